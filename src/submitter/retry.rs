use rand::Rng;
use std::time::Duration;

/// Retry configuration with linear backoff and jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: u32,
    /// Backoff step; the n-th retry waits `n * backoff_base_ms`
    pub backoff_base_ms: u64,
    /// Upper bound (exclusive) of the random jitter added to every wait
    pub jitter_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 2000,
            jitter_max_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failed_attempts` attempts failed
    ///
    /// `None` once the attempt budget is spent.
    pub fn calculate_delay(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }

        let base = self.backoff_base_ms.saturating_mul(failed_attempts as u64);
        let jitter = if self.jitter_max_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter_max_ms)
        };

        Some(Duration::from_millis(base.saturating_add(jitter)))
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base_ms: 0,
            jitter_max_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();

        let first = policy.calculate_delay(1).unwrap();
        assert!(first >= Duration::from_millis(2000));
        assert!(first < Duration::from_millis(3000));

        let second = policy.calculate_delay(2).unwrap();
        assert!(second >= Duration::from_millis(4000));
        assert!(second < Duration::from_millis(5000));
        assert!(second > first);

        assert!(policy.calculate_delay(3).is_none());
        assert!(policy.calculate_delay(0).is_none());
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(5);
        assert_eq!(policy.calculate_delay(4), Some(Duration::ZERO));
        assert_eq!(policy.calculate_delay(5), None);
    }
}
