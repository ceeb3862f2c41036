//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Submission counters
    pub submissions_total: IntCounter,
    pub submission_attempts_total: IntCounter,
    pub submission_retries_total: IntCounter,
    pub submissions_already_exist_total: IntCounter,
    pub submissions_failed_total: IntCounterVec,

    // Confirmation counters
    pub confirmations_total: IntCounterVec,
    pub confirmation_timeouts_total: IntCounter,

    // Histograms
    pub confirmation_latency: Histogram,
    pub gateway_latency: HistogramVec,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "submissions_total",
            "Number of logical transaction submissions",
        ))?;

        let submission_attempts_total = IntCounter::with_opts(Opts::new(
            "submission_attempts_total",
            "Number of simulate + sign-and-submit attempts",
        ))?;

        let submission_retries_total = IntCounter::with_opts(Opts::new(
            "submission_retries_total",
            "Number of attempts scheduled after a retryable failure",
        ))?;

        let submissions_already_exist_total = IntCounter::with_opts(Opts::new(
            "submissions_already_exist_total",
            "Submissions resolved as already present on the ledger",
        ))?;

        let submissions_failed_total = IntCounterVec::new(
            Opts::new("submissions_failed_total", "Failed submissions by error category"),
            &["category"],
        )?;

        let confirmations_total = IntCounterVec::new(
            Opts::new("confirmations_total", "Confirmation results by outcome"),
            &["outcome"],
        )?;

        let confirmation_timeouts_total = IntCounter::with_opts(Opts::new(
            "confirmation_timeouts_total",
            "Confirmations abandoned after the polling timeout",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to terminal confirmation",
            )
            .buckets(vec![0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 60.0]),
        )?;

        let gateway_latency = HistogramVec::new(
            HistogramOpts::new("gateway_latency_seconds", "Ledger node call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["operation"],
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submission_attempts_total.clone()))?;
        registry.register(Box::new(submission_retries_total.clone()))?;
        registry.register(Box::new(submissions_already_exist_total.clone()))?;
        registry.register(Box::new(submissions_failed_total.clone()))?;
        registry.register(Box::new(confirmations_total.clone()))?;
        registry.register(Box::new(confirmation_timeouts_total.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(gateway_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            submission_attempts_total,
            submission_retries_total,
            submissions_already_exist_total,
            submissions_failed_total,
            confirmations_total,
            confirmation_timeouts_total,
            confirmation_latency,
            gateway_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.submissions_total.inc();
        m.submissions_failed_total
            .with_label_values(&["permission"])
            .inc();

        let text = m.render().unwrap();
        assert!(text.contains("submissions_total 1"));
        assert!(text.contains("submissions_failed_total{category=\"permission\"} 1"));
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let before = metrics().submission_retries_total.get();
        metrics().submission_retries_total.inc();
        assert!(metrics().submission_retries_total.get() > before);
    }
}
