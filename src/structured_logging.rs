//! Structured logging for the submission pipeline

use uuid::Uuid;

use crate::classifier::ClassifiedError;

/// Structured logger for one logical submission
///
/// Every event carries the same `context_id` so the attempts, retries and the
/// final outcome of a submission can be correlated in the logs.
#[derive(Debug, Clone)]
pub struct SubmissionLogger {
    context_id: String,
    function: String,
}

impl SubmissionLogger {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            context_id: Uuid::new_v4().to_string(),
            function: function.into(),
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_attempt(&self, attempt: u32, max_attempts: u32, sequence_number: Option<u64>) {
        tracing::info!(
            context_id = %self.context_id,
            function = %self.function,
            attempt,
            max_attempts,
            sequence_number = ?sequence_number,
            "Submitting transaction attempt"
        );
    }

    pub fn log_sequence_unavailable(&self, error: &ClassifiedError) {
        tracing::warn!(
            context_id = %self.context_id,
            function = %self.function,
            error = %error,
            "Failed to get sequence number, continuing without it"
        );
    }

    pub fn log_simulation(&self, max_gas_amount: Option<u64>, gas_unit_price: Option<u64>) {
        tracing::debug!(
            context_id = %self.context_id,
            function = %self.function,
            max_gas_amount = ?max_gas_amount,
            gas_unit_price = ?gas_unit_price,
            "Simulation successful, adopting gas estimates"
        );
    }

    pub fn log_simulation_failure(&self, error: &ClassifiedError) {
        tracing::warn!(
            context_id = %self.context_id,
            function = %self.function,
            kind = %error.kind,
            error = %error.raw_message,
            "Simulation failed, proceeding with submission"
        );
    }

    pub fn log_submitted(&self, hash: &str, attempt: u32) {
        tracing::info!(
            context_id = %self.context_id,
            function = %self.function,
            hash = %hash,
            attempt,
            "Transaction submitted"
        );
    }

    pub fn log_already_exists(&self, stage: &str) {
        tracing::info!(
            context_id = %self.context_id,
            function = %self.function,
            stage = %stage,
            "Resource already exists, treating as success"
        );
    }

    pub fn log_retry(&self, attempt: u32, error: &ClassifiedError, backoff_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            function = %self.function,
            attempt,
            kind = %error.kind,
            backoff_ms,
            "Transient submission failure, backing off before retry"
        );
    }

    pub fn log_failure(&self, attempts: u32, error: &ClassifiedError) {
        tracing::error!(
            context_id = %self.context_id,
            function = %self.function,
            attempts,
            kind = %error.kind,
            error = %error.raw_message,
            hint = %error.actionable_hint,
            "Transaction submission failed"
        );
    }
}
