//! Transaction submission state machine
//!
//! One `submit` call walks Simulate -> Sign&Submit -> (Retryable-Wait ->
//! Simulate)* -> Done | Failed. The submitter is the only component that makes
//! retry decisions; everything it talks to classifies and returns.

mod payload;
mod registry;
mod retry;

pub use payload::{
    apply_gas_margin, AttemptOutcome, EntryFunctionPayload, GasOptions, SimulatedGas,
    SubmissionAttempt, SubmitOutcome, TransactionRequest, ALREADY_EXISTS_PREFIX,
    SIMULATION_ALREADY_EXISTS_PREFIX,
};
pub use registry::{RegistryInitState, RegistryTracker};
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::classifier::{classify, ClassifiedError};
use crate::gateway::{LedgerGateway, SimulationOutcome};
use crate::metrics::metrics;
use crate::signer::Signer;
use crate::structured_logging::SubmissionLogger;

/// Tunables of the submission state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPolicy {
    pub retry: RetryPolicy,
    /// Pause after a successful sign-and-submit so the node can index it
    pub propagation_delay: Duration,
    /// Safety margin added to the simulated max gas amount
    pub gas_margin_percent: u32,
    /// Keep going when simulation fails for a reason other than "already exists"
    pub proceed_on_simulation_failure: bool,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            propagation_delay: Duration::from_millis(500),
            gas_margin_percent: 50,
            proceed_on_simulation_failure: true,
        }
    }
}

/// How a single attempt ended
enum Step {
    Submitted(String),
    AlreadyExists,
    Failed(ClassifiedError),
}

pub struct TransactionSubmitter {
    gateway: Arc<dyn LedgerGateway>,
    signer: Option<Arc<dyn Signer>>,
    policy: SubmissionPolicy,
}

impl TransactionSubmitter {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Option<Arc<dyn Signer>>,
        policy: SubmissionPolicy,
    ) -> Self {
        Self {
            gateway,
            signer,
            policy,
        }
    }

    pub fn policy(&self) -> &SubmissionPolicy {
        &self.policy
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    /// Submit `request` on behalf of `wallet_address`
    ///
    /// Returns once the signer accepted the transaction (or the ledger reported
    /// the record as already present). Confirmation is the caller's job.
    #[instrument(skip(self, request), fields(function = %request.function_id()))]
    pub async fn submit(
        &self,
        wallet_address: &str,
        request: &TransactionRequest,
    ) -> Result<SubmitOutcome, ClassifiedError> {
        let logger = SubmissionLogger::new(request.function_id());
        metrics().submissions_total.inc();

        let Some(signer) = self.signer.as_deref() else {
            let err = ClassifiedError::wallet_unavailable();
            logger.log_failure(0, &err);
            metrics()
                .submissions_failed_total
                .with_label_values(&[err.kind.category()])
                .inc();
            return Err(err);
        };

        let max_attempts = self.policy.retry.max_attempts.max(1);
        let mut attempts: Vec<SubmissionAttempt> = Vec::new();

        loop {
            let attempt_number = attempts.len() as u32 + 1;
            metrics().submission_attempts_total.inc();

            let (record, step) = self
                .attempt(signer, wallet_address, request, attempt_number, max_attempts, &logger)
                .await;
            attempts.push(record);

            let err = match step {
                Step::Submitted(hash) => {
                    return Ok(SubmitOutcome {
                        hash,
                        already_completed: false,
                        attempts,
                    });
                }
                Step::AlreadyExists => {
                    logger.log_already_exists("simulation");
                    return Ok(already_completed(SIMULATION_ALREADY_EXISTS_PREFIX, attempts));
                }
                Step::Failed(err) => err,
            };

            if err.kind.is_benign() {
                logger.log_already_exists("submission");
                return Ok(already_completed(ALREADY_EXISTS_PREFIX, attempts));
            }

            let delay = if err.is_retryable() {
                self.policy.retry.calculate_delay(attempt_number)
            } else {
                None
            };

            match delay {
                Some(delay) => {
                    logger.log_retry(attempt_number, &err, delay.as_millis() as u64);
                    metrics().submission_retries_total.inc();
                    tokio::time::sleep(delay).await;
                }
                None => {
                    logger.log_failure(attempt_number, &err);
                    metrics()
                        .submissions_failed_total
                        .with_label_values(&[err.kind.category()])
                        .inc();
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        signer: &dyn Signer,
        wallet_address: &str,
        request: &TransactionRequest,
        attempt_number: u32,
        max_attempts: u32,
        logger: &SubmissionLogger,
    ) -> (SubmissionAttempt, Step) {
        // Best-effort: the signer fills in the sequence number when we cannot
        let sequence_number = match self.gateway.sequence_number(wallet_address).await {
            Ok(n) => Some(n),
            Err(err) => {
                logger.log_sequence_unavailable(&err);
                None
            }
        };
        logger.log_attempt(attempt_number, max_attempts, sequence_number);

        let record = |simulated_gas, outcome| SubmissionAttempt {
            attempt_number,
            sequence_number_used: sequence_number,
            simulated_gas,
            outcome,
        };

        let mut simulated_gas = None;
        let mut gas = request.gas_options.unwrap_or_default();
        let simulation = self
            .gateway
            .simulate(request, wallet_address)
            .await
            .and_then(SimulationOutcome::into_result);

        match simulation {
            Ok(outcome) => {
                if outcome.gas_unit_price.is_some() {
                    gas.gas_unit_price = outcome.gas_unit_price;
                }
                if let Some(estimate) = outcome.max_gas_amount {
                    gas.max_gas_amount =
                        Some(apply_gas_margin(estimate, self.policy.gas_margin_percent));
                }
                simulated_gas = Some(SimulatedGas {
                    unit_price: outcome.gas_unit_price,
                    max_amount: outcome.max_gas_amount,
                });
                logger.log_simulation(gas.max_gas_amount, gas.gas_unit_price);
            }
            Err(err) if err.kind.is_benign() => {
                return (record(None, AttemptOutcome::Failed(err)), Step::AlreadyExists);
            }
            Err(err) => {
                logger.log_simulation_failure(&err);
                if !self.policy.proceed_on_simulation_failure {
                    return (
                        record(None, AttemptOutcome::Failed(err.clone())),
                        Step::Failed(err),
                    );
                }
            }
        }

        let payload = EntryFunctionPayload::build(request, sequence_number, gas);
        match signer.sign_and_submit_transaction(&payload).await {
            Ok(response) => {
                let hash = response.into_hash();
                logger.log_submitted(&hash, attempt_number);
                tokio::time::sleep(self.policy.propagation_delay).await;
                (
                    record(simulated_gas, AttemptOutcome::Submitted(hash.clone())),
                    Step::Submitted(hash),
                )
            }
            Err(raw) => {
                let err = classify(raw);
                (
                    record(simulated_gas, AttemptOutcome::Failed(err.clone())),
                    Step::Failed(err),
                )
            }
        }
    }
}

fn already_completed(prefix: &str, attempts: Vec<SubmissionAttempt>) -> SubmitOutcome {
    metrics().submissions_already_exist_total.inc();
    SubmitOutcome {
        hash: format!("{}{}", prefix, chrono::Utc::now().timestamp_millis()),
        already_completed: true,
        attempts,
    }
}
