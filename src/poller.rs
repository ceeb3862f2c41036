//! Confirmation polling for submitted transactions

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::gateway::{LedgerGateway, TransactionRecord};
use crate::metrics::{metrics, Timer};

pub const TIMEOUT_STATUS: &str = "Timeout waiting for confirmation";
pub const CANCELLED_STATUS: &str = "Confirmation cancelled";
pub const NOT_FOUND_STATUS: &str = "Transaction not found or query failed";
pub const PENDING_STATUS: &str = "Pending";

/// Terminal view of one transaction hash
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationResult {
    pub success: bool,
    pub status: String,
    pub vm_status: Option<String>,
    pub gas_used: Option<String>,
    pub events: Option<Vec<Value>>,
}

impl ConfirmationResult {
    fn unresolved(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
            vm_status: None,
            gas_used: None,
            events: None,
        }
    }

    fn from_record(record: TransactionRecord) -> Self {
        match record {
            TransactionRecord::Pending { .. } => Self::unresolved(PENDING_STATUS),
            TransactionRecord::Committed {
                success,
                vm_status,
                gas_used,
                events,
                ..
            } => Self {
                success,
                status: vm_status.clone(),
                vm_status: Some(vm_status),
                gas_used,
                events: Some(events),
            },
        }
    }

    /// The ledger state is unknown; the transaction may still land
    pub fn is_timeout(&self) -> bool {
        self.status.starts_with(TIMEOUT_STATUS)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == CANCELLED_STATUS
    }
}

/// Polls the gateway at a fixed interval until a hash reaches a terminal state
pub struct ConfirmationPoller {
    gateway: Arc<dyn LedgerGateway>,
    interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(gateway: Arc<dyn LedgerGateway>, interval: Duration) -> Self {
        Self { gateway, interval }
    }

    /// Single lookup without waiting
    pub async fn check_transaction(&self, hash: &str) -> ConfirmationResult {
        match self.gateway.transaction_by_hash(hash).await {
            Ok(Some(record)) => ConfirmationResult::from_record(record),
            Ok(None) => ConfirmationResult::unresolved(NOT_FOUND_STATUS),
            Err(err) => {
                warn!(hash, error = %err, "Transaction lookup failed");
                ConfirmationResult::unresolved(NOT_FOUND_STATUS)
            }
        }
    }

    /// Poll until `hash` is committed, `timeout` elapses or `cancel` fires
    ///
    /// Each iteration sleeps one interval before querying. Lookup failures are
    /// treated like "not indexed yet". A timed-out result carries the last
    /// status seen, so callers must read it as "unknown", not as a failure.
    #[instrument(skip(self, cancel))]
    pub async fn wait_for(
        &self,
        hash: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ConfirmationResult {
        let started = Instant::now();
        let timer = Timer::new();
        let mut last_seen: Option<&'static str> = None;
        let mut polls = 0u32;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(hash, polls, "Confirmation polling cancelled");
                    metrics().confirmations_total.with_label_values(&["cancelled"]).inc();
                    return ConfirmationResult::unresolved(CANCELLED_STATUS);
                }

                _ = sleep(self.interval) => {}
            }

            polls += 1;
            match self.gateway.transaction_by_hash(hash).await {
                Ok(Some(TransactionRecord::Pending { .. })) => {
                    last_seen = Some(PENDING_STATUS);
                }
                Ok(Some(record)) => {
                    let result = ConfirmationResult::from_record(record);
                    let outcome = if result.success { "success" } else { "failure" };
                    info!(hash, polls, success = result.success, status = %result.status, "Transaction confirmed");
                    metrics().confirmations_total.with_label_values(&[outcome]).inc();
                    timer.observe_duration(&metrics().confirmation_latency);
                    return result;
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(hash, polls, error = %err, "Transaction not available yet");
                }
            }

            if started.elapsed() >= timeout {
                warn!(hash, polls, "Timed out waiting for confirmation");
                metrics().confirmation_timeouts_total.inc();
                let status = match last_seen {
                    Some(seen) => format!("{TIMEOUT_STATUS} (last seen: {seen})"),
                    None => TIMEOUT_STATUS.to_string(),
                };
                return ConfirmationResult::unresolved(status);
            }
        }
    }
}
