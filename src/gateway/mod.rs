//! Ledger read gateway
//!
//! Narrow, read-mostly view of the ledger node. Implementations classify every
//! failure before returning it and never retry; retry decisions belong to the
//! submitter.

use async_trait::async_trait;
use serde_json::Value;

use crate::classifier::ClassifiedError;
use crate::submitter::TransactionRequest;

pub mod http;
mod types;

pub use http::HttpLedgerGateway;
pub use types::{SimulationOutcome, TransactionRecord};

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current sequence number of an account
    async fn sequence_number(&self, address: &str) -> Result<u64, ClassifiedError>;

    /// Whether `resource_type` (`"<addr>::<module>::<struct>"`) is published at `address`
    ///
    /// A not-found response is `Ok(false)`, not an error.
    async fn resource_exists(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<bool, ClassifiedError>;

    /// Raw resource data
    async fn account_resource(
        &self,
        address: &str,
        resource_type: &str,
    ) -> Result<Value, ClassifiedError>;

    /// Dry-run `request` as `sender` without committing anything
    async fn simulate(
        &self,
        request: &TransactionRequest,
        sender: &str,
    ) -> Result<SimulationOutcome, ClassifiedError>;

    /// `Ok(None)` when the node does not know the hash (yet)
    async fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionRecord>, ClassifiedError>;

    /// Read-only view call; gas options on `request` are ignored
    async fn view(&self, request: &TransactionRequest) -> Result<Vec<Value>, ClassifiedError>;

    /// Liveness probe; `false` on any failure
    async fn is_network_reachable(&self) -> bool;
}
