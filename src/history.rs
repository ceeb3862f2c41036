//! Transaction history records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which domain contract produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Sample,
    Data,
    Access,
    Workflow,
    Ip,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sample => "sample",
            Self::Data => "data",
            Self::Access => "access",
            Self::Workflow => "workflow",
            Self::Ip => "ip",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    /// Confirmation timed out; the ledger state is unknown
    Pending,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHistoryItem {
    pub id: String,
    pub wallet_address: String,
    pub transaction_hash: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub status: HistoryStatus,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl TransactionHistoryItem {
    pub fn new(
        wallet_address: impl Into<String>,
        record_type: RecordType,
        title: impl Into<String>,
        description: impl Into<String>,
        transaction_hash: impl Into<String>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self {
            id: format!("tx-{timestamp}"),
            wallet_address: wallet_address.into(),
            transaction_hash: transaction_hash.into(),
            timestamp,
            status: HistoryStatus::Success,
            record_type,
            title: title.into(),
            description: description.into(),
            details: None,
        }
    }

    pub fn with_status(mut self, status: HistoryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Storage key of a wallet's history list
pub fn history_key(wallet_address: &str) -> String {
    format!("txHistory_{wallet_address}")
}
