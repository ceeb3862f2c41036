use crate::classifier::{classify, ClassifiedError, RawFailure};
use crate::encoding::decode_u64;
use serde_json::Value;

/// Dry-run result for a transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub success: bool,
    pub vm_status: String,
    pub gas_used: Option<u64>,
    pub gas_unit_price: Option<u64>,
    pub max_gas_amount: Option<u64>,
}

impl SimulationOutcome {
    /// Parse one entry of the node's simulate response
    pub fn from_json(value: &Value) -> Option<Self> {
        Some(Self {
            success: value.get("success")?.as_bool()?,
            vm_status: value
                .get("vm_status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            gas_used: value.get("gas_used").and_then(decode_u64),
            gas_unit_price: value.get("gas_unit_price").and_then(decode_u64),
            max_gas_amount: value.get("max_gas_amount").and_then(decode_u64),
        })
    }

    /// A failed dry run is classified from its VM status
    pub fn into_result(self) -> Result<Self, ClassifiedError> {
        if self.success {
            Ok(self)
        } else {
            Err(classify(RawFailure::vm_status(self.vm_status)))
        }
    }
}

/// Transaction as reported by the node's by-hash lookup
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionRecord {
    /// Accepted into the mempool, not yet executed
    Pending { hash: String },
    Committed {
        hash: String,
        success: bool,
        vm_status: String,
        gas_used: Option<String>,
        events: Vec<Value>,
    },
}

impl TransactionRecord {
    pub fn from_json(value: &Value) -> Option<Self> {
        let hash = value.get("hash")?.as_str()?.to_string();
        if value.get("type").and_then(Value::as_str) == Some("pending_transaction") {
            return Some(Self::Pending { hash });
        }

        Some(Self::Committed {
            hash,
            success: value.get("success")?.as_bool()?,
            vm_status: value
                .get("vm_status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            gas_used: value.get("gas_used").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            events: value
                .get("events")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn hash(&self) -> &str {
        match self {
            Self::Pending { hash } | Self::Committed { hash, .. } => hash,
        }
    }
}
