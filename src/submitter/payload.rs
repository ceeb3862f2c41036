//! Transaction requests, signer payloads and per-attempt records

use crate::classifier::ClassifiedError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of the synthetic hash returned when simulation reports the record exists
pub const SIMULATION_ALREADY_EXISTS_PREFIX: &str = "simulation-already-exists-";

/// Prefix of the synthetic hash returned when submission reports the record exists
pub const ALREADY_EXISTS_PREFIX: &str = "already-exists-";

/// Caller-provided gas settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasOptions {
    pub max_gas_amount: Option<u64>,
    pub gas_unit_price: Option<u64>,
}

/// A logical "call this entry function" intent
///
/// Built fresh for every call and only ever shared by reference afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRequest {
    pub module_address: String,
    pub module_name: String,
    pub function_name: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
    pub gas_options: Option<GasOptions>,
}

impl TransactionRequest {
    pub fn new(
        module_address: impl Into<String>,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            module_address: module_address.into(),
            module_name: module_name.into(),
            function_name: function_name.into(),
            type_arguments: Vec::new(),
            arguments: Vec::new(),
            gas_options: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_type_arguments(mut self, type_arguments: Vec<String>) -> Self {
        self.type_arguments = type_arguments;
        self
    }

    pub fn with_gas_options(mut self, gas_options: GasOptions) -> Self {
        self.gas_options = Some(gas_options);
        self
    }

    /// Fully-qualified `<address>::<module>::<function>` target
    pub fn function_id(&self) -> String {
        format!(
            "{}::{}::{}",
            self.module_address, self.module_name, self.function_name
        )
    }
}

/// Payload handed to the wallet signer
///
/// Numeric fields are decimal strings, as the wallet API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_unit_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas_amount: Option<String>,
}

impl EntryFunctionPayload {
    pub fn build(
        request: &TransactionRequest,
        sequence_number: Option<u64>,
        gas: GasOptions,
    ) -> Self {
        Self {
            function: request.function_id(),
            type_arguments: request.type_arguments.clone(),
            arguments: request.arguments.clone(),
            sequence_number: sequence_number.map(|n| n.to_string()),
            gas_unit_price: gas.gas_unit_price.map(|n| n.to_string()),
            max_gas_amount: gas.max_gas_amount.map(|n| n.to_string()),
        }
    }
}

/// Gas figures adopted from a successful simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedGas {
    pub unit_price: Option<u64>,
    pub max_amount: Option<u64>,
}

/// Add `margin_percent` to a gas estimate, rounding up
pub fn apply_gas_margin(estimate: u64, margin_percent: u32) -> u64 {
    let scaled = estimate as u128 * (100 + margin_percent as u128);
    let with_margin = scaled.div_ceil(100);
    u64::try_from(with_margin).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Submitted(String),
    Failed(ClassifiedError),
}

/// Record of one pass through simulate + sign-and-submit
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionAttempt {
    pub attempt_number: u32,
    pub sequence_number_used: Option<u64>,
    pub simulated_gas: Option<SimulatedGas>,
    pub outcome: AttemptOutcome,
}

/// Result of a submit call that reached `Done`
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub hash: String,
    /// The ledger reported the record as already present; `hash` is synthetic
    pub already_completed: bool,
    pub attempts: Vec<SubmissionAttempt>,
}

impl SubmitOutcome {
    pub fn is_synthetic(&self) -> bool {
        self.already_completed
    }
}
