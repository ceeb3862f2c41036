//! Error classification for ledger and signer failures
//!
//! Every failure that crosses a boundary (REST node, wallet signer, simulation
//! result) is turned into a [`ClassifiedError`] right away so the rest of the
//! pipeline only has to branch on an [`ErrorKind`].
//!
//! Classification is driven by an ordered rule table. The first rule whose
//! pattern appears in the failure text wins, so more specific patterns must be
//! listed before the generic ones they contain (`OUT_OF_GAS` before `GAS`,
//! wallet-missing messages before a bare `NOT FOUND`).

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Tagged kind of a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SequenceNumberConflict,
    ResourceAlreadyExists,
    ResourceNotFound,
    OutOfGas,
    GasEstimationFailure,
    PermissionDenied,
    InvalidArgument,
    VmExecutionError,
    WalletUnavailable,
    NetworkUnreachable,
    Unknown,
}

impl ErrorKind {
    /// Whether the submitter may retry an attempt that failed with this kind
    ///
    /// `Unknown` is treated as a generic, possibly transient failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SequenceNumberConflict | Self::Unknown)
    }

    /// `ResourceAlreadyExists` is a benign outcome for registry-style writes
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::ResourceAlreadyExists)
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::SequenceNumberConflict => "sequence_number",
            Self::ResourceAlreadyExists => "already_exists",
            Self::ResourceNotFound => "not_found",
            Self::OutOfGas => "out_of_gas",
            Self::GasEstimationFailure => "gas_estimation",
            Self::PermissionDenied => "permission",
            Self::InvalidArgument => "invalid_argument",
            Self::VmExecutionError => "vm_execution",
            Self::WalletUnavailable => "wallet",
            Self::NetworkUnreachable => "network",
            Self::Unknown => "unknown",
        }
    }

    /// Suggested next step shown to the user alongside the raw message
    pub fn actionable_hint(&self) -> &'static str {
        match self {
            Self::SequenceNumberConflict => {
                "Another transaction from this account is in flight. Wait a few seconds and retry."
            }
            Self::ResourceAlreadyExists => {
                "This record already exists on the ledger. No further action is needed."
            }
            Self::ResourceNotFound => {
                "The account or registry was not found. Fund the account or initialize the registry first."
            }
            Self::OutOfGas => "The transaction ran out of gas. Retry with a higher max gas amount.",
            Self::GasEstimationFailure => {
                "Gas could not be estimated or paid. Check the account balance and gas settings."
            }
            Self::PermissionDenied => {
                "The request was rejected or the account lacks permission. Approve it in the wallet or use an authorized account."
            }
            Self::InvalidArgument => "One of the submitted values is invalid. Review the form fields.",
            Self::VmExecutionError => {
                "The contract aborted during execution. Review the record values and the registry state."
            }
            Self::WalletUnavailable => {
                "No wallet signer is available. Install or unlock a compatible wallet and connect it."
            }
            Self::NetworkUnreachable => {
                "The ledger node could not be reached. Check the network connection and node URL."
            }
            Self::Unknown => "An unexpected error occurred. Retry, and report it if it persists.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SequenceNumberConflict => "SequenceNumberConflict",
            Self::ResourceAlreadyExists => "ResourceAlreadyExists",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::OutOfGas => "OutOfGas",
            Self::GasEstimationFailure => "GasEstimationFailure",
            Self::PermissionDenied => "PermissionDenied",
            Self::InvalidArgument => "InvalidArgument",
            Self::VmExecutionError => "VMExecutionError",
            Self::WalletUnavailable => "WalletUnavailable",
            Self::NetworkUnreachable => "NetworkUnreachable",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A failure after classification
///
/// The display form always carries the kind, the raw message and the hint so
/// any surface that prints it is actionable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {raw_message} ({actionable_hint})")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub raw_message: String,
    pub actionable_hint: String,
}

impl ClassifiedError {
    /// Build an error of a known kind with the kind's default hint
    pub fn new(kind: ErrorKind, raw_message: impl Into<String>) -> Self {
        Self {
            kind,
            raw_message: raw_message.into(),
            actionable_hint: kind.actionable_hint().to_string(),
        }
    }

    pub fn wallet_unavailable() -> Self {
        Self::new(
            ErrorKind::WalletUnavailable,
            "Wallet not found. Please install a compatible wallet extension.",
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Raw failure shapes seen at the boundaries
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// Nothing usable was reported
    Empty,
    /// An error message (transport error, signer rejection, ...)
    Message(String),
    /// A structured body, e.g. `{"message", "error_code", "vm_error_code"}`
    /// from the node or `{"vm_status"}` from a simulation
    Object(Value),
    /// A non-2xx HTTP response with whatever body came back
    Http { status: u16, body: Value },
}

impl RawFailure {
    /// Failure reported through a VM status string
    pub fn vm_status(status: impl Into<String>) -> Self {
        Self::Object(serde_json::json!({ "vm_status": status.into() }))
    }

    fn stringify(&self) -> String {
        match self {
            Self::Empty => "null".to_string(),
            Self::Message(msg) => msg.clone(),
            Self::Object(value) => stringify_value(value),
            Self::Http { status, body } => format!("HTTP {}: {}", status, stringify_value(body)),
        }
    }

    /// All text the rule table is matched against
    fn haystack(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Message(msg) => msg.clone(),
            Self::Object(value) | Self::Http { body: value, .. } => {
                let mut parts: Vec<String> = ["vm_status", "error_code", "vm_error_code", "message"]
                    .iter()
                    .filter_map(|field| value.get(*field))
                    .filter(|v| !v.is_null())
                    .map(stringify_value)
                    .collect();
                if let Value::String(s) = value {
                    parts.push(s.clone());
                }
                parts.join(" | ")
            }
        }
    }
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<&str> for RawFailure {
    fn from(msg: &str) -> Self {
        Self::Message(msg.to_string())
    }
}

impl From<String> for RawFailure {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

impl From<Value> for RawFailure {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) => Self::Message(s),
            other => Self::Object(other),
        }
    }
}

impl From<reqwest::Error> for RawFailure {
    fn from(err: reqwest::Error) -> Self {
        // Transport failures carry no ledger semantics; tag them so the
        // network rule matches even when the message is terse.
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Message(format!("network error: {}", err))
        } else {
            Self::Message(err.to_string())
        }
    }
}

impl From<anyhow::Error> for RawFailure {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{:#}", err))
    }
}

/// Ordered rule table, matched against the upper-cased failure text
const RULES: &[(&str, ErrorKind)] = &[
    ("RESOURCE_ALREADY_EXISTS", ErrorKind::ResourceAlreadyExists),
    ("EALREADY_EXISTS", ErrorKind::ResourceAlreadyExists),
    ("ALREADY EXISTS", ErrorKind::ResourceAlreadyExists),
    ("ALREADY_INITIALIZED", ErrorKind::ResourceAlreadyExists),
    ("SEQUENCE_NUMBER_TOO_OLD", ErrorKind::SequenceNumberConflict),
    ("SEQUENCE_NUMBER_TOO_NEW", ErrorKind::SequenceNumberConflict),
    ("SEQUENCE_NUMBER_TOO_BIG", ErrorKind::SequenceNumberConflict),
    ("SEQUENCE NUMBER", ErrorKind::SequenceNumberConflict),
    ("SEQUENCE_NUMBER", ErrorKind::SequenceNumberConflict),
    ("OUT_OF_GAS", ErrorKind::OutOfGas),
    ("OUT OF GAS", ErrorKind::OutOfGas),
    ("MAX_GAS_UNITS_BELOW_MIN_TRANSACTION_GAS_UNITS", ErrorKind::GasEstimationFailure),
    ("MAX_GAS_UNITS_EXCEEDS_MAX_GAS_UNITS_BOUND", ErrorKind::GasEstimationFailure),
    ("GAS_UNIT_PRICE_BELOW_MIN_BOUND", ErrorKind::GasEstimationFailure),
    ("INSUFFICIENT_BALANCE_FOR_TRANSACTION_FEE", ErrorKind::GasEstimationFailure),
    ("GAS ESTIMAT", ErrorKind::GasEstimationFailure),
    ("GAS", ErrorKind::GasEstimationFailure),
    ("WALLET NOT FOUND", ErrorKind::WalletUnavailable),
    ("WALLET_UNAVAILABLE", ErrorKind::WalletUnavailable),
    ("NO WALLET", ErrorKind::WalletUnavailable),
    ("NOT INSTALLED", ErrorKind::WalletUnavailable),
    ("USER REJECTED", ErrorKind::PermissionDenied),
    ("REJECTED THE REQUEST", ErrorKind::PermissionDenied),
    ("PERMISSION_DENIED", ErrorKind::PermissionDenied),
    ("PERMISSION DENIED", ErrorKind::PermissionDenied),
    ("ENOT_AUTHORIZED", ErrorKind::PermissionDenied),
    ("EUNAUTHORIZED", ErrorKind::PermissionDenied),
    ("UNAUTHORIZED", ErrorKind::PermissionDenied),
    ("RESOURCE_NOT_FOUND", ErrorKind::ResourceNotFound),
    ("ACCOUNT_NOT_FOUND", ErrorKind::ResourceNotFound),
    ("RESOURCE_DOES_NOT_EXIST", ErrorKind::ResourceNotFound),
    ("SENDING_ACCOUNT_DOES_NOT_EXIST", ErrorKind::ResourceNotFound),
    ("ENOT_INITIALIZED", ErrorKind::ResourceNotFound),
    ("NOT FOUND", ErrorKind::ResourceNotFound),
    ("FAILED_TO_DESERIALIZE_ARGUMENT", ErrorKind::InvalidArgument),
    ("NUMBER_OF_ARGUMENTS_MISMATCH", ErrorKind::InvalidArgument),
    ("NUMBER_OF_TYPE_ARGUMENTS_MISMATCH", ErrorKind::InvalidArgument),
    ("INVALID_ARGUMENT", ErrorKind::InvalidArgument),
    ("INVALID_INPUT", ErrorKind::InvalidArgument),
    ("EINVALID", ErrorKind::InvalidArgument),
    ("MOVE_ABORT", ErrorKind::VmExecutionError),
    ("MOVE ABORT", ErrorKind::VmExecutionError),
    ("EXECUTION_FAILURE", ErrorKind::VmExecutionError),
    ("ARITHMETIC_ERROR", ErrorKind::VmExecutionError),
    ("VM_ERROR", ErrorKind::VmExecutionError),
    ("FAILED TO FETCH", ErrorKind::NetworkUnreachable),
    ("NETWORK ERROR", ErrorKind::NetworkUnreachable),
    ("ECONNREFUSED", ErrorKind::NetworkUnreachable),
    ("CONNECTION REFUSED", ErrorKind::NetworkUnreachable),
    ("CONNECTION RESET", ErrorKind::NetworkUnreachable),
    ("TIMED OUT", ErrorKind::NetworkUnreachable),
    ("DNS ERROR", ErrorKind::NetworkUnreachable),
    ("SERVICE UNAVAILABLE", ErrorKind::NetworkUnreachable),
];

/// Classify a raw failure
///
/// Total: every input maps to a [`ClassifiedError`], falling back to
/// [`ErrorKind::Unknown`] with the stringified failure as raw message.
pub fn classify(raw: impl Into<RawFailure>) -> ClassifiedError {
    let raw = raw.into();
    let haystack = raw.haystack().to_uppercase();

    let kind = RULES
        .iter()
        .find(|(pattern, _)| haystack.contains(pattern))
        .map(|(_, kind)| *kind)
        .or_else(|| classify_http_status(&raw))
        .unwrap_or(ErrorKind::Unknown);

    ClassifiedError::new(kind, raw.stringify())
}

/// Status-code fallback for responses whose body matched no rule
fn classify_http_status(raw: &RawFailure) -> Option<ErrorKind> {
    match raw {
        RawFailure::Http { status, .. } => match *status {
            404 => Some(ErrorKind::ResourceNotFound),
            400 => Some(ErrorKind::InvalidArgument),
            401 | 403 => Some(ErrorKind::PermissionDenied),
            502..=504 => Some(ErrorKind::NetworkUnreachable),
            _ => None,
        },
        _ => None,
    }
}
