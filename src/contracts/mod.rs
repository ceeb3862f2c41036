//! Domain record contracts
//!
//! Each contract knows its module name, its registry resource and the
//! positional argument layout of its entry functions. Writes go through
//! [`ContractModule::execute`], which ensures the registry, submits, waits for
//! confirmation, records history and emits exactly one notification. Reads are
//! best-effort view calls.

pub mod access;
pub mod data;
pub mod ip;
pub mod sample;
pub mod workflow;

pub use access::{AccessControl, AccessLevel, Permission};
pub use data::{experiment_fingerprint, DataUpdate, ExperimentalData, ExperimentalDataAuditTrail};
pub use ip::{IntellectualProperty, IntellectualPropertyAttribution};
pub use sample::{Sample, SampleHistoryEvent, SampleProvenance};
pub use workflow::{TaskDraft, TaskStatus, WorkflowAutomation, WorkflowTask};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::classifier::{classify, ClassifiedError, ErrorKind, RawFailure};
use crate::encoding::{decode_text, decode_u64};
use crate::history::{HistoryStatus, RecordType, TransactionHistoryItem};
use crate::poller::ConfirmationResult;
use crate::session::{Notification, WalletSession};
use crate::submitter::TransactionRequest;

/// Address the contract modules are published under
pub const DEFAULT_CONTRACT_ADDRESS: &str =
    "0x08e845d10bbb594fcffceb36d934a188bb84d9cdf7362e4e2522265b185127cb";

/// Fixed call-target table entry for one module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSpec {
    pub module: &'static str,
    /// Registry resource published under the sender's account
    pub registry_struct: &'static str,
    pub init_function: &'static str,
    pub entry_functions: &'static [&'static str],
    pub record_type: RecordType,
}

pub const SAMPLE_PROVENANCE: ModuleSpec = ModuleSpec {
    module: "SampleProvenance",
    registry_struct: "SampleRegistry",
    init_function: "initialize_registry",
    entry_functions: &["register_sample", "record_transfer"],
    record_type: RecordType::Sample,
};

pub const EXPERIMENTAL_DATA: ModuleSpec = ModuleSpec {
    module: "ExperimentalDataAuditTrail",
    registry_struct: "DataRegistry",
    init_function: "initialize_data_registry",
    entry_functions: &["submit_experiment", "update_experiment"],
    record_type: RecordType::Data,
};

pub const ACCESS_CONTROL: ModuleSpec = ModuleSpec {
    module: "AccessControlPermission",
    registry_struct: "PermissionRegistry",
    init_function: "initialize_permission_registry",
    entry_functions: &["grant_permission"],
    record_type: RecordType::Access,
};

pub const WORKFLOW_AUTOMATION: ModuleSpec = ModuleSpec {
    module: "WorkflowAutomationCompliance",
    registry_struct: "WorkflowRegistry",
    init_function: "initialize_workflow_registry",
    entry_functions: &["create_task", "update_task_status"],
    record_type: RecordType::Workflow,
};

pub const INTELLECTUAL_PROPERTY: ModuleSpec = ModuleSpec {
    module: "IntellectualPropertyAttribution",
    registry_struct: "IPRegistry",
    init_function: "initialize_ip_registry",
    entry_functions: &["register_contribution"],
    record_type: RecordType::Ip,
};

pub const CALL_TARGETS: [ModuleSpec; 5] = [
    SAMPLE_PROVENANCE,
    EXPERIMENTAL_DATA,
    ACCESS_CONTROL,
    WORKFLOW_AUTOMATION,
    INTELLECTUAL_PROPERTY,
];

/// Look a module up by name
pub fn module_spec(module: &str) -> Option<&'static ModuleSpec> {
    CALL_TARGETS.iter().find(|spec| spec.module == module)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiptStatus {
    Confirmed,
    /// The ledger already holds the record; no transaction was committed
    AlreadyCompleted,
    /// Submitted but not confirmed in time
    Pending,
}

/// What a domain write produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub hash: String,
    pub status: ReceiptStatus,
    pub confirmation: Option<ConfirmationResult>,
    #[serde(skip)]
    pub history: Option<TransactionHistoryItem>,
}

impl SubmissionReceipt {
    fn notification(&self, title: &str) -> Notification {
        let title = title.to_string();
        match self.status {
            ReceiptStatus::Confirmed => Notification::Success {
                title,
                hash: self.hash.clone(),
            },
            ReceiptStatus::AlreadyCompleted => Notification::AlreadyCompleted { title },
            ReceiptStatus::Pending => Notification::Pending {
                title,
                hash: self.hash.clone(),
            },
        }
    }
}

/// One domain write: entry function, encoded arguments and history text
#[derive(Debug, Clone)]
pub struct RecordCall {
    pub function: &'static str,
    pub arguments: Vec<Value>,
    pub title: &'static str,
    pub description: String,
    pub details: Option<Value>,
}

/// A module of the contract package bound to a session
#[derive(Clone)]
pub struct ContractModule {
    session: Arc<WalletSession>,
    contract_address: String,
    spec: &'static ModuleSpec,
}

impl ContractModule {
    pub fn new(
        session: Arc<WalletSession>,
        contract_address: impl Into<String>,
        spec: &'static ModuleSpec,
    ) -> Self {
        Self {
            session,
            contract_address: contract_address.into(),
            spec,
        }
    }

    pub fn spec(&self) -> &'static ModuleSpec {
        self.spec
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    pub fn request(&self, function: &str, arguments: Vec<Value>) -> TransactionRequest {
        TransactionRequest::new(&self.contract_address, self.spec.module, function)
            .with_arguments(arguments)
    }

    /// `"<addr>::<module>::<struct>"`
    pub fn resource_type(&self, struct_name: &str) -> String {
        format!("{}::{}::{}", self.contract_address, self.spec.module, struct_name)
    }

    pub async fn ensure_registry(&self) -> Result<(), ClassifiedError> {
        let init = self.request(self.spec.init_function, Vec::new());
        self.session
            .ensure_registry(
                self.spec.module,
                &self.resource_type(self.spec.registry_struct),
                &init,
            )
            .await
    }

    /// Run a domain write end to end
    pub async fn execute(&self, call: RecordCall) -> Result<SubmissionReceipt, ClassifiedError> {
        match self.run(&call).await {
            Ok(receipt) => {
                self.session.notify(receipt.notification(call.title));
                Ok(receipt)
            }
            Err(err) => {
                if err.kind == ErrorKind::ResourceNotFound {
                    self.session.invalidate_registry(self.spec.module);
                }
                self.session.notify(Notification::Failed {
                    title: call.title.to_string(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Surface an argument error for a write that never reached `execute`
    pub fn reject(&self, title: &str, err: ClassifiedError) -> ClassifiedError {
        self.session.notify(Notification::Failed {
            title: title.to_string(),
            error: err.clone(),
        });
        err
    }

    async fn run(&self, call: &RecordCall) -> Result<SubmissionReceipt, ClassifiedError> {
        self.ensure_registry().await?;

        let request = self.request(call.function, call.arguments.clone());
        let outcome = self.session.submit(&request).await?;
        if outcome.already_completed {
            return Ok(SubmissionReceipt {
                hash: outcome.hash,
                status: ReceiptStatus::AlreadyCompleted,
                confirmation: None,
                history: None,
            });
        }

        let confirmation = self.session.wait_for_confirmation(&outcome.hash).await;
        let status = if confirmation.success {
            ReceiptStatus::Confirmed
        } else if confirmation.is_timeout() || confirmation.is_cancelled() {
            ReceiptStatus::Pending
        } else {
            let vm_status = confirmation
                .vm_status
                .clone()
                .unwrap_or_else(|| confirmation.status.clone());
            let err = classify(RawFailure::vm_status(vm_status));
            if !err.kind.is_benign() {
                return Err(err);
            }
            return Ok(SubmissionReceipt {
                hash: outcome.hash,
                status: ReceiptStatus::AlreadyCompleted,
                confirmation: Some(confirmation),
                history: None,
            });
        };

        let history_status = match status {
            ReceiptStatus::Pending => HistoryStatus::Pending,
            _ => HistoryStatus::Success,
        };
        let history = self.session.add_transaction_to_history(
            self.spec.record_type,
            call.title,
            &call.description,
            &outcome.hash,
            history_status,
            call.details.clone(),
        );
        info!(
            module = self.spec.module,
            function = call.function,
            hash = %outcome.hash,
            ?status,
            "Domain record submitted"
        );

        Ok(SubmissionReceipt {
            hash: outcome.hash,
            status,
            confirmation: Some(confirmation),
            history,
        })
    }

    /// Best-effort view call; `None` on any failure
    pub async fn view(&self, function: &str, arguments: Vec<Value>) -> Option<Vec<Value>> {
        let request = self.request(function, arguments);
        match self.session.gateway().view(&request).await {
            Ok(values) => Some(values),
            Err(err) => {
                debug!(module = self.spec.module, function, error = %err, "View call failed");
                None
            }
        }
    }

    /// First return value of a view call
    pub async fn view_first(&self, function: &str, arguments: Vec<Value>) -> Option<Value> {
        self.view(function, arguments)
            .await
            .and_then(|values| values.into_iter().next())
    }
}

/// Decode a view value that is either a vector of records or a single record
pub(crate) fn decode_list<T>(value: Option<Value>, decode: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(&decode).collect(),
        Some(other) => decode(&other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Text field stored either as a byte vector or as a plain string
pub(crate) fn text_field(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.starts_with("0x") => Some(s.clone()),
        other => decode_text(other),
    }
}

pub(crate) fn u64_field(record: &Value, key: &str) -> Option<u64> {
    record.get(key).and_then(decode_u64)
}

pub(crate) fn address_field(record: &Value, key: &str) -> Option<String> {
    record.get(key)?.as_str().map(str::to_string)
}
