//! Experimental data audit trail

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{
    address_field, decode_list, text_field, u64_field, ContractModule, RecordCall,
    SubmissionReceipt, EXPERIMENTAL_DATA,
};
use crate::classifier::ClassifiedError;
use crate::encoding::{decode_u64, text_arg, u64_arg, u64_view_arg};
use crate::session::WalletSession;

/// `0x`-prefixed SHA-256 digest of a data payload
pub fn experiment_fingerprint(data: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(data)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataUpdate {
    pub event: String,
    pub operator: String,
    pub timestamp: u64,
}

impl DataUpdate {
    fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            event: text_field(value, "event")?,
            operator: address_field(value, "operator")?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentalData {
    pub id: u64,
    pub hash: String,
    pub description: String,
    pub experiment_id: String,
    pub data_type: String,
    pub version: String,
    pub creator: String,
    pub timestamp: u64,
    pub history: Vec<DataUpdate>,
}

impl ExperimentalData {
    pub fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            id: u64_field(value, "id")?,
            hash: text_field(value, "hash").unwrap_or_default(),
            description: text_field(value, "description").unwrap_or_default(),
            experiment_id: text_field(value, "experiment_id").unwrap_or_default(),
            data_type: text_field(value, "data_type").unwrap_or_default(),
            version: text_field(value, "version").unwrap_or_default(),
            creator: address_field(value, "creator")?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
            history: decode_list(value.get("history").cloned(), DataUpdate::from_view),
        })
    }
}

pub struct ExperimentalDataAuditTrail {
    module: ContractModule,
}

impl ExperimentalDataAuditTrail {
    pub fn new(session: Arc<WalletSession>, contract_address: impl Into<String>) -> Self {
        Self {
            module: ContractModule::new(session, contract_address, &EXPERIMENTAL_DATA),
        }
    }

    pub fn module(&self) -> &ContractModule {
        &self.module
    }

    /// Record an experiment by its data hash
    pub async fn submit_experiment(
        &self,
        data_hash: &str,
        description: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        self.module
            .execute(RecordCall {
                function: "submit_experiment",
                arguments: vec![text_arg(data_hash), text_arg(description)],
                title: "Data Submission",
                description: format!("Submitted experiment data: {description}"),
                details: Some(json!({ "dataHash": data_hash })),
            })
            .await
    }

    /// Fingerprint `data` and record the experiment
    pub async fn submit_experiment_data(
        &self,
        data: &[u8],
        description: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        let fingerprint = experiment_fingerprint(data);
        self.submit_experiment(&fingerprint, description).await
    }

    pub async fn update_experiment(
        &self,
        experiment_id: u64,
        new_hash: &str,
        description: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        self.module
            .execute(RecordCall {
                function: "update_experiment",
                arguments: vec![u64_arg(experiment_id), text_arg(new_hash), text_arg(description)],
                title: "Data Update",
                description: format!("Updated experiment {experiment_id}: {description}"),
                details: Some(json!({ "experimentId": experiment_id, "dataHash": new_hash })),
            })
            .await
    }

    pub async fn get_experiment(&self, experiment_id: u64) -> Option<ExperimentalData> {
        self.module
            .view_first("get_experiment", vec![u64_view_arg(experiment_id)])
            .await
            .as_ref()
            .and_then(ExperimentalData::from_view)
    }

    pub async fn get_experiment_count(&self) -> Option<u64> {
        self.module
            .view_first("get_experiment_count", Vec::new())
            .await
            .as_ref()
            .and_then(decode_u64)
    }

    pub async fn get_all_experiments(&self) -> Vec<ExperimentalData> {
        decode_list(
            self.module.view_first("get_all_experiments", Vec::new()).await,
            ExperimentalData::from_view,
        )
    }
}
