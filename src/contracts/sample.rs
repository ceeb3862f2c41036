//! Sample provenance: registration and custody transfers

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    address_field, decode_list, text_field, u64_field, ContractModule, RecordCall,
    SubmissionReceipt, SAMPLE_PROVENANCE,
};
use crate::classifier::ClassifiedError;
use crate::encoding::{address_arg, decode_u64, short_address, text_arg, u64_arg, u64_view_arg};
use crate::session::WalletSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleHistoryEvent {
    pub event_type: String,
    pub operator: String,
    pub timestamp: u64,
    pub details: String,
}

impl SampleHistoryEvent {
    fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            event_type: text_field(value, "event_type")?,
            operator: address_field(value, "operator")?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
            details: text_field(value, "details").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub id: u64,
    pub description: String,
    pub owner: String,
    pub timestamp: u64,
    pub history: Vec<SampleHistoryEvent>,
}

impl Sample {
    pub fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            id: u64_field(value, "id")?,
            description: text_field(value, "description").unwrap_or_default(),
            owner: address_field(value, "owner")?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
            history: decode_list(value.get("history").cloned(), SampleHistoryEvent::from_view),
        })
    }
}

pub struct SampleProvenance {
    module: ContractModule,
}

impl SampleProvenance {
    pub fn new(session: Arc<WalletSession>, contract_address: impl Into<String>) -> Self {
        Self {
            module: ContractModule::new(session, contract_address, &SAMPLE_PROVENANCE),
        }
    }

    pub fn module(&self) -> &ContractModule {
        &self.module
    }

    pub async fn register_sample(
        &self,
        description: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        self.module
            .execute(RecordCall {
                function: "register_sample",
                arguments: vec![text_arg(description)],
                title: "Sample Registration",
                description: format!("Registered sample: {description}"),
                details: Some(json!({ "description": description })),
            })
            .await
    }

    pub async fn record_transfer(
        &self,
        sample_id: u64,
        new_owner: &str,
        details: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        let owner = address_arg(new_owner).map_err(|e| self.module.reject("Sample Transfer", e))?;
        self.module
            .execute(RecordCall {
                function: "record_transfer",
                arguments: vec![u64_arg(sample_id), owner, text_arg(details)],
                title: "Sample Transfer",
                description: format!(
                    "Transferred sample {sample_id} to {}",
                    short_address(new_owner)
                ),
                details: Some(json!({
                    "sampleId": sample_id,
                    "newOwner": new_owner,
                    "details": details,
                })),
            })
            .await
    }

    pub async fn get_sample(&self, sample_id: u64) -> Option<Sample> {
        self.module
            .view_first("get_sample", vec![u64_view_arg(sample_id)])
            .await
            .as_ref()
            .and_then(Sample::from_view)
    }

    pub async fn get_sample_count(&self) -> Option<u64> {
        self.module
            .view_first("get_sample_count", Vec::new())
            .await
            .as_ref()
            .and_then(decode_u64)
    }

    pub async fn get_all_samples(&self) -> Vec<Sample> {
        decode_list(
            self.module.view_first("get_all_samples", Vec::new()).await,
            Sample::from_view,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_from_view() {
        let sample = Sample::from_view(&json!({
            "id": "3",
            "description": "0x426c6f6f64",
            "owner": "0xabc",
            "timestamp": "1700000000",
            "history": [
                {
                    "event_type": "0x7472616e73666572",
                    "operator": "0xabc",
                    "timestamp": "1700000100",
                    "details": "0x636f6c64"
                }
            ]
        }))
        .unwrap();

        assert_eq!(sample.id, 3);
        assert_eq!(sample.description, "Blood");
        assert_eq!(sample.history.len(), 1);
        assert_eq!(sample.history[0].event_type, "transfer");
        assert_eq!(sample.history[0].details, "cold");
    }

    #[test]
    fn test_sample_requires_id_and_owner() {
        assert!(Sample::from_view(&json!({ "description": "0x00" })).is_none());
    }
}
