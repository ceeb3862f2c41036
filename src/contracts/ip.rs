//! Intellectual property attribution

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    address_field, decode_list, text_field, u64_field, ContractModule, RecordCall,
    SubmissionReceipt, INTELLECTUAL_PROPERTY,
};
use crate::classifier::ClassifiedError;
use crate::encoding::{decode_u64, text_arg, u64_view_arg};
use crate::session::WalletSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntellectualProperty {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub content_hash: String,
    pub owner: String,
    pub timestamp: u64,
}

impl IntellectualProperty {
    pub fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            id: u64_field(value, "id")?,
            title: text_field(value, "title").unwrap_or_default(),
            description: text_field(value, "description").unwrap_or_default(),
            content_hash: text_field(value, "content_hash").unwrap_or_default(),
            owner: address_field(value, "owner")?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
        })
    }
}

pub struct IntellectualPropertyAttribution {
    module: ContractModule,
}

impl IntellectualPropertyAttribution {
    pub fn new(session: Arc<WalletSession>, contract_address: impl Into<String>) -> Self {
        Self {
            module: ContractModule::new(session, contract_address, &INTELLECTUAL_PROPERTY),
        }
    }

    pub fn module(&self) -> &ContractModule {
        &self.module
    }

    pub async fn register_contribution(
        &self,
        title: &str,
        description: &str,
        role: &str,
        contribution: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        self.module
            .execute(RecordCall {
                function: "register_contribution",
                arguments: vec![
                    text_arg(title),
                    text_arg(description),
                    text_arg(role),
                    text_arg(contribution),
                ],
                title: "IP Registration",
                description: format!("Registered contribution \"{title}\" as {role}"),
                details: Some(json!({ "title": title, "role": role })),
            })
            .await
    }

    pub async fn get_contribution(&self, id: u64) -> Option<IntellectualProperty> {
        self.module
            .view_first("get_contribution", vec![u64_view_arg(id)])
            .await
            .as_ref()
            .and_then(IntellectualProperty::from_view)
    }

    pub async fn get_contribution_count(&self) -> Option<u64> {
        self.module
            .view_first("get_contribution_count", Vec::new())
            .await
            .as_ref()
            .and_then(decode_u64)
    }

    pub async fn get_all_contributions(&self) -> Vec<IntellectualProperty> {
        decode_list(
            self.module.view_first("get_all_contributions", Vec::new()).await,
            IntellectualProperty::from_view,
        )
    }
}
