//! Access control permissions

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    address_field, decode_list, u64_field, ContractModule, RecordCall, SubmissionReceipt,
    ACCESS_CONTROL,
};
use crate::classifier::{ClassifiedError, ErrorKind};
use crate::encoding::{address_arg, short_address, u64_arg, u64_view_arg, u8_arg};
use crate::session::WalletSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AccessLevel {
    Read = 1,
    Write = 2,
    Admin = 3,
}

impl AccessLevel {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::Read),
            2 => Some(Self::Write),
            3 => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl FromStr for AccessLevel {
    type Err = ClassifiedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "admin" => Ok(Self::Admin),
            other => Err(ClassifiedError::new(
                ErrorKind::InvalidArgument,
                format!("unknown access level: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permission {
    pub user: String,
    pub resource_id: u64,
    pub level: AccessLevel,
    pub granted_at: u64,
    pub granted_by: String,
}

impl Permission {
    pub fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            user: address_field(value, "user")?,
            resource_id: u64_field(value, "resource_id")?,
            level: u64_field(value, "level").and_then(AccessLevel::from_code)?,
            granted_at: u64_field(value, "granted_at").unwrap_or_default(),
            granted_by: address_field(value, "granted_by").unwrap_or_default(),
        })
    }
}

pub struct AccessControl {
    module: ContractModule,
}

impl AccessControl {
    pub fn new(session: Arc<WalletSession>, contract_address: impl Into<String>) -> Self {
        Self {
            module: ContractModule::new(session, contract_address, &ACCESS_CONTROL),
        }
    }

    pub fn module(&self) -> &ContractModule {
        &self.module
    }

    pub async fn grant_permission(
        &self,
        user: &str,
        resource_id: u64,
        level: AccessLevel,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        let user_arg = address_arg(user).map_err(|e| self.module.reject("Access Grant", e))?;
        self.module
            .execute(RecordCall {
                function: "grant_permission",
                arguments: vec![user_arg, u64_arg(resource_id), u8_arg(level.code())],
                title: "Access Grant",
                description: format!(
                    "Granted {level} access on resource {resource_id} to {}",
                    short_address(user)
                ),
                details: Some(json!({
                    "user": user,
                    "resourceId": resource_id,
                    "level": level.code(),
                })),
            })
            .await
    }

    pub async fn get_permission(&self, user: &str, resource_id: u64) -> Option<Permission> {
        let user_arg = address_arg(user).ok()?;
        self.module
            .view_first("get_permission", vec![user_arg, u64_view_arg(resource_id)])
            .await
            .as_ref()
            .and_then(Permission::from_view)
    }

    pub async fn get_permissions_for_user(&self, user: &str) -> Vec<Permission> {
        let Ok(user_arg) = address_arg(user) else {
            return Vec::new();
        };
        decode_list(
            self.module
                .view_first("get_user_permissions", vec![user_arg])
                .await,
            Permission::from_view,
        )
    }
}
