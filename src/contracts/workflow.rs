//! Workflow tasks and their approval status

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    address_field, decode_list, text_field, u64_field, ContractModule, RecordCall,
    SubmissionReceipt, WORKFLOW_AUTOMATION,
};
use crate::classifier::{ClassifiedError, ErrorKind};
use crate::encoding::{address_arg, decode_u64, short_address, text_arg, u64_arg, u64_view_arg, u8_arg};
use crate::session::WalletSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Pending = 0,
    InProgress = 1,
    Completed = 2,
    Approved = 3,
}

impl TaskStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::InProgress),
            2 => Some(Self::Completed),
            3 => Some(Self::Approved),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskStatus {
    type Err = ClassifiedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "approved" => Ok(Self::Approved),
            other => Err(ClassifiedError::new(
                ErrorKind::InvalidArgument,
                format!("unknown task status: {other}"),
            )),
        }
    }
}

/// Task description as stored on the ledger (JSON text)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDraft {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl TaskDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            deadline: None,
            priority: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowTask {
    pub id: u64,
    pub description: String,
    pub owner: String,
    pub status: TaskStatus,
    pub timestamp: u64,
}

impl WorkflowTask {
    pub fn from_view(value: &Value) -> Option<Self> {
        Some(Self {
            id: u64_field(value, "id")?,
            description: text_field(value, "description").unwrap_or_default(),
            owner: address_field(value, "owner")?,
            status: u64_field(value, "status").and_then(TaskStatus::from_code)?,
            timestamp: u64_field(value, "timestamp").unwrap_or_default(),
        })
    }
}

pub struct WorkflowAutomation {
    module: ContractModule,
}

impl WorkflowAutomation {
    pub fn new(session: Arc<WalletSession>, contract_address: impl Into<String>) -> Self {
        Self {
            module: ContractModule::new(session, contract_address, &WORKFLOW_AUTOMATION),
        }
    }

    pub fn module(&self) -> &ContractModule {
        &self.module
    }

    pub async fn create_task(
        &self,
        draft: &TaskDraft,
        assignee: &str,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        let assignee_arg =
            address_arg(assignee).map_err(|e| self.module.reject("Task Creation", e))?;
        let encoded = serde_json::to_string(draft).map_err(|e| {
            self.module.reject(
                "Task Creation",
                ClassifiedError::new(ErrorKind::InvalidArgument, format!("task description: {e}")),
            )
        })?;

        self.module
            .execute(RecordCall {
                function: "create_task",
                arguments: vec![text_arg(&encoded), assignee_arg],
                title: "Task Creation",
                description: format!(
                    "Created task for {}: {}",
                    short_address(assignee),
                    draft.description
                ),
                details: Some(json!({ "assignee": assignee, "task": draft })),
            })
            .await
    }

    pub async fn update_task_status(
        &self,
        task_id: u64,
        status: TaskStatus,
    ) -> Result<SubmissionReceipt, ClassifiedError> {
        self.module
            .execute(RecordCall {
                function: "update_task_status",
                arguments: vec![u64_arg(task_id), u8_arg(status.code())],
                title: "Task Status Update",
                description: format!("Task {task_id} moved to {status}"),
                details: Some(json!({ "taskId": task_id, "status": status.code() })),
            })
            .await
    }

    pub async fn get_task(&self, task_id: u64) -> Option<WorkflowTask> {
        self.module
            .view_first("get_task", vec![u64_view_arg(task_id)])
            .await
            .as_ref()
            .and_then(WorkflowTask::from_view)
    }

    pub async fn get_task_count(&self) -> Option<u64> {
        self.module
            .view_first("get_task_count", Vec::new())
            .await
            .as_ref()
            .and_then(decode_u64)
    }

    pub async fn get_all_tasks(&self) -> Vec<WorkflowTask> {
        decode_list(
            self.module.view_first("get_all_tasks", Vec::new()).await,
            WorkflowTask::from_view,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TaskStatus::Pending.code(), 0);
        assert_eq!(TaskStatus::Approved.code(), 3);
        assert_eq!(TaskStatus::from_code(1), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_code(4), None);
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Completed);
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_draft_encoding_skips_missing_fields() {
        let mut draft = TaskDraft::new("review");
        assert_eq!(serde_json::to_string(&draft).unwrap(), r#"{"description":"review"}"#);

        draft.priority = Some("high".to_string());
        let encoded: Value = serde_json::to_value(&draft).unwrap();
        assert_eq!(encoded["priority"], "high");
    }

    #[test]
    fn test_task_from_view() {
        let task = WorkflowTask::from_view(&json!({
            "id": "1",
            "description": "0x726576696577",
            "owner": "0x5",
            "status": 2
        }))
        .unwrap();
        assert_eq!(task.description, "review");
        assert_eq!(task.status, TaskStatus::Completed);
    }
}
