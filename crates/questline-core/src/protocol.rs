//! Request and response shapes exchanged with the dispatcher.

use crate::error::LedgerError;
use crate::ledger::UserSnapshot;
use crate::tasks::Task;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Objective stored by very old accounts; displayed as empty.
pub const LEGACY_PLACEHOLDER_OBJECTIVE: &str = "Pro max programmer xd.";

/// Top-level operations reachable through the single-endpoint dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TaskAction,
    SpCollect,
    SaveObjective,
}

impl FromStr for Endpoint {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "task_action" => Ok(Self::TaskAction),
            "sp_collect" => Ok(Self::SpCollect),
            "save_objective" => Ok(Self::SaveObjective),
            _ => Err(LedgerError::UnknownOperation("Unknown endpoint.".to_string())),
        }
    }
}

/// Raw task action as received from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskActionRequest {
    pub action: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub permanent: bool,
}

/// Validated task action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Add { text: String, permanent: bool },
    Toggle { id: String },
    Delete { id: String },
    SetPermanent { id: String, permanent: bool },
}

impl TaskCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Toggle { .. } => "toggle",
            Self::Delete { .. } => "delete",
            Self::SetPermanent { .. } => "set_permanent",
        }
    }
}

impl TryFrom<TaskActionRequest> for TaskCommand {
    type Error = LedgerError;

    /// Unknown action names fail with `UnknownOperation`; a known action with
    /// a missing id fails with `NotFound`, and `add` without text with
    /// `Validation`.
    fn try_from(request: TaskActionRequest) -> Result<Self, Self::Error> {
        let id = || request.id.clone().ok_or_else(LedgerError::task_not_found);
        match request.action.as_str() {
            "add" => Ok(Self::Add {
                text: request.text.clone().unwrap_or_default(),
                permanent: request.permanent,
            }),
            "toggle" => Ok(Self::Toggle { id: id()? }),
            "delete" => Ok(Self::Delete { id: id()? }),
            "set_permanent" => Ok(Self::SetPermanent {
                id: id()?,
                permanent: request.permanent,
            }),
            other => Err(LedgerError::UnknownOperation(format!(
                "Unknown task action '{other}'."
            ))),
        }
    }
}

/// Body of the single-endpoint dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub endpoint: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub objective: Option<String>,
}

impl EndpointRequest {
    pub fn task_action(&self) -> TaskActionRequest {
        TaskActionRequest {
            action: self.action.clone().unwrap_or_default(),
            id: self.id.clone(),
            text: self.text.clone(),
            permanent: self.permanent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserSnapshot>,
}

impl TaskActionResponse {
    pub fn failure(error: &LedgerError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpCollectResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_points: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Any response produced by the single-endpoint dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EndpointResponse {
    TaskAction(TaskActionResponse),
    SpCollect(SpCollectResponse),
    SaveObjective(ObjectiveResponse),
}

/// Read model backing the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub username: String,
    pub user_data: UserSnapshot,
    pub rank_description: String,
    pub objective: String,
    pub can_collect_diamonds: bool,
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_endpoints_and_rejects_others() {
        assert_eq!("sp_collect".parse::<Endpoint>().unwrap(), Endpoint::SpCollect);
        assert_eq!(
            "launch_rockets".parse::<Endpoint>().unwrap_err(),
            LedgerError::UnknownOperation("Unknown endpoint.".to_string())
        );
    }

    #[test]
    fn task_commands_require_ids_and_known_actions() {
        let toggle = TaskActionRequest {
            action: "toggle".to_string(),
            id: Some("t1".to_string()),
            ..TaskActionRequest::default()
        };
        assert_eq!(
            TaskCommand::try_from(toggle).unwrap(),
            TaskCommand::Toggle {
                id: "t1".to_string()
            }
        );

        let missing_id = TaskActionRequest {
            action: "delete".to_string(),
            ..TaskActionRequest::default()
        };
        assert!(matches!(
            TaskCommand::try_from(missing_id),
            Err(LedgerError::NotFound(_))
        ));

        let unknown = TaskActionRequest {
            action: "archive".to_string(),
            ..TaskActionRequest::default()
        };
        assert!(matches!(
            TaskCommand::try_from(unknown),
            Err(LedgerError::UnknownOperation(_))
        ));
    }

    #[test]
    fn permanent_flag_is_a_real_boolean_on_the_wire() {
        let request: EndpointRequest = serde_json::from_value(serde_json::json!({
            "endpoint": "task_action",
            "action": "add",
            "text": "stretch",
            "permanent": true
        }))
        .unwrap();
        assert!(request.task_action().permanent);
    }

    #[test]
    fn failure_responses_omit_empty_fields() {
        let body = serde_json::to_value(TaskActionResponse::failure(
            &LedgerError::task_not_found(),
        ))
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "Error: Task ID not found."})
        );
    }
}
