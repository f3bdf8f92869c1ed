use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{InstanceId, ProcessId, StepId, StepKey, UserId};

pub const DEFAULT_TEMPLATE_CODE: &str = "LICENCIAMENTO_AMBIENTAL_COMPLETO";
pub const LICENSE_TARGET_TYPE: &str = "LICENSE_PROCESS";
pub const DRAFT_PROCESS_STATUS: &str = "draft";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub key: StepKey,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    InProgress,
    Finished,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRequest {
    pub template_code: String,
    pub target_type: String,
    pub target_id: ProcessId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartInstanceResponse {
    pub instance_id: InstanceId,
    pub current_step: WorkflowStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStepResponse {
    pub status: InstanceStatus,
    pub step: WorkflowStep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteStepResponse {
    pub status: InstanceStatus,
    #[serde(rename = "nextStep", default)]
    pub next_step: Option<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprocess_instance_id: Option<InstanceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStepsResponse {
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepHistoryResponse {
    #[serde(default)]
    pub completed_steps: Vec<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<StepId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StepSubprocessResponse {
    pub has_subprocess: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprocess_instance_id: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprocess_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprocess_current_step: Option<WorkflowStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProcessRequest {
    pub user_id: UserId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub user_id: UserId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGeneralDataRequest {
    pub processo_id: ProcessId,
}

/// Opaque step payload forwarded from step pages to the engine.
pub type StepPayload = Value;
