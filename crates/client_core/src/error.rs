use shared::domain::{InstanceId, StepId};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("workflow engine unavailable: {0}")]
    Unavailable(String),
    #[error("workflow engine rejected the request: {0}")]
    Rejected(String),
    #[error("step {step_id} is not the current step of instance {instance_id}")]
    StepConflict {
        instance_id: InstanceId,
        step_id: StepId,
    },
    #[error("unexpected workflow engine response: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Errors that send initialization into manual mode instead of blocking.
    pub fn allows_manual_fallback(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Protocol(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("failed to create process: {0}")]
    ProcessCreation(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("wizard storage failure: {0}")]
    Storage(String),
    #[error("wizard is not initialized")]
    NotInitialized,
    #[error("workflow is already finished")]
    AlreadyFinished,
    #[error("another transition is in flight")]
    Busy,
    #[error("initialization blocked: {0}")]
    Blocked(String),
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(value: anyhow::Error) -> Self {
        Self::Storage(format!("{value:#}"))
    }
}
