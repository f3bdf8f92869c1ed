//! Remote facade for workflow-engine instance and step operations.

use std::{collections::HashSet, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{InstanceId, ProcessId, StepId},
    error::ApiError,
    protocol::{
        CompleteStepResponse, CurrentStepResponse, InstanceStatus, StartInstanceRequest,
        StartInstanceResponse, StepHistoryResponse, StepSubprocessResponse,
        TemplateStepsResponse, WorkflowStep, LICENSE_TARGET_TYPE,
    },
};
use tracing::debug;
use url::Url;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedInstance {
    pub instance_id: InstanceId,
    pub current_step: WorkflowStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCompletion {
    pub status: InstanceStatus,
    pub next_step: Option<WorkflowStep>,
}

impl StepCompletion {
    pub fn is_finished(&self) -> bool {
        self.status == InstanceStatus::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentStep {
    pub status: InstanceStatus,
    pub step: WorkflowStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubprocessInfo {
    pub has_subprocess: bool,
    pub subprocess_instance_id: Option<InstanceId>,
    pub current_sub_step: Option<WorkflowStep>,
}

impl SubprocessInfo {
    pub fn none() -> Self {
        Self::default()
    }
}

/// One request per call; no retry and no caching.
#[async_trait]
pub trait EngineClient: Send + Sync {
    async fn start_instance(&self, process_id: &ProcessId) -> Result<StartedInstance, EngineError>;

    async fn complete_step(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
        payload: &Value,
    ) -> Result<StepCompletion, EngineError>;

    async fn get_template_steps(&self, template_code: &str)
        -> Result<Vec<WorkflowStep>, EngineError>;

    async fn get_instance_history(
        &self,
        instance_id: &InstanceId,
    ) -> Result<HashSet<StepId>, EngineError>;

    async fn get_step_subprocess(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
    ) -> Result<SubprocessInfo, EngineError>;

    /// A `Finished` completion means the parent step is complete; its
    /// `next_step` is then in parent scope.
    async fn complete_subprocess_step(
        &self,
        subprocess_instance_id: &InstanceId,
        sub_step_id: &StepId,
        payload: &Value,
    ) -> Result<StepCompletion, EngineError>;

    async fn get_current_step(&self, instance_id: &InstanceId) -> Result<CurrentStep, EngineError>;
}

/// Stand-in used when no engine is configured; every call is unavailable.
pub struct MissingEngineClient;

#[async_trait]
impl EngineClient for MissingEngineClient {
    async fn start_instance(&self, _process_id: &ProcessId) -> Result<StartedInstance, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn complete_step(
        &self,
        _instance_id: &InstanceId,
        _step_id: &StepId,
        _payload: &Value,
    ) -> Result<StepCompletion, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn get_template_steps(
        &self,
        _template_code: &str,
    ) -> Result<Vec<WorkflowStep>, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn get_instance_history(
        &self,
        _instance_id: &InstanceId,
    ) -> Result<HashSet<StepId>, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn get_step_subprocess(
        &self,
        _instance_id: &InstanceId,
        _step_id: &StepId,
    ) -> Result<SubprocessInfo, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn complete_subprocess_step(
        &self,
        _subprocess_instance_id: &InstanceId,
        _sub_step_id: &StepId,
        _payload: &Value,
    ) -> Result<StepCompletion, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }

    async fn get_current_step(&self, _instance_id: &InstanceId) -> Result<CurrentStep, EngineError> {
        Err(EngineError::Unavailable("workflow engine is not configured".into()))
    }
}

pub struct HttpEngineClient {
    http: Client,
    base_url: Url,
    template_code: String,
}

impl HttpEngineClient {
    pub fn new(
        base_url: &str,
        template_code: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid engine url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("engine url '{base_url}' cannot be used as a base url");
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build engine http client")?;
        Ok(Self {
            http,
            base_url,
            template_code: template_code.into(),
        })
    }

    pub fn template_code(&self) -> &str {
        &self.template_code
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::Protocol(format!("invalid engine base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        conflict: Option<(&InstanceId, &StepId)>,
    ) -> Result<T, EngineError> {
        debug!(%url, "engine GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        decode_response(response, conflict).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
        conflict: Option<(&InstanceId, &StepId)>,
    ) -> Result<T, EngineError> {
        debug!(%url, "engine POST");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        decode_response(response, conflict).await
    }

    async fn complete(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
        payload: &Value,
    ) -> Result<StepCompletion, EngineError> {
        let url = self.endpoint(&[
            "workflow",
            "instances",
            instance_id.as_str(),
            "steps",
            step_id.as_str(),
            "complete",
        ])?;
        let body = if payload.is_null() {
            Value::Object(Default::default())
        } else {
            payload.clone()
        };
        let response: CompleteStepResponse = self
            .post_json(url, &body, Some((instance_id, step_id)))
            .await?;
        Ok(StepCompletion {
            status: response.status,
            next_step: response.next_step,
        })
    }
}

#[async_trait]
impl EngineClient for HttpEngineClient {
    async fn start_instance(&self, process_id: &ProcessId) -> Result<StartedInstance, EngineError> {
        let url = self.endpoint(&["workflow", "instances", "start"])?;
        let request = StartInstanceRequest {
            template_code: self.template_code.clone(),
            target_type: LICENSE_TARGET_TYPE.to_string(),
            target_id: process_id.clone(),
        };
        let response: StartInstanceResponse = self.post_json(url, &request, None).await?;
        Ok(StartedInstance {
            instance_id: response.instance_id,
            current_step: response.current_step,
        })
    }

    async fn complete_step(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
        payload: &Value,
    ) -> Result<StepCompletion, EngineError> {
        self.complete(instance_id, step_id, payload).await
    }

    async fn get_template_steps(
        &self,
        template_code: &str,
    ) -> Result<Vec<WorkflowStep>, EngineError> {
        let url = self.endpoint(&["workflow", "templates", template_code, "steps"])?;
        let response: TemplateStepsResponse = self.get_json(url, None).await?;
        Ok(response.steps)
    }

    async fn get_instance_history(
        &self,
        instance_id: &InstanceId,
    ) -> Result<HashSet<StepId>, EngineError> {
        let url = self.endpoint(&["workflow", "instances", instance_id.as_str(), "step-history"])?;
        let response: StepHistoryResponse = self.get_json(url, None).await?;
        Ok(response.completed_steps.into_iter().collect())
    }

    async fn get_step_subprocess(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
    ) -> Result<SubprocessInfo, EngineError> {
        let url = self.endpoint(&[
            "workflow",
            "instances",
            instance_id.as_str(),
            "steps",
            step_id.as_str(),
            "subprocess",
        ])?;
        debug!(%url, "engine GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        // engines without subprocess support do not expose the endpoint
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SubprocessInfo::none());
        }
        let response: StepSubprocessResponse = decode_response(response, None).await?;
        Ok(SubprocessInfo {
            has_subprocess: response.has_subprocess && response.subprocess_instance_id.is_some(),
            subprocess_instance_id: response.subprocess_instance_id,
            current_sub_step: response.subprocess_current_step,
        })
    }

    async fn complete_subprocess_step(
        &self,
        subprocess_instance_id: &InstanceId,
        sub_step_id: &StepId,
        payload: &Value,
    ) -> Result<StepCompletion, EngineError> {
        self.complete(subprocess_instance_id, sub_step_id, payload)
            .await
    }

    async fn get_current_step(&self, instance_id: &InstanceId) -> Result<CurrentStep, EngineError> {
        let url = self.endpoint(&["workflow", "instances", instance_id.as_str(), "current-step"])?;
        let response: CurrentStepResponse = self.get_json(url, None).await?;
        Ok(CurrentStep {
            status: response.status,
            step: response.step,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> EngineError {
    if error.is_decode() {
        EngineError::Protocol(error.to_string())
    } else {
        EngineError::Unavailable(error.to_string())
    }
}

async fn decode_response<T: DeserializeOwned>(
    response: Response,
    conflict: Option<(&InstanceId, &StepId)>,
) -> Result<T, EngineError> {
    let status = response.status();
    if status.is_success() {
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        return serde_json::from_slice(&bytes).map_err(|err| EngineError::Protocol(err.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body, conflict))
}

pub(crate) fn classify_status(
    status: StatusCode,
    body: &str,
    conflict: Option<(&InstanceId, &StepId)>,
) -> EngineError {
    let message = error_message(status, body);
    match (status, conflict) {
        (StatusCode::CONFLICT, Some((instance_id, step_id))) => EngineError::StepConflict {
            instance_id: instance_id.clone(),
            step_id: step_id.clone(),
        },
        (StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS, _) => {
            EngineError::Unavailable(message)
        }
        (status, _) if status.is_server_error() => EngineError::Unavailable(message),
        _ => EngineError::Rejected(message),
    }
}

pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return api_error.message;
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for field in ["message", "detail", "error"] {
            if let Some(text) = value.get(field).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "tests/engine_client_tests.rs"]
mod tests;
