//! Development workflow engine and process API over HTTP.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{InstanceId, ProcessId, StepId},
    error::ApiError,
    protocol::{
        CompleteStepResponse, CreateProcessRequest, CurrentStepResponse, ProcessRecord,
        SeedGeneralDataRequest, StartInstanceRequest, StartInstanceResponse, StepHistoryResponse,
        StepSubprocessResponse, TemplateStepsResponse,
    },
};
use tokio::sync::Mutex;
use tracing::warn;

pub mod config;
pub mod workflow;

use config::Settings;
use workflow::{WorkflowEngine, WorkflowError};

pub struct AppState {
    engine: Mutex<WorkflowEngine>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            engine: Mutex::new(WorkflowEngine::new(
                settings.template_code.clone(),
                &settings.subprocess_step_key,
            )),
        }
    }

    pub fn engine(&self) -> &Mutex<WorkflowEngine> {
        &self.engine
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(err: WorkflowError) -> (StatusCode, Json<ApiError>) {
    let message = err.to_string();
    let (status, body) = match err {
        WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, ApiError::not_found(message)),
        WorkflowError::Conflict(_) => (StatusCode::CONFLICT, ApiError::conflict(message)),
        WorkflowError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, ApiError::validation(message)),
    };
    (status, Json(body))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/workflow/instances/start", post(start_instance))
        .route("/workflow/instances/:instance_id/current-step", get(current_step))
        .route("/workflow/instances/:instance_id/step-history", get(step_history))
        .route(
            "/workflow/instances/:instance_id/steps/:step_id/complete",
            post(complete_step),
        )
        .route(
            "/workflow/instances/:instance_id/steps/:step_id/subprocess",
            get(step_subprocess),
        )
        .route("/workflow/templates/:template_code/steps", get(template_steps))
        .route("/api/v1/processos", post(create_process))
        .route("/api/v1/processos/", post(create_process))
        .route("/api/v1/processos/:process_id", get(get_process))
        .route("/api/v1/processos/:process_id/dados-gerais", put(seed_general_data))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn start_instance(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartInstanceRequest>,
) -> ApiResult<StartInstanceResponse> {
    let response = state.engine.lock().await.start(&req).map_err(|err| {
        warn!(process_id = %req.target_id, "workflow start rejected: {err}");
        api_error(err)
    })?;
    Ok(Json(response))
}

async fn current_step(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> ApiResult<CurrentStepResponse> {
    let response = state
        .engine
        .lock()
        .await
        .current_step(&InstanceId::new(instance_id))
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn step_history(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
) -> ApiResult<StepHistoryResponse> {
    let response = state
        .engine
        .lock()
        .await
        .history(&InstanceId::new(instance_id))
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn complete_step(
    State(state): State<Arc<AppState>>,
    Path((instance_id, step_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<CompleteStepResponse> {
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::validation(format!("invalid step payload: {e}"))),
            )
        })?
    };

    let instance_id = InstanceId::new(instance_id);
    let step_id = StepId::new(step_id);
    let response = state
        .engine
        .lock()
        .await
        .complete(&instance_id, &step_id, payload)
        .map_err(|err| {
            warn!(%instance_id, %step_id, "step completion refused: {err}");
            api_error(err)
        })?;
    Ok(Json(response))
}

async fn step_subprocess(
    State(state): State<Arc<AppState>>,
    Path((instance_id, step_id)): Path<(String, String)>,
) -> ApiResult<StepSubprocessResponse> {
    let response = state
        .engine
        .lock()
        .await
        .subprocess(&InstanceId::new(instance_id), &StepId::new(step_id))
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn template_steps(
    State(state): State<Arc<AppState>>,
    Path(template_code): Path<String>,
) -> ApiResult<TemplateStepsResponse> {
    let steps = state
        .engine
        .lock()
        .await
        .template_steps(&template_code)
        .map_err(api_error)?;
    Ok(Json(TemplateStepsResponse { steps }))
}

async fn create_process(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProcessRequest>,
) -> Result<(StatusCode, Json<ProcessRecord>), (StatusCode, Json<ApiError>)> {
    if req.user_id.as_str().trim().is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::validation("user_id is required")),
        ));
    }
    let record = state
        .engine
        .lock()
        .await
        .create_process(req.user_id, req.status);
    Ok((StatusCode::CREATED, Json(record)))
}

async fn get_process(
    State(state): State<Arc<AppState>>,
    Path(process_id): Path<String>,
) -> ApiResult<ProcessRecord> {
    let process_id = ProcessId::new(process_id);
    state
        .engine
        .lock()
        .await
        .process(&process_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::not_found(format!("process {process_id} not found"))),
            )
        })
}

async fn seed_general_data(
    State(state): State<Arc<AppState>>,
    Path(process_id): Path<String>,
    Json(req): Json<SeedGeneralDataRequest>,
) -> ApiResult<Value> {
    let process_id = ProcessId::new(process_id);
    if req.processo_id != process_id {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::validation("processo_id does not match the route")),
        ));
    }
    state
        .engine
        .lock()
        .await
        .seed_general_data(&process_id)
        .map_err(api_error)?;
    Ok(Json(json!({ "processo_id": process_id })))
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
