//! In-memory process records and workflow instances.
//!
//! One parent template drives the wizard; its subprocess step owns a nested
//! instance whose last completion closes the parent step.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::{json, Value};
use shared::{
    domain::{InstanceId, ProcessId, StepId, StepKey, UserId},
    protocol::{
        CompleteStepResponse, CurrentStepResponse, InstanceStatus, ProcessRecord,
        StartInstanceRequest, StartInstanceResponse, StepHistoryResponse, StepSubprocessResponse,
        WorkflowStep, LICENSE_TARGET_TYPE,
    },
};
use thiserror::Error;
use tracing::{debug, info};

pub const SUBPROCESS_TEMPLATE_CODE: &str = "FORMULARIO_ATIVIDADE";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
}

fn step(id: &str, key: &str, label: &str, path: &str, ordinal: Option<u32>) -> WorkflowStep {
    WorkflowStep {
        id: StepId::new(id),
        key: StepKey::new(key),
        label: label.to_string(),
        path: path.to_string(),
        ordinal,
    }
}

pub fn parent_steps() -> Vec<WorkflowStep> {
    vec![
        step("etapa-participantes", "PARTICIPANTES", "Participantes", "/inscricao/participantes", Some(1)),
        step("etapa-imovel", "PROPERTY", "Imóvel", "/inscricao/imovel", Some(2)),
        step("etapa-empreendimento", "ENTERPRISE", "Empreendimento", "/inscricao/empreendimento", Some(3)),
        step("etapa-formulario", "FORM", "Formulário", "/inscricao/formulario", Some(4)),
        step("etapa-documentacao", "DOCUMENTS", "Documentação", "/inscricao/documentacao", Some(5)),
        step("etapa-revisao", "REVIEW", "Revisão", "/inscricao/revisao", Some(6)),
    ]
}

/// Sub-steps render inside the parent page, so they carry no route.
pub fn subprocess_steps() -> Vec<WorkflowStep> {
    vec![
        step("form-caracteristicas", "CARACTERISTICAS", "Características", "", None),
        step("form-recursos-energia", "RECURSOS_ENERGIA", "Recursos e energia", "", None),
        step("form-uso-agua", "USO_AGUA", "Uso da água", "", None),
        step("form-residuos", "RESIDUOS", "Resíduos", "", None),
        step("form-outras-info", "OUTRAS_INFO", "Outras informações", "", None),
    ]
}

#[derive(Debug, Clone)]
struct Instance {
    steps: Vec<WorkflowStep>,
    position: usize,
    status: InstanceStatus,
    completed: Vec<StepId>,
    /// Owning instance and step for subprocess instances.
    parent: Option<(InstanceId, StepId)>,
    subprocesses: HashMap<StepId, InstanceId>,
    payloads: Vec<(StepId, Value)>,
}

impl Instance {
    fn new(steps: Vec<WorkflowStep>, parent: Option<(InstanceId, StepId)>) -> Self {
        Self {
            steps,
            position: 0,
            status: InstanceStatus::InProgress,
            completed: Vec::new(),
            parent,
            subprocesses: HashMap::new(),
            payloads: Vec::new(),
        }
    }

    fn current(&self) -> Result<&WorkflowStep, WorkflowError> {
        self.steps
            .get(self.position)
            .ok_or_else(|| WorkflowError::Invalid("instance has no steps".into()))
    }
}

pub struct WorkflowEngine {
    template_code: String,
    subprocess_step_key: StepKey,
    processes: HashMap<ProcessId, ProcessRecord>,
    seeded: HashSet<ProcessId>,
    instances: HashMap<InstanceId, Instance>,
}

impl WorkflowEngine {
    pub fn new(template_code: impl Into<String>, subprocess_step_key: impl AsRef<str>) -> Self {
        Self {
            template_code: template_code.into(),
            subprocess_step_key: StepKey::new(subprocess_step_key),
            processes: HashMap::new(),
            seeded: HashSet::new(),
            instances: HashMap::new(),
        }
    }

    pub fn template_code(&self) -> &str {
        &self.template_code
    }

    pub fn create_process(&mut self, user_id: UserId, status: String) -> ProcessRecord {
        let record = ProcessRecord {
            id: ProcessId::random(),
            user_id,
            status,
            created_at: Some(Utc::now()),
        };
        info!(process_id = %record.id, user_id = %record.user_id, "process created");
        self.processes.insert(record.id.clone(), record.clone());
        record
    }

    pub fn process(&self, process_id: &ProcessId) -> Option<&ProcessRecord> {
        self.processes.get(process_id)
    }

    pub fn seed_general_data(&mut self, process_id: &ProcessId) -> Result<(), WorkflowError> {
        if !self.processes.contains_key(process_id) {
            return Err(WorkflowError::NotFound(format!("process {process_id} not found")));
        }
        self.seeded.insert(process_id.clone());
        Ok(())
    }

    pub fn is_seeded(&self, process_id: &ProcessId) -> bool {
        self.seeded.contains(process_id)
    }

    pub fn template_steps(&self, template_code: &str) -> Result<Vec<WorkflowStep>, WorkflowError> {
        if template_code == self.template_code {
            Ok(parent_steps())
        } else if template_code == SUBPROCESS_TEMPLATE_CODE {
            Ok(subprocess_steps())
        } else {
            Err(WorkflowError::NotFound(format!("template {template_code} not found")))
        }
    }

    pub fn start(&mut self, request: &StartInstanceRequest) -> Result<StartInstanceResponse, WorkflowError> {
        if request.template_code != self.template_code {
            return Err(WorkflowError::Invalid(format!(
                "unknown template {}",
                request.template_code
            )));
        }
        if request.target_type != LICENSE_TARGET_TYPE {
            return Err(WorkflowError::Invalid(format!(
                "unsupported target type {}",
                request.target_type
            )));
        }
        if !self.processes.contains_key(&request.target_id) {
            return Err(WorkflowError::Invalid(format!(
                "process {} does not exist",
                request.target_id
            )));
        }

        let instance_id = InstanceId::random();
        let instance = Instance::new(parent_steps(), None);
        let current_step = instance.current()?.clone();
        self.instances.insert(instance_id.clone(), instance);
        self.enter(&instance_id, &current_step);
        info!(
            %instance_id,
            process_id = %request.target_id,
            step_key = %current_step.key,
            "workflow instance started"
        );
        Ok(StartInstanceResponse {
            instance_id,
            current_step,
        })
    }

    pub fn current_step(&self, instance_id: &InstanceId) -> Result<CurrentStepResponse, WorkflowError> {
        let instance = self.instance(instance_id)?;
        Ok(CurrentStepResponse {
            status: instance.status,
            step: instance.current()?.clone(),
        })
    }

    pub fn history(&self, instance_id: &InstanceId) -> Result<StepHistoryResponse, WorkflowError> {
        let instance = self.instance(instance_id)?;
        let current_step_id = match instance.status {
            InstanceStatus::Finished => None,
            _ => Some(instance.current()?.id.clone()),
        };
        Ok(StepHistoryResponse {
            completed_steps: instance.completed.clone(),
            current_step_id,
        })
    }

    pub fn subprocess(
        &self,
        instance_id: &InstanceId,
        step_id: &StepId,
    ) -> Result<StepSubprocessResponse, WorkflowError> {
        let instance = self.instance(instance_id)?;
        let Some(sub_id) = instance.subprocesses.get(step_id) else {
            return Ok(StepSubprocessResponse::default());
        };
        let sub = self.instance(sub_id)?;
        if sub.status == InstanceStatus::Finished {
            return Ok(StepSubprocessResponse::default());
        }
        Ok(StepSubprocessResponse {
            has_subprocess: true,
            subprocess_instance_id: Some(sub_id.clone()),
            subprocess_template: Some(SUBPROCESS_TEMPLATE_CODE.to_string()),
            subprocess_current_step: Some(sub.current()?.clone()),
        })
    }

    /// Completes `step_id` on `instance_id`. Completing the last sub-step of
    /// a subprocess also completes the owning parent step; the response then
    /// carries `FINISHED` with the parent's next step.
    pub fn complete(
        &mut self,
        instance_id: &InstanceId,
        step_id: &StepId,
        payload: Value,
    ) -> Result<CompleteStepResponse, WorkflowError> {
        let instance = self.instance(instance_id)?;
        if instance.status == InstanceStatus::Finished {
            return Err(WorkflowError::Conflict(format!(
                "instance {instance_id} is already finished"
            )));
        }
        let current = instance.current()?;
        if current.id != *step_id {
            return Err(WorkflowError::Conflict(format!(
                "step {step_id} is not the current step of instance {instance_id} (current: {})",
                current.id
            )));
        }
        if let Some(sub_id) = instance.subprocesses.get(step_id) {
            if self.is_open(sub_id) {
                return Err(WorkflowError::Conflict(format!(
                    "step {step_id} has an open subprocess {sub_id}"
                )));
            }
        }
        let parent = instance.parent.clone();

        let (status, next_step) = self.step_forward(instance_id, payload)?;
        let Some((parent_id, parent_step)) = parent.filter(|_| status == InstanceStatus::Finished) else {
            return Ok(CompleteStepResponse {
                status,
                next_step,
                subprocess_instance_id: None,
            });
        };

        let still_owned = self.instance(&parent_id)?.current()?.id == parent_step;
        let parent_next = if still_owned {
            debug!(%parent_id, step_id = %parent_step, "subprocess finished, closing parent step");
            self.step_forward(&parent_id, json!({ "subprocess_instance_id": instance_id }))?
                .1
        } else {
            None
        };
        Ok(CompleteStepResponse {
            status: InstanceStatus::Finished,
            next_step: parent_next,
            subprocess_instance_id: Some(instance_id.clone()),
        })
    }

    pub fn payloads(&self, instance_id: &InstanceId) -> Vec<(StepId, Value)> {
        self.instances
            .get(instance_id)
            .map(|instance| instance.payloads.clone())
            .unwrap_or_default()
    }

    fn instance(&self, instance_id: &InstanceId) -> Result<&Instance, WorkflowError> {
        self.instances
            .get(instance_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("instance {instance_id} not found")))
    }

    fn is_open(&self, instance_id: &InstanceId) -> bool {
        self.instances
            .get(instance_id)
            .is_some_and(|instance| instance.status != InstanceStatus::Finished)
    }

    fn step_forward(
        &mut self,
        instance_id: &InstanceId,
        payload: Value,
    ) -> Result<(InstanceStatus, Option<WorkflowStep>), WorkflowError> {
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("instance {instance_id} not found")))?;
        let done = instance.current()?.id.clone();
        instance.completed.push(done.clone());
        instance.payloads.push((done.clone(), payload));

        if instance.position + 1 >= instance.steps.len() {
            instance.status = InstanceStatus::Finished;
            info!(%instance_id, "workflow instance finished");
            return Ok((InstanceStatus::Finished, None));
        }
        instance.position += 1;
        let next = instance.current()?.clone();
        debug!(%instance_id, completed = %done, step_key = %next.key, "step completed");
        self.enter(instance_id, &next);
        Ok((InstanceStatus::InProgress, Some(next)))
    }

    /// Opens the subprocess when a parent instance reaches the subprocess step.
    fn enter(&mut self, instance_id: &InstanceId, step: &WorkflowStep) {
        let is_parent = self
            .instances
            .get(instance_id)
            .is_some_and(|instance| instance.parent.is_none());
        if !is_parent || step.key != self.subprocess_step_key {
            return;
        }

        let sub_id = InstanceId::random();
        self.instances.insert(
            sub_id.clone(),
            Instance::new(subprocess_steps(), Some((instance_id.clone(), step.id.clone()))),
        );
        if let Some(parent) = self.instances.get_mut(instance_id) {
            parent.subprocesses.insert(step.id.clone(), sub_id.clone());
        }
        info!(%instance_id, subprocess_instance_id = %sub_id, step_key = %step.key, "subprocess opened");
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
