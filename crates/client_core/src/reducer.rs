//! The single transition function over the wizard's step pointer and bindings.
//!
//! Every write to the step ordinal, the workflow binding or the subprocess
//! binding goes through [`reduce`]. Callers perform the side effects named in
//! the returned [`Transition`].

use shared::{domain::InstanceId, protocol::WorkflowStep};

use crate::{
    catalog::StepCatalog,
    route_binder::{bind_route, RouteBinding},
    wizard_state::{EngineMode, SubprocessBinding, WizardState, WorkflowBinding},
};

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    RouteChanged { path: String },
    Engine(EngineEvent),
    User(UserAction),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    InstanceStarted {
        instance_id: InstanceId,
        step: WorkflowStep,
    },
    FellBackToManual,
    StepAdvanced {
        next_step: WorkflowStep,
    },
    WorkflowFinished,
    SubprocessResolved(Option<SubprocessBinding>),
    SubprocessAdvanced {
        next_step: WorkflowStep,
    },
    /// The last sub-step completed; `parent_next` is in parent scope.
    SubprocessFinished {
        parent_next: Option<WorkflowStep>,
    },
    CurrentStepResynced {
        step: WorkflowStep,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    ManualAdvance,
    SelectStep(u32),
    Reset,
    StartNew,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Push(String),
    Replace(String),
}

impl Navigation {
    pub fn path(&self) -> &str {
        match self {
            Self::Push(path) | Self::Replace(path) => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// The persisted subset may have changed.
    pub changed: bool,
    pub navigate: Option<Navigation>,
    /// The workflow reached its end; the caller moves to the terminal route.
    pub finished: bool,
}

impl Transition {
    fn navigate_to(path: Option<String>) -> Self {
        Self {
            navigate: path.map(Navigation::Push),
            ..Self::default()
        }
    }
}

pub fn reduce(state: &mut WizardState, catalog: &StepCatalog, event: WizardEvent) -> Transition {
    let before = state.clone();
    let mut transition = match event {
        WizardEvent::RouteChanged { path } => match bind_route(state, catalog, &path) {
            RouteBinding::Redirect(target) => Transition {
                navigate: Some(Navigation::Replace(target)),
                ..Transition::default()
            },
            RouteBinding::Bound { .. } | RouteBinding::Unmatched => Transition::default(),
        },
        WizardEvent::Engine(event) => reduce_engine(state, catalog, event),
        WizardEvent::User(action) => reduce_user(state, catalog, action),
    };
    transition.changed = *state != before;
    transition
}

fn reduce_engine(state: &mut WizardState, catalog: &StepCatalog, event: EngineEvent) -> Transition {
    match event {
        EngineEvent::InstanceStarted { instance_id, step } => {
            state.clear_subprocess_binding();
            state.set_workflow_binding(WorkflowBinding::new(
                instance_id,
                step.id.clone(),
                step.key.clone(),
            ));
            state.set_engine_mode(EngineMode::Bound);
            Transition::navigate_to(point_at(state, catalog, &step))
        }
        EngineEvent::FellBackToManual => {
            state.clear_subprocess_binding();
            state.clear_workflow_binding();
            state.set_engine_mode(EngineMode::Degraded);
            state.set_current_step(1);
            Transition::navigate_to(catalog.first().map(|step| step.path.clone()))
        }
        EngineEvent::StepAdvanced { next_step } | EngineEvent::CurrentStepResynced { step: next_step } => {
            advance_parent(state, catalog, next_step)
        }
        EngineEvent::WorkflowFinished => {
            state.clear_subprocess_binding();
            Transition {
                finished: true,
                ..Transition::default()
            }
        }
        EngineEvent::SubprocessResolved(Some(binding)) => {
            if state.workflow().is_some() {
                state.set_subprocess_binding(binding);
            }
            Transition::default()
        }
        EngineEvent::SubprocessResolved(None) => {
            state.clear_subprocess_binding();
            Transition::default()
        }
        EngineEvent::SubprocessAdvanced { next_step } => {
            if let Some(binding) = state.subprocess().cloned() {
                state.set_subprocess_binding(SubprocessBinding::new(
                    binding.instance_id,
                    next_step.id,
                    next_step.key,
                ));
            }
            Transition::default()
        }
        EngineEvent::SubprocessFinished { parent_next } => {
            state.clear_subprocess_binding();
            match parent_next {
                Some(next_step) => advance_parent(state, catalog, next_step),
                None => Transition::default(),
            }
        }
    }
}

fn advance_parent(state: &mut WizardState, catalog: &StepCatalog, next_step: WorkflowStep) -> Transition {
    let Some(binding) = state.workflow().cloned() else {
        return Transition::default();
    };
    if binding.current_step_key != next_step.key {
        state.clear_subprocess_binding();
    }
    state.set_workflow_binding(WorkflowBinding::new(
        binding.instance_id,
        next_step.id.clone(),
        next_step.key.clone(),
    ));
    Transition::navigate_to(point_at(state, catalog, &next_step))
}

/// Moves the ordinal to the catalog entry for `step` and returns its route.
fn point_at(state: &mut WizardState, catalog: &StepCatalog, step: &WorkflowStep) -> Option<String> {
    match catalog.find_by_key(&step.key) {
        Some((index, entry)) => {
            if let Some(ordinal) = catalog.ordinal_at(index) {
                state.set_current_step(ordinal);
            }
            Some(entry.path.clone())
        }
        None if !step.path.is_empty() => Some(step.path.clone()),
        None => None,
    }
}

fn reduce_user(state: &mut WizardState, catalog: &StepCatalog, action: UserAction) -> Transition {
    match action {
        UserAction::ManualAdvance => {
            let next = state.current_step().saturating_add(1);
            match catalog.find_by_ordinal(next) {
                Some((_, entry)) => {
                    let path = entry.path.clone();
                    state.set_current_step(next);
                    Transition::navigate_to(Some(path))
                }
                None => Transition {
                    finished: true,
                    ..Transition::default()
                },
            }
        }
        UserAction::SelectStep(ordinal) => {
            if state.is_engine_mode() || !state.can_proceed_to_step(ordinal) {
                return Transition::default();
            }
            match catalog.find_by_ordinal(ordinal) {
                Some((_, entry)) => {
                    let path = entry.path.clone();
                    state.set_current_step(ordinal);
                    Transition::navigate_to(Some(path))
                }
                None => Transition::default(),
            }
        }
        UserAction::Reset => {
            state.reset();
            Transition::default()
        }
        UserAction::StartNew => {
            state.start_new();
            Transition::default()
        }
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
