//! Keeps the wizard's step pointer in line with the active route.

use crate::{
    catalog::{normalize_path, StepCatalog, StepDefinition},
    wizard_state::{WizardState, WorkflowBinding},
};

pub const WIZARD_BASE_PATH: &str = "/inscricao";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteBinding {
    /// Route matched a catalog entry; `changed` is false when the state
    /// already agreed with it.
    Bound { index: usize, changed: bool },
    /// The wizard base route; the caller replaces it with this path.
    Redirect(String),
    Unmatched,
}

pub fn bind_route(state: &mut WizardState, catalog: &StepCatalog, path: &str) -> RouteBinding {
    if normalize_path(path) == WIZARD_BASE_PATH {
        return match active_step_path(state, catalog) {
            Some(target) => RouteBinding::Redirect(target),
            None => RouteBinding::Unmatched,
        };
    }

    let Some((index, entry)) = catalog.find_by_path(path) else {
        return RouteBinding::Unmatched;
    };

    let mut changed = false;
    if let Some(ordinal) = catalog.ordinal_at(index) {
        if state.current_step() != ordinal {
            state.set_current_step(ordinal);
            changed = true;
        }
    }

    if let Some(binding) = state.workflow().cloned() {
        if binding.current_step_key != entry.key {
            state.set_workflow_binding(WorkflowBinding::new(
                binding.instance_id,
                entry.id.clone(),
                entry.key.clone(),
            ));
            // the nested instance belonged to the step we left
            state.clear_subprocess_binding();
            changed = true;
        }
    }

    RouteBinding::Bound { index, changed }
}

/// Catalog entry the session points at: by binding key in engine mode, by
/// ordinal otherwise, falling back to the first entry.
pub fn active_step<'a>(state: &WizardState, catalog: &'a StepCatalog) -> Option<&'a StepDefinition> {
    let by_pointer = match state.workflow() {
        Some(binding) => catalog.find_by_key(&binding.current_step_key),
        None => catalog.find_by_ordinal(state.current_step()),
    };
    by_pointer.map(|(_, step)| step).or_else(|| catalog.first())
}

pub fn active_step_path(state: &WizardState, catalog: &StepCatalog) -> Option<String> {
    active_step(state, catalog).map(|step| step.path.clone())
}

#[cfg(test)]
#[path = "tests/route_binder_tests.rs"]
mod tests;
