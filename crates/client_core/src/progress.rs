//! Per-step progress derived from session state, catalog and history.

use std::{collections::HashSet, fmt};

use shared::domain::{StepId, StepKey};

use crate::{catalog::StepCatalog, wizard_state::WizardState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Current,
    Completed,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub id: StepId,
    pub key: StepKey,
    pub label: String,
    pub path: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub steps: Vec<StepProgress>,
    pub current_index: Option<usize>,
    pub completed: usize,
    /// `connectors[i]` joins step `i` and `i + 1`; true once step `i` is done.
    pub connectors: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressView {
    Loading,
    Ready(ProgressSnapshot),
}

impl ProgressView {
    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        match self {
            Self::Loading => None,
            Self::Ready(snapshot) => Some(snapshot),
        }
    }
}

/// `history` is `None` until the engine's first step-history snapshot arrives.
pub fn derive_progress(
    state: &WizardState,
    catalog: &StepCatalog,
    history: Option<&HashSet<StepId>>,
) -> ProgressView {
    if catalog.is_empty() || state.is_process_initializing() {
        return ProgressView::Loading;
    }

    let (current_key, completed_ids) = match state.workflow() {
        Some(binding) => match history {
            Some(history) => (Some(binding.current_step_key.clone()), history.clone()),
            None => return ProgressView::Loading,
        },
        None => (
            catalog
                .find_by_ordinal(state.current_step())
                .map(|(_, step)| step.key.clone()),
            HashSet::new(),
        ),
    };

    let current_index = current_key
        .as_ref()
        .and_then(|key| catalog.index_of_key(key));

    let steps: Vec<StepProgress> = catalog
        .steps()
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let status = if current_key.as_ref() == Some(&step.key) {
                StepStatus::Current
            } else if let Some(current) = current_index {
                // position wins over history once the current step resolves
                if index < current {
                    StepStatus::Completed
                } else {
                    StepStatus::Upcoming
                }
            } else if completed_ids.contains(&step.id) {
                StepStatus::Completed
            } else {
                StepStatus::Upcoming
            };
            StepProgress {
                id: step.id.clone(),
                key: step.key.clone(),
                label: step.label.clone(),
                path: step.path.clone(),
                status,
            }
        })
        .collect();

    let completed = steps
        .iter()
        .filter(|step| step.status == StepStatus::Completed)
        .count();
    let connectors = steps
        .windows(2)
        .map(|pair| pair[0].status == StepStatus::Completed)
        .collect();

    ProgressView::Ready(ProgressSnapshot {
        steps,
        current_index,
        completed,
        connectors,
    })
}

impl fmt::Display for ProgressView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::Ready(snapshot) = self else {
            return f.write_str("(loading progress)");
        };
        for (index, step) in snapshot.steps.iter().enumerate() {
            let marker = match step.status {
                StepStatus::Current => '>',
                StepStatus::Completed => 'x',
                StepStatus::Upcoming => ' ',
            };
            write!(f, "[{marker}] {}. {}", index + 1, step.label)?;
            if index + 1 < snapshot.steps.len() {
                let connector = if snapshot.connectors[index] { "=" } else { "-" };
                write!(f, " {connector} ")?;
            }
        }
        write!(f, "  ({}/{})", snapshot.completed, snapshot.steps.len())
    }
}

#[cfg(test)]
#[path = "tests/progress_tests.rs"]
mod tests;
