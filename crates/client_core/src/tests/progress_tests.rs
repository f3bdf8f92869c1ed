use super::*;

use shared::domain::InstanceId;

use crate::wizard_state::{SubprocessBinding, WorkflowBinding};

use super::StepStatus::{Completed as C, Current as K, Upcoming as U};

fn engine_state(key: &str) -> WizardState {
    let mut state = WizardState::default();
    state.set_workflow_binding(WorkflowBinding::new(
        InstanceId::new("inst-1"),
        StepId::new("e"),
        StepKey::new(key),
    ));
    state
}

fn statuses(view: &ProgressView) -> Vec<StepStatus> {
    view.snapshot()
        .expect("ready view")
        .steps
        .iter()
        .map(|step| step.status)
        .collect()
}

fn history(ids: &[&str]) -> HashSet<StepId> {
    ids.iter().map(|id| StepId::new(*id)).collect()
}

#[test]
fn manual_mode_is_positional() {
    let catalog = StepCatalog::static_fallback();
    let mut state = WizardState::default();
    state.set_current_step(3);

    let view = derive_progress(&state, &catalog, None);
    assert_eq!(statuses(&view), vec![C, C, K, U, U, U]);
    let snapshot = view.snapshot().expect("ready");
    assert_eq!(snapshot.completed, 2);
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.connectors, vec![true, true, false, false, false]);
}

#[test]
fn engine_mode_waits_for_history() {
    let catalog = StepCatalog::static_fallback();
    let state = engine_state("ENTERPRISE");
    assert_eq!(derive_progress(&state, &catalog, None), ProgressView::Loading);
}

#[test]
fn loading_while_catalog_empty_or_process_initializing() {
    let empty = StepCatalog::from_template(Vec::new());
    let state = WizardState::default();
    assert_eq!(derive_progress(&state, &empty, None), ProgressView::Loading);

    let mut initializing = WizardState::default();
    initializing.set_process_initializing(true);
    assert_eq!(
        derive_progress(&initializing, &StepCatalog::static_fallback(), None),
        ProgressView::Loading
    );
}

#[test]
fn position_wins_over_history_when_current_resolves() {
    let catalog = StepCatalog::static_fallback();
    let state = engine_state("FORM");
    let completed = history(&["s5", "s6"]);

    let view = derive_progress(&state, &catalog, Some(&completed));
    assert_eq!(statuses(&view), vec![C, C, C, K, U, U]);
}

#[test]
fn history_marks_steps_when_current_is_unknown() {
    let catalog = StepCatalog::static_fallback();
    let state = engine_state("UNLISTED");
    let completed = history(&["s1", "s3"]);

    let view = derive_progress(&state, &catalog, Some(&completed));
    assert_eq!(statuses(&view), vec![C, U, C, U, U, U]);
    assert_eq!(view.snapshot().expect("ready").current_index, None);
}

#[test]
fn subprocess_keeps_parent_step_current() {
    let catalog = StepCatalog::static_fallback();
    let mut state = engine_state("FORM");
    state.set_subprocess_binding(SubprocessBinding::new(
        InstanceId::new("sub-1"),
        StepId::new("f2"),
        StepKey::new("RECURSOS_ENERGIA"),
    ));

    let view = derive_progress(&state, &catalog, Some(&HashSet::new()));
    assert_eq!(statuses(&view)[3], K);
}

#[test]
fn never_more_than_one_current_nor_completed_past_current() {
    let catalog = StepCatalog::static_fallback();
    let histories = [
        history(&[]),
        history(&["s1", "s2", "s3", "s4", "s5", "s6"]),
        history(&["s6"]),
    ];
    let keys = ["PARTICIPANTES", "PROPERTY", "FORM", "REVIEW", "MISSING"];

    for key in keys {
        for completed in &histories {
            let state = engine_state(key);
            let view = derive_progress(&state, &catalog, Some(completed));
            let snapshot = view.snapshot().expect("ready");
            let current: Vec<usize> = snapshot
                .steps
                .iter()
                .enumerate()
                .filter(|(_, step)| step.status == K)
                .map(|(index, _)| index)
                .collect();
            assert!(current.len() <= 1, "key {key}");
            if let Some(current_index) = snapshot.current_index {
                assert!(snapshot
                    .steps
                    .iter()
                    .skip(current_index + 1)
                    .all(|step| step.status != C));
            }
        }
    }
}

#[test]
fn display_renders_markers() {
    let mut catalog_steps = Vec::new();
    for (index, key) in ["A", "B"].iter().enumerate() {
        catalog_steps.push(shared::protocol::WorkflowStep {
            id: StepId::new(*key),
            key: StepKey::new(*key),
            label: key.to_string(),
            path: format!("/inscricao/{key}"),
            ordinal: Some(index as u32 + 1),
        });
    }
    let catalog = StepCatalog::from_template(catalog_steps);
    let mut state = WizardState::default();
    state.set_current_step(2);

    let rendered = derive_progress(&state, &catalog, None).to_string();
    assert_eq!(rendered, "[x] 1. A = [>] 2. B  (1/2)");
    assert_eq!(ProgressView::Loading.to_string(), "(loading progress)");
}
