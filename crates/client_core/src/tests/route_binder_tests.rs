use super::*;

use shared::domain::{InstanceId, StepId, StepKey};

fn engine_state(step_id: &str, key: &str) -> WizardState {
    let mut state = WizardState::default();
    state.set_workflow_binding(WorkflowBinding::new(
        InstanceId::new("inst-1"),
        StepId::new(step_id),
        StepKey::new(key),
    ));
    state
}

#[test]
fn ordinal_follows_every_matching_route() {
    let catalog = StepCatalog::static_fallback();
    let mut state = WizardState::default();
    let routes = [
        ("/inscricao/empreendimento", Some(3)),
        ("/somewhere/else", None),
        ("/inscricao/imovel/", Some(2)),
        ("/inscricao/revisao?from=stepper", Some(6)),
        ("/", None),
        ("/inscricao/participantes", Some(1)),
    ];

    for (path, expected) in routes {
        let before = state.current_step();
        bind_route(&mut state, &catalog, path);
        assert_eq!(state.current_step(), expected.unwrap_or(before), "route {path}");
    }
}

#[test]
fn repeated_route_is_idempotent() {
    let catalog = StepCatalog::static_fallback();
    let mut state = WizardState::default();
    assert_eq!(
        bind_route(&mut state, &catalog, "/inscricao/formulario"),
        RouteBinding::Bound {
            index: 3,
            changed: true
        }
    );
    assert_eq!(
        bind_route(&mut state, &catalog, "/inscricao/formulario"),
        RouteBinding::Bound {
            index: 3,
            changed: false
        }
    );
}

#[test]
fn matching_key_keeps_engine_step_id() {
    let catalog = StepCatalog::static_fallback();
    let mut state = engine_state("engine-42", "PROPERTY");

    bind_route(&mut state, &catalog, "/inscricao/imovel");

    let binding = state.workflow().expect("binding");
    assert_eq!(binding.current_step_id, StepId::new("engine-42"));
    assert_eq!(state.current_step(), 2);
}

#[test]
fn different_key_takes_catalog_entry_and_drops_subprocess() {
    let catalog = StepCatalog::static_fallback();
    let mut state = engine_state("engine-4", "FORM");
    state.set_subprocess_binding(WorkflowBinding::new(
        InstanceId::new("sub-1"),
        StepId::new("f1"),
        StepKey::new("CARACTERISTICAS"),
    ));

    bind_route(&mut state, &catalog, "/inscricao/empreendimento");

    let binding = state.workflow().expect("binding");
    assert_eq!(binding.instance_id, InstanceId::new("inst-1"));
    assert_eq!(binding.current_step_id, StepId::new("s3"));
    assert_eq!(binding.current_step_key, StepKey::new("ENTERPRISE"));
    assert!(state.subprocess().is_none());
}

#[test]
fn unmatched_route_changes_nothing() {
    let catalog = StepCatalog::static_fallback();
    let mut state = engine_state("engine-2", "PROPERTY");
    let before = state.clone();
    assert_eq!(
        bind_route(&mut state, &catalog, "/inscricao/desconhecido"),
        RouteBinding::Unmatched
    );
    assert_eq!(state, before);
}

#[test]
fn base_route_redirects_to_active_step() {
    let catalog = StepCatalog::static_fallback();
    let mut fresh = WizardState::default();
    assert_eq!(
        bind_route(&mut fresh, &catalog, "/inscricao/"),
        RouteBinding::Redirect("/inscricao/participantes".into())
    );

    let mut engine = engine_state("engine-5", "DOCUMENTS");
    assert_eq!(
        bind_route(&mut engine, &catalog, "/inscricao"),
        RouteBinding::Redirect("/inscricao/documentacao".into())
    );

    let mut manual = WizardState::default();
    manual.set_current_step(3);
    assert_eq!(
        active_step_path(&manual, &catalog).as_deref(),
        Some("/inscricao/empreendimento")
    );
}
