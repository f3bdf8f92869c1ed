use super::*;

use serde_json::json;
use shared::domain::{PersonKind, PropertyKind};
use storage::MemorySessionStorage;

fn requerente() -> Participant {
    Participant::new(PersonKind::Individual, ParticipantRole::Requerente).with_name("Ana")
}

fn binding(key: &str) -> WorkflowBinding {
    WorkflowBinding::new(
        InstanceId::new("inst-1"),
        StepId::new(format!("id-{key}")),
        StepKey::new(key),
    )
}

fn memory() -> Arc<MemorySessionStorage> {
    Arc::new(MemorySessionStorage::new())
}

#[test]
fn participants_need_a_requerente() {
    let mut state = WizardState::default();
    assert!(!state.is_step_complete(1));

    state.add_participant(Participant::new(
        PersonKind::Company,
        ParticipantRole::Procurador,
    ));
    assert!(!state.is_step_complete(1));

    state.add_participant(requerente());
    assert!(state.is_step_complete(1));
}

#[test]
fn property_needs_fragment_and_external_id() {
    let mut state = WizardState::default();
    state.set_property(Property::new(PropertyKind::Rural));
    assert!(!state.is_step_complete(2));
    state.set_property_id(77);
    assert!(state.is_step_complete(2));
}

#[test]
fn form_and_documents_complete_once_passed() {
    let mut state = WizardState::default();
    state.set_current_step(4);
    assert!(!state.is_step_complete(4));
    state.set_current_step(6);
    assert!(state.is_step_complete(4));
    assert!(state.is_step_complete(5));
    assert!(state.is_step_complete(6));
    assert!(!state.is_step_complete(7));
    assert!(!state.is_step_complete(0));
}

#[test]
fn can_proceed_requires_every_previous_step() {
    let mut state = WizardState::default();
    assert!(state.can_proceed_to_step(0));
    assert!(state.can_proceed_to_step(1));
    assert!(!state.can_proceed_to_step(2));

    state.add_participant(requerente());
    assert!(state.can_proceed_to_step(2));
    assert!(!state.can_proceed_to_step(3));

    state.set_property(Property::new(PropertyKind::Urbano));
    state.set_property_id(1);
    state.set_activity_id(9);
    assert!(state.can_proceed_to_step(4));
    assert!(!state.can_proceed_to_step(5));
}

#[test]
fn list_helpers_ignore_out_of_range_indexes() {
    let mut state = WizardState::default();
    state.add_participant(requerente());
    state.remove_participant(5);
    state.update_participant(3, requerente().with_name("Bia"));
    assert_eq!(state.participants().len(), 1);
    assert_eq!(state.participants()[0].name.as_deref(), Some("Ana"));

    state.update_participant(0, requerente().with_name("Bia"));
    assert_eq!(state.participants()[0].name.as_deref(), Some("Bia"));

    state.add_title(PropertyTitle::default());
    state.remove_title(1);
    assert_eq!(state.titles().len(), 1);
    state.remove_title(0);
    assert!(state.titles().is_empty());
}

#[test]
fn setting_process_id_clears_initializing_flag() {
    let mut state = WizardState::default();
    state.is_process_initializing = true;
    state.set_process_id(ProcessId::new("p1"));
    assert!(!state.is_process_initializing());
}

#[test]
fn reset_clears_everything_and_start_new_keeps_user() {
    let mut state = WizardState::default();
    state.set_user_id(UserId::new("user-1"));
    state.set_process_id(ProcessId::new("p1"));
    state.add_participant(requerente());
    state.set_activity_id(3);
    state.set_current_step(3);
    state.set_workflow_binding(binding("ENTERPRISE"));
    state.set_subprocess_binding(binding("CARACTERISTICAS"));

    let mut fresh = state.clone();
    fresh.start_new();
    assert_eq!(fresh.user_id(), Some(&UserId::new("user-1")));
    let mut expected = WizardState::default();
    expected.set_user_id(UserId::new("user-1"));
    assert_eq!(fresh, expected);

    state.reset();
    assert_eq!(state, WizardState::default());
}

#[test]
fn render_key_prefers_subprocess_binding() {
    let mut state = WizardState::default();
    assert!(state.render_key().is_none());
    state.set_workflow_binding(binding("FORM"));
    assert_eq!(state.render_key().map(StepKey::as_str), Some("FORM"));
    state.set_subprocess_binding(binding("USO_AGUA"));
    assert_eq!(state.render_key().map(StepKey::as_str), Some("USO_AGUA"));
}

#[tokio::test]
async fn store_persists_subset_and_restores_without_transient_fields() {
    let storage = memory();
    let mut store = WizardStore::new(storage.clone(), DEFAULT_STORAGE_KEY);
    store.set_process_initializing(true);
    store
        .update(|state| {
            state.set_user_id(UserId::new("user-1"));
            state.set_process_id(ProcessId::new("p1"));
            state.add_participant(requerente());
            state.set_current_step(2);
            state.set_workflow_binding(binding("PROPERTY"));
            state.set_subprocess_binding(binding("CARACTERISTICAS"));
        })
        .await
        .expect("update");
    store.set_process_initializing(true);

    let raw = storage
        .load(DEFAULT_STORAGE_KEY)
        .await
        .expect("load")
        .expect("snapshot written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["version"], 1);
    assert!(value.get("subprocess").is_none());
    assert!(value.get("is_process_initializing").is_none());

    let restored = WizardStore::restore(storage, DEFAULT_STORAGE_KEY)
        .await
        .expect("restore");
    let state = restored.state();
    assert_eq!(state.process_id(), Some(&ProcessId::new("p1")));
    assert_eq!(state.current_step(), 2);
    assert_eq!(
        state.workflow().map(|b| b.current_step_key.as_str()),
        Some("PROPERTY")
    );
    assert!(state.subprocess().is_none());
    assert!(!state.is_process_initializing());
    assert_eq!(state.engine_mode(), EngineMode::Bound);
    assert_eq!(state.participants().len(), 1);
}

#[tokio::test]
async fn engine_mode_survives_restore() {
    let storage = memory();
    let mut store = WizardStore::new(storage.clone(), DEFAULT_STORAGE_KEY);
    store
        .update(|state| {
            state.set_process_id(ProcessId::new("p1"));
            state.set_engine_mode(EngineMode::Degraded);
        })
        .await
        .expect("update");

    let raw = storage
        .load(DEFAULT_STORAGE_KEY)
        .await
        .expect("load")
        .expect("snapshot written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["engine_mode"], "degraded");

    let restored = WizardStore::restore(storage.clone(), DEFAULT_STORAGE_KEY)
        .await
        .expect("restore");
    assert_eq!(restored.state().engine_mode(), EngineMode::Degraded);

    // a bound mode without a saved instance cannot be trusted
    storage
        .save(
            DEFAULT_STORAGE_KEY,
            &json!({
                "version": 1,
                "saved_at": "2026-01-01T00:00:00Z",
                "process_id": "p1",
                "current_step": 2,
                "engine_mode": "bound"
            })
            .to_string(),
        )
        .await
        .expect("save");
    let restored = WizardStore::restore(storage, DEFAULT_STORAGE_KEY)
        .await
        .expect("restore");
    assert_eq!(restored.state().engine_mode(), EngineMode::Pending);
}

#[tokio::test]
async fn unknown_snapshot_version_starts_fresh() {
    let storage = memory();
    storage
        .save(
            DEFAULT_STORAGE_KEY,
            &json!({"version": 9, "saved_at": "2026-01-01T00:00:00Z", "current_step": 4})
                .to_string(),
        )
        .await
        .expect("save");

    let store = WizardStore::restore(storage, DEFAULT_STORAGE_KEY)
        .await
        .expect("restore");
    assert_eq!(store.state(), &WizardState::default());
}

#[tokio::test]
async fn corrupt_snapshot_starts_fresh() {
    let storage = memory();
    storage
        .save(DEFAULT_STORAGE_KEY, "{not json")
        .await
        .expect("save");
    let store = WizardStore::restore(storage, DEFAULT_STORAGE_KEY)
        .await
        .expect("restore");
    assert_eq!(store.state().current_step(), 1);
}

#[tokio::test]
async fn unknown_participant_fields_round_trip() {
    let storage = memory();
    let mut participant = requerente();
    participant
        .extra
        .insert("nacionalidade".into(), json!("brasileira"));
    let mut store = WizardStore::new(storage.clone(), "k");
    store
        .update(|state| state.set_participants(vec![participant.clone()]))
        .await
        .expect("update");

    let restored = WizardStore::restore(storage, "k").await.expect("restore");
    assert_eq!(restored.state().participants(), &[participant]);
}
