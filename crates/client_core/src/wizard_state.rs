//! Canonical wizard session state and the store that persists it.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{
    InstanceId, Participant, ParticipantRole, ProcessId, Property, PropertyTitle, StepId, StepKey,
    UserId,
};
use storage::SessionStorage;
use tracing::{debug, warn};

use crate::{
    catalog::StepCatalog,
    reducer::{reduce, Transition, WizardEvent},
};

pub const SNAPSHOT_VERSION: u32 = 1;
pub const DEFAULT_STORAGE_KEY: &str = "inscricao-storage";

/// Engine-side pointer to the active step of one workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowBinding {
    pub instance_id: InstanceId,
    pub current_step_id: StepId,
    pub current_step_key: StepKey,
}

impl WorkflowBinding {
    pub fn new(instance_id: InstanceId, current_step_id: StepId, current_step_key: StepKey) -> Self {
        Self {
            instance_id,
            current_step_id,
            current_step_key,
        }
    }
}

/// Same shape as the parent binding, scoped to a nested instance.
pub type SubprocessBinding = WorkflowBinding;

/// Whether the session has settled on engine or manual mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// No instance yet: never started, interrupted, or rejected.
    #[default]
    Pending,
    /// The engine was unreachable at start; the session stays manual.
    Degraded,
    Bound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    process_id: Option<ProcessId>,
    user_id: Option<UserId>,
    participants: Vec<Participant>,
    property_id: Option<i64>,
    property: Option<Property>,
    titles: Vec<PropertyTitle>,
    activity_id: Option<i64>,
    current_step: u32,
    workflow: Option<WorkflowBinding>,
    subprocess: Option<SubprocessBinding>,
    engine_mode: EngineMode,
    is_process_initializing: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            process_id: None,
            user_id: None,
            participants: Vec::new(),
            property_id: None,
            property: None,
            titles: Vec::new(),
            activity_id: None,
            current_step: 1,
            workflow: None,
            subprocess: None,
            engine_mode: EngineMode::Pending,
            is_process_initializing: false,
        }
    }
}

impl WizardState {
    pub fn process_id(&self) -> Option<&ProcessId> {
        self.process_id.as_ref()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn property_id(&self) -> Option<i64> {
        self.property_id
    }

    pub fn property(&self) -> Option<&Property> {
        self.property.as_ref()
    }

    pub fn titles(&self) -> &[PropertyTitle] {
        &self.titles
    }

    pub fn activity_id(&self) -> Option<i64> {
        self.activity_id
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn workflow(&self) -> Option<&WorkflowBinding> {
        self.workflow.as_ref()
    }

    pub fn subprocess(&self) -> Option<&SubprocessBinding> {
        self.subprocess.as_ref()
    }

    pub fn is_process_initializing(&self) -> bool {
        self.is_process_initializing
    }

    pub fn engine_mode(&self) -> EngineMode {
        self.engine_mode
    }

    /// Engine mode is recognized by a bound instance.
    pub fn is_engine_mode(&self) -> bool {
        self.workflow.is_some()
    }

    /// Key used to pick the page to render: the subprocess step wins over
    /// the parent step.
    pub fn render_key(&self) -> Option<&StepKey> {
        self.subprocess
            .as_ref()
            .or(self.workflow.as_ref())
            .map(|binding| &binding.current_step_key)
    }

    pub fn set_process_id(&mut self, process_id: ProcessId) {
        self.process_id = Some(process_id);
        self.is_process_initializing = false;
    }

    pub fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    pub fn set_participants(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    pub fn update_participant(&mut self, index: usize, participant: Participant) {
        if let Some(slot) = self.participants.get_mut(index) {
            *slot = participant;
        }
    }

    pub fn remove_participant(&mut self, index: usize) {
        if index < self.participants.len() {
            self.participants.remove(index);
        }
    }

    pub fn set_property_id(&mut self, property_id: i64) {
        self.property_id = Some(property_id);
    }

    pub fn set_property(&mut self, property: Property) {
        self.property = Some(property);
    }

    pub fn set_titles(&mut self, titles: Vec<PropertyTitle>) {
        self.titles = titles;
    }

    pub fn add_title(&mut self, title: PropertyTitle) {
        self.titles.push(title);
    }

    pub fn remove_title(&mut self, index: usize) {
        if index < self.titles.len() {
            self.titles.remove(index);
        }
    }

    pub fn set_activity_id(&mut self, activity_id: i64) {
        self.activity_id = Some(activity_id);
    }

    pub fn is_step_complete(&self, ordinal: u32) -> bool {
        match ordinal {
            1 => self
                .participants
                .iter()
                .any(|participant| participant.role == ParticipantRole::Requerente),
            2 => self.property.is_some() && self.property_id.is_some(),
            3 => self.activity_id.is_some(),
            // form and documents pages validate their own payloads
            4 | 5 => self.current_step > ordinal,
            6 => true,
            _ => false,
        }
    }

    pub fn can_proceed_to_step(&self, ordinal: u32) -> bool {
        (1..ordinal).all(|previous| self.is_step_complete(previous))
    }

    // Step pointer and bindings are written by the reducer only.

    pub(crate) fn set_current_step(&mut self, ordinal: u32) {
        self.current_step = ordinal;
    }

    pub(crate) fn set_workflow_binding(&mut self, binding: WorkflowBinding) {
        self.workflow = Some(binding);
    }

    pub(crate) fn clear_workflow_binding(&mut self) {
        self.workflow = None;
    }

    pub(crate) fn set_subprocess_binding(&mut self, binding: SubprocessBinding) {
        self.subprocess = Some(binding);
    }

    pub(crate) fn clear_subprocess_binding(&mut self) {
        self.subprocess = None;
    }

    pub(crate) fn set_engine_mode(&mut self, mode: EngineMode) {
        self.engine_mode = mode;
    }

    pub(crate) fn set_process_initializing(&mut self, initializing: bool) {
        self.is_process_initializing = initializing;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn start_new(&mut self) {
        let user_id = self.user_id.take();
        *self = Self {
            user_id,
            ..Self::default()
        };
    }

    fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            process_id: self.process_id.clone(),
            user_id: self.user_id.clone(),
            participants: self.participants.clone(),
            property_id: self.property_id,
            property: self.property.clone(),
            titles: self.titles.clone(),
            activity_id: self.activity_id,
            current_step: self.current_step,
            workflow: self.workflow.clone(),
            engine_mode: self.engine_mode,
        }
    }

    fn from_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self {
            process_id: snapshot.process_id,
            user_id: snapshot.user_id,
            participants: snapshot.participants,
            property_id: snapshot.property_id,
            property: snapshot.property,
            titles: snapshot.titles,
            activity_id: snapshot.activity_id,
            current_step: snapshot.current_step.max(1),
            engine_mode: match (&snapshot.workflow, snapshot.engine_mode) {
                (Some(_), _) => EngineMode::Bound,
                (None, EngineMode::Bound) => EngineMode::Pending,
                (None, mode) => mode,
            },
            workflow: snapshot.workflow,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub process_id: Option<ProcessId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub property: Option<Property>,
    #[serde(default)]
    pub titles: Vec<PropertyTitle>,
    #[serde(default)]
    pub activity_id: Option<i64>,
    pub current_step: u32,
    #[serde(default)]
    pub workflow: Option<WorkflowBinding>,
    #[serde(default)]
    pub engine_mode: EngineMode,
}

#[derive(Deserialize)]
struct SnapshotVersion {
    version: u32,
}

/// Owns the session state and writes the persisted subset on every change.
pub struct WizardStore {
    state: WizardState,
    storage: Arc<dyn SessionStorage>,
    storage_key: String,
}

impl WizardStore {
    pub fn new(storage: Arc<dyn SessionStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            state: WizardState::default(),
            storage,
            storage_key: storage_key.into(),
        }
    }

    /// Loads the saved snapshot. Subprocess binding and transient flags
    /// always start empty.
    pub async fn restore(
        storage: Arc<dyn SessionStorage>,
        storage_key: impl Into<String>,
    ) -> Result<Self> {
        let storage_key = storage_key.into();
        let raw = storage
            .load(&storage_key)
            .await
            .with_context(|| format!("failed to load wizard snapshot '{storage_key}'"))?;

        let state = match raw {
            None => WizardState::default(),
            Some(raw) => match decode_snapshot(&raw) {
                Ok(Some(snapshot)) => {
                    debug!(storage_key = %storage_key, "restored wizard snapshot");
                    WizardState::from_snapshot(snapshot)
                }
                Ok(None) => WizardState::default(),
                Err(err) => {
                    warn!(storage_key = %storage_key, "discarding unreadable wizard snapshot: {err:#}");
                    WizardState::default()
                }
            },
        };

        Ok(Self {
            state,
            storage,
            storage_key,
        })
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Applies a change within the persisted subset and saves it.
    pub async fn update<R>(&mut self, change: impl FnOnce(&mut WizardState) -> R) -> Result<R> {
        let result = change(&mut self.state);
        self.persist().await?;
        Ok(result)
    }

    pub fn set_process_initializing(&mut self, initializing: bool) {
        self.state.set_process_initializing(initializing);
    }

    /// Runs the reducer and saves the snapshot when the state moved.
    pub async fn dispatch(&mut self, catalog: &StepCatalog, event: WizardEvent) -> Result<Transition> {
        let transition = reduce(&mut self.state, catalog, event);
        if transition.changed {
            self.persist().await?;
        }
        Ok(transition)
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = serde_json::to_string(&self.state.snapshot())
            .context("failed to encode wizard snapshot")?;
        self.storage
            .save(&self.storage_key, &snapshot)
            .await
            .with_context(|| format!("failed to save wizard snapshot '{}'", self.storage_key))
    }
}

fn decode_snapshot(raw: &str) -> Result<Option<PersistedSnapshot>> {
    let probe: SnapshotVersion = serde_json::from_str(raw).context("snapshot has no version")?;
    if probe.version != SNAPSHOT_VERSION {
        warn!(
            version = probe.version,
            expected = SNAPSHOT_VERSION,
            "ignoring wizard snapshot with unknown version"
        );
        return Ok(None);
    }
    let snapshot = serde_json::from_str(raw).context("invalid wizard snapshot")?;
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "tests/wizard_state_tests.rs"]
mod tests;
