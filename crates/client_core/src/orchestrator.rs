//! Drives the wizard: initialization with engine fallback, step transitions,
//! subprocess lifecycle and finalization.
//!
//! Step pages never talk to the engine. They read and write fragments through
//! [`Orchestrator::update_state`] and call [`Orchestrator::advance`] with their
//! payload; the orchestrator turns engine answers into reducer events and
//! performs the navigation the reducer asks for.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::{
    domain::{ProcessId, StepId, StepKey, UserId},
    protocol::{InstanceStatus, StepPayload},
};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    catalog::StepCatalog,
    config::WizardSettings,
    engine_client::EngineClient,
    error::{EngineError, OrchestratorError},
    navigation::Navigator,
    process_service::ProcessService,
    progress::{derive_progress, ProgressView},
    reducer::{EngineEvent, Navigation, Transition, UserAction, WizardEvent},
    route_binder::active_step,
    single_flight::SingleFlight,
    wizard_state::{EngineMode, SubprocessBinding, WizardState, WizardStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorPhase {
    Uninitialized,
    CreatingProcess,
    EngineActive,
    ManualActive,
    Finished,
    /// The engine refused to start an instance; `initialize` retries.
    Blocked(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    PhaseChanged(OrchestratorPhase),
    Navigated(String),
    Notice { level: NoticeLevel, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next step and navigated there.
    Navigated(String),
    /// Moved to the next step; the route changed meanwhile so no navigation
    /// happened.
    Moved,
    /// Next sub-step of the active subprocess, rendered in place.
    SubStep(StepKey),
    /// The engine's current step differed; state now follows the engine.
    Realigned(Option<String>),
    Finished,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub template_code: String,
    pub terminal_path: String,
}

impl From<&WizardSettings> for OrchestratorSettings {
    fn from(settings: &WizardSettings) -> Self {
        Self {
            template_code: settings.template_code.clone(),
            terminal_path: settings.terminal_path.clone(),
        }
    }
}

struct Runtime {
    phase: OrchestratorPhase,
    catalog: StepCatalog,
    history: Option<HashSet<StepId>>,
    route_epoch: u64,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            phase: OrchestratorPhase::Uninitialized,
            catalog: StepCatalog::empty(),
            history: None,
            route_epoch: 0,
        }
    }
}

type InitResult = Result<OrchestratorPhase, OrchestratorError>;

pub struct Orchestrator {
    engine: Arc<dyn EngineClient>,
    processes: Arc<dyn ProcessService>,
    navigator: Arc<dyn Navigator>,
    settings: OrchestratorSettings,
    store: Mutex<WizardStore>,
    runtime: Mutex<Runtime>,
    init_flight: SingleFlight<String, InitResult>,
    busy: AtomicBool,
    events: broadcast::Sender<OrchestratorEvent>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        processes: Arc<dyn ProcessService>,
        navigator: Arc<dyn Navigator>,
        store: WizardStore,
        settings: OrchestratorSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            engine,
            processes,
            navigator,
            settings,
            store: Mutex::new(store),
            runtime: Mutex::new(Runtime::default()),
            init_flight: SingleFlight::new(),
            busy: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> OrchestratorPhase {
        self.runtime.lock().await.phase.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> WizardState {
        self.store.lock().await.state().clone()
    }

    pub async fn catalog(&self) -> StepCatalog {
        self.runtime.lock().await.catalog.clone()
    }

    /// Direct access for step pages that read several fragments at once.
    pub async fn wizard(&self) -> MutexGuard<'_, WizardStore> {
        self.store.lock().await
    }

    /// Writes step-page fragments; the snapshot is saved before returning.
    pub async fn update_state<R>(
        &self,
        change: impl FnOnce(&mut WizardState) -> R,
    ) -> Result<R, OrchestratorError> {
        Ok(self.store.lock().await.update(change).await?)
    }

    /// Starts or resumes the session. Concurrent calls share one run, so a
    /// fresh session creates exactly one process.
    pub async fn initialize(self: &Arc<Self>, user_id: UserId) -> InitResult {
        let key = self.store.lock().await.storage_key().to_string();
        let this = Arc::clone(self);
        self.init_flight
            .run(key, move || async move { this.run_initialize(user_id).await })
            .await
    }

    async fn run_initialize(self: Arc<Self>, user_id: UserId) -> InitResult {
        let phase = self.phase().await;
        if matches!(
            phase,
            OrchestratorPhase::EngineActive
                | OrchestratorPhase::ManualActive
                | OrchestratorPhase::Finished
        ) {
            return Ok(phase);
        }

        let existing = self.store.lock().await.state().process_id().cloned();
        match existing {
            Some(process_id) if matches!(phase, OrchestratorPhase::Blocked(_)) => {
                info!(%process_id, "retrying workflow start");
                self.start_engine(process_id).await
            }
            Some(process_id) => self.resume(process_id).await,
            None => self.create_session(user_id).await,
        }
    }

    async fn create_session(&self, user_id: UserId) -> InitResult {
        self.set_phase(OrchestratorPhase::CreatingProcess).await;
        {
            let mut store = self.store.lock().await;
            store.set_process_initializing(true);
            let user = user_id.clone();
            store.update(move |state| state.set_user_id(user)).await?;
        }

        let process_id = match self.processes.create_process(&user_id).await {
            Ok(process_id) => process_id,
            Err(err) => {
                self.store.lock().await.set_process_initializing(false);
                self.set_phase(OrchestratorPhase::Uninitialized).await;
                let message = format!("{err:#}");
                warn!(%user_id, "process creation failed: {message}");
                self.notify(NoticeLevel::Error, format!("Could not create the process: {message}"));
                return Err(OrchestratorError::ProcessCreation(message));
            }
        };

        info!(%process_id, %user_id, "process created");
        {
            let id = process_id.clone();
            self.store
                .lock()
                .await
                .update(move |state| state.set_process_id(id))
                .await?;
        }
        self.start_engine(process_id).await
    }

    async fn start_engine(&self, process_id: ProcessId) -> InitResult {
        if self.store.lock().await.state().engine_mode() == EngineMode::Degraded {
            return self.enter_manual().await;
        }

        match self.engine.start_instance(&process_id).await {
            Ok(started) => {
                info!(
                    %process_id,
                    instance_id = %started.instance_id,
                    step_key = %started.current_step.key,
                    "workflow instance started"
                );
                let catalog = self.load_catalog().await;
                self.runtime.lock().await.catalog = catalog;
                let transition = self
                    .dispatch(WizardEvent::Engine(EngineEvent::InstanceStarted {
                        instance_id: started.instance_id,
                        step: started.current_step,
                    }))
                    .await?;
                self.set_phase(OrchestratorPhase::EngineActive).await;
                self.apply(transition, None).await?;
                self.refresh_history().await;
                self.prepare_active_step().await?;
                Ok(OrchestratorPhase::EngineActive)
            }
            Err(err) if err.allows_manual_fallback() => {
                warn!(%process_id, "workflow engine unavailable, continuing in manual mode: {err}");
                self.enter_manual().await
            }
            Err(err) => {
                let message = err.to_string();
                warn!(%process_id, "workflow start rejected: {message}");
                self.set_phase(OrchestratorPhase::Blocked(message.clone()))
                    .await;
                self.notify(NoticeLevel::Error, message.clone());
                Err(OrchestratorError::Blocked(message))
            }
        }
    }

    async fn enter_manual(&self) -> InitResult {
        {
            let mut runtime = self.runtime.lock().await;
            runtime.catalog = StepCatalog::static_fallback();
            runtime.history = None;
        }
        let transition = self
            .dispatch(WizardEvent::Engine(EngineEvent::FellBackToManual))
            .await?;
        self.set_phase(OrchestratorPhase::ManualActive).await;
        self.apply(transition, None).await?;
        self.notify(
            NoticeLevel::Warning,
            "Workflow engine unavailable; continuing in manual mode.",
        );
        Ok(OrchestratorPhase::ManualActive)
    }

    async fn resume(&self, process_id: ProcessId) -> InitResult {
        let (binding, mode) = {
            let store = self.store.lock().await;
            (store.state().workflow().cloned(), store.state().engine_mode())
        };
        let Some(binding) = binding else {
            if mode != EngineMode::Degraded {
                // the instance was never started or the engine refused it
                info!(%process_id, "no workflow instance saved, starting one");
                return self.start_engine(process_id).await;
            }
            debug!(%process_id, "resuming manual session");
            self.runtime.lock().await.catalog = StepCatalog::static_fallback();
            self.set_phase(OrchestratorPhase::ManualActive).await;
            self.show_active_step().await?;
            return Ok(OrchestratorPhase::ManualActive);
        };

        let catalog = self.load_catalog().await;
        self.runtime.lock().await.catalog = catalog;

        match self.engine.get_current_step(&binding.instance_id).await {
            Ok(current) if current.status == InstanceStatus::Finished => {
                info!(instance_id = %binding.instance_id, "resumed a finished workflow");
                self.dispatch(WizardEvent::Engine(EngineEvent::WorkflowFinished))
                    .await?;
                self.finish().await;
                return Ok(OrchestratorPhase::Finished);
            }
            Ok(current) => {
                let transition = self
                    .dispatch(WizardEvent::Engine(EngineEvent::CurrentStepResynced {
                        step: current.step,
                    }))
                    .await?;
                self.set_phase(OrchestratorPhase::EngineActive).await;
                self.apply(transition, None).await?;
            }
            Err(err) => {
                warn!(
                    instance_id = %binding.instance_id,
                    "could not realign resumed session, keeping saved binding: {err}"
                );
                self.set_phase(OrchestratorPhase::EngineActive).await;
                self.show_active_step().await?;
            }
        }

        self.refresh_history().await;
        self.prepare_active_step().await?;
        Ok(OrchestratorPhase::EngineActive)
    }

    /// External route change (back/forward, typed link). Cancels the
    /// navigation of any transition still in flight.
    pub async fn handle_route_change(&self, path: &str) -> Result<(), OrchestratorError> {
        self.runtime.lock().await.route_epoch += 1;
        let before = self
            .store
            .lock()
            .await
            .state()
            .workflow()
            .map(|binding| binding.current_step_key.clone());

        let transition = self
            .dispatch(WizardEvent::RouteChanged {
                path: path.to_string(),
            })
            .await?;
        self.apply(transition, None).await?;

        let after = self
            .store
            .lock()
            .await
            .state()
            .workflow()
            .map(|binding| binding.current_step_key.clone());
        if before != after {
            self.prepare_active_step().await?;
        }
        Ok(())
    }

    /// Resolves the nested subprocess of the active engine step and returns
    /// the key the page should render with.
    pub async fn prepare_active_step(&self) -> Result<Option<StepKey>, OrchestratorError> {
        if self.phase().await != OrchestratorPhase::EngineActive {
            return Ok(self.render_key().await);
        }
        let Some(binding) = self.store.lock().await.state().workflow().cloned() else {
            return Ok(self.render_key().await);
        };

        let resolved = match self
            .engine
            .get_step_subprocess(&binding.instance_id, &binding.current_step_id)
            .await
        {
            Ok(info) => match (info.has_subprocess, info.subprocess_instance_id) {
                (true, Some(sub_id)) => {
                    let sub_step = match info.current_sub_step {
                        Some(step) => Some(step),
                        None => match self.engine.get_current_step(&sub_id).await {
                            Ok(current) => Some(current.step),
                            Err(err) => {
                                warn!(subprocess_instance_id = %sub_id, "subprocess step lookup failed: {err}");
                                None
                            }
                        },
                    };
                    sub_step.map(|step| SubprocessBinding::new(sub_id, step.id, step.key))
                }
                _ => None,
            },
            Err(err) => {
                warn!(
                    instance_id = %binding.instance_id,
                    step_key = %binding.current_step_key,
                    "subprocess lookup failed, rendering parent step: {err}"
                );
                None
            }
        };

        let still_current = self
            .store
            .lock()
            .await
            .state()
            .workflow()
            .is_some_and(|current| current.current_step_id == binding.current_step_id);
        if still_current {
            if let Some(sub) = &resolved {
                debug!(
                    subprocess_instance_id = %sub.instance_id,
                    step_key = %sub.current_step_key,
                    "subprocess bound"
                );
            }
            self.dispatch(WizardEvent::Engine(EngineEvent::SubprocessResolved(resolved)))
                .await?;
        }
        Ok(self.render_key().await)
    }

    /// Completes the active step with the page's payload.
    pub async fn advance(&self, payload: StepPayload) -> Result<AdvanceOutcome, OrchestratorError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        match self.phase().await {
            OrchestratorPhase::EngineActive => self.advance_engine(payload).await,
            OrchestratorPhase::ManualActive => self.advance_manual().await,
            OrchestratorPhase::Finished => Err(OrchestratorError::AlreadyFinished),
            OrchestratorPhase::Blocked(message) => Err(OrchestratorError::Blocked(message)),
            OrchestratorPhase::Uninitialized | OrchestratorPhase::CreatingProcess => {
                Err(OrchestratorError::NotInitialized)
            }
        }
    }

    async fn advance_manual(&self) -> Result<AdvanceOutcome, OrchestratorError> {
        let epoch = self.runtime.lock().await.route_epoch;
        let transition = self
            .dispatch(WizardEvent::User(UserAction::ManualAdvance))
            .await?;
        self.outcome(transition, epoch).await
    }

    async fn advance_engine(&self, payload: StepPayload) -> Result<AdvanceOutcome, OrchestratorError> {
        let epoch = self.runtime.lock().await.route_epoch;
        let (binding, subprocess) = {
            let store = self.store.lock().await;
            (
                store.state().workflow().cloned(),
                store.state().subprocess().cloned(),
            )
        };
        let Some(binding) = binding else {
            return Err(OrchestratorError::NotInitialized);
        };

        let event = match &subprocess {
            Some(sub) => self
                .engine
                .complete_subprocess_step(&sub.instance_id, &sub.current_step_id, &payload)
                .await
                .map(|completion| {
                    let finished = completion.is_finished();
                    match completion.next_step {
                        Some(next_step) if !finished => EngineEvent::SubprocessAdvanced { next_step },
                        parent_next => EngineEvent::SubprocessFinished { parent_next },
                    }
                }),
            None => self
                .engine
                .complete_step(&binding.instance_id, &binding.current_step_id, &payload)
                .await
                .map(|completion| {
                    let finished = completion.is_finished();
                    match completion.next_step {
                        Some(next_step) if !finished => EngineEvent::StepAdvanced { next_step },
                        _ => EngineEvent::WorkflowFinished,
                    }
                }),
        };

        let event = match event {
            Ok(event) => event,
            Err(EngineError::StepConflict {
                instance_id,
                step_id,
            }) => {
                warn!(%instance_id, %step_id, "step conflict, realigning with the engine");
                return self.realign(epoch).await;
            }
            Err(err) => {
                warn!(
                    instance_id = %binding.instance_id,
                    step_key = %binding.current_step_key,
                    "step completion failed: {err}"
                );
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err.into());
            }
        };

        match event {
            EngineEvent::SubprocessAdvanced { next_step } => {
                let key = next_step.key.clone();
                self.dispatch(WizardEvent::Engine(EngineEvent::SubprocessAdvanced { next_step }))
                    .await?;
                Ok(AdvanceOutcome::SubStep(key))
            }
            EngineEvent::SubprocessFinished { parent_next: None } => {
                self.dispatch(WizardEvent::Engine(EngineEvent::SubprocessFinished {
                    parent_next: None,
                }))
                .await?;
                // the parent moved on but the engine did not say where
                self.realign(epoch).await
            }
            event => {
                let transition = self.dispatch(WizardEvent::Engine(event)).await?;
                let outcome = self.outcome(transition, epoch).await?;
                if outcome != AdvanceOutcome::Finished {
                    self.refresh_history().await;
                    self.prepare_active_step().await?;
                }
                Ok(outcome)
            }
        }
    }

    async fn realign(&self, epoch: u64) -> Result<AdvanceOutcome, OrchestratorError> {
        let binding = self.store.lock().await.state().workflow().cloned();
        let Some(binding) = binding else {
            return Err(OrchestratorError::NotInitialized);
        };

        let current = match self.engine.get_current_step(&binding.instance_id).await {
            Ok(current) => current,
            Err(err) => {
                warn!(instance_id = %binding.instance_id, "realignment failed: {err}");
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err.into());
            }
        };

        if current.status == InstanceStatus::Finished {
            let transition = self
                .dispatch(WizardEvent::Engine(EngineEvent::WorkflowFinished))
                .await?;
            return self.outcome(transition, epoch).await;
        }

        info!(
            instance_id = %binding.instance_id,
            step_key = %current.step.key,
            "realigned with engine current step"
        );
        let transition = self
            .dispatch(WizardEvent::Engine(EngineEvent::CurrentStepResynced {
                step: current.step,
            }))
            .await?;
        let path = transition.navigate.as_ref().map(|nav| nav.path().to_string());
        self.apply(transition, Some(epoch)).await?;
        self.notify(
            NoticeLevel::Warning,
            "The workflow had moved on; showing its current step.",
        );
        self.refresh_history().await;
        self.prepare_active_step().await?;
        Ok(AdvanceOutcome::Realigned(path))
    }

    async fn outcome(&self, transition: Transition, epoch: u64) -> Result<AdvanceOutcome, OrchestratorError> {
        if transition.finished {
            self.finish().await;
            return Ok(AdvanceOutcome::Finished);
        }
        let target = transition.navigate.as_ref().map(|nav| nav.path().to_string());
        let navigated = self.apply(transition, Some(epoch)).await?;
        Ok(match (navigated, target) {
            (true, Some(path)) => AdvanceOutcome::Navigated(path),
            _ => AdvanceOutcome::Moved,
        })
    }

    /// Stepper click. Only manual sessions choose their own step.
    pub async fn select_step(&self, ordinal: u32) -> Result<bool, OrchestratorError> {
        match self.phase().await {
            OrchestratorPhase::ManualActive => {}
            OrchestratorPhase::EngineActive => {
                self.notify(
                    NoticeLevel::Info,
                    "Steps are controlled by the workflow engine.",
                );
                return Ok(false);
            }
            _ => return Err(OrchestratorError::NotInitialized),
        }

        let transition = self
            .dispatch(WizardEvent::User(UserAction::SelectStep(ordinal)))
            .await?;
        if transition.navigate.is_none() {
            self.notify(
                NoticeLevel::Warning,
                format!("Complete the previous steps before opening step {ordinal}."),
            );
            return Ok(false);
        }
        self.apply(transition, None).await
    }

    /// Browser-style back; returns the route landed on.
    pub async fn back(&self) -> Result<Option<String>, OrchestratorError> {
        let Some(path) = self.navigator.back() else {
            return Ok(None);
        };
        self.handle_route_change(&path).await?;
        Ok(Some(self.navigator.current()))
    }

    pub async fn progress(&self) -> ProgressView {
        let store = self.store.lock().await;
        let runtime = self.runtime.lock().await;
        if runtime.phase == OrchestratorPhase::CreatingProcess {
            return ProgressView::Loading;
        }
        derive_progress(store.state(), &runtime.catalog, runtime.history.as_ref())
    }

    /// Key of the page to render: subprocess step, engine step, or the
    /// catalog entry at the manual ordinal.
    pub async fn render_key(&self) -> Option<StepKey> {
        let store = self.store.lock().await;
        if let Some(key) = store.state().render_key() {
            return Some(key.clone());
        }
        let runtime = self.runtime.lock().await;
        runtime
            .catalog
            .find_by_ordinal(store.state().current_step())
            .map(|(_, step)| step.key.clone())
    }

    /// Discards every field including the user.
    pub async fn reset(&self) -> Result<(), OrchestratorError> {
        self.dispatch(WizardEvent::User(UserAction::Reset)).await?;
        self.clear_runtime().await;
        info!("wizard reset");
        Ok(())
    }

    /// Discards the session but keeps the user for the next inscription.
    pub async fn start_new(&self) -> Result<(), OrchestratorError> {
        self.dispatch(WizardEvent::User(UserAction::StartNew)).await?;
        self.clear_runtime().await;
        info!("starting a new inscription");
        Ok(())
    }

    async fn clear_runtime(&self) {
        {
            let mut runtime = self.runtime.lock().await;
            let route_epoch = runtime.route_epoch;
            *runtime = Runtime {
                route_epoch,
                ..Runtime::default()
            };
        }
        let _ = self
            .events
            .send(OrchestratorEvent::PhaseChanged(OrchestratorPhase::Uninitialized));
    }

    async fn dispatch(&self, event: WizardEvent) -> Result<Transition, OrchestratorError> {
        let catalog = self.catalog().await;
        Ok(self.store.lock().await.dispatch(&catalog, event).await?)
    }

    /// Performs the reducer's navigation. With `epoch` set, navigation is
    /// skipped when the route changed since that epoch was read.
    async fn apply(&self, transition: Transition, epoch: Option<u64>) -> Result<bool, OrchestratorError> {
        let Some(navigation) = transition.navigate else {
            return Ok(false);
        };
        if let Some(epoch) = epoch {
            let current = self.runtime.lock().await.route_epoch;
            if current != epoch {
                debug!(target_path = navigation.path(), "route changed during the call; not navigating");
                return Ok(false);
            }
        }

        let path = match navigation {
            Navigation::Push(path) => {
                self.navigator.push(&path);
                path
            }
            Navigation::Replace(path) => {
                self.navigator.replace(&path);
                path
            }
        };
        debug!(%path, "navigated");
        let _ = self.events.send(OrchestratorEvent::Navigated(path.clone()));
        if transition.finished {
            self.finish().await;
            return Ok(true);
        }
        // bind before any page reads the state for the new route
        self.dispatch(WizardEvent::RouteChanged { path }).await?;
        Ok(true)
    }

    async fn show_active_step(&self) -> Result<(), OrchestratorError> {
        let path = {
            let store = self.store.lock().await;
            let runtime = self.runtime.lock().await;
            active_step(store.state(), &runtime.catalog).map(|step| step.path.clone())
        };
        if let Some(path) = path {
            self.apply(
                Transition {
                    navigate: Some(Navigation::Replace(path)),
                    ..Transition::default()
                },
                None,
            )
            .await?;
        }
        Ok(())
    }

    async fn finish(&self) {
        self.set_phase(OrchestratorPhase::Finished).await;
        let terminal = self.settings.terminal_path.clone();
        self.navigator.push(&terminal);
        let _ = self.events.send(OrchestratorEvent::Navigated(terminal));
        self.notify(NoticeLevel::Success, "Inscription submitted.");
    }

    async fn load_catalog(&self) -> StepCatalog {
        match self
            .engine
            .get_template_steps(&self.settings.template_code)
            .await
        {
            Ok(steps) if !steps.is_empty() => StepCatalog::from_template(steps),
            Ok(_) => {
                warn!(template_code = %self.settings.template_code, "template has no steps, using static catalog");
                StepCatalog::static_fallback()
            }
            Err(err) => {
                warn!(template_code = %self.settings.template_code, "template steps unavailable, using static catalog: {err}");
                StepCatalog::static_fallback()
            }
        }
    }

    async fn refresh_history(&self) {
        let binding = self.store.lock().await.state().workflow().cloned();
        let Some(binding) = binding else {
            return;
        };
        let history = match self.engine.get_instance_history(&binding.instance_id).await {
            Ok(history) => history,
            Err(err) => {
                warn!(instance_id = %binding.instance_id, "step history unavailable: {err}");
                HashSet::new()
            }
        };
        self.runtime.lock().await.history = Some(history);
    }

    async fn set_phase(&self, phase: OrchestratorPhase) {
        let changed = {
            let mut runtime = self.runtime.lock().await;
            let changed = runtime.phase != phase;
            runtime.phase = phase.clone();
            changed
        };
        if changed {
            info!(?phase, "wizard phase changed");
            let _ = self.events.send(OrchestratorEvent::PhaseChanged(phase));
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.events.send(OrchestratorEvent::Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
