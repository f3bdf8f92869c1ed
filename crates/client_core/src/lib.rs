//! Client side of the inscription wizard: session state, step catalog,
//! engine and process API clients, and the orchestrator that ties them
//! together behind a navigator.

pub mod catalog;
pub mod config;
pub mod engine_client;
pub mod error;
pub mod navigation;
pub mod orchestrator;
pub mod process_service;
pub mod progress;
pub mod reducer;
pub mod route_binder;
pub mod single_flight;
pub mod wizard_state;

pub use catalog::{CatalogSource, StepCatalog, StepDefinition};
pub use config::{load_settings, load_settings_from, WizardSettings};
pub use engine_client::{
    CurrentStep, EngineClient, HttpEngineClient, MissingEngineClient, StartedInstance,
    StepCompletion, SubprocessInfo,
};
pub use error::{EngineError, OrchestratorError};
pub use navigation::{MemoryNavigator, Navigator};
pub use orchestrator::{
    AdvanceOutcome, NoticeLevel, Orchestrator, OrchestratorEvent, OrchestratorPhase,
    OrchestratorSettings,
};
pub use process_service::{HttpProcessService, MissingProcessService, ProcessService};
pub use progress::{derive_progress, ProgressSnapshot, ProgressView, StepProgress, StepStatus};
pub use route_binder::WIZARD_BASE_PATH;
pub use wizard_state::{EngineMode, WizardState, WizardStore, WorkflowBinding, DEFAULT_STORAGE_KEY};
