use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_database_url, load_settings, AdvanceOutcome, EngineClient, HttpEngineClient,
    HttpProcessService, MemoryNavigator, MissingEngineClient, MissingProcessService, Navigator,
    NoticeLevel, Orchestrator, OrchestratorEvent, OrchestratorSettings, ProcessService,
    WizardSettings, WizardStore, WIZARD_BASE_PATH,
};
use serde_json::Value;
use shared::domain::UserId;
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "wizard", about = "Drive an inscription session from the terminal")]
struct Cli {
    /// Session database; defaults to the settings value or the per-user data dir.
    #[arg(long)]
    database_url: Option<String>,
    /// Workflow engine base url; an empty value forces manual mode.
    #[arg(long)]
    engine_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a process and start the workflow, or resume the saved session.
    Init {
        /// Defaults to the user kept by `start-new`.
        #[arg(long)]
        user: Option<String>,
    },
    Status,
    /// Complete the active step.
    Advance {
        /// Step payload as JSON.
        #[arg(long)]
        payload: Option<String>,
    },
    Goto {
        path: String,
    },
    Select {
        ordinal: u32,
    },
    Back,
    Reset,
    StartNew,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.engine_url.as_deref() {
        let url = url.trim();
        settings.engine_url = (!url.is_empty()).then(|| url.to_string());
    }
    let database_url = resolve_database_url(cli.database_url.as_deref(), &settings);
    debug!(%database_url, "opening session database");

    let storage = Arc::new(Storage::new(&database_url).await?);
    let store = WizardStore::restore(storage, settings.storage_key.clone()).await?;
    let saved_user = store
        .state()
        .user_id()
        .cloned()
        .filter(|_| store.state().process_id().is_some());

    let navigator = Arc::new(MemoryNavigator::new(WIZARD_BASE_PATH));
    let orchestrator = Orchestrator::new(
        engine_client(&settings)?,
        process_service(&settings)?,
        navigator.clone(),
        store,
        OrchestratorSettings::from(&settings),
    );
    let mut events = orchestrator.subscribe_events();

    match cli.command {
        Command::Init { user } => {
            let user = init_user(user, orchestrator.state().await.user_id())?;
            let result = orchestrator.initialize(user).await;
            print_notices(&mut events);
            let phase = result?;
            println!("session ready: {phase:?}");
        }
        Command::Reset => {
            orchestrator.reset().await?;
            println!("session cleared");
            return Ok(());
        }
        Command::StartNew => {
            orchestrator.start_new().await?;
            println!("previous inscription discarded; run `wizard init` to begin a new one");
            return Ok(());
        }
        command => {
            let Some(user) = saved_user else {
                bail!("no inscription in progress; run `wizard init --user <id>` first");
            };
            let resumed = orchestrator.initialize(user).await;
            print_notices(&mut events);
            resumed?;
            run(&orchestrator, navigator.as_ref(), command).await?;
            print_notices(&mut events);
        }
    }

    print_status(&orchestrator, navigator.as_ref()).await;
    Ok(())
}

async fn run(orchestrator: &Orchestrator, navigator: &MemoryNavigator, command: Command) -> Result<()> {
    match command {
        Command::Status | Command::Init { .. } | Command::Reset | Command::StartNew => {}
        Command::Advance { payload } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw).context("--payload must be valid JSON")?,
                None => Value::Null,
            };
            match orchestrator.advance(payload).await {
                Ok(outcome) => println!("{}", describe(&outcome)),
                Err(err) => println!("step not completed: {err}"),
            }
        }
        Command::Goto { path } => {
            navigator.push(&path);
            orchestrator.handle_route_change(&path).await?;
        }
        Command::Select { ordinal } => {
            if !orchestrator.select_step(ordinal).await? {
                println!("step {ordinal} is not available");
            }
        }
        Command::Back => {
            if orchestrator.back().await?.is_none() {
                back_one_step(orchestrator, navigator).await?;
            }
        }
    }
    Ok(())
}

/// Route history does not survive between runs; step back through the
/// catalog instead.
async fn back_one_step(orchestrator: &Orchestrator, navigator: &MemoryNavigator) -> Result<()> {
    let ordinal = orchestrator.state().await.current_step();
    let previous = orchestrator
        .catalog()
        .await
        .find_by_ordinal(ordinal.saturating_sub(1))
        .map(|(_, step)| step.path.clone());
    match previous {
        Some(path) => {
            navigator.push(&path);
            orchestrator.handle_route_change(&path).await?;
        }
        None => println!("already at the first step"),
    }
    Ok(())
}

/// `--user` wins; otherwise the user kept across `start-new`.
fn init_user(flag: Option<String>, saved: Option<&UserId>) -> Result<UserId> {
    match (flag, saved) {
        (Some(user), _) => Ok(UserId::new(user)),
        (None, Some(user)) => Ok(user.clone()),
        (None, None) => bail!("no saved user; run `wizard init --user <id>`"),
    }
}

fn describe(outcome: &AdvanceOutcome) -> String {
    match outcome {
        AdvanceOutcome::Navigated(path) => format!("moved to {path}"),
        AdvanceOutcome::Moved => "step completed".to_string(),
        AdvanceOutcome::SubStep(key) => format!("next sub-step {key}"),
        AdvanceOutcome::Realigned(Some(path)) => format!("realigned with the engine at {path}"),
        AdvanceOutcome::Realigned(None) => "realigned with the engine".to_string(),
        AdvanceOutcome::Finished => "inscription finished".to_string(),
    }
}

fn engine_client(settings: &WizardSettings) -> Result<Arc<dyn EngineClient>> {
    match settings.engine_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpEngineClient::new(
            url,
            settings.template_code.clone(),
            settings.request_timeout(),
        )?)),
        None => {
            warn!("no workflow engine configured; sessions run in manual mode");
            Ok(Arc::new(MissingEngineClient))
        }
    }
}

fn process_service(settings: &WizardSettings) -> Result<Arc<dyn ProcessService>> {
    match settings.api_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpProcessService::new(url, settings.request_timeout())?)),
        None => Ok(Arc::new(MissingProcessService)),
    }
}

fn resolve_database_url(flag: Option<&str>, settings: &WizardSettings) -> String {
    if let Some(url) = flag {
        return normalize_database_url(url);
    }
    if settings.database_url != WizardSettings::default().database_url {
        return settings.database_url.clone();
    }
    // Fallback: per-user app data
    match dirs::data_local_dir() {
        Some(base) => {
            let path = base.join("inscricao_wizard").join("wizard.db");
            normalize_database_url(&path.to_string_lossy())
        }
        None => settings.database_url.clone(),
    }
}

fn print_notices(events: &mut broadcast::Receiver<OrchestratorEvent>) {
    while let Ok(event) = events.try_recv() {
        if let OrchestratorEvent::Notice { level, message } = event {
            let tag = match level {
                NoticeLevel::Info => "info",
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            println!("[{tag}] {message}");
        }
    }
}

async fn print_status(orchestrator: &Orchestrator, navigator: &MemoryNavigator) {
    let state = orchestrator.state().await;
    println!("phase:    {:?}", orchestrator.phase().await);
    if let Some(process_id) = state.process_id() {
        println!("process:  {process_id}");
    }
    if let Some(binding) = state.workflow() {
        println!(
            "instance: {} at {}",
            binding.instance_id, binding.current_step_key
        );
    }
    if let Some(sub) = state.subprocess() {
        println!("sub-step: {} ({})", sub.current_step_key, sub.instance_id);
    }
    println!("route:    {}", navigator.current());
    if let Some(key) = orchestrator.render_key().await {
        println!("page:     {key}");
    }
    println!("{}", orchestrator.progress().await);
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
