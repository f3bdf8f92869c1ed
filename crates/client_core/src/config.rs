use std::{collections::HashMap, fs, path::Path, time::Duration};

use shared::protocol::DEFAULT_TEMPLATE_CODE;
use tracing::warn;

use crate::wizard_state::DEFAULT_STORAGE_KEY;

pub const DEFAULT_SETTINGS_FILE: &str = "wizard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSettings {
    /// `None` runs the wizard in manual mode only.
    pub engine_url: Option<String>,
    pub api_url: Option<String>,
    pub template_code: String,
    pub database_url: String,
    pub storage_key: String,
    pub terminal_path: String,
    pub request_timeout_ms: u64,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            engine_url: Some("http://127.0.0.1:8787".into()),
            api_url: Some("http://127.0.0.1:8787".into()),
            template_code: DEFAULT_TEMPLATE_CODE.into(),
            database_url: "sqlite://./data/wizard.db".into(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
            terminal_path: "/".into(),
            request_timeout_ms: 20_000,
        }
    }
}

impl WizardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

pub fn load_settings() -> WizardSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |name| std::env::var(name).ok())
}

/// Defaults, then the toml file at `path` if readable, then the variables
/// returned by `env`.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> WizardSettings {
    let mut settings = WizardSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, &file_cfg),
            Err(err) => warn!(path = %path.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    apply_env(&mut settings, env);
    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn apply_file(settings: &mut WizardSettings, file_cfg: &HashMap<String, toml::Value>) {
    let text = |name: &str| file_cfg.get(name).and_then(toml::Value::as_str).map(str::to_string);

    if let Some(v) = text("engine_url") {
        settings.engine_url = optional_url(v);
    }
    if let Some(v) = text("api_url") {
        settings.api_url = optional_url(v);
    }
    if let Some(v) = text("template_code") {
        settings.template_code = v;
    }
    if let Some(v) = text("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = text("storage_key") {
        settings.storage_key = v;
    }
    if let Some(v) = text("terminal_path") {
        settings.terminal_path = v;
    }
    if let Some(v) = file_cfg
        .get("request_timeout_ms")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.request_timeout_ms = v;
    }
}

fn apply_env(settings: &mut WizardSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("WIZARD_ENGINE_URL") {
        settings.engine_url = optional_url(v);
    }
    if let Some(v) = env("APP__ENGINE_URL") {
        settings.engine_url = optional_url(v);
    }

    if let Some(v) = env("WIZARD_API_URL") {
        settings.api_url = optional_url(v);
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = optional_url(v);
    }

    if let Some(v) = env("APP__TEMPLATE_CODE") {
        settings.template_code = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__STORAGE_KEY") {
        settings.storage_key = v;
    }
    if let Some(v) = env("APP__TERMINAL_PATH") {
        settings.terminal_path = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_ms = parsed;
        }
    }
}

fn optional_url(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return WizardSettings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
