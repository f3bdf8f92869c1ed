use std::{collections::HashMap, fs, path::Path};

use shared::protocol::DEFAULT_TEMPLATE_CODE;

pub const DEFAULT_SETTINGS_FILE: &str = "engine.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub template_code: String,
    pub subprocess_step_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".into(),
            template_code: DEFAULT_TEMPLATE_CODE.into(),
            subprocess_step_key: "FORM".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |name| std::env::var(name).ok())
}

pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.bind_addr = v.clone();
            }
            if let Some(v) = file_cfg.get("template_code") {
                settings.template_code = v.clone();
            }
            if let Some(v) = file_cfg.get("subprocess_step_key") {
                settings.subprocess_step_key = v.clone();
            }
        }
    }

    if let Some(v) = env("ENGINE_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = env("APP__TEMPLATE_CODE") {
        settings.template_code = v;
    }
    if let Some(v) = env("APP__SUBPROCESS_STEP_KEY") {
        settings.subprocess_step_key = v;
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
