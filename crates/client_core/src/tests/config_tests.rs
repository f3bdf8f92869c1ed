use super::*;

use std::collections::HashMap;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("missing.toml"), env_of(&[]));
    assert_eq!(settings, WizardSettings::default());
    assert_eq!(settings.request_timeout(), Duration::from_secs(20));
}

#[test]
fn file_values_are_overridden_by_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wizard.toml");
    fs::write(
        &path,
        r#"
engine_url = "http://engine.local:9000"
template_code = "FROM_FILE"
database_url = "./state/wizard.db"
request_timeout_ms = 1500
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(
        &path,
        env_of(&[
            ("APP__TEMPLATE_CODE", "FROM_ENV"),
            ("WIZARD_API_URL", "http://api.local"),
            ("APP__TERMINAL_PATH", "/processos"),
        ]),
    );

    assert_eq!(settings.engine_url.as_deref(), Some("http://engine.local:9000"));
    assert_eq!(settings.api_url.as_deref(), Some("http://api.local"));
    assert_eq!(settings.template_code, "FROM_ENV");
    assert_eq!(settings.database_url, "sqlite://./state/wizard.db");
    assert_eq!(settings.terminal_path, "/processos");
    assert_eq!(settings.request_timeout_ms, 1500);
}

#[test]
fn app_prefixed_variable_wins_and_empty_url_disables_engine() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(
        &dir.path().join("none.toml"),
        env_of(&[
            ("WIZARD_ENGINE_URL", "http://ignored"),
            ("APP__ENGINE_URL", ""),
            ("APP__REQUEST_TIMEOUT_MS", "not-a-number"),
        ]),
    );
    assert_eq!(settings.engine_url, None);
    assert_eq!(settings.request_timeout_ms, 20_000);
}

#[test]
fn unreadable_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wizard.toml");
    fs::write(&path, "engine_url = [broken").expect("write");
    let settings = load_settings_from(&path, env_of(&[]));
    assert_eq!(settings.engine_url, WizardSettings::default().engine_url);
}

#[test]
fn normalizes_database_urls() {
    assert_eq!(normalize_database_url("./data/test.db"), "sqlite://./data/test.db");
    assert_eq!(normalize_database_url("sqlite:data\\w.db"), "sqlite://data/w.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), "sqlite://./data/wizard.db");
}
