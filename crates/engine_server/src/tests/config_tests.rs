use super::*;

#[test]
fn file_then_env_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("engine.toml");
    fs::write(&path, "bind_addr = \"0.0.0.0:9000\"\ntemplate_code = \"LOCAL\"\n").expect("write");

    let settings = load_settings_from(&path, |name| match name {
        "APP__BIND_ADDR" => Some("127.0.0.1:9100".to_string()),
        _ => None,
    });

    assert_eq!(settings.bind_addr, "127.0.0.1:9100");
    assert_eq!(settings.template_code, "LOCAL");
    assert_eq!(settings.subprocess_step_key, "FORM");
}

#[test]
fn missing_file_keeps_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("absent.toml"), |_| None);
    assert_eq!(settings, Settings::default());
}
