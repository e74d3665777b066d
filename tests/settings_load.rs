use std::fs;
use std::sync::Mutex;

use quiver::error::QueryError;
use quiver::settings::QuerySettings;

// These tests share the process environment, so anything that reads or
// writes it holds this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn defaults_are_sensible() {
    let settings = QuerySettings::default();
    assert!(settings.validate_on_boot);
    assert_eq!(settings.interpretation_cache_capacity, 2048);
    assert!(!settings.log_translations);
}

#[test]
fn load_without_a_file_yields_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    let settings = QuerySettings::load(None).expect("settings");
    assert_eq!(settings, QuerySettings::default());
}

#[test]
fn environment_overrides_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        std::env::set_var("QUIVER_INTERPRETATION_CACHE_CAPACITY", "64");
    }
    let settings = QuerySettings::load(None).expect("settings");
    unsafe {
        std::env::remove_var("QUIVER_INTERPRETATION_CACHE_CAPACITY");
    }
    assert_eq!(settings.interpretation_cache_capacity, 64);
    assert!(settings.validate_on_boot, "untouched settings keep their defaults");
}

#[test]
fn file_settings_override_defaults() {
    let _guard = ENV_LOCK.lock().unwrap();
    let path = std::env::temp_dir().join("quiver_settings_test.toml");
    fs::write(&path, "validate_on_boot = false\nlog_translations = true\n")
        .expect("settings file");
    let settings = QuerySettings::load(path.to_str()).expect("settings");
    fs::remove_file(&path).expect("cleanup");
    assert!(!settings.validate_on_boot);
    assert!(settings.log_translations);
    assert_eq!(settings.interpretation_cache_capacity, 2048);
}

#[test]
fn missing_file_is_a_config_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    let err = QuerySettings::load(Some("/no/such/quiver_settings")).expect_err("missing file");
    assert!(matches!(err, QueryError::Config(_)));
}
