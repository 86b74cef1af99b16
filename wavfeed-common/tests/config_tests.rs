//! Tests for configuration file loading and graceful degradation
//!
//! Note: Uses serial_test to prevent environment variable races. Tests that
//! point XDG_CONFIG_HOME at a temporary directory are marked with #[serial].

use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;
use wavfeed_common::config::{load_toml_config, ConfigSource};
use wavfeed_common::logging::LoggingConfig;
use wavfeed_common::Error;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    name: String,
    rate: u32,
    logging: LoggingConfig,
}

#[test]
fn test_explicit_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        "name = \"studio\"\nrate = 48000\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let loaded = load_toml_config::<SampleConfig>(Some(&path)).unwrap();

    assert_eq!(loaded.source, ConfigSource::Explicit(path.clone()));
    assert_eq!(loaded.config.name, "studio");
    assert_eq!(loaded.config.rate, 48000);
    assert_eq!(loaded.config.logging.level, "debug");
    assert!(loaded.config.logging.file.is_none());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let result = load_toml_config::<SampleConfig>(Some(&path));

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("does-not-exist.toml")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "rate = \"not a number\"\n").unwrap();

    let result = load_toml_config::<SampleConfig>(Some(&path));

    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_location_is_used_when_present() {
    let dir = TempDir::new().unwrap();
    let app_dir = dir.path().join("wavfeed");
    fs::create_dir_all(&app_dir).unwrap();
    fs::write(app_dir.join("config.toml"), "rate = 22050\n").unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let loaded = load_toml_config::<SampleConfig>(None);

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    let loaded = loaded.unwrap();
    assert_eq!(loaded.source, ConfigSource::Default(app_dir.join("config.toml")));
    assert_eq!(loaded.config.rate, 22050);
    assert_eq!(loaded.config.logging, LoggingConfig::default());
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_missing_default_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let loaded = load_toml_config::<SampleConfig>(None);

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    let loaded = loaded.unwrap();
    assert_eq!(loaded.source, ConfigSource::BuiltIn);
    assert_eq!(loaded.config, SampleConfig::default());
}
