//! Tests for backend base URL resolution and TOML loading
//!
//! Tests that manipulate AERISK_API_BASE_URL are marked with #[serial] so
//! they run sequentially, not in parallel.

use aerisk_common::config::{
    resolve_api_base_url, TomlConfig, API_BASE_URL_ENV, DEFAULT_API_BASE_URL,
};
use serial_test::serial;
use std::env;
use std::io::Write;

fn toml_with_url(url: &str) -> TomlConfig {
    TomlConfig {
        api_base_url: Some(url.to_string()),
        ..TomlConfig::default()
    }
}

#[test]
#[serial]
fn test_no_overrides_uses_compiled_default() {
    env::remove_var(API_BASE_URL_ENV);

    let url = resolve_api_base_url(None, &TomlConfig::default());
    assert_eq!(url, DEFAULT_API_BASE_URL);
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    env::set_var(API_BASE_URL_ENV, "http://env.example:9000");

    let url = resolve_api_base_url(
        Some("http://cli.example:8000/"),
        &toml_with_url("http://toml.example"),
    );
    assert_eq!(url, "http://cli.example:8000");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(API_BASE_URL_ENV, "http://env.example:9000");

    let url = resolve_api_base_url(None, &toml_with_url("http://toml.example"));
    assert_eq!(url, "http://env.example:9000");

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(API_BASE_URL_ENV);

    let url = resolve_api_base_url(None, &toml_with_url("https://toml.example/api/"));
    assert_eq!(url, "https://toml.example/api");
}

#[test]
#[serial]
fn test_invalid_tiers_fall_through() {
    env::set_var(API_BASE_URL_ENV, "not-a-url");

    let url = resolve_api_base_url(Some("   "), &toml_with_url("ftp://toml.example"));
    assert_eq!(url, DEFAULT_API_BASE_URL);

    env::remove_var(API_BASE_URL_ENV);
}

#[test]
fn test_load_full_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
api_base_url = "http://localhost:8000"

[logging]
level = "debug"

[probe]
base_delay_ms = 250
max_attempts = 4
"#
    )
    .unwrap();

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:8000"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.probe.base_delay_ms, 250);
    assert_eq!(config.probe.max_attempts, 4);
    assert_eq!(config.probe.max_delay_ms, 10_000);
}

#[test]
fn test_load_invalid_toml_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "api_base_url = [unterminated").unwrap();

    let err = TomlConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
