//! Configuration loading and backend base URL resolution
//!
//! Backend base URL priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`AERISK_API_BASE_URL`)
//! 3. TOML config file (`api_base_url`)
//! 4. Compiled default (fallback)
//!
//! A missing or broken TOML file never aborts startup. It is logged and the
//! next tier is used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Compiled fallback for the prediction backend
pub const DEFAULT_API_BASE_URL: &str = "https://aai-risk-analysis-fault-prediction.onrender.com";

/// Environment variable overriding the backend base URL
pub const API_BASE_URL_ENV: &str = "AERISK_API_BASE_URL";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "AERISK_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Prediction backend base URL
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Health probe tuning (optional)
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Health probe tuning
///
/// Defaults reproduce the backend wake-up behaviour: 1s base delay growing
/// 1.5x per attempt, capped at 10s, 8 attempts, 8s timeout per attempt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub base_delay_ms: u64,
    pub growth_factor: f64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            growth_factor: 1.5,
            max_delay_ms: 10_000,
            max_attempts: 8,
            timeout_ms: 8000,
        }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }
}

/// Locate the config file for the platform
///
/// `AERISK_CONFIG` wins when set. On Linux `~/.config/aerisk/config.toml` is
/// tried before `/etc/aerisk/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        return path.exists().then_some(path);
    }

    let user_config = dirs::config_dir().map(|d| d.join("aerisk").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/aerisk/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the backend base URL following the priority order above
pub fn resolve_api_base_url(cli_arg: Option<&str>, toml_config: &TomlConfig) -> String {
    // Priority 1: Command-line argument
    if let Some(url) = cli_arg.and_then(|v| accept_base_url(v, "command line")) {
        return url;
    }

    // Priority 2: Environment variable
    if let Some(url) = std::env::var(API_BASE_URL_ENV)
        .ok()
        .and_then(|v| accept_base_url(&v, API_BASE_URL_ENV))
    {
        return url;
    }

    // Priority 3: TOML config file
    if let Some(url) = toml_config
        .api_base_url
        .as_deref()
        .and_then(|v| accept_base_url(v, "config file"))
    {
        return url;
    }

    // Priority 4: Compiled default
    DEFAULT_API_BASE_URL.to_string()
}

/// Normalize a base URL: trimmed, no trailing slash, http(s) scheme
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config("Base URL is empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Base URL must start with http:// or https:// (got {})",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

fn accept_base_url(raw: &str, source: &str) -> Option<String> {
    match normalize_base_url(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Ignoring base URL from {}: {}", source, e);
            None
        }
    }
}
