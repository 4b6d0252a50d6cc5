//! Configuration loading for the DRDX service
//!
//! Configuration is read from a TOML file (default
//! `~/.config/drdx/drdx.toml`), then overridden by environment variables:
//!
//! - `DRDX_BIND` — listen address for the HTTP service
//! - `DRDX_LLM_ENDPOINT` — chat-completions endpoint of the vision LLM
//! - `DRDX_LLM_API_KEY` — bearer token for the vision LLM
//!
//! A missing file is not an error; defaults apply. A present-but-invalid
//! file is a configuration error with actionable text.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP service settings
    #[serde(default)]
    pub service: ServiceConfig,
    /// Vision LLM boundary settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[service]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Listen address, e.g. "127.0.0.1:5840"
    pub bind: String,
    /// Event bus channel capacity
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5840".to_string(),
            event_capacity: 100,
        }
    }
}

/// `[llm]` section - the external vision model boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// Bearer token (may also come from DRDX_LLM_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier sent in the request body
    pub model: String,
    /// Whole-call budget for one consultation, in seconds
    pub timeout_seconds: u64,
    /// Minimum interval between consecutive requests, in milliseconds
    pub min_request_interval_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/v1/chat/completions".to_string(),
            api_key: None,
            model: "qwen-plus".to_string(),
            timeout_seconds: 30,
            min_request_interval_ms: 200,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing env-filter directive, e.g. "info" or "drdx_engine=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/drdx/drdx.toml` on Linux; the platform config dir elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("drdx").join("drdx.toml"))
}

/// Load configuration from an explicit path, or the default location
///
/// Missing file: returns defaults. Unreadable or unparseable file: error.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let resolved = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let mut config = match resolved {
        Some(ref p) if p.exists() => {
            let content = std::fs::read_to_string(p)
                .map_err(|e| Error::Config(format!("cannot read {}: {}", p.display(), e)))?;
            let parsed: TomlConfig = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("cannot parse {}: {}", p.display(), e)))?;
            info!("Configuration loaded from {}", p.display());
            parsed
        }
        Some(ref p) => {
            info!("No configuration file at {}, using defaults", p.display());
            TomlConfig::default()
        }
        None => {
            warn!("No platform config directory, using defaults");
            TomlConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Apply `DRDX_*` environment overrides on top of file values
fn apply_env_overrides(config: &mut TomlConfig) {
    if let Ok(bind) = std::env::var("DRDX_BIND") {
        if !bind.trim().is_empty() {
            config.service.bind = bind;
        }
    }
    if let Ok(endpoint) = std::env::var("DRDX_LLM_ENDPOINT") {
        if !endpoint.trim().is_empty() {
            config.llm.endpoint = endpoint;
        }
    }
    if let Ok(key) = std::env::var("DRDX_LLM_API_KEY") {
        if !key.trim().is_empty() {
            config.llm.api_key = Some(key);
        }
    }
}

/// Validate resolved configuration
fn validate(config: &TomlConfig) -> Result<()> {
    if config.service.bind.trim().is_empty() {
        return Err(Error::Config(
            "service.bind must not be empty (set [service] bind or DRDX_BIND)".to_string(),
        ));
    }
    if config.llm.endpoint.trim().is_empty() {
        return Err(Error::Config(
            "llm.endpoint must not be empty (set [llm] endpoint or DRDX_LLM_ENDPOINT)".to_string(),
        ));
    }
    if config.llm.timeout_seconds == 0 {
        return Err(Error::Config(
            "llm.timeout_seconds must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Write configuration back to a TOML file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("cannot create {}: {}", parent.display(), e)))?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("cannot serialize configuration: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))?;
    Ok(())
}
