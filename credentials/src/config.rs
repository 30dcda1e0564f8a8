//! Configuration loader. The file is JSON with camelCase keys; every field is
//! optional and falls back to the defaults the stored records were made with.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::kdf::KdfParams;

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "MIGRALE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("config rejected: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub kdf: KdfParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            kdf: KdfParams::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("logLevel must not be empty".to_string()));
        }
        self.kdf
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("kdf: {e}")))
    }
}

/// Reads and validates the JSON configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let config: Config =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;
    config.validate()?;
    Ok(config)
}

/// Resolves the config source: an explicit path wins, then `MIGRALE_CONFIG`,
/// then built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}
