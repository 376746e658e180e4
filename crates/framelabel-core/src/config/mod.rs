//! Configuration management for framelabel.
//!
//! Configuration is loaded once from a TOML file and handed explicitly to
//! every component. Nothing re-reads the file or the environment afterwards.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch processing settings
    pub batch: BatchConfig,

    /// Network limits
    pub limits: LimitsConfig,

    /// Vision-language backend settings
    pub llm: LlmConfig,

    /// Camera image source API
    pub events: EventsConfig,

    /// Per-call response log
    pub response_log: ResponseLogConfig,

    /// Price table overrides
    pub pricing: PricingConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.framelabel.framelabel/config.toml
    /// - Linux: ~/.config/framelabel/config.toml
    ///
    /// Falls back to ~/.framelabel/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "framelabel", "framelabel")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".framelabel").join("config.toml")
            })
    }

    /// Get the resolved response log directory (with ~ expansion).
    pub fn response_log_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.response_log.dir);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
