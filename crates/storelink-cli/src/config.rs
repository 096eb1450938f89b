//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::path::Path;
use storelink_core::ClientConfig;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "STORELINK_CONFIG";
/// Config file used when neither flag nor environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Locale sent with every request unless overridden on the command line.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Network layer settings.
    #[serde(default)]
    pub client: ClientConfig,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            client: ClientConfig::default(),
        }
    }
}

impl AppConfig {
    /// Resolve the config path: CLI arg > `STORELINK_CONFIG` > default.
    pub fn resolve_path(cli_path: Option<String>) -> String {
        cli_path
            .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration, falling back to defaults if the file is missing.
    ///
    /// Environment overrides are applied in both cases.
    pub fn load(path: &str) -> AppResult<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Self::default()
        };
        config.client.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }
}
