use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

use crate::config::types::Config;

/// Environment override for the REST base URL.
const API_URL_ENV: &str = "STOREFRONT_API_URL";
/// Environment override for the hub URL.
const HUB_URL_ENV: &str = "STOREFRONT_HUB_URL";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/storefront/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("storefront").join("config.toml")
    }

    /// Loads configuration from the default config file, then applies
    /// environment overrides.
    ///
    /// A missing file yields `Config::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Replace the URLs with `STOREFRONT_API_URL` / `STOREFRONT_HUB_URL` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
        if let Ok(url) = std::env::var(HUB_URL_ENV) {
            if !url.trim().is_empty() {
                self.realtime.hub_url = url;
            }
        }
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Both URLs parse and use an http(s) or ws(s) scheme
    /// - Timeouts are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("api.base_url", &self.api.base_url)?;
        validate_url("realtime.hub_url", &self.realtime.hub_url)?;

        if self.api.timeout_seconds == 0 || self.api.connect_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "API timeouts must be greater than zero".to_string(),
            });
        }

        if self.realtime.keep_alive_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "realtime.keep_alive_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::ValidationError {
        message: format!("{} '{}' is not a valid URL: {}", field, value, e),
    })?;

    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(()),
        other => Err(ConfigError::ValidationError {
            message: format!("{} uses unsupported scheme '{}'", field, other),
        }),
    }
}
