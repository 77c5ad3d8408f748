use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::realtime::ReconnectPolicy;

/// Base URL of the REST API when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://api.storefront.local/api/";

/// Push-channel hub endpoint when nothing else is configured.
pub const DEFAULT_HUB_URL: &str = "https://api.storefront.local/hubs/store";

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every resource path is joined onto.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Read timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Connection timeout in seconds (default: 30).
    #[serde(default = "default_timeout")]
    pub connect_timeout_seconds: u32,
}

/// Push-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Hub endpoint; `http(s)` is rewritten to `ws(s)` when connecting.
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    /// Interval between keep-alive pings in seconds (default: 15).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u32,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Automatic reconnection after an unexpected close.
///
/// `max_attempts = 0` disables it, which is the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

/// Where the session token and role are persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit session file; defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_hub_url() -> String {
    DEFAULT_HUB_URL.to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_keep_alive() -> u32 {
    15
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_seconds))
    }
}

impl RealtimeConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_seconds))
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl StorageConfig {
    /// Resolved session file path.
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        data_dir.join("storefront").join("session.toml")
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            hub_url: default_hub_url(),
            keep_alive_seconds: default_keep_alive(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}
