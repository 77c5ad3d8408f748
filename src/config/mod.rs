//! Configuration, session credentials and authentication headers.

mod auth;
mod credentials;
mod loader;
mod store;
mod types;

pub use auth::{bearer_header, AuthHeader};
pub use credentials::{CredentialStore, SecureString, ROLE_KEY, TOKEN_KEY};
pub use loader::ConfigError;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    ApiConfig, Config, RealtimeConfig, ReconnectConfig, StorageConfig, DEFAULT_API_BASE_URL,
    DEFAULT_HUB_URL,
};
