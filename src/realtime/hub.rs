use std::sync::OnceLock;

use crate::config::{CredentialStore, RealtimeConfig};

use super::connection::HubConnection;
use super::reconnect::ReconnectSupervisor;

/// Owner of the process-wide push-channel connection.
///
/// Construct one and pass it to whatever needs realtime events. The
/// connection itself is built on the first call to
/// [`RealtimeHub::connection`]; concurrent first calls still produce a
/// single connection.
pub struct RealtimeHub {
    config: RealtimeConfig,
    credentials: CredentialStore,
    connection: OnceLock<HubConnection>,
}

impl RealtimeHub {
    pub fn new(config: RealtimeConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            connection: OnceLock::new(),
        }
    }

    pub fn connection(&self) -> &HubConnection {
        self.connection.get_or_init(|| {
            tracing::debug!(endpoint = %self.config.hub_url, "Creating hub connection");
            HubConnection::new(&self.config, self.credentials.clone())
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.get().is_some()
    }

    /// Spawn a reconnect supervisor when the configured policy enables one.
    pub fn supervise(&self) -> Option<ReconnectSupervisor> {
        let policy = self.config.reconnect.policy();
        if !policy.is_enabled() {
            return None;
        }
        tracing::info!(max_attempts = policy.max_attempts, "Hub reconnection enabled");
        Some(ReconnectSupervisor::spawn(self.connection().clone(), policy))
    }
}
