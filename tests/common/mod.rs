//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_backend;
pub mod mock_hub;

use std::time::Duration;

use storefront::api::ApiClient;
use storefront::config::{ApiConfig, CredentialStore, RealtimeConfig, ReconnectConfig};
use storefront::realtime::HubConnection;

pub use mock_backend::{CapturedRequest, MockBackend, MockResponse};
pub use mock_hub::MockHub;

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        connect_timeout_seconds: 2,
    }
}

/// Client pointed at the mock backend, sharing `credentials`.
pub fn client_for(backend: &MockBackend, credentials: &CredentialStore) -> ApiClient {
    ApiClient::new(&api_config(&backend.base_url()), credentials.clone())
        .expect("Failed to build client")
}

pub fn realtime_config(hub_url: &str) -> RealtimeConfig {
    RealtimeConfig {
        hub_url: hub_url.to_string(),
        keep_alive_seconds: 15,
        reconnect: ReconnectConfig::default(),
    }
}

pub fn connection_for(hub: &MockHub, credentials: &CredentialStore) -> HubConnection {
    HubConnection::new(&realtime_config(&hub.url()), credentials.clone())
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// A URL nothing listens on.
pub fn dead_url(scheme: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind free port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("{}://127.0.0.1:{}/", scheme, port)
}
