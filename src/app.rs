//! Wiring of the shared services every controller needs.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::{Config, ConfigError, CredentialStore, FileStore};
use crate::controllers::{
    AdminController, AuthController, CartController, ChatController, OrderController,
    ProductController, WarrantyController,
};
use crate::realtime::{HubConnection, RealtimeHub};

/// One credential store, one API client and one hub per process.
///
/// Build it once at startup and hand out controllers from it; nothing in
/// the crate reaches these services through globals.
pub struct Storefront {
    config: Config,
    credentials: CredentialStore,
    api: ApiClient,
    hub: RealtimeHub,
}

impl Storefront {
    pub fn new(config: Config, credentials: CredentialStore) -> Result<Self, ConfigError> {
        config.validate()?;
        let api = ApiClient::new(&config.api, credentials.clone())?;
        let hub = RealtimeHub::new(config.realtime.clone(), credentials.clone());
        Ok(Self {
            config,
            credentials,
            api,
            hub,
        })
    }

    /// Use the on-disk session file named by the configuration.
    pub fn with_session_file(config: Config) -> Result<Self, ConfigError> {
        let path = config.storage.session_path();
        tracing::debug!(path = %path.display(), "Using session file");
        let credentials = CredentialStore::new(Arc::new(FileStore::new(path)));
        Self::new(config, credentials)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    pub fn connection(&self) -> &HubConnection {
        self.hub.connection()
    }

    pub fn auth(&self) -> AuthController {
        AuthController::new(self.api.clone())
    }

    pub fn products(&self) -> Arc<ProductController> {
        Arc::new(ProductController::new(self.api.clone()))
    }

    pub fn cart(&self) -> CartController {
        CartController::new(self.api.clone())
    }

    pub fn orders(&self) -> Arc<OrderController> {
        Arc::new(OrderController::new(self.api.clone()))
    }

    pub fn chat(&self) -> Arc<ChatController> {
        Arc::new(ChatController::new(
            self.api.clone(),
            self.connection().clone(),
        ))
    }

    pub fn warranty(&self) -> WarrantyController {
        WarrantyController::new(self.api.clone())
    }

    pub fn admin(&self) -> AdminController {
        AdminController::new(self.api.clone())
    }
}
