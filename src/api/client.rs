use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::config::{bearer_header, ApiConfig, ConfigError, CredentialStore};
use crate::resource::Resource;

use super::envelope::{interpret, Empty};
use super::error::{ApiError, ErrorKind};
use super::request::{ApiRequest, RequestBody};

/// Authenticated client for the storefront REST API.
///
/// Cloning is cheap; clones share the connection pool and the credential
/// store. The client never retries on its own.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    credentials: CredentialStore,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, credentials: CredentialStore) -> Result<Self, ConfigError> {
        let base_url = normalize_base_url(&config.base_url)?;

        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::ValidationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Execute a request and decode the envelope's `data` as `T`.
    ///
    /// A successful envelope without `data` is a contract violation here;
    /// use [`ApiClient::execute`] for operations that return nothing.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        match self.dispatch::<T>(request).await? {
            Some(data) => Ok(data),
            None => {
                tracing::error!(path = %path, "Response envelope has no data");
                Err(ApiError::Malformed {
                    detail: "response has no data".to_string(),
                })
            }
        }
    }

    /// Execute a request whose payload, if any, is ignored.
    pub async fn execute(&self, request: ApiRequest) -> Result<Empty, ApiError> {
        self.dispatch::<IgnoredAny>(request).await.map(|_| Empty)
    }

    /// [`ApiClient::send`] folded into a `Resource`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Resource<T> {
        self.send(request).await.into()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: impl Into<String>) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Option<T>, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let method = request.method.clone();
        let path = request.path.clone();

        let (status, body) = self.transmit(request, &request_id).await?;
        let result = interpret::<T>(status, &body);

        match &result {
            Ok(_) => {
                tracing::debug!(request_id = %request_id, %method, path = %path, status = status.as_u16(), "Request succeeded");
            }
            Err(err) => self.on_failure(err, &request_id, &method, &path),
        }

        result
    }

    async fn transmit(
        &self,
        request: ApiRequest,
        request_id: &str,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let url = self.url_for(&request)?;
        let mut builder = self.http.request(request.method.clone(), url);

        if let Some((name, value)) = bearer_header(&self.credentials) {
            builder = builder.header(name, value);
        }

        match request.body {
            RequestBody::None => {}
            RequestBody::Json(bytes) => {
                builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
            }
            RequestBody::Invalid(reason) => {
                return Err(ApiError::InvalidRequest(format!(
                    "Failed to serialize request body: {}",
                    reason
                )));
            }
        }

        tracing::debug!(request_id = %request_id, method = %request.method, path = %request.path, "Sending request");

        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from(e);
            tracing::warn!(request_id = %request_id, path = %request.path, error = %err, "Transport failure");
            err
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            let err = ApiError::from(e);
            tracing::warn!(request_id = %request_id, path = %request.path, error = %err, "Failed to read response body");
            err
        })?;

        Ok((status, body.to_vec()))
    }

    fn on_failure(&self, err: &ApiError, request_id: &str, method: &reqwest::Method, path: &str) {
        match err.kind() {
            ErrorKind::Authentication => {
                tracing::info!(request_id = %request_id, %method, path = %path, "Session rejected, clearing credentials");
                self.credentials.clear();
            }
            ErrorKind::Server => {
                tracing::warn!(request_id = %request_id, %method, path = %path, status = ?err.status(), error = %err, "Server error");
            }
            ErrorKind::Contract => {
                tracing::error!(request_id = %request_id, %method, path = %path, error = %err, "Response did not match the expected contract");
            }
            ErrorKind::Validation | ErrorKind::Rejected | ErrorKind::Transport => {
                tracing::debug!(request_id = %request_id, %method, path = %path, error = %err, "Request failed");
            }
        }
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let relative = request.path.trim_start_matches('/');
        let mut url = self
            .base_url
            .join(relative)
            .map_err(|e| ApiError::InvalidRequest(format!("Bad path '{}': {}", request.path, e)))?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// Parse the base URL and force a trailing slash so relative joins keep
/// the last path segment.
fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::ValidationError {
        message: format!("Invalid API base URL '{}': {}", raw, e),
    })
}
