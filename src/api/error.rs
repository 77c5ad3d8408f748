//! Error taxonomy for the HTTP client core.
//!
//! Every failure path of a request resolves into one of these variants.
//! The variants carry plain strings so the error can be cloned into a
//! `Resource::Error` and compared in tests.

use thiserror::Error;

/// Errors that can occur while executing an API request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No connectivity, DNS failure or timeout.
    #[error("network failure: {detail}")]
    Transport { detail: String },

    /// 401/419: the session token was rejected and has been cleared.
    #[error("Authentication required ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Any other 4xx, including validation failures.
    #[error("Request rejected ({status}): {message}")]
    Client { status: u16, message: String },

    /// 5xx from the server.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 2xx with `success: false` in the envelope.
    #[error("Request failed: {message}")]
    Rejected { message: String },

    /// The response did not match the expected shape.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },

    /// The request could not be built (bad path, unserializable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Form input rejected before anything was sent.
    #[error("{0}")]
    InvalidInput(String),
}

/// Coarse classification used by screens to pick an error presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Authentication,
    Validation,
    Server,
    Rejected,
    Contract,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Unauthorized { .. } => ErrorKind::Authentication,
            ApiError::Client { .. } | ApiError::InvalidInput(_) => ErrorKind::Validation,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Rejected { .. } => ErrorKind::Rejected,
            ApiError::Malformed { .. } | ApiError::InvalidRequest(_) => ErrorKind::Contract,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport { .. } | ApiError::Server { .. })
    }

    /// Whether the UI should route to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status, when the failure came with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. }
            | ApiError::Client { status, .. }
            | ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text shown to the user in an error panel.
    ///
    /// Server-provided messages are surfaced verbatim; transport and
    /// contract failures get fixed generic text.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport { .. } => "network failure".to_string(),
            ApiError::Malformed { .. } => "malformed response".to_string(),
            ApiError::InvalidRequest(_) => "invalid request".to_string(),
            ApiError::Unauthorized { message, .. }
            | ApiError::Client { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Rejected { message }
            | ApiError::InvalidInput(message) => message.clone(),
        }
    }

    /// Map a non-success HTTP status plus the server's message.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 419 => ApiError::Unauthorized { status, message },
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Client { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("timed out: {}", err)
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        ApiError::Transport { detail }
    }
}
