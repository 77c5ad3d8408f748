//! Uniform representation of an asynchronous result shown on screen.

use crate::api::ApiError;

/// In-flight, succeeded or failed.
///
/// Exactly one variant is active; a new value replaces the old one in its
/// holder rather than being mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource<T> {
    Loading,
    Success(T),
    Error(ApiError),
}

impl<T> Resource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Text for an error panel, if this is an error.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ApiError::user_message)
    }

    pub fn as_ref(&self) -> Resource<&T> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(data) => Resource::Success(data),
            Self::Error(err) => Resource::Error(err.clone()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success(data) => Resource::Success(f(data)),
            Self::Error(err) => Resource::Error(err),
        }
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::Loading
    }
}

impl<T> From<Result<T, ApiError>> for Resource<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Error(err),
        }
    }
}
