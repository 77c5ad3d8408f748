//! HTTP client core.
//!
//! Turns a logical request into a decoded payload or a typed error:
//! bearer-token injection, envelope unwrapping and failure
//! classification all happen here.

mod client;
mod envelope;
mod error;
mod request;
mod retry;

pub use client::ApiClient;
pub use envelope::{interpret, Empty, Envelope, ErrorDetails, Page, Pagination};
pub use error::{ApiError, ErrorKind};
pub use request::ApiRequest;
pub use retry::{retry_idempotent, RetryPolicy};
