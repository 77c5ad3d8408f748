//! The uniform server response wrapper and its interpretation.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;

/// `{ success, message, data, errors }` as returned by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<ErrorDetails>,
}

/// Server-side error list. Older endpoints send a flat list, validation
/// failures send a field map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    List(Vec<String>),
    Fields(BTreeMap<String, Vec<String>>),
    Single(String),
}

impl ErrorDetails {
    pub fn messages(&self) -> Vec<String> {
        match self {
            ErrorDetails::List(items) => items.clone(),
            ErrorDetails::Fields(fields) => fields.values().flatten().cloned().collect(),
            ErrorDetails::Single(message) => vec![message.clone()],
        }
    }
}

/// Success marker for operations that return no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;

/// Paged list nested inside an envelope's `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    /// Derive page counts from the totals.
    ///
    /// `total_pages = ceil(total_items / page_size)` and
    /// `has_next = current_page < total_pages`. A zero page size yields
    /// zero pages.
    pub fn new(current_page: u32, page_size: u32, total_items: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            let pages = total_items.div_ceil(u64::from(page_size));
            u32::try_from(pages).unwrap_or(u32::MAX)
        };
        Self {
            current_page,
            page_size,
            total_items,
            total_pages,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }
}

impl<T> Page<T> {
    pub fn empty(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::new(1, page_size, 0),
        }
    }
}

impl<T> Envelope<T> {
    /// `message`, or the joined `errors` when no message was given.
    pub fn failure_message(&self) -> Option<String> {
        failure_message(self.message.as_deref(), self.errors.as_ref())
    }
}

/// Loose shape used to pull a message out of non-2xx bodies, which may or
/// may not be proper envelopes.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    errors: Option<ErrorDetails>,
}

fn failure_message(message: Option<&str>, errors: Option<&ErrorDetails>) -> Option<String> {
    if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
        return Some(message.to_string());
    }
    let joined = errors
        .map(|e| e.messages().join("; "))
        .filter(|m| !m.is_empty())?;
    Some(joined)
}

/// Turn a status and raw body into the envelope's `data`.
///
/// A transport-level 2xx with `success: false` is still a failure.
/// Non-2xx bodies are decoded only to extract a message.
pub fn interpret<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<Option<T>, ApiError> {
    if status.is_success() {
        // `data` stays untyped until `success` is known; failures may carry
        // placeholder data of any shape.
        let envelope: Envelope<Value> =
            serde_json::from_slice(body).map_err(|e| ApiError::Malformed {
                detail: e.to_string(),
            })?;

        if !envelope.success {
            let message = envelope
                .failure_message()
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ApiError::Rejected { message });
        }
        return envelope
            .data
            .map(serde_json::from_value::<T>)
            .transpose()
            .map_err(|e| ApiError::Malformed {
                detail: e.to_string(),
            });
    }

    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| {
            failure_message(b.message.as_deref(), b.errors.as_ref()).or(b.title)
        })
        .unwrap_or_else(|| default_status_message(status));

    Err(ApiError::from_status(status.as_u16(), message))
}

fn default_status_message(status: StatusCode) -> String {
    match status.as_u16() {
        401 | 419 => "Authentication required".to_string(),
        500..=599 => "Server error, please try again".to_string(),
        code => match status.canonical_reason() {
            Some(reason) => format!("{} {}", code, reason),
            None => format!("Request failed with status {}", code),
        },
    }
}
