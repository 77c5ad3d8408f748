//! Caller-side retry for idempotent requests.
//!
//! The client core never retries; controllers opt in here for refreshes.

use std::future::Future;
use std::time::Duration;

use super::error::ApiError;
use super::request::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1 << attempt.min(6))
    }
}

/// Run `op` with `request`, repeating only when the request is a GET and
/// the error is retryable.
pub async fn retry_idempotent<T, F, Fut>(
    policy: &RetryPolicy,
    request: ApiRequest,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut(ApiRequest) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        let err = match op(request.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        attempt += 1;
        if !request.is_idempotent() || !err.is_retryable() || attempt >= policy.max_attempts {
            return Err(err);
        }

        let delay = policy.backoff(attempt - 1);
        tracing::debug!(path = %request.path(), attempt, delay_ms = delay.as_millis() as u64, error = %err, "Retrying request");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_transport_failures_on_get() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, ApiError> = retry_idempotent(&fast(), ApiRequest::get("product"), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Transport {
                        detail: "refused".to_string(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_post() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_idempotent(&fast(), ApiRequest::post("orders"), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Server {
                    status: 503,
                    message: "busy".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_retry_validation_errors() {
        let calls = AtomicU32::new(0);
        let _ = retry_idempotent::<(), _, _>(&fast(), ApiRequest::get("product"), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Client {
                    status: 404,
                    message: "Not found".to_string(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
