use std::future::Future;
use std::pin::pin;

use api::ApiError;
use futures::future::{select, Either};
use serde::{Deserialize, Serialize};

use crate::core::timing::sleep_ms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub backoff_ms: u64,
    /// Per-attempt request timeout.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 1_000,
            timeout_ms: 10_000,
        }
    }
}

/// Resolve `future`, or fail with [`ApiError::Timeout`] after `timeout_ms`.
pub async fn with_timeout<T, F>(future: F, timeout_ms: u64) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let request = pin!(future);
    let timer = pin!(sleep_ms(timeout_ms));
    match select(request, timer).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(ApiError::Timeout { timeout_ms }),
    }
}

/// Run `call` until it succeeds, fails for good, or runs out of attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut call: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match with_timeout(call(), policy.timeout_ms).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                log::warn!("{label}: attempt {attempt}/{attempts} failed ({err}); retrying");
                sleep_ms(policy.backoff_ms).await;
                attempt += 1;
            }
            Err(err) => {
                log::warn!("{label}: giving up after attempt {attempt}/{attempts}: {err}");
                return Err(err);
            }
        }
    }
}
