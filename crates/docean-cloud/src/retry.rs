//! Bounded retry of operations that fail on transient preconditions

use crate::context::Context;
use crate::error::{CloudError, Result};
use crate::waiter::next_wait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const RETRY_MIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Classification of a failed attempt
#[derive(Debug)]
pub enum RetryError {
    Retryable(CloudError),
    NonRetryable(CloudError),
}

impl RetryError {
    pub fn retryable(err: impl Into<CloudError>) -> Self {
        RetryError::Retryable(err.into())
    }

    pub fn non_retryable(err: impl Into<CloudError>) -> Self {
        RetryError::NonRetryable(err.into())
    }

    pub fn into_inner(self) -> CloudError {
        match self {
            RetryError::Retryable(e) | RetryError::NonRetryable(e) => e,
        }
    }
}

/// Retryable only for 412 responses whose message contains `needle`
///
/// Matching is case-insensitive. Everything else is fatal.
pub fn retry_on_precondition(err: docean_api::Error, needle: &str) -> RetryError {
    let in_use = err.is_precondition_failed()
        && err
            .message()
            .to_lowercase()
            .contains(&needle.to_lowercase());
    if in_use {
        RetryError::retryable(err)
    } else {
        RetryError::non_retryable(err)
    }
}

/// Run `body` until it succeeds, fails fatally or `timeout` passes
///
/// On timeout the last retryable error is returned.
pub async fn retry<T, F, Fut>(ctx: &Context, timeout: Duration, mut body: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut wait = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let last = match ctx.run(body()).await? {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(e),
            Err(RetryError::Retryable(e)) => e,
        };

        let now = Instant::now();
        if now >= deadline {
            tracing::warn!("giving up after {} attempts: {}", attempt, last);
            return Err(last);
        }

        let next = next_wait(wait, RETRY_MIN_TIMEOUT);
        wait = Some(next);
        tracing::debug!("attempt {} failed: {}; retrying in {:?}", attempt, last, next);
        ctx.sleep(next.min(deadline - now)).await?;
    }
}
