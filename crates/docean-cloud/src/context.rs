//! Cancellation and deadlines for long-running callbacks

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carries cancellation and an optional deadline through an operation
///
/// Every sleep and every remote call of a callback goes through the
/// context so that the host can abandon the operation at any point.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Child context whose deadline is the earlier of the parent's and
    /// `now + timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(d) if d < candidate => d,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast when the context is already done
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CloudError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(CloudError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep unless cancelled or past the deadline first
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(tokio::time::sleep(duration)).await
    }

    /// Run a future, abandoning it on cancellation or deadline
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(CloudError::Cancelled),
            out = fut => Ok(out),
            _ = expired => Err(CloudError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let ctx = Context::new();
        let start = Instant::now();
        ctx.sleep(Duration::from_secs(5)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_sleep() {
        let ctx = Context::new().with_timeout(Duration::from_secs(2));
        let err = ctx.sleep(Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, CloudError::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_surfaced() {
        let ctx = Context::new();
        let child = ctx.with_timeout(Duration::from_secs(600));
        let waiter = tokio::spawn({
            let child = child.clone();
            async move { child.sleep(Duration::from_secs(60)).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        ctx.cancel();
        let res = waiter.await.unwrap();
        assert!(matches!(res, Err(CloudError::Cancelled)));
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let parent = Context::new().with_timeout(Duration::from_secs(10));
            let child = parent.with_timeout(Duration::from_secs(60));
            assert_eq!(child.deadline(), parent.deadline());
        });
    }
}
