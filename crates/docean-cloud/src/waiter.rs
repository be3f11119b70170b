//! Polling asynchronous operations to a terminal state

use crate::context::Context;
use crate::error::{CloudError, Result};
use docean_api::{Action, ActionsService};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 60;

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);

/// Result of one refresh: the object and its state, or not found yet
pub type Refreshed<T> = Option<(T, String)>;

/// Next wait of the polling backoff
///
/// Starts at 100ms and doubles up to 10s, never below `min_timeout`.
pub(crate) fn next_wait(previous: Option<Duration>, min_timeout: Duration) -> Duration {
    let wait = match previous {
        None => INITIAL_WAIT,
        Some(prev) => (prev * 2).min(MAX_WAIT),
    };
    wait.max(min_timeout)
}

/// Configuration of a state wait
#[derive(Debug, Clone, PartialEq)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Lower bound between refreshes
    pub min_timeout: Duration,
    /// Fixed interval between refreshes, replacing the backoff
    pub poll_interval: Option<Duration>,
    /// Consecutive not-found refreshes tolerated
    pub not_found_checks: u32,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str]) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Poll `refresh` until it reports a target state
    ///
    /// Pending states keep polling; any other state is an error. The wait
    /// gives up with [`CloudError::WaitTimeout`] once `timeout` has passed.
    pub async fn wait_for_state<T, F, Fut>(&self, ctx: &Context, mut refresh: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refreshed<T>>>,
    {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();
        let mut not_found = 0u32;
        let mut wait: Option<Duration> = None;

        ctx.sleep(self.delay.min(self.timeout)).await?;

        loop {
            match ctx.run(refresh()).await?? {
                Some((object, state)) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        tracing::debug!("reached target state '{}'", state);
                        return Ok(object);
                    }
                    if !self.pending.contains(&state) {
                        return Err(CloudError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    tracing::debug!("waiting for {:?}, current state '{}'", self.target, state);
                    last_state = state;
                }
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(CloudError::NotFound {
                            checks: self.not_found_checks,
                        });
                    }
                    tracing::debug!("object not found yet ({}/{})", not_found, self.not_found_checks);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CloudError::WaitTimeout {
                    expected: self.target.clone(),
                    last_state,
                    timeout: self.timeout,
                });
            }

            let next = match self.poll_interval {
                Some(interval) => interval,
                None => next_wait(wait, self.min_timeout),
            };
            wait = Some(next);
            ctx.sleep(next.min(deadline - now)).await?;
        }
    }
}

/// State of an action handle: completed once `completed_at` is set
pub fn action_state(action: &Action) -> &'static str {
    if action.is_completed() {
        docean_api::ACTION_COMPLETED
    } else if action.is_errored() {
        docean_api::ACTION_ERRORED
    } else {
        docean_api::ACTION_IN_PROGRESS
    }
}

/// Wait for a cloud action to complete
pub async fn wait_for_action(
    ctx: &Context,
    actions: &dyn ActionsService,
    action_id: i64,
    timeout: Duration,
) -> Result<Action> {
    wait_for_action_with(
        ctx,
        actions,
        action_id,
        StateChangeConf::new(&[docean_api::ACTION_IN_PROGRESS], &[docean_api::ACTION_COMPLETED])
            .timeout(timeout),
    )
    .await
}

/// Wait for a cloud action using explicit polling parameters
pub async fn wait_for_action_with(
    ctx: &Context,
    actions: &dyn ActionsService,
    action_id: i64,
    conf: StateChangeConf,
) -> Result<Action> {
    tracing::debug!("waiting for action {}", action_id);
    conf.wait_for_state(ctx, || async move {
        let action = actions.get(action_id).await?;
        if action.is_errored() {
            return Err(CloudError::ActionFailed {
                id: action.id,
                action_type: action.action_type.clone(),
            });
        }
        let state = action_state(&action).to_string();
        Ok(Some((action, state)))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn conf() -> StateChangeConf {
        StateChangeConf::new(&["new"], &["active"])
            .timeout(Duration::from_secs(120))
            .delay(Duration::from_secs(1))
    }

    #[test]
    fn test_backoff_progression() {
        let min = Duration::from_millis(50);
        let mut wait = None;
        let mut seen = Vec::new();
        for _ in 0..9 {
            let next = next_wait(wait, min);
            seen.push(next.as_millis());
            wait = Some(next);
        }
        assert_eq!(
            seen,
            vec![100, 200, 400, 800, 1600, 3200, 6400, 10000, 10000]
        );
        assert_eq!(next_wait(None, Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_target() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = Context::new();
        let got = conf()
            .wait_for_state(&ctx, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    let state = if n < 3 { "new" } else { "active" };
                    Ok::<_, CloudError>(Some((n, state.to_string())))
                }
            })
            .await
            .unwrap();
        assert_eq!(got, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_is_error() {
        let ctx = Context::new();
        let err = conf()
            .wait_for_state(&ctx, || async { Ok::<_, CloudError>(Some(((), "errored".to_string()))) })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::UnexpectedState { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_bounded() {
        let ctx = Context::new();
        let start = Instant::now();
        let conf = conf().timeout(Duration::from_secs(30));
        let err = conf
            .wait_for_state(&ctx, || async { Ok::<_, CloudError>(Some(((), "new".to_string()))) })
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::WaitTimeout { ref last_state, .. } if last_state == "new"));
        assert!(start.elapsed() <= conf.timeout + conf.min_timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_tolerance() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = Context::new();
        let got = conf()
            .not_found_checks(2)
            .wait_for_state(&ctx, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CloudError>((n >= 2).then(|| ("ok", "active".to_string())))
                }
            })
            .await
            .unwrap();
        assert_eq!(got, "ok");

        let err = conf()
            .not_found_checks(2)
            .wait_for_state(&ctx, || async { Ok::<_, CloudError>(None::<((), String)>) })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::NotFound { checks: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_propagates() {
        let ctx = Context::new();
        let err = conf()
            .wait_for_state(&ctx, || async {
                Err::<Refreshed<()>, _>(CloudError::msg("boom"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_stops_polling() {
        let ctx = Context::new();
        ctx.cancel();
        let err = conf()
            .wait_for_state(&ctx, || async { Ok::<_, CloudError>(Some(((), "new".to_string()))) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
