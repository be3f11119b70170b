//! Deployment watcher
//!
//! Creating or updating an app starts a deployment, but the API response
//! does not reliably carry its id. The watcher lists the most recent
//! deployments until one other than the deployment seen before the change
//! shows up, then follows that deployment's progress.

use crate::meta::Meta;
use docean_api::apps::{DEPLOYMENT_PHASE_ACTIVE, DEPLOYMENT_PHASE_ERROR, STEP_STATUS_SUCCESS};
use docean_api::{Deployment, ListOptions};
use docean_cloud::{CloudError, Context, Result};
use std::time::Duration;
use tokio::time::Instant;

pub const DEPLOYMENT_TICK: Duration = Duration::from_secs(10);
pub const DEPLOYMENT_TIMEOUT: &str = "timeout waiting for app deployment";

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Succeeded,
    Failed(String),
    Running,
}

/// Classify a deployment by its step counters and phase
pub fn progress(deployment: &Deployment) -> Progress {
    let failed_steps: Vec<String> = deployment
        .progress
        .iter()
        .flat_map(|p| &p.steps)
        .filter(|s| s.status != STEP_STATUS_SUCCESS && s.reason.is_some())
        .map(|s| match &s.reason {
            Some(reason) => format!("{}: {}", s.name, reason.message),
            None => s.name.clone(),
        })
        .collect();

    let error_steps = deployment.progress.as_ref().map_or(0, |p| p.error_steps);
    if error_steps > 0 || deployment.phase == DEPLOYMENT_PHASE_ERROR {
        let detail = if failed_steps.is_empty() {
            format!("{error_steps} step(s) errored")
        } else {
            failed_steps.join("; ")
        };
        return Progress::Failed(format!("deployment {} failed: {}", deployment.id, detail));
    }

    if let Some(p) = &deployment.progress {
        let all_succeeded = !p.steps.is_empty() && p.steps.iter().all(|s| s.status == STEP_STATUS_SUCCESS);
        if all_succeeded || (p.total_steps > 0 && p.success_steps == p.total_steps) {
            return Progress::Succeeded;
        }
    }
    if deployment.phase == DEPLOYMENT_PHASE_ACTIVE {
        return Progress::Succeeded;
    }
    Progress::Running
}

/// Id of the most recent deployment of the app, if any
pub async fn latest_deployment_id(ctx: &Context, meta: &Meta, app_id: &str) -> Result<Option<String>> {
    let opt = ListOptions { page: 1, per_page: 2 };
    let page = ctx.run(meta.apps.list_deployments(app_id, opt)).await??;
    Ok(page.items.into_iter().next().map(|d| d.id))
}

/// Wait for the deployment started after `previous` to finish
///
/// Polls every [`DEPLOYMENT_TICK`] until `timeout` elapses. A deployment
/// with errored steps fails the wait; running out of time yields
/// [`CloudError::Timeout`].
pub async fn wait_for_deployment(
    ctx: &Context,
    meta: &Meta,
    app_id: &str,
    previous: Option<&str>,
    timeout: Duration,
) -> Result<Deployment> {
    let deadline = Instant::now() + timeout;
    let mut deployment_id: Option<String> = None;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CloudError::Timeout(DEPLOYMENT_TIMEOUT.to_string()));
        }
        ctx.sleep(DEPLOYMENT_TICK.min(remaining)).await?;

        let id = match &deployment_id {
            Some(id) => id.clone(),
            None => match latest_deployment_id(ctx, meta, app_id).await? {
                Some(id) if previous != Some(id.as_str()) => {
                    tracing::debug!("following deployment {} of app {}", id, app_id);
                    deployment_id = Some(id.clone());
                    id
                }
                _ => continue,
            },
        };

        let deployment = ctx.run(meta.apps.get_deployment(app_id, &id)).await??;
        match progress(&deployment) {
            Progress::Succeeded => {
                tracing::info!("deployment {} of app {} is active", id, app_id);
                return Ok(deployment);
            }
            Progress::Failed(message) => return Err(CloudError::msg(message)),
            Progress::Running => {
                if let Some(p) = &deployment.progress {
                    tracing::debug!(
                        "deployment {}: {}/{} steps done",
                        id,
                        p.success_steps,
                        p.total_steps
                    );
                }
            }
        }
    }
}
