//! App Platform apps
//!
//! An app is described by one nested App Spec. Every create or spec update
//! starts a deployment that is followed to completion before the app is
//! read back.

pub mod spec;
pub mod watcher;

use crate::meta::Meta;
use crate::project;
use async_trait::async_trait;
use docean_api::App;
use docean_api::apps::{AppCreateRequest, AppUpdateRequest};
use docean_cloud::{
    Attribute, Block, Context, Diagnostics, Operation, Resource, ResourceData, Result, Schema,
    Timeouts, Value,
};
use spec::{app_spec_block, configured_destinations, expand_app_spec, flatten_app_spec};
use std::sync::Arc;
use std::time::Duration;
use watcher::{latest_deployment_id, wait_for_deployment};

pub const DEPLOY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const ENCRYPTED_PREFIX: &str = "EV[";

fn app_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr(
                "spec",
                Attribute::block_list(app_spec_block()).required().max_items(1),
            )
            .attr("project_id", Attribute::string().optional().computed())
            .attr("default_ingress", Attribute::string().computed())
            .attr("live_url", Attribute::string().computed())
            .attr("live_domain", Attribute::string().computed())
            .attr("active_deployment_id", Attribute::string().computed())
            .attr("urn", Attribute::string().computed())
            .attr("created_at", Attribute::string().computed())
            .attr("updated_at", Attribute::string().computed()),
    )
}

/// Keep configured values where the API returns encrypted secrets
///
/// Secret environment values come back as `EV[...]` ciphertext, which
/// would otherwise show up as drift on every plan.
fn keep_encrypted(new: &mut Value, old: &Value) {
    match (new, old) {
        (Value::Map(new), Value::Map(old)) => {
            for (key, value) in new.iter_mut() {
                if let Some(prior) = old.get(key) {
                    keep_encrypted(value, prior);
                }
            }
        }
        (Value::List(new), Value::List(old)) => {
            for (value, prior) in new.iter_mut().zip(old) {
                keep_encrypted(value, prior);
            }
        }
        (Value::String(new), Value::String(old)) if new.starts_with(ENCRYPTED_PREFIX) => {
            *new = old.clone();
        }
        _ => {}
    }
}

pub struct AppResource {
    schema: Arc<Schema>,
}

impl AppResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(app_schema()),
        }
    }

    /// Route notifications of app-level alerts
    async fn sync_alert_destinations(&self, ctx: &Context, d: &ResourceData, meta: &Meta) -> Result<()> {
        let configured = configured_destinations(&d.get_list("spec"));
        if configured.is_empty() {
            return Ok(());
        }
        let id = d.id();
        let alerts = ctx.run(meta.apps.list_alerts(id)).await??;
        for (rule, req) in configured {
            let Some(alert) = alerts.iter().find(|a| {
                a.component_name.is_empty() && a.spec.as_ref().is_some_and(|s| s.rule == rule)
            }) else {
                tracing::warn!("app {} has no {} alert to route", id, rule);
                continue;
            };
            tracing::info!("updating destinations of alert {} of app {}", alert.id, id);
            ctx.run(meta.apps.update_alert_destinations(id, &alert.id, &req)).await??;
        }
        Ok(())
    }

    async fn set_app(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta, app: &App) -> Result<()> {
        if let Some(app_spec) = &app.spec {
            let alerts = if app_spec.alerts.is_empty() {
                Vec::new()
            } else {
                ctx.run(meta.apps.list_alerts(&app.id)).await??
            };
            let mut flat = flatten_app_spec(app_spec, &alerts);
            keep_encrypted(&mut flat, &d.get("spec"));
            d.set("spec", flat)?;
        }
        d.set("project_id", &app.project_id)?;
        d.set("default_ingress", &app.default_ingress)?;
        d.set("live_url", &app.live_url)?;
        d.set("live_domain", &app.live_domain)?;
        d.set("urn", app.urn())?;
        d.set("created_at", &app.created_at)?;
        d.set("updated_at", &app.updated_at)?;
        let active = app.active_deployment.as_ref().map(|dep| dep.id.as_str()).unwrap_or_default();
        d.set("active_deployment_id", active)?;
        Ok(())
    }
}

impl Default for AppResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for AppResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_app"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default().create(DEPLOY_TIMEOUT).update(DEPLOY_TIMEOUT)
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let req = AppCreateRequest {
            spec: expand_app_spec(&d.get_list("spec")),
            project_id: d.get_string("project_id"),
        };
        let app = ctx.run(meta.apps.create(&req)).await??;
        tracing::info!("created app {} ({})", req.spec.name, app.id);
        d.set_id(&app.id);

        wait_for_deployment(ctx, meta, &app.id, None, d.timeout(Operation::Create)).await?;
        self.sync_alert_destinations(ctx, d, meta).await?;
        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let app = match ctx.run(meta.apps.get(d.id())).await? {
            Ok(app) => app,
            Err(e) if e.is_not_found() => {
                tracing::warn!("app {} not found, removing from state", d.id());
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.set_app(ctx, d, meta, &app).await?;

        let mut diags = Diagnostics::new();
        if app.active_deployment.is_none() {
            diags.warning(
                "app has no active deployment",
                Some(format!("app {} has not been deployed successfully yet", app.id)),
            );
        }
        Ok(diags)
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        d.set_partial(true);

        if d.has_change(&["spec"]) {
            let previous = latest_deployment_id(ctx, meta, &id).await?;
            let req = AppUpdateRequest {
                spec: expand_app_spec(&d.get_list("spec")),
            };
            tracing::info!("updating spec of app {}", id);
            ctx.run(meta.apps.update(&id, &req)).await??;
            wait_for_deployment(ctx, meta, &id, previous.as_deref(), d.timeout(Operation::Update)).await?;
            self.sync_alert_destinations(ctx, d, meta).await?;
            let app_spec = d.get("spec");
            d.set("spec", app_spec)?;
        }

        if d.has_change(&["project_id"]) {
            let project_id = d.get_string("project_id");
            if !project_id.is_empty() {
                let urn = format!("do:app:{id}");
                project::assign_resources(ctx, meta, &project_id, &[urn]).await?;
            }
            d.set("project_id", project_id)?;
        }

        d.set_partial(false);
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        match ctx.run(meta.apps.delete(d.id())).await? {
            Ok(()) => tracing::info!("deleted app {}", d.id()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(Diagnostics::new())
    }
}
