//! Sweepers for resources left behind by acceptance tests
//!
//! Dependencies: volumes after droplets, certificates after load
//! balancers, VPCs after droplets and load balancers, projects after
//! everything they can hold.

use crate::meta::Meta;
use crate::pagination::collect_all;
use crate::project::{DELETE_TIMEOUT, delete_project};
use async_trait::async_trait;
use docean_cloud::sweep::matches_prefix;
use docean_cloud::{Context, Result, Sweeper, SweeperRegistry, wait_for_action};
use std::time::Duration;

const DETACH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub struct DropletSweeper;

#[async_trait]
impl Sweeper<Meta> for DropletSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let droplets = collect_all(ctx, move |opt| meta.droplets.list(opt)).await?;
        let mut swept = 0;
        for droplet in droplets.iter().filter(|d| matches_prefix(&d.name, prefix)) {
            tracing::info!("sweeping droplet {} ({})", droplet.name, droplet.id);
            ctx.run(meta.droplets.delete(droplet.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

pub struct VolumeSweeper;

#[async_trait]
impl Sweeper<Meta> for VolumeSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let volumes = collect_all(ctx, move |opt| meta.volumes.list(opt)).await?;
        let mut swept = 0;
        for volume in volumes.iter().filter(|v| matches_prefix(&v.name, prefix)) {
            tracing::info!("sweeping volume {} ({})", volume.name, volume.id);
            for droplet_id in &volume.droplet_ids {
                let action = ctx.run(meta.storage_actions.detach(&volume.id, *droplet_id)).await??;
                wait_for_action(ctx, meta.actions.as_ref(), action.id, DETACH_TIMEOUT).await?;
            }
            ctx.run(meta.volumes.delete(&volume.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

pub struct LoadBalancerSweeper;

#[async_trait]
impl Sweeper<Meta> for LoadBalancerSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let lbs = collect_all(ctx, move |opt| meta.load_balancers.list(opt)).await?;
        let mut swept = 0;
        for lb in lbs.iter().filter(|lb| matches_prefix(&lb.name, prefix)) {
            tracing::info!("sweeping load balancer {} ({})", lb.name, lb.id);
            ctx.run(meta.load_balancers.delete(&lb.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

pub struct CertificateSweeper;

#[async_trait]
impl Sweeper<Meta> for CertificateSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let certificates = collect_all(ctx, move |opt| meta.certificates.list(opt)).await?;
        let mut swept = 0;
        for cert in certificates.iter().filter(|c| matches_prefix(&c.name, prefix)) {
            tracing::info!("sweeping certificate {} ({})", cert.name, cert.id);
            ctx.run(meta.certificates.delete(&cert.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

/// CDN endpoints are matched by origin host
pub struct CdnSweeper;

#[async_trait]
impl Sweeper<Meta> for CdnSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let endpoints = collect_all(ctx, move |opt| meta.cdn.list(opt)).await?;
        let mut swept = 0;
        for cdn in endpoints.iter().filter(|c| matches_prefix(&c.origin, prefix)) {
            tracing::info!("sweeping CDN endpoint {} ({})", cdn.origin, cdn.id);
            ctx.run(meta.cdn.delete(&cdn.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

pub struct AppSweeper;

#[async_trait]
impl Sweeper<Meta> for AppSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let apps = collect_all(ctx, move |opt| meta.apps.list(opt)).await?;
        let mut swept = 0;
        for app in &apps {
            let name = app.spec.as_ref().map(|s| s.name.as_str()).unwrap_or_default();
            if !matches_prefix(name, prefix) {
                continue;
            }
            tracing::info!("sweeping app {} ({})", name, app.id);
            ctx.run(meta.apps.delete(&app.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

/// The default project is never swept
pub struct ProjectSweeper;

#[async_trait]
impl Sweeper<Meta> for ProjectSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let projects = collect_all(ctx, move |opt| meta.projects.list(opt)).await?;
        let mut swept = 0;
        for project in projects
            .iter()
            .filter(|p| !p.is_default && matches_prefix(&p.name, prefix))
        {
            tracing::info!("sweeping project {} ({})", project.name, project.id);
            delete_project(ctx, meta, &project.id, DELETE_TIMEOUT).await?;
            swept += 1;
        }
        Ok(swept)
    }
}

/// Default VPCs are never swept
pub struct VpcSweeper;

#[async_trait]
impl Sweeper<Meta> for VpcSweeper {
    async fn sweep(&self, ctx: &Context, meta: &Meta, prefix: &str) -> Result<usize> {
        let vpcs = collect_all(ctx, move |opt| meta.vpcs.list(opt)).await?;
        let mut swept = 0;
        for vpc in vpcs.iter().filter(|v| !v.default && matches_prefix(&v.name, prefix)) {
            tracing::info!("sweeping VPC {} ({})", vpc.name, vpc.id);
            ctx.run(meta.vpcs.delete(&vpc.id)).await??;
            swept += 1;
        }
        Ok(swept)
    }
}

/// Every sweeper with its dependencies
pub fn registry() -> Result<SweeperRegistry<Meta>> {
    let mut registry = SweeperRegistry::new();
    registry.register("digitalocean_droplet", &[], DropletSweeper)?;
    registry.register("digitalocean_volume", &["digitalocean_droplet"], VolumeSweeper)?;
    registry.register("digitalocean_loadbalancer", &[], LoadBalancerSweeper)?;
    registry.register(
        "digitalocean_certificate",
        &["digitalocean_loadbalancer", "digitalocean_cdn"],
        CertificateSweeper,
    )?;
    registry.register("digitalocean_cdn", &[], CdnSweeper)?;
    registry.register("digitalocean_app", &[], AppSweeper)?;
    registry.register(
        "digitalocean_project",
        &[
            "digitalocean_droplet",
            "digitalocean_volume",
            "digitalocean_loadbalancer",
            "digitalocean_app",
        ],
        ProjectSweeper,
    )?;
    registry.register(
        "digitalocean_vpc",
        &["digitalocean_droplet", "digitalocean_loadbalancer"],
        VpcSweeper,
    )?;
    Ok(registry)
}
