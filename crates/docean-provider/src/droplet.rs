//! Droplets
//!
//! Droplet updates are sequences of actions and the cloud runs one action
//! per droplet at a time, so every action is awaited before the next one
//! starts. A resize needs the droplet powered off; it is powered back on
//! even when the resize fails.

use crate::fields::{self, Fields};
use crate::meta::Meta;
use crate::project;
use crate::tags::{sync_tags, tags_attribute};
use async_trait::async_trait;
use docean_api::droplets::{DropletBackupPolicy, DropletCreateImage, DropletCreateSshKey};
use docean_api::{Droplet, DropletCreateRequest, TaggedResource};
use docean_cloud::hash::{state_lowercase, state_sha1};
use docean_cloud::schema::{int_between, string_in, suppress_case};
use docean_cloud::value::STRING_SET;
use docean_cloud::{
    AttrType, Attribute, Block, CloudError, Context, Diagnostics, Operation, Resource,
    ResourceData, ResourceDiff, Result, Schema, StateChangeConf, Value, wait_for_action,
};
use std::sync::Arc;
use std::time::Duration;

pub const STATUS_NEW: &str = "new";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_OFF: &str = "off";
pub const STATUS_ARCHIVE: &str = "archive";

const BACKUP_PLANS: &[&str] = &["daily", "weekly"];
const WEEKDAYS: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn backup_policy_block() -> Block {
    Block::new()
        .attr("plan", Attribute::string().optional().validate(string_in(BACKUP_PLANS)))
        .attr("weekday", Attribute::string().optional().validate(string_in(WEEKDAYS)))
        .attr("hour", Attribute::int().optional().validate(int_between(0, 20)))
}

fn droplet_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr("image", Attribute::string().required().force_new())
            .attr("name", Attribute::string().required())
            .attr(
                "region",
                Attribute::string()
                    .optional()
                    .computed()
                    .force_new()
                    .state_func(state_lowercase)
                    .diff_suppress(suppress_case),
            )
            .attr("size", Attribute::string().required().state_func(state_lowercase))
            .attr("project_id", Attribute::string().required())
            .attr("graceful_shutdown", Attribute::bool().optional().default(false))
            .attr("resize_disk", Attribute::bool().optional().default(true))
            .attr("backups", Attribute::bool().optional().default(false))
            .attr(
                "backup_policy",
                Attribute::block_list(backup_policy_block()).optional().max_items(1),
            )
            .attr("ipv6", Attribute::bool().optional().default(false))
            .attr("private_networking", Attribute::bool().optional().computed().force_new())
            .attr("monitoring", Attribute::bool().optional().default(false).force_new())
            .attr("droplet_agent", Attribute::bool().optional().force_new())
            .attr("ssh_keys", Attribute::list(AttrType::String).optional().force_new())
            .attr(
                "user_data",
                Attribute::string().optional().force_new().sensitive().state_func(state_sha1),
            )
            .attr(
                "volume_ids",
                Attribute::set(AttrType::String, STRING_SET).optional().computed(),
            )
            .attr("tags", tags_attribute())
            .attr("vpc_uuid", Attribute::string().optional().computed().force_new())
            .attr("disk", Attribute::int().computed())
            .attr("vcpus", Attribute::int().computed())
            .attr("memory", Attribute::int().computed())
            .attr("price_hourly", Attribute::float().computed())
            .attr("price_monthly", Attribute::float().computed())
            .attr("status", Attribute::string().computed())
            .attr("locked", Attribute::bool().computed())
            .attr("urn", Attribute::string().computed())
            .attr("created_at", Attribute::string().computed())
            .attr("ipv4_address", Attribute::string().computed())
            .attr("ipv4_address_private", Attribute::string().computed())
            .attr("ipv6_address", Attribute::string().computed()),
    )
}

/// Backup policy from the single-element `backup_policy` block
pub fn expand_backup_policy(items: &[Value]) -> Option<DropletBackupPolicy> {
    let block = fields::blocks(items).into_iter().next()?;
    let hour = block.get("hour").and_then(Value::as_int);
    Some(DropletBackupPolicy {
        plan: fields::string(block, "plan"),
        weekday: fields::string(block, "weekday"),
        hour,
    })
}

fn droplet_id(d: &ResourceData) -> Result<i64> {
    d.id()
        .parse()
        .map_err(|_| CloudError::msg(format!("invalid droplet id '{}'", d.id())))
}

fn strings(set: &docean_cloud::HashedSet) -> Vec<String> {
    set.iter().filter_map(|v| v.as_str().map(String::from)).collect()
}

/// Poll the droplet until its status reaches one of `target`
///
/// A droplet that 404s counts as archived, so deletes can wait on it.
pub async fn wait_for_status(
    ctx: &Context,
    meta: &Meta,
    id: i64,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
) -> Result<Droplet> {
    let archived_when_gone = target.contains(&STATUS_ARCHIVE);
    StateChangeConf::new(pending, target)
        .timeout(timeout)
        .wait_for_state(ctx, move || async move {
            match meta.droplets.get(id).await {
                Ok(droplet) => {
                    let status = droplet.status.clone();
                    Ok(Some((droplet, status)))
                }
                Err(e) if e.is_not_found() && archived_when_gone => {
                    Ok(Some((Droplet::default(), STATUS_ARCHIVE.to_string())))
                }
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
}

pub struct DropletResource {
    schema: Arc<Schema>,
}

impl DropletResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(droplet_schema()),
        }
    }

    async fn power_off(&self, ctx: &Context, meta: &Meta, id: i64, timeout: Duration) -> Result<()> {
        match ctx.run(meta.droplet_actions.power_off(id)).await? {
            Ok(action) => {
                wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
            }
            Err(e) if e.is_unprocessable() && e.message().contains("already powered off") => {
                tracing::debug!("droplet {} is already off", id);
            }
            Err(e) => return Err(e.into()),
        }
        wait_for_status(ctx, meta, id, &[STATUS_ACTIVE], &[STATUS_OFF], timeout).await?;
        Ok(())
    }

    async fn power_on(&self, ctx: &Context, meta: &Meta, id: i64, timeout: Duration) -> Result<()> {
        let action = ctx.run(meta.droplet_actions.power_on(id)).await??;
        wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
        wait_for_status(ctx, meta, id, &[STATUS_OFF], &[STATUS_ACTIVE], timeout).await?;
        Ok(())
    }

    /// Power off, resize, power on
    async fn resize(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta, id: i64) -> Result<()> {
        let timeout = d.timeout(Operation::Update);
        let size = d.get_string("size");
        let resize_disk = d.get_bool("resize_disk");
        tracing::info!("resizing droplet {} to {} (resize_disk={})", id, size, resize_disk);

        self.power_off(ctx, meta, id, timeout).await?;

        let resized = match ctx.run(meta.droplet_actions.resize(id, &size, resize_disk)).await? {
            Ok(action) => wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout)
                .await
                .map(|_| ()),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = resized {
            tracing::warn!("resizing droplet {} failed, powering it back on: {}", id, e);
            if let Err(power_err) = self.power_on(ctx, meta, id, timeout).await {
                tracing::warn!("powering on droplet {} failed: {}", id, power_err);
            }
            return Err(e);
        }

        self.power_on(ctx, meta, id, timeout).await?;
        d.set("size", size)?;
        d.set("resize_disk", resize_disk)?;
        Ok(())
    }

    async fn update_backups(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta, id: i64) -> Result<()> {
        let timeout = d.timeout(Operation::Update);
        let backups = d.get_bool("backups");
        let policy = expand_backup_policy(&d.get_list("backup_policy"));

        let action = if backups && d.has_change(&["backups"]) {
            tracing::info!("enabling backups on droplet {}", id);
            ctx.run(meta.droplet_actions.enable_backups(id, policy.as_ref())).await??
        } else if backups {
            let Some(policy) = policy.as_ref() else {
                return Ok(());
            };
            tracing::info!("changing backup policy of droplet {}", id);
            ctx.run(meta.droplet_actions.change_backup_policy(id, policy)).await??
        } else {
            tracing::info!("disabling backups on droplet {}", id);
            ctx.run(meta.droplet_actions.disable_backups(id)).await??
        };
        wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
        let policy_blocks = Value::List(d.get_list("backup_policy"));
        d.set("backups", backups)?;
        d.set("backup_policy", policy_blocks)?;
        Ok(())
    }

    /// Attach added volumes, then detach removed ones, one at a time
    async fn update_volumes(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta, id: i64) -> Result<()> {
        let timeout = d.timeout(Operation::Update);
        let (remove, add) = d.set_change("volume_ids")?;
        for volume in strings(&add) {
            tracing::info!("attaching volume {} to droplet {}", volume, id);
            let action = ctx.run(meta.storage_actions.attach(&volume, id)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
        }
        for volume in strings(&remove) {
            tracing::info!("detaching volume {} from droplet {}", volume, id);
            let action = ctx.run(meta.storage_actions.detach(&volume, id)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
        }
        let volumes = d.get("volume_ids");
        d.set("volume_ids", volumes)?;
        Ok(())
    }

    fn set_droplet(&self, d: &mut ResourceData, droplet: &Droplet) -> Result<()> {
        d.set("name", &droplet.name)?;
        if let Some(region) = &droplet.region {
            d.set("region", &region.slug)?;
        }
        let size = droplet
            .size
            .as_ref()
            .map(|s| s.slug.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&droplet.size_slug);
        d.set("size", size)?;

        // The reported image drifts: slugs move to newer builds and retired
        // images lose theirs. Only an empty value (import) is filled in.
        if let Some(image) = droplet.image.as_ref().filter(|_| d.get_string("image").is_empty()) {
            if image.slug.is_empty() {
                d.set("image", image.id.to_string())?;
            } else {
                d.set("image", &image.slug)?;
            }
        }

        d.set("disk", droplet.disk)?;
        d.set("vcpus", droplet.vcpus)?;
        d.set("memory", droplet.memory)?;
        d.set("price_hourly", droplet.price_hourly())?;
        d.set("price_monthly", droplet.price_monthly())?;
        d.set("status", &droplet.status)?;
        d.set("locked", droplet.locked)?;
        d.set("urn", droplet.urn())?;
        d.set("created_at", &droplet.created_at)?;
        d.set("ipv4_address", droplet.public_ipv4().unwrap_or_default())?;
        d.set("ipv4_address_private", droplet.private_ipv4().unwrap_or_default())?;
        d.set("ipv6_address", droplet.public_ipv6().unwrap_or_default().to_lowercase())?;
        d.set("ipv6", droplet.public_ipv6().is_some())?;
        // VPC droplets always carry a private address
        if d.get_if_set("private_networking").is_none() {
            d.set("private_networking", droplet.private_ipv4().is_some())?;
        }
        d.set("backups", droplet.has_feature("backups"))?;
        d.set("monitoring", droplet.has_feature("monitoring"))?;
        d.set("volume_ids", Value::string_list(droplet.volume_ids.iter().cloned()))?;
        d.set("tags", Value::string_list(droplet.tags.iter().cloned()))?;
        d.set("vpc_uuid", &droplet.vpc_uuid)?;
        Ok(())
    }
}

impl Default for DropletResource {
    fn default() -> Self {
        Self::new()
    }
}

fn create_request(d: &ResourceData) -> DropletCreateRequest {
    let mut req = DropletCreateRequest::new(
        d.get_string("name"),
        d.get_string("size"),
        DropletCreateImage::parse(&d.get_string("image")),
    );
    req.region = d.get_string("region");
    req.ssh_keys = d
        .get_string_list("ssh_keys")
        .iter()
        .map(|k| DropletCreateSshKey::parse(k))
        .collect();
    req.backups = d.get_bool("backups");
    req.backup_policy = expand_backup_policy(&d.get_list("backup_policy"));
    req.ipv6 = d.get_bool("ipv6");
    req.private_networking = d.get_bool("private_networking");
    req.monitoring = d.get_bool("monitoring");
    req.user_data = d.get_string("user_data");
    req.volumes = d.get_string_list("volume_ids");
    req.tags = d.get_string_list("tags");
    req.vpc_uuid = d.get_string("vpc_uuid");
    req.with_droplet_agent = d.get_if_set("droplet_agent").and_then(|v| v.as_bool());
    req
}

#[async_trait]
impl Resource<Meta> for DropletResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_droplet"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn customize_diff(&self, diff: &mut ResourceDiff, d: &ResourceData) -> Result<()> {
        if !d.get_bool("backups") && !d.get_list("backup_policy").is_empty() {
            return Err(CloudError::InvalidConfig(
                "backup_policy can only be set when backups are enabled".into(),
            ));
        }
        // IPv6 cannot be switched off on a running droplet
        let (old, new) = d.get_change("ipv6");
        if !diff.create && old.as_bool() == Some(true) && new.as_bool() == Some(false) {
            diff.force_new("ipv6")?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let req = create_request(d);
        let droplet = ctx.run(meta.droplets.create(&req)).await??;
        tracing::info!("created droplet {} ({})", droplet.name, droplet.id);
        d.set_id(droplet.id.to_string());

        wait_for_status(
            ctx,
            meta,
            droplet.id,
            &[STATUS_NEW],
            &[STATUS_ACTIVE],
            d.timeout(Operation::Create),
        )
        .await?;

        let project_id = d.get_string("project_id");
        project::assign_resources(ctx, meta, &project_id, &[droplet.urn()]).await?;

        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = droplet_id(d)?;
        let droplet = match ctx.run(meta.droplets.get(id)).await? {
            Ok(droplet) => droplet,
            Err(e) if e.is_not_found() => {
                tracing::warn!("droplet {} not found, removing from state", id);
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.set_droplet(d, &droplet)?;
        Ok(Diagnostics::new())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = droplet_id(d)?;
        let timeout = d.timeout(Operation::Update);
        let mut diags = Diagnostics::new();
        d.set_partial(true);

        if d.has_change(&["size"]) {
            self.resize(ctx, d, meta, id).await?;
        } else if d.has_change(&["resize_disk"]) {
            let resize_disk = d.get_bool("resize_disk");
            d.set("resize_disk", resize_disk)?;
        }

        if d.has_change(&["name"]) {
            let old = d.get_old("name").as_str().unwrap_or_default().to_string();
            let new = d.get_string("name");
            tracing::info!("renaming droplet {} from {} to {}", id, old, new);
            let action = ctx.run(meta.droplet_actions.rename(id, &new)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
            StateChangeConf::new(&[old.as_str()], &[new.as_str()])
                .timeout(timeout)
                .wait_for_state(ctx, move || async move {
                    let droplet = meta.droplets.get(id).await?;
                    let name = droplet.name.clone();
                    Ok(Some((droplet, name)))
                })
                .await?;
            d.set("name", new)?;
        }

        if d.has_change(&["backups", "backup_policy"]) {
            self.update_backups(ctx, d, meta, id).await?;
        }

        if d.has_change(&["ipv6"]) && d.get_bool("ipv6") {
            tracing::info!("enabling IPv6 on droplet {}", id);
            let action = ctx.run(meta.droplet_actions.enable_ipv6(id)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
            d.set("ipv6", true)?;
            diags.warning(
                "enabling IPv6 requires OS-level configuration",
                Some(
                    "The droplet received an IPv6 address; configure it inside the \
                     operating system before it can be used."
                        .into(),
                ),
            );
        }

        if d.has_change(&["tags"]) {
            sync_tags(ctx, meta, d, TaggedResource::droplet(id)).await?;
            let tags = d.get("tags");
            d.set("tags", tags)?;
        }

        if d.has_change(&["volume_ids"]) {
            self.update_volumes(ctx, d, meta, id).await?;
        }

        if d.has_change(&["project_id"]) {
            let project_id = d.get_string("project_id");
            tracing::info!("moving droplet {} to project {}", id, project_id);
            project::assign_resources(ctx, meta, &project_id, &[format!("do:droplet:{id}")]).await?;
            d.set("project_id", project_id)?;
        }

        if d.has_change(&["graceful_shutdown"]) {
            let graceful = d.get_bool("graceful_shutdown");
            d.set("graceful_shutdown", graceful)?;
        }

        d.set_partial(false);
        diags.extend(self.read(ctx, d, meta).await?);
        Ok(diags)
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = droplet_id(d)?;
        let timeout = d.timeout(Operation::Delete);

        if d.get_bool("graceful_shutdown") {
            tracing::info!("shutting down droplet {}", id);
            match ctx.run(meta.droplet_actions.shutdown(id)).await? {
                Ok(action) => {
                    wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
                    wait_for_status(ctx, meta, id, &[STATUS_ACTIVE], &[STATUS_OFF], timeout).await?;
                }
                Err(e) if e.is_unprocessable() && e.message().contains("already powered off") => {
                    tracing::debug!("droplet {} is already off", id);
                }
                Err(e) if e.is_not_found() => {
                    d.clear_id();
                    return Ok(Diagnostics::new());
                }
                Err(e) => return Err(e.into()),
            }
        }

        for volume in d.get_string_list("volume_ids") {
            tracing::info!("detaching volume {} from droplet {}", volume, id);
            match ctx.run(meta.storage_actions.detach(&volume, id)).await? {
                Ok(action) => {
                    wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        match ctx.run(meta.droplets.delete(id)).await? {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("droplet {} already deleted", id);
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        }

        wait_for_status(
            ctx,
            meta,
            id,
            &[STATUS_ACTIVE, STATUS_OFF, STATUS_NEW],
            &[STATUS_ARCHIVE],
            timeout,
        )
        .await?;
        tracing::info!("deleted droplet {}", id);
        d.clear_id();
        Ok(Diagnostics::new())
    }

    fn import_defaults(&self, d: &mut ResourceData) -> Result<()> {
        d.set("resize_disk", true)?;
        d.set("graceful_shutdown", false)?;
        Ok(())
    }
}
