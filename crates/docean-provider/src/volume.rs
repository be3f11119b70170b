//! Block storage volumes

use crate::meta::Meta;
use crate::tags::{sync_tags, tags_attribute};
use async_trait::async_trait;
use docean_api::{TaggedResource, Volume, VolumeCreateRequest};
use docean_cloud::hash::state_lowercase;
use docean_cloud::schema::{int_between, lowercase_slug, string_in};
use docean_cloud::value::INT_SET;
use docean_cloud::{
    AttrType, Attribute, Block, CloudError, Context, Diagnostics, Operation, Resource,
    ResourceData, ResourceDiff, Result, Schema, Value, wait_for_action,
};
use std::sync::Arc;

const FILESYSTEM_TYPES: &[&str] = &["ext4", "xfs"];

fn volume_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr(
                "region",
                Attribute::string().required().force_new().state_func(state_lowercase),
            )
            .attr(
                "name",
                Attribute::string().required().force_new().validate(lowercase_slug()),
            )
            .attr("size", Attribute::int().required().validate(int_between(1, 16 * 1024)))
            .attr("description", Attribute::string().optional().force_new())
            .attr("snapshot_id", Attribute::string().optional().force_new())
            .attr(
                "initial_filesystem_type",
                Attribute::string()
                    .optional()
                    .force_new()
                    .validate(string_in(FILESYSTEM_TYPES)),
            )
            .attr("initial_filesystem_label", Attribute::string().optional().force_new())
            .attr("droplet_ids", Attribute::set(AttrType::Int, INT_SET).computed())
            .attr("filesystem_type", Attribute::string().computed())
            .attr("filesystem_label", Attribute::string().computed())
            .attr("urn", Attribute::string().computed())
            .attr("tags", tags_attribute()),
    )
}

fn create_request(d: &ResourceData) -> VolumeCreateRequest {
    VolumeCreateRequest {
        name: d.get_string("name"),
        region: d.get_string("region").to_lowercase(),
        size_gigabytes: d.get_int("size"),
        description: d.get_string("description"),
        snapshot_id: d.get_string("snapshot_id"),
        filesystem_type: d.get_string("initial_filesystem_type"),
        filesystem_label: d.get_string("initial_filesystem_label"),
        tags: d.get_string_list("tags"),
    }
}

pub struct VolumeResource {
    schema: Arc<Schema>,
}

impl VolumeResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(volume_schema()),
        }
    }

    fn set_volume(&self, d: &mut ResourceData, volume: &Volume) -> Result<()> {
        d.set("name", &volume.name)?;
        d.set("region", volume.region_slug())?;
        d.set("size", volume.size_gigabytes)?;
        d.set("description", &volume.description)?;
        d.set("filesystem_type", &volume.filesystem_type)?;
        d.set("filesystem_label", &volume.filesystem_label)?;
        d.set("urn", volume.urn())?;
        d.set(
            "droplet_ids",
            Value::List(volume.droplet_ids.iter().map(|id| Value::Int(*id)).collect()),
        )?;
        d.set("tags", Value::string_list(volume.tags.iter().cloned()))?;
        Ok(())
    }
}

impl Default for VolumeResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for VolumeResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_volume"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    /// Volumes only grow; a smaller size needs a new volume
    fn customize_diff(&self, diff: &mut ResourceDiff, d: &ResourceData) -> Result<()> {
        let (old, new) = d.get_change("size");
        let (old, new) = (old.as_int().unwrap_or_default(), new.as_int().unwrap_or_default());
        if !diff.create && new < old {
            diff.force_new("size")?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let req = create_request(d);
        let volume = ctx.run(meta.volumes.create(&req)).await??;
        tracing::info!("created volume {} ({})", volume.name, volume.id);
        d.set_id(&volume.id);
        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let volume = match ctx.run(meta.volumes.get(d.id())).await? {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                tracing::warn!("volume {} not found, removing from state", d.id());
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.set_volume(d, &volume)?;
        Ok(Diagnostics::new())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        d.set_partial(true);

        if d.has_change(&["size"]) {
            let size = d.get_int("size");
            if size < d.get_old("size").as_int().unwrap_or_default() {
                return Err(CloudError::InvalidConfig(format!(
                    "volume {id} cannot shrink to {size} GiB"
                )));
            }
            tracing::info!("resizing volume {} to {} GiB", id, size);
            let region = d.get_string("region");
            let action = ctx.run(meta.storage_actions.resize(&id, size, &region)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, d.timeout(Operation::Update)).await?;
            d.set("size", size)?;
        }

        if d.has_change(&["tags"]) {
            sync_tags(ctx, meta, d, TaggedResource::volume(&id)).await?;
            let tags = d.get("tags");
            d.set("tags", tags)?;
        }

        d.set_partial(false);
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        let timeout = d.timeout(Operation::Delete);

        let volume = match ctx.run(meta.volumes.get(&id)).await? {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        for droplet_id in &volume.droplet_ids {
            tracing::info!("detaching volume {} from droplet {}", id, droplet_id);
            let action = ctx.run(meta.storage_actions.detach(&id, *droplet_id)).await??;
            wait_for_action(ctx, meta.actions.as_ref(), action.id, timeout).await?;
        }

        match ctx.run(meta.volumes.delete(&id)).await? {
            Ok(()) => tracing::info!("deleted volume {}", id),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(Diagnostics::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docean_cloud::InstanceState;
    use docean_cloud::plan::ChangeAction;

    fn plan(size: i64) -> ResourceDiff {
        let resource = VolumeResource::new();
        let prior = InstanceState::new("vol-1", 0)
            .with_attribute("region", "nyc1".into())
            .with_attribute("name", "data".into())
            .with_attribute("size", 100.into());
        let config = serde_json::json!({"region": "NYC1", "name": "data", "size": size});
        let d = ResourceData::planned(resource.schema(), Some(&prior), config.as_object().unwrap());
        let mut diff = ResourceDiff::compute(resource.type_name(), &d);
        resource.customize_diff(&mut diff, &d).unwrap();
        diff
    }

    #[test]
    fn test_volume_only_grows_in_place() {
        assert_eq!(plan(100).action(), ChangeAction::NoOp);
        assert_eq!(plan(200).action(), ChangeAction::Update);
        assert_eq!(plan(50).action(), ChangeAction::Replace);
    }

    #[test]
    fn test_create_request() {
        let resource = VolumeResource::new();
        let config = serde_json::json!({
            "region": "NYC1", "name": "data", "size": 10, "initial_filesystem_type": "ext4"
        });
        let d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        let req = create_request(&d);
        assert_eq!(req.region, "nyc1");
        assert_eq!(req.filesystem_type, "ext4");
        assert_eq!(req.size_gigabytes, 10);
    }
}
