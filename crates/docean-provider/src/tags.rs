//! Tag membership updates shared by taggable resource kinds

use crate::meta::Meta;
use docean_api::TaggedResource;
use docean_cloud::{Attribute, AttrType, Context, ResourceData, Result};
use docean_cloud::value::SetHasher;
use docean_cloud::hash::hash_lowercase_value;

/// Tags compare case-insensitively on the cloud side
pub const TAG_SET: SetHasher = SetHasher::new("tag", hash_lowercase_value);

pub fn tags_attribute() -> Attribute {
    Attribute::set(AttrType::String, TAG_SET).optional()
}

/// Apply the planned change of the `tags` attribute to `resource`
///
/// Tags new to the set are created first, since tagging with an unknown
/// tag fails.
pub async fn sync_tags(ctx: &Context, meta: &Meta, d: &ResourceData, resource: TaggedResource) -> Result<()> {
    if !d.has_change(&["tags"]) {
        return Ok(());
    }
    let (remove, add) = d.set_change("tags")?;
    let targets = [resource];

    for tag in remove.iter().filter_map(|v| v.as_str()) {
        tracing::info!("removing tag {} from {}", tag, targets[0].resource_id);
        match ctx.run(meta.tags.untag_resources(tag, &targets)).await? {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
    }

    for tag in add.iter().filter_map(|v| v.as_str()) {
        match ctx.run(meta.tags.create(tag)).await? {
            Ok(()) => {}
            Err(e) if e.is_unprocessable() => {
                tracing::debug!("tag {} already exists", tag);
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!("adding tag {} to {}", tag, targets[0].resource_id);
        ctx.run(meta.tags.tag_resources(tag, &targets)).await??;
    }
    Ok(())
}
