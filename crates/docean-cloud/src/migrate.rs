//! Schema-versioned state upgrades

use crate::context::Context;
use crate::error::{CloudError, Result};
use crate::resource::Resource;
use crate::state::{AttributeMap, InstanceState};

/// Upgrade a raw attribute map from `stored_version` to the resource's
/// current schema version, one version at a time
pub async fn upgrade_state<M: Sync>(
    resource: &dyn Resource<M>,
    ctx: &Context,
    meta: &M,
    stored_version: u32,
    mut raw: AttributeMap,
) -> Result<AttributeMap> {
    let current = resource.schema().version;
    if stored_version > current {
        return Err(CloudError::StateUpgrade(format!(
            "{} state version {} is newer than supported version {}",
            resource.type_name(),
            stored_version,
            current
        )));
    }
    for version in stored_version..current {
        tracing::info!(
            "upgrading {} state from version {} to {}",
            resource.type_name(),
            version,
            version + 1
        );
        raw = resource.upgrade_state(ctx, version, raw, meta).await?;
    }
    Ok(raw)
}

/// Upgrade a persisted instance; the id travels through the raw map as `id`
pub async fn upgrade_instance<M: Sync>(
    resource: &dyn Resource<M>,
    ctx: &Context,
    meta: &M,
    state: InstanceState,
) -> Result<InstanceState> {
    let current = resource.schema().version;
    if state.schema_version == current {
        return Ok(state);
    }

    let mut raw = state.attributes;
    raw.insert("id".to_string(), serde_json::Value::String(state.id.clone()));
    let mut raw = upgrade_state(resource, ctx, meta, state.schema_version, raw).await?;

    let id = match raw.remove("id") {
        Some(serde_json::Value::String(id)) => id,
        _ => state.id,
    };
    Ok(InstanceState {
        id,
        schema_version: current,
        attributes: raw,
        timeouts: state.timeouts,
    })
}
