//! CDN endpoints

use crate::certificate;
use crate::meta::Meta;
use async_trait::async_trait;
use docean_api::cdn::{Cdn, CdnCreateRequest, CdnUpdateCustomDomainRequest};
use docean_cloud::schema::ValidateFn;
use docean_cloud::{
    Attribute, AttributeMap, Block, CloudError, Context, Diagnostics, Resource, ResourceData,
    Result, Schema, Value,
};
use std::sync::Arc;

pub const DEFAULT_TTL: i64 = 3600;
const TTLS: &[i64] = &[60, 600, 3600, 86400, 604800];

fn ttl_in_allowed() -> ValidateFn {
    Arc::new(|v| match v {
        Value::Int(ttl) if TTLS.contains(ttl) => Ok(()),
        Value::Int(ttl) => Err(format!("ttl must be one of {TTLS:?}, got {ttl}")),
        other => Err(format!("expected int, got {}", other.kind())),
    })
}

fn cdn_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr("origin", Attribute::string().required().force_new())
            .attr(
                "ttl",
                Attribute::int().optional().computed().validate(ttl_in_allowed()),
            )
            .attr(
                "certificate_name",
                Attribute::string()
                    .optional()
                    .computed()
                    .conflicts_with(&["certificate_id"]),
            )
            .attr(
                "certificate_id",
                Attribute::string()
                    .optional()
                    .computed()
                    .deprecated("certificate_id is deprecated; use certificate_name instead"),
            )
            .attr("custom_domain", Attribute::string().optional())
            .attr("endpoint", Attribute::string().computed())
            .attr("created_at", Attribute::string().computed()),
    )
    .with_version(1)
}

/// Configured certificate name; `certificate_id` holds a name since
/// version 1
fn configured_certificate(d: &ResourceData) -> String {
    let name = d.get_string("certificate_name");
    if name.is_empty() {
        d.get_string("certificate_id")
    } else {
        name
    }
}

async fn resolve_certificate(ctx: &Context, meta: &Meta, d: &ResourceData) -> Result<String> {
    let name = configured_certificate(d);
    if name.is_empty() {
        return Ok(String::new());
    }
    certificate::id_for_name(ctx, meta, &name).await
}

pub struct CdnResource {
    schema: Arc<Schema>,
}

impl CdnResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(cdn_schema()),
        }
    }

    async fn set_cdn(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta, cdn: &Cdn) -> Result<()> {
        d.set("origin", &cdn.origin)?;
        d.set("endpoint", &cdn.endpoint)?;
        d.set("created_at", &cdn.created_at)?;
        d.set("ttl", cdn.ttl)?;
        d.set("custom_domain", &cdn.custom_domain)?;

        let name = if cdn.certificate_id.is_empty() {
            String::new()
        } else {
            match certificate::name_for_id(ctx, meta, &cdn.certificate_id).await {
                Ok(name) => name,
                Err(e) if e.is_not_found() => {
                    tracing::warn!("certificate {} of CDN {} not found", cdn.certificate_id, cdn.id);
                    String::new()
                }
                Err(e) => return Err(e),
            }
        };
        d.set("certificate_name", name.as_str())?;
        d.set("certificate_id", name)?;
        Ok(())
    }
}

impl Default for CdnResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for CdnResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_cdn"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let ttl = d.get_if_set("ttl").and_then(|v| v.as_int()).unwrap_or(DEFAULT_TTL);
        let req = CdnCreateRequest {
            origin: d.get_string("origin"),
            ttl: ttl as u32,
            custom_domain: d.get_string("custom_domain"),
            certificate_id: resolve_certificate(ctx, meta, d).await?,
        };
        let cdn = ctx.run(meta.cdn.create(&req)).await??;
        tracing::info!("created CDN endpoint {} for {}", cdn.id, cdn.origin);
        d.set_id(&cdn.id);
        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let cdn = match ctx.run(meta.cdn.get(d.id())).await? {
            Ok(cdn) => cdn,
            Err(e) if e.is_not_found() => {
                tracing::warn!("CDN endpoint {} not found, removing from state", d.id());
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.set_cdn(ctx, d, meta, &cdn).await?;
        Ok(Diagnostics::new())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        d.set_partial(true);

        if d.has_change(&["ttl"]) {
            let ttl = d.get_int("ttl");
            tracing::info!("updating TTL of CDN endpoint {} to {}", id, ttl);
            ctx.run(meta.cdn.update_ttl(&id, ttl as u32)).await??;
            d.set("ttl", ttl)?;
        }

        if d.has_change(&["certificate_name", "certificate_id", "custom_domain"]) {
            let req = CdnUpdateCustomDomainRequest {
                custom_domain: d.get_string("custom_domain"),
                certificate_id: resolve_certificate(ctx, meta, d).await?,
            };
            tracing::info!("updating custom domain of CDN endpoint {}", id);
            ctx.run(meta.cdn.update_custom_domain(&id, &req)).await??;
            let name = configured_certificate(d);
            d.set("custom_domain", req.custom_domain)?;
            d.set("certificate_name", name.as_str())?;
            d.set("certificate_id", name)?;
        }

        d.set_partial(false);
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        match ctx.run(meta.cdn.delete(d.id())).await? {
            Ok(()) => tracing::info!("deleted CDN endpoint {}", d.id()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(Diagnostics::new())
    }

    /// Replace the certificate id with the certificate name
    async fn upgrade_state(
        &self,
        ctx: &Context,
        from_version: u32,
        mut raw: AttributeMap,
        meta: &Meta,
    ) -> Result<AttributeMap> {
        if from_version != 0 {
            return Err(CloudError::StateUpgrade(format!(
                "digitalocean_cdn has no upgrader from version {from_version}"
            )));
        }
        let has_name = raw
            .get("certificate_name")
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.is_empty());
        let id = raw
            .get("certificate_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if has_name || id.is_empty() {
            return Ok(raw);
        }

        let name = match certificate::name_for_id(ctx, meta, &id).await {
            Ok(name) => name,
            Err(e) if e.is_not_found() => {
                tracing::warn!("certificate {} no longer exists, keeping its id", id);
                return Ok(raw);
            }
            Err(e) => return Err(e),
        };
        raw.insert("certificate_id".into(), name.clone().into());
        raw.insert("certificate_name".into(), name.into());
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docean_cloud::validate_config;
    use serde_json::json;

    #[test]
    fn test_ttl_validation() {
        let schema = cdn_schema();
        let ok = json!({"origin": "bucket.nyc3.digitaloceanspaces.com", "ttl": 600});
        assert!(validate_config(&schema.block, ok.as_object().unwrap()).is_ok());

        let bad = json!({"origin": "bucket.nyc3.digitaloceanspaces.com", "ttl": 30});
        let err = validate_config(&schema.block, bad.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("ttl must be one of"));
    }

    #[test]
    fn test_certificate_id_is_deprecated() {
        let schema = cdn_schema();
        let config = json!({"origin": "o", "certificate_id": "cert-a"});
        let warnings = validate_config(&schema.block, config.as_object().unwrap()).unwrap();
        assert_eq!(warnings.warnings().count(), 1);

        let both = json!({"origin": "o", "certificate_id": "a", "certificate_name": "a"});
        assert!(validate_config(&schema.block, both.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_configured_certificate_prefers_name() {
        let resource = CdnResource::new();
        let config = json!({"origin": "o", "certificate_name": "cert-b"});
        let d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        assert_eq!(configured_certificate(&d), "cert-b");

        let config = json!({"origin": "o", "certificate_id": "cert-a"});
        let d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        assert_eq!(configured_certificate(&d), "cert-a");
    }
}
