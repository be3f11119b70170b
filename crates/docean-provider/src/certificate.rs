//! TLS certificates
//!
//! Let's Encrypt certificates get a new id every time they are renewed, so
//! from schema version 1 on a certificate is identified by its name and the
//! current API id is kept in the computed `uuid` attribute. Other kinds
//! refer to certificates by name for the same reason.

use crate::meta::Meta;
use crate::pagination::collect_all;
use async_trait::async_trait;
use docean_api::certificates::{CERTIFICATE_TYPE_CUSTOM, CERTIFICATE_TYPE_LETS_ENCRYPT};
use docean_api::{Certificate, CertificateRequest};
use docean_cloud::hash::state_sha1;
use docean_cloud::schema::string_in;
use docean_cloud::value::STRING_SET;
use docean_cloud::{
    AttrType, Attribute, AttributeMap, Block, CloudError, Context, Diagnostics, Operation,
    Resource, ResourceData, ResourceDiff, Result, Schema, StateChangeConf, Value, retry,
    retry_on_precondition,
};
use std::sync::Arc;

pub const STATE_PENDING: &str = "pending";
pub const STATE_VERIFIED: &str = "verified";

const TYPES: &[&str] = &[CERTIFICATE_TYPE_CUSTOM, CERTIFICATE_TYPE_LETS_ENCRYPT];

fn certificate_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr("name", Attribute::string().required().force_new())
            .attr("uuid", Attribute::string().computed())
            .attr(
                "type",
                Attribute::string()
                    .optional()
                    .default(CERTIFICATE_TYPE_CUSTOM)
                    .force_new()
                    .validate(string_in(TYPES)),
            )
            .attr(
                "private_key",
                Attribute::string().optional().force_new().sensitive().state_func(state_sha1),
            )
            .attr(
                "leaf_certificate",
                Attribute::string().optional().force_new().state_func(state_sha1),
            )
            .attr(
                "certificate_chain",
                Attribute::string().optional().force_new().state_func(state_sha1),
            )
            .attr(
                "domains",
                Attribute::set(AttrType::String, STRING_SET)
                    .optional()
                    .computed()
                    .force_new(),
            )
            .attr("state", Attribute::string().computed())
            .attr("not_after", Attribute::string().computed())
            .attr("sha1_fingerprint", Attribute::string().computed())
            .attr("created_at", Attribute::string().computed()),
    )
    .with_version(1)
}

/// Certificate with the given name, if any
pub async fn find_by_name(ctx: &Context, meta: &Meta, name: &str) -> Result<Option<Certificate>> {
    let certificates = collect_all(ctx, move |opt| meta.certificates.list(opt)).await?;
    Ok(certificates.into_iter().find(|c| c.name == name))
}

/// Current id of the certificate with the given name
pub async fn id_for_name(ctx: &Context, meta: &Meta, name: &str) -> Result<String> {
    find_by_name(ctx, meta, name)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| CloudError::msg(format!("certificate '{name}' not found")))
}

/// Name of the certificate with the given id
pub async fn name_for_id(ctx: &Context, meta: &Meta, id: &str) -> Result<String> {
    let certificate = ctx.run(meta.certificates.get(id)).await??;
    Ok(certificate.name)
}

fn check_type_fields(d: &ResourceData) -> Result<()> {
    let kind = d.get_string("type");
    let mut missing = Vec::new();
    if kind == CERTIFICATE_TYPE_CUSTOM {
        for name in ["private_key", "leaf_certificate"] {
            if d.get_string(name).is_empty() {
                missing.push(format!("'{name}' is required for custom certificates"));
            }
        }
    } else if kind == CERTIFICATE_TYPE_LETS_ENCRYPT && d.get_list("domains").is_empty() {
        missing.push("'domains' is required for Let's Encrypt certificates".to_string());
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CloudError::Validation(missing))
    }
}

fn create_request(d: &ResourceData) -> CertificateRequest {
    CertificateRequest {
        name: d.get_string("name"),
        certificate_type: d.get_string("type"),
        dns_names: d.get_string_list("domains"),
        private_key: d.get_string("private_key"),
        leaf_certificate: d.get_string("leaf_certificate"),
        certificate_chain: d.get_string("certificate_chain"),
    }
}

pub struct CertificateResource {
    schema: Arc<Schema>,
}

impl CertificateResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(certificate_schema()),
        }
    }
}

impl Default for CertificateResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for CertificateResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_certificate"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn customize_diff(&self, diff: &mut ResourceDiff, d: &ResourceData) -> Result<()> {
        if diff.create {
            check_type_fields(d)?;
        }
        Ok(())
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        check_type_fields(d)?;
        let req = create_request(d);
        let certificate = ctx.run(meta.certificates.create(&req)).await??;
        tracing::info!("created certificate {} ({})", certificate.name, certificate.id);
        d.set_id(&certificate.name);
        d.set("uuid", &certificate.id)?;

        let uuid = certificate.id.clone();
        let uuid = uuid.as_str();
        StateChangeConf::new(&[STATE_PENDING], &[STATE_VERIFIED])
            .timeout(d.timeout(Operation::Create))
            .wait_for_state(ctx, move || async move {
                match meta.certificates.get(uuid).await {
                    Ok(certificate) => {
                        let state = certificate.state.clone();
                        Ok(Some((certificate, state)))
                    }
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let name = d.id().to_string();
        let Some(certificate) = find_by_name(ctx, meta, &name).await? else {
            tracing::warn!("certificate {} not found, removing from state", name);
            d.clear_id();
            return Ok(Diagnostics::new());
        };
        d.set("name", &certificate.name)?;
        d.set("uuid", &certificate.id)?;
        d.set("type", &certificate.certificate_type)?;
        d.set("state", &certificate.state)?;
        d.set("not_after", &certificate.not_after)?;
        d.set("sha1_fingerprint", &certificate.sha1_fingerprint)?;
        d.set("created_at", &certificate.created_at)?;
        d.set("domains", Value::string_list(certificate.dns_names.iter().cloned()))?;
        Ok(Diagnostics::new())
    }

    /// Every argument forces replacement
    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        self.read(ctx, d, meta).await
    }

    /// Retried while a load balancer or CDN endpoint still uses the
    /// certificate
    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let mut uuid = d.get_string("uuid");
        if uuid.is_empty() {
            match find_by_name(ctx, meta, d.id()).await? {
                Some(certificate) => uuid = certificate.id,
                None => {
                    d.clear_id();
                    return Ok(Diagnostics::new());
                }
            }
        }

        let uuid = uuid.as_str();
        retry(ctx, d.timeout(Operation::Delete), move || async move {
            match meta.certificates.delete(uuid).await {
                Ok(()) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(retry_on_precondition(e, "in use")),
            }
        })
        .await?;
        tracing::info!("deleted certificate {}", d.id());
        d.clear_id();
        Ok(Diagnostics::new())
    }

    async fn upgrade_state(
        &self,
        _ctx: &Context,
        from_version: u32,
        mut raw: AttributeMap,
        _meta: &Meta,
    ) -> Result<AttributeMap> {
        if from_version != 0 {
            return Err(CloudError::StateUpgrade(format!(
                "digitalocean_certificate has no upgrader from version {from_version}"
            )));
        }
        upgrade_v0(&mut raw);
        Ok(raw)
    }
}

/// Key the state by name; the former id becomes `uuid`
fn upgrade_v0(raw: &mut AttributeMap) {
    if !raw.contains_key("uuid") {
        if let Some(id) = raw.get("id").cloned() {
            raw.insert("uuid".to_string(), id);
        }
    }
    if let Some(name) = raw.get("name").cloned() {
        raw.insert("id".to_string(), name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upgrade_v0_is_idempotent() {
        let mut raw = json!({"name": "cert-a", "id": "aaa-bbb-123-ccc"})
            .as_object()
            .cloned()
            .unwrap();
        upgrade_v0(&mut raw);
        let once = raw.clone();
        upgrade_v0(&mut raw);

        assert_eq!(raw, once);
        assert_eq!(raw["id"], json!("cert-a"));
        assert_eq!(raw["uuid"], json!("aaa-bbb-123-ccc"));
    }

    #[test]
    fn test_type_fields_are_checked() {
        let resource = CertificateResource::new();
        let config = json!({"name": "c", "type": "lets_encrypt"});
        let d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        let err = check_type_fields(&d).unwrap_err();
        assert!(err.to_string().contains("domains"));

        let config = json!({"name": "c", "private_key": "KEY"});
        let d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        let err = check_type_fields(&d).unwrap_err();
        assert!(err.to_string().contains("leaf_certificate"));
        assert!(!err.to_string().contains("private_key"));
    }

    #[test]
    fn test_pem_bodies_are_hashed_in_state() {
        let resource = CertificateResource::new();
        let config = json!({"name": "c", "private_key": "KEY", "leaf_certificate": "LEAF"});
        let mut d = ResourceData::planned(resource.schema(), None, config.as_object().unwrap());
        d.set_id("c");
        let state = d.state().unwrap();
        assert_eq!(
            state.attributes["private_key"],
            json!(docean_cloud::hash::sha1_hex("KEY"))
        );
        assert_eq!(state.schema_version, 1);
    }
}
