//! Load balancers
//!
//! The whole load balancer configuration travels in every create and
//! update request. Certificates are referenced by name in configuration and
//! resolved to their current id just before the request is sent, so a
//! renewed Let's Encrypt certificate does not show up as drift.

use crate::certificate;
use crate::fields::{self, Fields, Record};
use crate::meta::Meta;
use crate::pagination::collect_all;
use async_trait::async_trait;
use docean_api::load_balancers::{
    CdnSettings, ForwardingRule, GlbSettings, HealthCheck, LbDomain, LbFirewall, StickySessions,
};
use docean_api::{LoadBalancer, LoadBalancerRequest};
use docean_cloud::hash::{hash_fields, hash_string, state_lowercase};
use docean_cloud::schema::{int_between, string_in, suppress_case};
use docean_cloud::value::{INT_SET, SetHasher};
use docean_cloud::{
    AttrType, Attribute, AttributeMap, Block, CloudError, Context, Diagnostics, Operation,
    Resource, ResourceData, Result, Schema, StateChangeConf, Value,
};
use futures_util::future::try_join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub const STATUS_NEW: &str = "new";
pub const STATUS_ACTIVE: &str = "active";

const PROTOCOLS: &[&str] = &["http", "https", "http2", "http3", "tcp", "udp"];
const HEALTHCHECK_PROTOCOLS: &[&str] = &["http", "https", "tcp"];
const ALGORITHMS: &[&str] = &["round_robin", "least_connections"];
const STICKY_TYPES: &[&str] = &["none", "cookies"];
const NETWORKS: &[&str] = &["EXTERNAL", "INTERNAL"];
const TYPES: &[&str] = &["REGIONAL", "REGIONAL_NETWORK", "GLOBAL"];

/// Certificate key of a rule; `certificate_id` holds a name since schema
/// version 1 and the name fills in when it is empty
fn rule_certificate(rule: &Fields) -> String {
    let id = fields::string(rule, "certificate_id");
    if id.is_empty() {
        fields::string(rule, "certificate_name")
    } else {
        id
    }
}

fn hash_forwarding_rule(v: &Value) -> u32 {
    let Some(rule) = v.as_map() else {
        return hash_string(&v.canonical());
    };
    hash_fields([
        fields::int(rule, "entry_port").to_string(),
        fields::string(rule, "entry_protocol").to_lowercase(),
        fields::int(rule, "target_port").to_string(),
        fields::string(rule, "target_protocol").to_lowercase(),
        rule_certificate(rule),
        fields::boolean(rule, "tls_passthrough").to_string(),
    ])
}

fn hash_domain(v: &Value) -> u32 {
    match v.as_map() {
        Some(domain) => hash_string(&fields::string(domain, "name").to_lowercase()),
        None => hash_string(&v.canonical()),
    }
}

pub const FORWARDING_RULE_SET: SetHasher =
    SetHasher::new("forwarding_rule", hash_forwarding_rule);
pub const DOMAIN_SET: SetHasher = SetHasher::new("lb_domain", hash_domain);

fn forwarding_rule_block() -> Block {
    Block::new()
        .attr("entry_protocol", Attribute::string().required().validate(string_in(PROTOCOLS)))
        .attr("entry_port", Attribute::int().required().validate(int_between(1, 65535)))
        .attr("target_protocol", Attribute::string().required().validate(string_in(PROTOCOLS)))
        .attr("target_port", Attribute::int().required().validate(int_between(1, 65535)))
        .attr("certificate_name", Attribute::string().optional().computed())
        .attr(
            "certificate_id",
            Attribute::string()
                .optional()
                .computed()
                .deprecated("certificate_id is deprecated; use certificate_name instead"),
        )
        .attr("tls_passthrough", Attribute::bool().optional().default(false))
}

fn healthcheck_block() -> Block {
    Block::new()
        .attr(
            "protocol",
            Attribute::string().required().validate(string_in(HEALTHCHECK_PROTOCOLS)),
        )
        .attr("port", Attribute::int().required().validate(int_between(1, 65535)))
        .attr("path", Attribute::string().optional())
        .attr(
            "check_interval_seconds",
            Attribute::int().optional().default(10).validate(int_between(3, 300)),
        )
        .attr(
            "response_timeout_seconds",
            Attribute::int().optional().default(5).validate(int_between(3, 300)),
        )
        .attr(
            "healthy_threshold",
            Attribute::int().optional().default(5).validate(int_between(2, 10)),
        )
        .attr(
            "unhealthy_threshold",
            Attribute::int().optional().default(3).validate(int_between(2, 10)),
        )
}

fn sticky_sessions_block() -> Block {
    Block::new()
        .attr(
            "type",
            Attribute::string().optional().default("none").validate(string_in(STICKY_TYPES)),
        )
        .attr("cookie_name", Attribute::string().optional())
        .attr("cookie_ttl_seconds", Attribute::int().optional())
}

fn firewall_block() -> Block {
    Block::new()
        .attr("allow", Attribute::list(AttrType::String).optional())
        .attr("deny", Attribute::list(AttrType::String).optional())
}

fn domain_block() -> Block {
    Block::new()
        .attr("name", Attribute::string().required())
        .attr("is_managed", Attribute::bool().optional().default(false))
        .attr("certificate_name", Attribute::string().optional())
        .attr("status", Attribute::string().computed())
}

fn glb_settings_block() -> Block {
    let cdn = Block::new().attr("is_enabled", Attribute::bool().optional().default(false));
    Block::new()
        .attr("target_protocol", Attribute::string().required().validate(string_in(PROTOCOLS)))
        .attr("target_port", Attribute::int().required().validate(int_between(1, 65535)))
        .attr("cdn", Attribute::block_list(cdn).optional().max_items(1))
}

fn load_balancer_schema() -> Schema {
    Schema::new(
        Block::new()
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
            .attr("size", Attribute::string().optional().computed())
            .attr("size_unit", Attribute::int().optional().computed().validate(int_between(1, 200)))
            .attr(
                "type",
                Attribute::string().optional().computed().force_new().validate(string_in(TYPES)),
            )
            .attr(
                "algorithm",
                Attribute::string()
                    .optional()
                    .default("round_robin")
                    .validate(string_in(ALGORITHMS))
                    .deprecated("algorithm is no longer honoured by the cloud"),
            )
            .attr(
                "forwarding_rule",
                Attribute::block_set(forwarding_rule_block(), FORWARDING_RULE_SET).optional(),
            )
            .attr(
                "healthcheck",
                Attribute::block_list(healthcheck_block()).optional().computed().max_items(1),
            )
            .attr(
                "sticky_sessions",
                Attribute::block_list(sticky_sessions_block())
                    .optional()
                    .computed()
                    .max_items(1),
            )
            .attr(
                "droplet_ids",
                Attribute::set(AttrType::Int, INT_SET)
                    .optional()
                    .computed()
                    .conflicts_with(&["droplet_tag"]),
            )
            .attr("droplet_tag", Attribute::string().optional())
            .attr("redirect_http_to_https", Attribute::bool().optional().default(false))
            .attr("enable_proxy_protocol", Attribute::bool().optional().default(false))
            .attr("enable_backend_keepalive", Attribute::bool().optional().default(false))
            .attr(
                "http_idle_timeout_seconds",
                Attribute::int().optional().computed().validate(int_between(30, 600)),
            )
            .attr("vpc_uuid", Attribute::string().optional().computed().force_new())
            .attr("project_id", Attribute::string().optional().computed())
            .attr(
                "disable_lets_encrypt_dns_records",
                Attribute::bool().optional().default(false),
            )
            .attr(
                "firewall",
                Attribute::block_list(firewall_block()).optional().max_items(1),
            )
            .attr("domain", Attribute::block_set(domain_block(), DOMAIN_SET).optional())
            .attr(
                "glb_settings",
                Attribute::block_list(glb_settings_block()).optional().max_items(1),
            )
            .attr(
                "network",
                Attribute::string().optional().computed().force_new().validate(string_in(NETWORKS)),
            )
            .attr("ip", Attribute::string().computed())
            .attr("status", Attribute::string().computed())
            .attr("urn", Attribute::string().computed())
            .attr("created_at", Attribute::string().computed()),
    )
    .with_version(1)
}

// ============ Certificates ============

/// Certificate names referenced by rules and domains
fn referenced_certificates(d: &ResourceData) -> BTreeSet<String> {
    let rules = d.get_list("forwarding_rule");
    let domains = d.get_list("domain");
    let mut names: BTreeSet<String> = fields::blocks(&rules).into_iter().map(rule_certificate).collect();
    names.extend(
        fields::blocks(&domains)
            .into_iter()
            .map(|domain| fields::string(domain, "certificate_name")),
    );
    names.remove("");
    names
}

/// Current ids of the named certificates; one listing covers every name
async fn certificate_ids(ctx: &Context, meta: &Meta, names: &BTreeSet<String>) -> Result<HashMap<String, String>> {
    if names.is_empty() {
        return Ok(HashMap::new());
    }
    let certificates = collect_all(ctx, move |opt| meta.certificates.list(opt)).await?;
    Ok(certificates
        .into_iter()
        .filter(|c| names.contains(&c.name))
        .map(|c| (c.name, c.id))
        .collect())
}

/// Names of the certificates with the given ids, looked up concurrently
///
/// A certificate that no longer exists maps to an empty name.
async fn certificate_names(ctx: &Context, meta: &Meta, ids: BTreeSet<String>) -> Result<HashMap<String, String>> {
    let lookups = ids.into_iter().map(move |id| async move {
        match certificate::name_for_id(ctx, meta, &id).await {
            Ok(name) => Ok((id, name)),
            Err(e) if e.is_not_found() => {
                tracing::warn!("certificate {} referenced by a load balancer no longer exists", id);
                Ok((id, String::new()))
            }
            Err(e) => Err(e),
        }
    });
    Ok(try_join_all(lookups).await?.into_iter().collect())
}

// ============ Expand ============

/// Certificate id for a configured reference
///
/// A name wins; a bare `certificate_id` that matches no certificate name
/// is sent as written.
fn resolve_rule_certificate(rule: &Fields, ids: &HashMap<String, String>) -> Result<String> {
    let name = fields::string(rule, "certificate_name");
    if !name.is_empty() {
        return ids
            .get(&name)
            .cloned()
            .ok_or_else(|| CloudError::msg(format!("certificate '{name}' not found")));
    }
    let legacy = fields::string(rule, "certificate_id");
    Ok(ids.get(&legacy).cloned().unwrap_or(legacy))
}

pub fn expand_forwarding_rules(items: &[Value], ids: &HashMap<String, String>) -> Result<Vec<ForwardingRule>> {
    fields::blocks(items)
        .into_iter()
        .map(|rule| -> Result<ForwardingRule> {
            Ok(ForwardingRule {
                entry_protocol: fields::string(rule, "entry_protocol"),
                entry_port: fields::int(rule, "entry_port"),
                target_protocol: fields::string(rule, "target_protocol"),
                target_port: fields::int(rule, "target_port"),
                certificate_id: resolve_rule_certificate(rule, ids)?,
                tls_passthrough: fields::boolean(rule, "tls_passthrough"),
            })
        })
        .collect()
}

pub fn expand_health_check(items: &[Value]) -> Option<HealthCheck> {
    let block = fields::blocks(items).into_iter().next()?;
    Some(HealthCheck {
        protocol: fields::string(block, "protocol"),
        port: fields::int(block, "port"),
        path: fields::string(block, "path"),
        check_interval_seconds: fields::int(block, "check_interval_seconds"),
        response_timeout_seconds: fields::int(block, "response_timeout_seconds"),
        healthy_threshold: fields::int(block, "healthy_threshold"),
        unhealthy_threshold: fields::int(block, "unhealthy_threshold"),
    })
}

pub fn expand_sticky_sessions(items: &[Value]) -> Option<StickySessions> {
    let block = fields::blocks(items).into_iter().next()?;
    Some(StickySessions {
        session_type: fields::string(block, "type"),
        cookie_name: fields::string(block, "cookie_name"),
        cookie_ttl_seconds: fields::int(block, "cookie_ttl_seconds"),
    })
}

fn expand_firewall(items: &[Value]) -> Option<LbFirewall> {
    let block = fields::blocks(items).into_iter().next()?;
    Some(LbFirewall {
        allow: fields::strings(block, "allow"),
        deny: fields::strings(block, "deny"),
    })
}

fn expand_domains(items: &[Value], ids: &HashMap<String, String>) -> Result<Vec<LbDomain>> {
    fields::blocks(items)
        .into_iter()
        .map(|domain| -> Result<LbDomain> {
            let name = fields::string(domain, "certificate_name");
            let certificate_id = if name.is_empty() {
                String::new()
            } else {
                ids.get(&name)
                    .cloned()
                    .ok_or_else(|| CloudError::msg(format!("certificate '{name}' not found")))?
            };
            Ok(LbDomain {
                name: fields::string(domain, "name"),
                is_managed: fields::boolean(domain, "is_managed"),
                certificate_id,
                status: String::new(),
            })
        })
        .collect()
}

fn expand_glb_settings(items: &[Value]) -> Option<GlbSettings> {
    let block = fields::blocks(items).into_iter().next()?;
    let cdn = fields::first(block, "cdn").map(|cdn| CdnSettings {
        is_enabled: fields::boolean(cdn, "is_enabled"),
    });
    Some(GlbSettings {
        target_protocol: fields::string(block, "target_protocol"),
        target_port: fields::int(block, "target_port"),
        cdn,
    })
}

/// Request carrying the full configured load balancer
fn build_request(d: &ResourceData, ids: &HashMap<String, String>) -> Result<LoadBalancerRequest> {
    Ok(LoadBalancerRequest {
        name: d.get_string("name"),
        algorithm: d.get_string("algorithm"),
        region: d.get_string("region").to_lowercase(),
        size_slug: d.get_string("size"),
        size_unit: d.get_int("size_unit"),
        lb_type: d.get_string("type"),
        forwarding_rules: expand_forwarding_rules(&d.get_list("forwarding_rule"), ids)?,
        health_check: expand_health_check(&d.get_list("healthcheck")),
        sticky_sessions: expand_sticky_sessions(&d.get_list("sticky_sessions")),
        droplet_ids: d.get_list("droplet_ids").iter().filter_map(Value::as_int).collect(),
        tag: d.get_string("droplet_tag"),
        redirect_http_to_https: d.get_bool("redirect_http_to_https"),
        enable_proxy_protocol: d.get_bool("enable_proxy_protocol"),
        enable_backend_keepalive: d.get_bool("enable_backend_keepalive"),
        http_idle_timeout_seconds: d
            .get_if_set("http_idle_timeout_seconds")
            .and_then(|v| v.as_int())
            .and_then(|secs| u64::try_from(secs).ok()),
        vpc_uuid: d.get_string("vpc_uuid"),
        project_id: d.get_string("project_id"),
        disable_lets_encrypt_dns_records: d
            .get_if_set("disable_lets_encrypt_dns_records")
            .and_then(|v| v.as_bool()),
        firewall: expand_firewall(&d.get_list("firewall")),
        domains: expand_domains(&d.get_list("domain"), ids)?,
        glb_settings: expand_glb_settings(&d.get_list("glb_settings")),
        network: d.get_string("network"),
    })
}

async fn expand_request(ctx: &Context, meta: &Meta, d: &ResourceData) -> Result<LoadBalancerRequest> {
    let ids = certificate_ids(ctx, meta, &referenced_certificates(d)).await?;
    build_request(d, &ids)
}

// ============ Flatten ============

pub fn flatten_forwarding_rules(rules: &[ForwardingRule], names: &HashMap<String, String>) -> Vec<Value> {
    rules
        .iter()
        .map(|rule| {
            let name = names.get(&rule.certificate_id).cloned().unwrap_or_default();
            Record::new()
                .set("entry_protocol", rule.entry_protocol.as_str())
                .set("entry_port", rule.entry_port)
                .set("target_protocol", rule.target_protocol.as_str())
                .set("target_port", rule.target_port)
                .opt("certificate_name", name.as_str())
                .opt("certificate_id", name)
                .set("tls_passthrough", rule.tls_passthrough)
                .into_value()
        })
        .collect()
}

fn flatten_health_check(check: &HealthCheck) -> Record {
    Record::new()
        .set("protocol", check.protocol.as_str())
        .set("port", check.port)
        .opt("path", check.path.as_str())
        .set("check_interval_seconds", check.check_interval_seconds)
        .set("response_timeout_seconds", check.response_timeout_seconds)
        .set("healthy_threshold", check.healthy_threshold)
        .set("unhealthy_threshold", check.unhealthy_threshold)
}

fn flatten_sticky_sessions(sticky: &StickySessions) -> Record {
    Record::new()
        .set("type", sticky.session_type.as_str())
        .opt("cookie_name", sticky.cookie_name.as_str())
        .opt("cookie_ttl_seconds", sticky.cookie_ttl_seconds)
}

fn flatten_firewall(firewall: &LbFirewall) -> Record {
    Record::new()
        .strings("allow", &firewall.allow)
        .strings("deny", &firewall.deny)
}

fn flatten_domains(domains: &[LbDomain], names: &HashMap<String, String>) -> Vec<Value> {
    domains
        .iter()
        .map(|domain| {
            let name = names.get(&domain.certificate_id).cloned().unwrap_or_default();
            Record::new()
                .set("name", domain.name.as_str())
                .set("is_managed", domain.is_managed)
                .opt("certificate_name", name)
                .opt("status", domain.status.as_str())
                .into_value()
        })
        .collect()
}

fn flatten_glb_settings(glb: &GlbSettings) -> Record {
    let cdn = glb
        .cdn
        .as_ref()
        .map(|cdn| Record::new().set("is_enabled", cdn.is_enabled));
    Record::new()
        .set("target_protocol", glb.target_protocol.as_str())
        .set("target_port", glb.target_port)
        .block("cdn", cdn)
}

fn single(record: Option<Record>) -> Value {
    match record.filter(|r| !r.is_empty()) {
        Some(record) => Value::List(vec![record.into_value()]),
        None => Value::List(Vec::new()),
    }
}

async fn wait_for_active(ctx: &Context, meta: &Meta, id: &str, d: &ResourceData) -> Result<LoadBalancer> {
    StateChangeConf::new(&[STATUS_NEW], &[STATUS_ACTIVE])
        .timeout(d.timeout(Operation::Create))
        .wait_for_state(ctx, move || async move {
            match meta.load_balancers.get(id).await {
                Ok(lb) => {
                    let status = lb.status.clone();
                    Ok(Some((lb, status)))
                }
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
}

pub struct LoadBalancerResource {
    schema: Arc<Schema>,
}

impl LoadBalancerResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(load_balancer_schema()),
        }
    }

    async fn set_load_balancer(
        &self,
        ctx: &Context,
        d: &mut ResourceData,
        meta: &Meta,
        lb: &LoadBalancer,
    ) -> Result<()> {
        let ids: BTreeSet<String> = lb
            .forwarding_rules
            .iter()
            .map(|r| r.certificate_id.clone())
            .chain(lb.domains.iter().map(|domain| domain.certificate_id.clone()))
            .filter(|id| !id.is_empty())
            .collect();
        let names = certificate_names(ctx, meta, ids).await?;

        d.set("name", &lb.name)?;
        if let Some(region) = &lb.region {
            d.set("region", &region.slug)?;
        }
        d.set("size", &lb.size_slug)?;
        d.set("size_unit", lb.size_unit)?;
        d.set("type", &lb.lb_type)?;
        d.set("algorithm", &lb.algorithm)?;
        d.set("status", &lb.status)?;
        d.set("ip", &lb.ip)?;
        d.set("urn", lb.urn())?;
        d.set("created_at", &lb.created_at)?;
        d.set("droplet_tag", &lb.tag)?;
        d.set(
            "droplet_ids",
            Value::List(lb.droplet_ids.iter().map(|id| Value::Int(*id)).collect()),
        )?;
        d.set("redirect_http_to_https", lb.redirect_http_to_https)?;
        d.set("enable_proxy_protocol", lb.enable_proxy_protocol)?;
        d.set("enable_backend_keepalive", lb.enable_backend_keepalive)?;
        if let Some(secs) = lb.http_idle_timeout_seconds {
            d.set("http_idle_timeout_seconds", secs as i64)?;
        }
        d.set("vpc_uuid", &lb.vpc_uuid)?;
        d.set("project_id", &lb.project_id)?;
        d.set(
            "disable_lets_encrypt_dns_records",
            lb.disable_lets_encrypt_dns_records.unwrap_or_default(),
        )?;
        d.set("network", &lb.network)?;
        d.set(
            "forwarding_rule",
            Value::List(flatten_forwarding_rules(&lb.forwarding_rules, &names)),
        )?;
        d.set("healthcheck", single(lb.health_check.as_ref().map(flatten_health_check)))?;
        d.set(
            "sticky_sessions",
            single(lb.sticky_sessions.as_ref().map(flatten_sticky_sessions)),
        )?;
        d.set("firewall", single(lb.firewall.as_ref().map(flatten_firewall)))?;
        d.set("domain", Value::List(flatten_domains(&lb.domains, &names)))?;
        d.set("glb_settings", single(lb.glb_settings.as_ref().map(flatten_glb_settings)))?;
        Ok(())
    }
}

impl Default for LoadBalancerResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for LoadBalancerResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_loadbalancer"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let req = expand_request(ctx, meta, d).await?;
        let lb = ctx.run(meta.load_balancers.create(&req)).await??;
        tracing::info!("created load balancer {} ({})", lb.name, lb.id);
        d.set_id(&lb.id);

        wait_for_active(ctx, meta, &lb.id, d).await?;
        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let lb = match ctx.run(meta.load_balancers.get(d.id())).await? {
            Ok(lb) => lb,
            Err(e) if e.is_not_found() => {
                tracing::warn!("load balancer {} not found, removing from state", d.id());
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        self.set_load_balancer(ctx, d, meta, &lb).await?;
        Ok(Diagnostics::new())
    }

    /// One request carries the whole new configuration
    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        let req = expand_request(ctx, meta, d).await?;
        tracing::info!("updating load balancer {}", id);
        ctx.run(meta.load_balancers.update(&id, &req)).await??;
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        match ctx.run(meta.load_balancers.delete(d.id())).await? {
            Ok(()) => tracing::info!("deleted load balancer {}", d.id()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        d.clear_id();
        Ok(Diagnostics::new())
    }

    /// Rewrite forwarding rule certificate ids to certificate names
    async fn upgrade_state(
        &self,
        ctx: &Context,
        from_version: u32,
        mut raw: AttributeMap,
        meta: &Meta,
    ) -> Result<AttributeMap> {
        if from_version != 0 {
            return Err(CloudError::StateUpgrade(format!(
                "digitalocean_loadbalancer has no upgrader from version {from_version}"
            )));
        }
        let rules = match raw.get_mut("forwarding_rule") {
            Some(serde_json::Value::Array(rules)) => rules,
            _ => return Ok(raw),
        };
        for rule in rules.iter_mut().filter_map(|r| r.as_object_mut()) {
            let id = rule
                .get("certificate_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let has_name = rule
                .get("certificate_name")
                .and_then(|v| v.as_str())
                .is_some_and(|s| !s.is_empty());
            if id.is_empty() || has_name {
                continue;
            }
            match certificate::name_for_id(ctx, meta, &id).await {
                Ok(name) => {
                    rule.insert("certificate_id".into(), name.clone().into());
                    rule.insert("certificate_name".into(), name.into());
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!("certificate {} no longer exists, keeping its id", id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(raw)
    }
}
