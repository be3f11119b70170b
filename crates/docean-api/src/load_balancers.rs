//! Load balancers

use crate::client::Client;
use crate::droplets::Region;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub entry_protocol: String,
    pub entry_port: i64,
    pub target_protocol: String,
    pub target_port: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate_id: String,
    #[serde(default)]
    pub tls_passthrough: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub protocol: String,
    pub port: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default)]
    pub check_interval_seconds: i64,
    #[serde(default)]
    pub response_timeout_seconds: i64,
    #[serde(default)]
    pub healthy_threshold: i64,
    #[serde(default)]
    pub unhealthy_threshold: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickySessions {
    #[serde(rename = "type")]
    pub session_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cookie_name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cookie_ttl_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LbFirewall {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LbDomain {
    pub name: String,
    #[serde(default)]
    pub is_managed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdnSettings {
    #[serde(default)]
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlbSettings {
    pub target_protocol: String,
    pub target_port: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn: Option<CdnSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub size_slug: String,
    #[serde(default)]
    pub size_unit: i64,
    #[serde(rename = "type", default)]
    pub lb_type: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRule>,
    #[serde(default)]
    pub health_check: Option<HealthCheck>,
    #[serde(default)]
    pub sticky_sessions: Option<StickySessions>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub droplet_ids: Vec<i64>,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub redirect_http_to_https: bool,
    #[serde(default)]
    pub enable_proxy_protocol: bool,
    #[serde(default)]
    pub enable_backend_keepalive: bool,
    #[serde(default)]
    pub http_idle_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub vpc_uuid: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub disable_lets_encrypt_dns_records: Option<bool>,
    #[serde(default)]
    pub firewall: Option<LbFirewall>,
    #[serde(default)]
    pub domains: Vec<LbDomain>,
    #[serde(default)]
    pub glb_settings: Option<GlbSettings>,
    #[serde(default)]
    pub network: String,
}

impl LoadBalancer {
    pub fn urn(&self) -> String {
        format!("do:loadbalancer:{}", self.id)
    }
}

/// Full desired configuration; create and update take the same shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadBalancerRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub size_slug: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub size_unit: i64,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub lb_type: String,
    pub forwarding_rules: Vec<ForwardingRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky_sessions: Option<StickySessions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub droplet_ids: Vec<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    pub redirect_http_to_https: bool,
    pub enable_proxy_protocol: bool,
    pub enable_backend_keepalive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_idle_timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_lets_encrypt_dns_records: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall: Option<LbFirewall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<LbDomain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glb_settings: Option<GlbSettings>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[derive(Debug, Deserialize)]
struct LoadBalancerRoot {
    load_balancer: LoadBalancer,
}

#[derive(Debug, Deserialize)]
struct LoadBalancersRoot {
    #[serde(default)]
    load_balancers: Vec<LoadBalancer>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait LoadBalancersService: Send + Sync {
    async fn get(&self, id: &str) -> Result<LoadBalancer>;
    async fn list(&self, opt: ListOptions) -> Result<Page<LoadBalancer>>;
    async fn create(&self, req: &LoadBalancerRequest) -> Result<LoadBalancer>;
    async fn update(&self, id: &str, req: &LoadBalancerRequest) -> Result<LoadBalancer>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl LoadBalancersService for Client {
    async fn get(&self, id: &str) -> Result<LoadBalancer> {
        let root: LoadBalancerRoot = self
            .get_json(&format!("v2/load_balancers/{id}"), &[])
            .await?;
        Ok(root.load_balancer)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<LoadBalancer>> {
        let root: LoadBalancersRoot = self.get_json("v2/load_balancers", &opt.query()).await?;
        Ok(Page {
            items: root.load_balancers,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &LoadBalancerRequest) -> Result<LoadBalancer> {
        let root: LoadBalancerRoot = self.post_json("v2/load_balancers", req).await?;
        Ok(root.load_balancer)
    }

    async fn update(&self, id: &str, req: &LoadBalancerRequest) -> Result<LoadBalancer> {
        let root: LoadBalancerRoot = self
            .put_json(&format!("v2/load_balancers/{id}"), req)
            .await?;
        Ok(root.load_balancer)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/load_balancers/{id}")).await
    }
}
