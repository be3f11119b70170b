//! CDN endpoints

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cdn {
    pub id: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub certificate_id: String,
    #[serde(default)]
    pub custom_domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CdnCreateRequest {
    pub origin: String,
    pub ttl: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub custom_domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CdnUpdateCustomDomainRequest {
    pub custom_domain: String,
    pub certificate_id: String,
}

#[derive(Debug, Serialize)]
struct CdnUpdateTtlRequest {
    ttl: u32,
}

#[derive(Debug, Deserialize)]
struct CdnRoot {
    endpoint: Cdn,
}

#[derive(Debug, Deserialize)]
struct CdnsRoot {
    #[serde(default)]
    endpoints: Vec<Cdn>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait CdnService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Cdn>;
    async fn list(&self, opt: ListOptions) -> Result<Page<Cdn>>;
    async fn create(&self, req: &CdnCreateRequest) -> Result<Cdn>;
    async fn update_ttl(&self, id: &str, ttl: u32) -> Result<Cdn>;
    async fn update_custom_domain(
        &self,
        id: &str,
        req: &CdnUpdateCustomDomainRequest,
    ) -> Result<Cdn>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl CdnService for Client {
    async fn get(&self, id: &str) -> Result<Cdn> {
        let root: CdnRoot = self.get_json(&format!("v2/cdn/endpoints/{id}"), &[]).await?;
        Ok(root.endpoint)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<Cdn>> {
        let root: CdnsRoot = self.get_json("v2/cdn/endpoints", &opt.query()).await?;
        Ok(Page {
            items: root.endpoints,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &CdnCreateRequest) -> Result<Cdn> {
        let root: CdnRoot = self.post_json("v2/cdn/endpoints", req).await?;
        Ok(root.endpoint)
    }

    async fn update_ttl(&self, id: &str, ttl: u32) -> Result<Cdn> {
        let root: CdnRoot = self
            .put_json(&format!("v2/cdn/endpoints/{id}"), &CdnUpdateTtlRequest { ttl })
            .await?;
        Ok(root.endpoint)
    }

    async fn update_custom_domain(
        &self,
        id: &str,
        req: &CdnUpdateCustomDomainRequest,
    ) -> Result<Cdn> {
        let root: CdnRoot = self
            .put_json(&format!("v2/cdn/endpoints/{id}"), req)
            .await?;
        Ok(root.endpoint)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/cdn/endpoints/{id}")).await
    }
}
