//! VPC networks

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    #[serde(default)]
    pub urn: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ip_range: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct VpcsRoot {
    #[serde(default)]
    vpcs: Vec<Vpc>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait VpcsService: Send + Sync {
    async fn list(&self, opt: ListOptions) -> Result<Page<Vpc>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl VpcsService for Client {
    async fn list(&self, opt: ListOptions) -> Result<Page<Vpc>> {
        let root: VpcsRoot = self.get_json("v2/vpcs", &opt.query()).await?;
        Ok(Page {
            items: root.vpcs,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/vpcs/{id}")).await
    }
}
