//! Tags and tag membership

use crate::client::Client;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A resource reference inside a tag request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedResource {
    pub resource_id: String,
    pub resource_type: String,
}

impl TaggedResource {
    pub fn droplet(id: i64) -> Self {
        Self {
            resource_id: id.to_string(),
            resource_type: "droplet".to_string(),
        }
    }

    pub fn volume(id: &str) -> Self {
        Self {
            resource_id: id.to_string(),
            resource_type: "volume".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TagCreateRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct TagResourcesRequest<'a> {
    resources: &'a [TaggedResource],
}

#[async_trait]
pub trait TagsService: Send + Sync {
    /// Create a tag; creating an existing tag is not an error
    async fn create(&self, name: &str) -> Result<()>;
    async fn tag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()>;
    async fn untag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()>;
}

#[async_trait]
impl TagsService for Client {
    async fn create(&self, name: &str) -> Result<()> {
        self.post_empty("v2/tags", &TagCreateRequest { name }).await
    }

    async fn tag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()> {
        self.post_empty(
            &format!("v2/tags/{name}/resources"),
            &TagResourcesRequest { resources },
        )
        .await
    }

    async fn untag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()> {
        self.send_delete_with_body(
            &format!("v2/tags/{name}/resources"),
            &TagResourcesRequest { resources },
        )
        .await
    }
}
