//! Block storage volumes and their actions

use crate::actions::{Action, ActionRoot};
use crate::client::Client;
use crate::droplets::Region;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size_gigabytes: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub droplet_ids: Vec<i64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub filesystem_type: String,
    #[serde(default)]
    pub filesystem_label: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Volume {
    pub fn urn(&self) -> String {
        format!("do:volume:{}", self.id)
    }

    pub fn region_slug(&self) -> &str {
        self.region.as_ref().map(|r| r.slug.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolumeCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    pub size_gigabytes: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub snapshot_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filesystem_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filesystem_label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeRoot {
    volume: Volume,
}

#[derive(Debug, Deserialize)]
struct VolumesRoot {
    #[serde(default)]
    volumes: Vec<Volume>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait VolumesService: Send + Sync {
    async fn get(&self, id: &str) -> Result<Volume>;
    async fn list(&self, opt: ListOptions) -> Result<Page<Volume>>;
    async fn create(&self, req: &VolumeCreateRequest) -> Result<Volume>;
    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl VolumesService for Client {
    async fn get(&self, id: &str) -> Result<Volume> {
        let root: VolumeRoot = self.get_json(&format!("v2/volumes/{id}"), &[]).await?;
        Ok(root.volume)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<Volume>> {
        let root: VolumesRoot = self.get_json("v2/volumes", &opt.query()).await?;
        Ok(Page {
            items: root.volumes,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &VolumeCreateRequest) -> Result<Volume> {
        let root: VolumeRoot = self.post_json("v2/volumes", req).await?;
        Ok(root.volume)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/volumes/{id}")).await
    }
}

/// Attach, detach and resize volumes
#[async_trait]
pub trait StorageActionsService: Send + Sync {
    async fn attach(&self, volume_id: &str, droplet_id: i64) -> Result<Action>;
    async fn detach(&self, volume_id: &str, droplet_id: i64) -> Result<Action>;
    async fn resize(&self, volume_id: &str, size_gigabytes: i64, region: &str) -> Result<Action>;
}

#[derive(Debug, Serialize)]
struct StorageActionRequest<'a> {
    #[serde(rename = "type")]
    action_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    droplet_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_gigabytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

impl Client {
    async fn storage_action(
        &self,
        volume_id: &str,
        req: &StorageActionRequest<'_>,
    ) -> Result<Action> {
        let root: ActionRoot = self
            .post_json(&format!("v2/volumes/{volume_id}/actions"), req)
            .await?;
        Ok(root.action)
    }
}

#[async_trait]
impl StorageActionsService for Client {
    async fn attach(&self, volume_id: &str, droplet_id: i64) -> Result<Action> {
        let req = StorageActionRequest {
            action_type: "attach",
            droplet_id: Some(droplet_id),
            size_gigabytes: None,
            region: None,
        };
        self.storage_action(volume_id, &req).await
    }

    async fn detach(&self, volume_id: &str, droplet_id: i64) -> Result<Action> {
        let req = StorageActionRequest {
            action_type: "detach",
            droplet_id: Some(droplet_id),
            size_gigabytes: None,
            region: None,
        };
        self.storage_action(volume_id, &req).await
    }

    async fn resize(&self, volume_id: &str, size_gigabytes: i64, region: &str) -> Result<Action> {
        let req = StorageActionRequest {
            action_type: "resize",
            droplet_id: None,
            size_gigabytes: Some(size_gigabytes),
            region: Some(region),
        };
        self.storage_action(volume_id, &req).await
    }
}
