//! Images

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub image_type: String,
    #[serde(default)]
    pub distribution: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub min_disk_size: i64,
    #[serde(default)]
    pub size_gigabytes: f64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
struct ImageRoot {
    image: Image,
}

#[derive(Debug, Deserialize)]
struct ImagesRoot {
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait ImagesService: Send + Sync {
    async fn list(&self, opt: ListOptions) -> Result<Page<Image>>;
    /// Look up by numeric id or by slug
    async fn get(&self, id_or_slug: &str) -> Result<Image>;
}

#[async_trait]
impl ImagesService for Client {
    async fn list(&self, opt: ListOptions) -> Result<Page<Image>> {
        let root: ImagesRoot = self.get_json("v2/images", &opt.query()).await?;
        Ok(Page {
            items: root.images,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn get(&self, id_or_slug: &str) -> Result<Image> {
        let root: ImageRoot = self
            .get_json(&format!("v2/images/{id_or_slug}"), &[])
            .await?;
        Ok(root.image)
    }
}
