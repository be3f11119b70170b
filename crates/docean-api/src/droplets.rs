//! Droplets and droplet actions

use crate::actions::{Action, ActionRoot};
use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub vcpus: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub price_monthly: f64,
    #[serde(default)]
    pub price_hourly: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropletImage {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub distribution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkV4 {
    pub ip_address: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(rename = "type")]
    pub network_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkV6 {
    pub ip_address: String,
    #[serde(default)]
    pub netmask: i64,
    #[serde(default)]
    pub gateway: String,
    #[serde(rename = "type")]
    pub network_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
    #[serde(default)]
    pub v6: Vec<NetworkV6>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Droplet {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub memory: i64,
    #[serde(default)]
    pub vcpus: i64,
    #[serde(default)]
    pub disk: i64,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub image: Option<DropletImage>,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub size_slug: String,
    #[serde(default)]
    pub backup_ids: Vec<i64>,
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub networks: Option<Networks>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub vpc_uuid: String,
}

impl Droplet {
    pub fn urn(&self) -> String {
        format!("do:droplet:{}", self.id)
    }

    fn ipv4(&self, kind: &str) -> Option<&str> {
        self.networks
            .as_ref()?
            .v4
            .iter()
            .find(|n| n.network_type == kind)
            .map(|n| n.ip_address.as_str())
    }

    pub fn public_ipv4(&self) -> Option<&str> {
        self.ipv4("public")
    }

    pub fn private_ipv4(&self) -> Option<&str> {
        self.ipv4("private")
    }

    pub fn public_ipv6(&self) -> Option<&str> {
        self.networks
            .as_ref()?
            .v6
            .iter()
            .find(|n| n.network_type == "public")
            .map(|n| n.ip_address.as_str())
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    pub fn price_monthly(&self) -> f64 {
        self.size.as_ref().map(|s| s.price_monthly).unwrap_or_default()
    }

    pub fn price_hourly(&self) -> f64 {
        self.size.as_ref().map(|s| s.price_hourly).unwrap_or_default()
    }
}

/// Image reference for droplet creation: a numeric id or a slug
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DropletCreateImage {
    Id(i64),
    Slug(String),
}

impl DropletCreateImage {
    /// Numeric strings refer to image ids, anything else is a slug
    pub fn parse(image: &str) -> Self {
        match image.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Slug(image.to_string()),
        }
    }
}

/// SSH key reference for droplet creation: a numeric id or a fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DropletCreateSshKey {
    Id(i64),
    Fingerprint(String),
}

impl DropletCreateSshKey {
    pub fn parse(key: &str) -> Self {
        match key.parse::<i64>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Fingerprint(key.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropletBackupPolicy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plan: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub weekday: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropletCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    pub size: String,
    pub image: DropletCreateImage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<DropletCreateSshKey>,
    pub backups: bool,
    pub ipv6: bool,
    pub private_networking: bool,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_data: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_droplet_agent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_policy: Option<DropletBackupPolicy>,
}

impl DropletCreateRequest {
    pub fn new(
        name: impl Into<String>,
        size: impl Into<String>,
        image: DropletCreateImage,
    ) -> Self {
        Self {
            name: name.into(),
            region: String::new(),
            size: size.into(),
            image,
            ssh_keys: Vec::new(),
            backups: false,
            ipv6: false,
            private_networking: false,
            monitoring: false,
            user_data: String::new(),
            volumes: Vec::new(),
            tags: Vec::new(),
            vpc_uuid: String::new(),
            with_droplet_agent: None,
            backup_policy: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DropletRoot {
    droplet: Droplet,
}

#[derive(Debug, Deserialize)]
struct DropletsRoot {
    #[serde(default)]
    droplets: Vec<Droplet>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[async_trait]
pub trait DropletsService: Send + Sync {
    async fn get(&self, id: i64) -> Result<Droplet>;
    async fn list(&self, opt: ListOptions) -> Result<Page<Droplet>>;
    async fn create(&self, req: &DropletCreateRequest) -> Result<Droplet>;
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
impl DropletsService for Client {
    async fn get(&self, id: i64) -> Result<Droplet> {
        let root: DropletRoot = self.get_json(&format!("v2/droplets/{id}"), &[]).await?;
        Ok(root.droplet)
    }

    async fn list(&self, opt: ListOptions) -> Result<Page<Droplet>> {
        let root: DropletsRoot = self.get_json("v2/droplets", &opt.query()).await?;
        Ok(Page {
            items: root.droplets,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn create(&self, req: &DropletCreateRequest) -> Result<Droplet> {
        let root: DropletRoot = self.post_json("v2/droplets", req).await?;
        Ok(root.droplet)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.send_delete(&format!("v2/droplets/{id}")).await
    }
}

/// Actions that change a running droplet
///
/// Every call returns the action handle to poll; the API rejects a second
/// action while one is still in progress.
#[async_trait]
pub trait DropletActionsService: Send + Sync {
    async fn power_on(&self, id: i64) -> Result<Action>;
    async fn power_off(&self, id: i64) -> Result<Action>;
    async fn shutdown(&self, id: i64) -> Result<Action>;
    async fn resize(&self, id: i64, size: &str, resize_disk: bool) -> Result<Action>;
    async fn rename(&self, id: i64, name: &str) -> Result<Action>;
    async fn enable_ipv6(&self, id: i64) -> Result<Action>;
    async fn enable_private_networking(&self, id: i64) -> Result<Action>;
    async fn enable_backups(&self, id: i64, policy: Option<&DropletBackupPolicy>)
    -> Result<Action>;
    async fn change_backup_policy(&self, id: i64, policy: &DropletBackupPolicy)
    -> Result<Action>;
    async fn disable_backups(&self, id: i64) -> Result<Action>;
}

#[derive(Debug, Serialize)]
struct ActionRequest<'a> {
    #[serde(rename = "type")]
    action_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup_policy: Option<&'a DropletBackupPolicy>,
}

impl<'a> ActionRequest<'a> {
    fn new(action_type: &'a str) -> Self {
        Self {
            action_type,
            size: None,
            disk: None,
            name: None,
            backup_policy: None,
        }
    }
}

impl Client {
    async fn droplet_action(&self, id: i64, req: &ActionRequest<'_>) -> Result<Action> {
        let root: ActionRoot = self
            .post_json(&format!("v2/droplets/{id}/actions"), req)
            .await?;
        Ok(root.action)
    }
}

#[async_trait]
impl DropletActionsService for Client {
    async fn power_on(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("power_on")).await
    }

    async fn power_off(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("power_off")).await
    }

    async fn shutdown(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("shutdown")).await
    }

    async fn resize(&self, id: i64, size: &str, resize_disk: bool) -> Result<Action> {
        let req = ActionRequest {
            size: Some(size),
            disk: Some(resize_disk),
            ..ActionRequest::new("resize")
        };
        self.droplet_action(id, &req).await
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Action> {
        let req = ActionRequest {
            name: Some(name),
            ..ActionRequest::new("rename")
        };
        self.droplet_action(id, &req).await
    }

    async fn enable_ipv6(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("enable_ipv6")).await
    }

    async fn enable_private_networking(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("enable_private_networking"))
            .await
    }

    async fn enable_backups(
        &self,
        id: i64,
        policy: Option<&DropletBackupPolicy>,
    ) -> Result<Action> {
        let req = ActionRequest {
            backup_policy: policy,
            ..ActionRequest::new("enable_backups")
        };
        self.droplet_action(id, &req).await
    }

    async fn change_backup_policy(
        &self,
        id: i64,
        policy: &DropletBackupPolicy,
    ) -> Result<Action> {
        let req = ActionRequest {
            backup_policy: Some(policy),
            ..ActionRequest::new("change_backup_policy")
        };
        self.droplet_action(id, &req).await
    }

    async fn disable_backups(&self, id: i64) -> Result<Action> {
        self.droplet_action(id, &ActionRequest::new("disable_backups"))
            .await
    }
}
