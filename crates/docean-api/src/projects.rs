//! Projects and project membership

use crate::client::Client;
use crate::error::Result;
use crate::pagination::{Links, ListOptions, Meta, Page};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub owner_uuid: String,
    #[serde(default)]
    pub owner_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectResource {
    pub urn: String,
    #[serde(default)]
    pub assigned_at: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub purpose: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectUpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ProjectRoot {
    project: Project,
}

#[derive(Debug, Deserialize)]
struct ProjectsRoot {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct ProjectResourcesRoot {
    #[serde(default)]
    resources: Vec<ProjectResource>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct AssignRequest<'a> {
    resources: &'a [String],
}

#[async_trait]
pub trait ProjectsService: Send + Sync {
    async fn list(&self, opt: ListOptions) -> Result<Page<Project>>;
    async fn get(&self, id: &str) -> Result<Project>;
    async fn get_default(&self) -> Result<Project>;
    async fn create(&self, req: &ProjectCreateRequest) -> Result<Project>;
    async fn update(&self, id: &str, req: &ProjectUpdateRequest) -> Result<Project>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list_resources(&self, id: &str, opt: ListOptions) -> Result<Page<ProjectResource>>;
    /// Move the given URNs into the project, wherever they currently live
    async fn assign_resources(&self, id: &str, urns: &[String]) -> Result<Vec<ProjectResource>>;
}

#[async_trait]
impl ProjectsService for Client {
    async fn list(&self, opt: ListOptions) -> Result<Page<Project>> {
        let root: ProjectsRoot = self.get_json("v2/projects", &opt.query()).await?;
        Ok(Page {
            items: root.projects,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn get(&self, id: &str) -> Result<Project> {
        let root: ProjectRoot = self.get_json(&format!("v2/projects/{id}"), &[]).await?;
        Ok(root.project)
    }

    async fn get_default(&self) -> Result<Project> {
        let root: ProjectRoot = self.get_json("v2/projects/default", &[]).await?;
        Ok(root.project)
    }

    async fn create(&self, req: &ProjectCreateRequest) -> Result<Project> {
        let root: ProjectRoot = self.post_json("v2/projects", req).await?;
        Ok(root.project)
    }

    async fn update(&self, id: &str, req: &ProjectUpdateRequest) -> Result<Project> {
        let root: ProjectRoot = self.patch_json(&format!("v2/projects/{id}"), req).await?;
        Ok(root.project)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send_delete(&format!("v2/projects/{id}")).await
    }

    async fn list_resources(&self, id: &str, opt: ListOptions) -> Result<Page<ProjectResource>> {
        let root: ProjectResourcesRoot = self
            .get_json(&format!("v2/projects/{id}/resources"), &opt.query())
            .await?;
        Ok(Page {
            items: root.resources,
            links: root.links,
            meta: root.meta,
        })
    }

    async fn assign_resources(&self, id: &str, urns: &[String]) -> Result<Vec<ProjectResource>> {
        let root: ProjectResourcesRoot = self
            .post_json(
                &format!("v2/projects/{id}/resources"),
                &AssignRequest { resources: urns },
            )
            .await?;
        Ok(root.resources)
    }
}
