//! Projects and project membership
//!
//! Every cloud resource belongs to exactly one project. Removing a
//! resource from a project means handing it back to the account's default
//! project; deleting a project first hands back everything it still owns.
//! The cloud finishes those reassignments asynchronously, so the delete is
//! retried while it reports that the project still has resources.

use crate::meta::Meta;
use crate::pagination::collect_all;
use async_trait::async_trait;
use docean_api::projects::{ProjectCreateRequest, ProjectUpdateRequest};
use docean_api::Project;
use docean_cloud::schema::string_in;
use docean_cloud::value::STRING_SET;
use docean_cloud::{
    AttrType, Attribute, Block, Context, Diagnostics, Resource, ResourceData, Result, Schema,
    Timeouts, Value, retry, retry_on_precondition,
};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PURPOSE: &str = "Web Application";
pub const ENVIRONMENTS: &[&str] = &["Development", "Staging", "Production"];

/// Default delete timeout; covers the asynchronous reassignment
pub const DELETE_TIMEOUT: Duration = Duration::from_secs(3 * 60);

const NOT_EMPTY: &str = "cannot delete a project with resources";

// ============ Membership ============

/// URNs of every resource currently in the project
pub async fn load_resource_urns(ctx: &Context, meta: &Meta, project_id: &str) -> Result<Vec<String>> {
    let resources = collect_all(ctx, move |opt| meta.projects.list_resources(project_id, opt)).await?;
    Ok(resources.into_iter().map(|r| r.urn).collect())
}

/// Move `urns` into the project
pub async fn assign_resources(ctx: &Context, meta: &Meta, project_id: &str, urns: &[String]) -> Result<()> {
    if urns.is_empty() {
        return Ok(());
    }
    tracing::info!("assigning {} resources to project {}", urns.len(), project_id);
    ctx.run(meta.projects.assign_resources(project_id, urns)).await??;
    Ok(())
}

/// Hand `urns` back to the default project
pub async fn reassign_to_default(ctx: &Context, meta: &Meta, urns: &[String]) -> Result<()> {
    if urns.is_empty() {
        return Ok(());
    }
    let default = ctx.run(meta.projects.get_default()).await??;
    assign_resources(ctx, meta, &default.id, urns).await
}

/// Empty the project, then delete it
///
/// A project that is already gone counts as deleted.
pub async fn delete_project(ctx: &Context, meta: &Meta, project_id: &str, timeout: Duration) -> Result<()> {
    let urns = match load_resource_urns(ctx, meta, project_id).await {
        Ok(urns) => urns,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    };
    reassign_to_default(ctx, meta, &urns).await?;

    retry(ctx, timeout, move || async move {
        match meta.projects.delete(project_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(retry_on_precondition(e, NOT_EMPTY)),
        }
    })
    .await?;
    tracing::info!("deleted project {}", project_id);
    Ok(())
}

// ============ Project ============

fn project_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr("name", Attribute::string().required())
            .attr("description", Attribute::string().optional())
            .attr("purpose", Attribute::string().optional().default(DEFAULT_PURPOSE))
            .attr(
                "environment",
                Attribute::string().optional().validate(string_in(ENVIRONMENTS)),
            )
            .attr("is_default", Attribute::bool().optional().default(false))
            .attr(
                "resources",
                Attribute::set(AttrType::String, STRING_SET)
                    .optional()
                    .computed()
                    .description("URNs of the resources assigned to the project"),
            )
            .attr("owner_uuid", Attribute::string().computed())
            .attr("owner_id", Attribute::int().computed())
            .attr("created_at", Attribute::string().computed())
            .attr("updated_at", Attribute::string().computed()),
    )
}

/// Flattened project attributes, without resources
pub fn flatten_project(project: &Project) -> Vec<(&'static str, Value)> {
    vec![
        ("name", Value::from(&project.name)),
        ("description", Value::from(&project.description)),
        ("purpose", Value::from(&project.purpose)),
        ("environment", Value::from(&project.environment)),
        ("is_default", Value::from(project.is_default)),
        ("owner_uuid", Value::from(&project.owner_uuid)),
        ("owner_id", Value::from(project.owner_id)),
        ("created_at", Value::from(&project.created_at)),
        ("updated_at", Value::from(&project.updated_at)),
    ]
}

pub struct ProjectResource {
    schema: Arc<Schema>,
}

impl ProjectResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(project_schema()),
        }
    }
}

impl Default for ProjectResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for ProjectResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_project"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default().delete(DELETE_TIMEOUT)
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let req = ProjectCreateRequest {
            name: d.get_string("name"),
            description: d.get_string("description"),
            purpose: d.get_string("purpose"),
            environment: d.get_string("environment"),
        };
        let project = ctx.run(meta.projects.create(&req)).await??;
        tracing::info!("created project {} ({})", project.name, project.id);
        d.set_id(&project.id);

        if d.get_bool("is_default") {
            let req = ProjectUpdateRequest {
                is_default: Some(true),
                ..Default::default()
            };
            ctx.run(meta.projects.update(&project.id, &req)).await??;
        }

        let urns = d.get_string_list("resources");
        assign_resources(ctx, meta, &project.id, &urns).await?;

        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let project = match ctx.run(meta.projects.get(d.id())).await? {
            Ok(project) => project,
            Err(e) if e.is_not_found() => {
                tracing::warn!("project {} not found, removing from state", d.id());
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e.into()),
        };
        for (name, value) in flatten_project(&project) {
            d.set(name, value)?;
        }
        let urns = load_resource_urns(ctx, meta, &project.id).await?;
        d.set("resources", Value::string_list(urns))?;
        Ok(Diagnostics::new())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let id = d.id().to_string();
        d.set_partial(true);

        let changed = |d: &ResourceData, name: &str| d.has_change(&[name]).then(|| d.get_string(name));
        let req = ProjectUpdateRequest {
            name: changed(d, "name"),
            description: changed(d, "description"),
            purpose: changed(d, "purpose"),
            environment: changed(d, "environment"),
            is_default: d.has_change(&["is_default"]).then(|| d.get_bool("is_default")),
        };
        if req != ProjectUpdateRequest::default() {
            let project = ctx.run(meta.projects.update(&id, &req)).await??;
            for (name, value) in flatten_project(&project) {
                d.set(name, value)?;
            }
        }

        if d.has_change(&["resources"]) {
            let (remove, add) = d.set_change("resources")?;
            let strings = |set: &docean_cloud::HashedSet| -> Vec<String> {
                set.iter().filter_map(|v| v.as_str().map(String::from)).collect()
            };
            reassign_to_default(ctx, meta, &strings(&remove)).await?;
            assign_resources(ctx, meta, &id, &strings(&add)).await?;
            let resources = d.get("resources");
            d.set("resources", resources)?;
        }

        d.set_partial(false);
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let timeout = d.timeout(docean_cloud::Operation::Delete);
        delete_project(ctx, meta, d.id(), timeout).await?;
        d.clear_id();
        Ok(Diagnostics::new())
    }
}

// ============ Project resources ============

fn project_resources_schema() -> Schema {
    Schema::new(
        Block::new()
            .attr("project", Attribute::string().required().force_new())
            .attr(
                "resources",
                Attribute::set(AttrType::String, STRING_SET).required(),
            ),
    )
}

/// Membership of a subset of resources in an existing project
///
/// Only the configured URNs are managed; other members of the project are
/// left alone.
pub struct ProjectResourcesResource {
    schema: Arc<Schema>,
}

impl ProjectResourcesResource {
    pub fn new() -> Self {
        Self {
            schema: Arc::new(project_resources_schema()),
        }
    }
}

impl Default for ProjectResourcesResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource<Meta> for ProjectResourcesResource {
    fn type_name(&self) -> &'static str {
        "digitalocean_project_resources"
    }

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::default().delete(DELETE_TIMEOUT)
    }

    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let project_id = d.get_string("project");
        let urns = d.get_string_list("resources");
        assign_resources(ctx, meta, &project_id, &urns).await?;
        d.set_id(&project_id);
        self.read(ctx, d, meta).await
    }

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let project_id = d.id().to_string();
        let present = match load_resource_urns(ctx, meta, &project_id).await {
            Ok(urns) => urns,
            Err(e) if e.is_not_found() => {
                tracing::warn!("project {} not found, removing from state", project_id);
                d.clear_id();
                return Ok(Diagnostics::new());
            }
            Err(e) => return Err(e),
        };
        let managed: Vec<String> = d
            .get_string_list("resources")
            .into_iter()
            .filter(|urn| present.contains(urn))
            .collect();
        d.set("project", project_id.as_str())?;
        d.set("resources", Value::string_list(managed))?;
        Ok(Diagnostics::new())
    }

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let project_id = d.id().to_string();
        let (remove, add) = d.set_change("resources")?;
        let remove: Vec<String> = remove.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        let add: Vec<String> = add.iter().filter_map(|v| v.as_str().map(String::from)).collect();

        reassign_to_default(ctx, meta, &remove).await?;
        assign_resources(ctx, meta, &project_id, &add).await?;
        self.read(ctx, d, meta).await
    }

    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &Meta) -> Result<Diagnostics> {
        let urns = d.get_string_list("resources");
        reassign_to_default(ctx, meta, &urns).await?;
        d.clear_id();
        Ok(Diagnostics::new())
    }
}
