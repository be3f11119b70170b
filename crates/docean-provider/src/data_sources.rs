//! List data sources: droplets, images and projects
//!
//! Each source fetches every page and flattens objects into records; the
//! shared data-list pipeline filters, sorts and publishes them.

use crate::fields::Record;
use crate::meta::Meta;
use crate::pagination::collect_all;
use crate::project::{flatten_project, load_resource_urns};
use async_trait::async_trait;
use docean_api::{Droplet, Image, Project};
use docean_cloud::datalist;
use docean_cloud::value::STRING_SET;
use docean_cloud::{AttrType, Attribute, Block, Context, DataList, ListSource, Result, Value};
use futures_util::future::try_join_all;

fn strings(items: &[String]) -> Value {
    Value::string_list(items.iter().cloned())
}

// ============ Droplets ============

pub struct DropletsSource;

pub fn droplet_record_block() -> Block {
    Block::new()
        .attr("id", Attribute::int().computed())
        .attr("name", Attribute::string().computed())
        .attr("region", Attribute::string().computed())
        .attr("image", Attribute::string().computed())
        .attr("size", Attribute::string().computed())
        .attr("disk", Attribute::int().computed())
        .attr("vcpus", Attribute::int().computed())
        .attr("memory", Attribute::int().computed())
        .attr("price_hourly", Attribute::float().computed())
        .attr("price_monthly", Attribute::float().computed())
        .attr("status", Attribute::string().computed())
        .attr("locked", Attribute::bool().computed())
        .attr("urn", Attribute::string().computed())
        .attr("created_at", Attribute::string().computed())
        .attr("ipv4_address", Attribute::string().computed())
        .attr("ipv4_address_private", Attribute::string().computed())
        .attr("ipv6_address", Attribute::string().computed())
        .attr("backups", Attribute::bool().computed())
        .attr("monitoring", Attribute::bool().computed())
        .attr("volume_ids", Attribute::set(AttrType::String, STRING_SET).computed())
        .attr("tags", Attribute::set(AttrType::String, STRING_SET).computed())
        .attr("vpc_uuid", Attribute::string().computed())
}

pub fn flatten_droplet(droplet: &Droplet) -> datalist::Record {
    let image = droplet
        .image
        .as_ref()
        .map(|i| if i.slug.is_empty() { i.id.to_string() } else { i.slug.clone() })
        .unwrap_or_default();
    let size = droplet
        .size
        .as_ref()
        .map(|s| s.slug.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(&droplet.size_slug);
    Record::new()
        .set("id", droplet.id)
        .set("name", droplet.name.as_str())
        .set("region", droplet.region.as_ref().map(|r| r.slug.as_str()).unwrap_or_default())
        .set("image", image)
        .set("size", size)
        .set("disk", droplet.disk)
        .set("vcpus", droplet.vcpus)
        .set("memory", droplet.memory)
        .set("price_hourly", droplet.price_hourly())
        .set("price_monthly", droplet.price_monthly())
        .set("status", droplet.status.as_str())
        .set("locked", droplet.locked)
        .set("urn", droplet.urn())
        .set("created_at", droplet.created_at.as_str())
        .set("ipv4_address", droplet.public_ipv4().unwrap_or_default())
        .set("ipv4_address_private", droplet.private_ipv4().unwrap_or_default())
        .set("ipv6_address", droplet.public_ipv6().unwrap_or_default().to_lowercase())
        .set("backups", droplet.has_feature("backups"))
        .set("monitoring", droplet.has_feature("monitoring"))
        .set("volume_ids", strings(&droplet.volume_ids))
        .set("tags", strings(&droplet.tags))
        .set("vpc_uuid", droplet.vpc_uuid.as_str())
        .into_fields()
}

#[async_trait]
impl ListSource<Meta> for DropletsSource {
    type Item = Droplet;

    fn type_name(&self) -> &'static str {
        "digitalocean_droplets"
    }

    fn result_attribute(&self) -> &'static str {
        "droplets"
    }

    fn record_schema(&self) -> Block {
        droplet_record_block()
    }

    async fn fetch_all(&self, ctx: &Context, meta: &Meta) -> Result<Vec<Droplet>> {
        collect_all(ctx, move |opt| meta.droplets.list(opt)).await
    }

    fn flatten(&self, _meta: &Meta, droplet: &Droplet) -> Result<datalist::Record> {
        Ok(flatten_droplet(droplet))
    }
}

// ============ Images ============

pub struct ImagesSource;

pub fn image_record_block() -> Block {
    Block::new()
        .attr("id", Attribute::int().computed())
        .attr("name", Attribute::string().computed())
        .attr("type", Attribute::string().computed())
        .attr("distribution", Attribute::string().computed())
        .attr("slug", Attribute::string().computed())
        .attr("public", Attribute::bool().computed())
        .attr("regions", Attribute::set(AttrType::String, STRING_SET).computed())
        .attr("min_disk_size", Attribute::int().computed())
        .attr("size_gigabytes", Attribute::float().computed())
        .attr("created", Attribute::string().computed())
        .attr("description", Attribute::string().computed())
        .attr("tags", Attribute::set(AttrType::String, STRING_SET).computed())
        .attr("status", Attribute::string().computed())
}

pub fn flatten_image(image: &Image) -> datalist::Record {
    Record::new()
        .set("id", image.id)
        .set("name", image.name.as_str())
        .set("type", image.image_type.as_str())
        .set("distribution", image.distribution.as_str())
        .set("slug", image.slug.as_deref().unwrap_or_default())
        .set("public", image.public)
        .set("regions", strings(&image.regions))
        .set("min_disk_size", image.min_disk_size)
        .set("size_gigabytes", image.size_gigabytes)
        .set("created", image.created_at.as_str())
        .set("description", image.description.as_str())
        .set("tags", strings(&image.tags))
        .set("status", image.status.as_str())
        .into_fields()
}

#[async_trait]
impl ListSource<Meta> for ImagesSource {
    type Item = Image;

    fn type_name(&self) -> &'static str {
        "digitalocean_images"
    }

    fn result_attribute(&self) -> &'static str {
        "images"
    }

    fn record_schema(&self) -> Block {
        image_record_block()
    }

    async fn fetch_all(&self, ctx: &Context, meta: &Meta) -> Result<Vec<Image>> {
        collect_all(ctx, move |opt| meta.images.list(opt)).await
    }

    fn flatten(&self, _meta: &Meta, image: &Image) -> Result<datalist::Record> {
        Ok(flatten_image(image))
    }
}

// ============ Projects ============

pub struct ProjectsSource;

/// A project with the URNs of its resources
pub struct ProjectWithResources {
    pub project: Project,
    pub resources: Vec<String>,
}

pub fn project_record_block() -> Block {
    Block::new()
        .attr("id", Attribute::string().computed())
        .attr("name", Attribute::string().computed())
        .attr("description", Attribute::string().computed())
        .attr("purpose", Attribute::string().computed())
        .attr("environment", Attribute::string().computed())
        .attr("is_default", Attribute::bool().computed())
        .attr("owner_uuid", Attribute::string().computed())
        .attr("owner_id", Attribute::int().computed())
        .attr("created_at", Attribute::string().computed())
        .attr("updated_at", Attribute::string().computed())
        .attr("resources", Attribute::set(AttrType::String, STRING_SET).computed())
}

#[async_trait]
impl ListSource<Meta> for ProjectsSource {
    type Item = ProjectWithResources;

    fn type_name(&self) -> &'static str {
        "digitalocean_projects"
    }

    fn result_attribute(&self) -> &'static str {
        "projects"
    }

    fn record_schema(&self) -> Block {
        project_record_block()
    }

    async fn fetch_all(&self, ctx: &Context, meta: &Meta) -> Result<Vec<ProjectWithResources>> {
        let projects = collect_all(ctx, move |opt| meta.projects.list(opt)).await?;
        let resources = try_join_all(
            projects
                .iter()
                .map(|project| load_resource_urns(ctx, meta, &project.id)),
        )
        .await?;
        Ok(projects
            .into_iter()
            .zip(resources)
            .map(|(project, resources)| ProjectWithResources { project, resources })
            .collect())
    }

    fn flatten(&self, _meta: &Meta, item: &ProjectWithResources) -> Result<datalist::Record> {
        let mut record: datalist::Record = flatten_project(&item.project)
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        record.insert("id".to_string(), Value::from(&item.project.id));
        record.insert("resources".to_string(), strings(&item.resources));
        Ok(record)
    }
}

pub fn droplets() -> DataList<DropletsSource, Meta> {
    DataList::new(DropletsSource)
}

pub fn images() -> DataList<ImagesSource, Meta> {
    DataList::new(ImagesSource)
}

pub fn projects() -> DataList<ProjectsSource, Meta> {
    DataList::new(ProjectsSource)
}
