//! In-memory stand-in for the DigitalOcean API
//!
//! Actions complete immediately. Every mutating call is appended to the
//! call log so tests can assert on ordering.

#![allow(dead_code)]

use async_trait::async_trait;
use docean_api::apps::{
    AlertDestinationUpdateRequest, AppCreateRequest, AppUpdateRequest, DeploymentProgress,
    DeploymentProgressStep,
};
use docean_api::cdn::{CdnCreateRequest, CdnUpdateCustomDomainRequest};
use docean_api::droplets::{
    DropletBackupPolicy, DropletCreateImage, DropletImage, NetworkV4, NetworkV6, Networks, Region,
};
use docean_api::projects::{ProjectCreateRequest, ProjectUpdateRequest};
use docean_api::{
    ACTION_COMPLETED, ACTION_IN_PROGRESS, Account, AccountService, Action, ActionsService,
    ApiError, App, AppsService, Cdn, CdnService, Certificate, CertificateRequest,
    CertificatesService, Deployment, Droplet, DropletActionsService, DropletCreateRequest,
    DropletsService, Error, Image, ImagesService, ListOptions, LoadBalancer, LoadBalancerRequest,
    LoadBalancersService, Page, Project, ProjectResource, ProjectsService, Result,
    StorageActionsService, TaggedResource, TagsService, Volume, VolumeCreateRequest,
    VolumesService, Vpc, VpcsService,
};
use docean_api::apps::AppAlert;
use docean_config::Config;
use docean_provider::Meta;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_PROJECT: &str = "proj-default";
pub const CREATED_AT: &str = "2024-05-01T12:00:00Z";

fn api_error(status: u16, message: impl Into<String>) -> Error {
    Error::Api(ApiError::new(status, message))
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> Error {
    api_error(404, format!("{kind} {id} not found"))
}

/// Memory, vCPUs and disk of the sizes tests use
fn size_spec(slug: &str) -> (i64, i64, i64) {
    match slug {
        "s-1vcpu-1gb" => (1024, 1, 25),
        "s-1vcpu-2gb" => (2048, 1, 50),
        "s-2vcpu-2gb" => (2048, 2, 60),
        "s-2vcpu-4gb" => (4096, 2, 80),
        _ => (512, 1, 10),
    }
}

#[derive(Default)]
pub struct State {
    next_id: i64,
    pub calls: Vec<String>,
    pub droplets: BTreeMap<i64, Droplet>,
    pub volumes: BTreeMap<String, Volume>,
    pub certificates: BTreeMap<String, Certificate>,
    pub cdns: BTreeMap<String, Cdn>,
    pub load_balancers: BTreeMap<String, LoadBalancer>,
    pub projects: BTreeMap<String, Project>,
    /// URNs by project id
    pub project_resources: BTreeMap<String, Vec<String>>,
    pub apps: BTreeMap<String, App>,
    /// Deployments by app id, most recent first
    pub deployments: BTreeMap<String, Vec<Deployment>>,
    pub alerts: BTreeMap<String, Vec<AppAlert>>,
    pub images: Vec<Image>,
    pub vpcs: Vec<Vpc>,
    /// When false, deployments stay in the build phase forever
    pub deployments_succeed: bool,
    /// Number of upcoming project deletes answered with 412
    pub project_delete_conflicts: u32,
    /// When true, a detach finishes only once its action is polled
    pub slow_detach: bool,
    /// In-flight detaches: action id to (volume, droplet)
    pending_detaches: BTreeMap<i64, (String, i64)>,
    /// Droplet reads a shutdown keeps reporting `active` for
    pub shutdown_polls: u32,
    shutting_down: BTreeMap<i64, u32>,
}

impl State {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn log(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn action(&mut self, kind: &str, resource_id: i64) -> Action {
        Action {
            id: self.next(),
            status: ACTION_COMPLETED.to_string(),
            action_type: kind.to_string(),
            started_at: Some(CREATED_AT.to_string()),
            completed_at: Some(CREATED_AT.to_string()),
            resource_id,
            resource_type: "droplet".to_string(),
            region_slug: None,
        }
    }

    fn detach_now(&mut self, volume_id: &str, droplet_id: i64) {
        if let Some(droplet) = self.droplets.get_mut(&droplet_id) {
            droplet.volume_ids.retain(|v| v != volume_id);
        }
        if let Some(volume) = self.volumes.get_mut(volume_id) {
            volume.droplet_ids.retain(|d| *d != droplet_id);
        }
    }

    fn droplet_mut(&mut self, id: i64) -> Result<&mut Droplet> {
        self.droplets.get_mut(&id).ok_or_else(|| not_found("droplet", id))
    }

    fn unassign(&mut self, urn: &str) {
        for urns in self.project_resources.values_mut() {
            urns.retain(|u| u != urn);
        }
    }

    pub fn add_volume(&mut self, id: &str, region: &str, size_gigabytes: i64) {
        self.volumes.insert(
            id.to_string(),
            Volume {
                id: id.to_string(),
                region: Some(Region {
                    slug: region.to_string(),
                    ..Default::default()
                }),
                name: id.to_string(),
                size_gigabytes,
                created_at: CREATED_AT.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn add_project(&mut self, id: &str, name: &str, urns: &[&str]) {
        self.projects.insert(
            id.to_string(),
            Project {
                id: id.to_string(),
                name: name.to_string(),
                purpose: "Web Application".to_string(),
                created_at: CREATED_AT.to_string(),
                updated_at: CREATED_AT.to_string(),
                ..Default::default()
            },
        );
        self.project_resources
            .insert(id.to_string(), urns.iter().map(|u| u.to_string()).collect());
    }

    fn start_deployment(&mut self, app_id: &str, cause: &str) {
        let id = format!("dep-{}", self.next());
        let succeeded = self.deployments_succeed;
        let status = if succeeded { "SUCCESS" } else { "RUNNING" };
        let steps = ["build", "deploy"]
            .iter()
            .map(|name| DeploymentProgressStep {
                name: name.to_string(),
                status: status.to_string(),
                reason: None,
            })
            .collect::<Vec<_>>();
        let deployment = Deployment {
            id,
            phase: if succeeded { "ACTIVE" } else { "BUILDING" }.to_string(),
            cause: cause.to_string(),
            progress: Some(DeploymentProgress {
                pending_steps: 0,
                running_steps: if succeeded { 0 } else { 2 },
                success_steps: if succeeded { 2 } else { 0 },
                error_steps: 0,
                total_steps: 2,
                steps,
            }),
            created_at: CREATED_AT.to_string(),
        };
        if let Some(app) = self.apps.get_mut(app_id) {
            if succeeded {
                app.active_deployment = Some(deployment.clone());
                app.in_progress_deployment = None;
            } else {
                app.in_progress_deployment = Some(deployment.clone());
            }
        }
        self.deployments
            .entry(app_id.to_string())
            .or_default()
            .insert(0, deployment);
    }

    /// App-level alerts mirror the spec, keeping routed destinations
    fn sync_alerts(&mut self, app_id: &str) {
        let Some(spec) = self.apps.get(app_id).and_then(|a| a.spec.clone()) else {
            return;
        };
        let previous = self.alerts.remove(app_id).unwrap_or_default();
        let alerts = spec
            .alerts
            .iter()
            .enumerate()
            .map(|(i, alert)| {
                let prior = previous
                    .iter()
                    .find(|p| p.spec.as_ref().is_some_and(|s| s.rule == alert.rule));
                AppAlert {
                    id: format!("alert-{app_id}-{i}"),
                    component_name: String::new(),
                    spec: Some(alert.clone()),
                    emails: prior.map(|p| p.emails.clone()).unwrap_or_default(),
                    slack_webhooks: prior.map(|p| p.slack_webhooks.clone()).unwrap_or_default(),
                    phase: "CONFIGURED".to_string(),
                }
            })
            .collect();
        self.alerts.insert(app_id.to_string(), alerts);
    }
}

pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        let mut state = State {
            deployments_succeed: true,
            ..State::default()
        };
        state.projects.insert(
            DEFAULT_PROJECT.to_string(),
            Project {
                id: DEFAULT_PROJECT.to_string(),
                name: "first-project".to_string(),
                purpose: "Web Application".to_string(),
                is_default: true,
                created_at: CREATED_AT.to_string(),
                ..Default::default()
            },
        );
        state.project_resources.insert(DEFAULT_PROJECT.to_string(), Vec::new());
        state.vpcs.push(Vpc {
            id: "vpc-default".to_string(),
            urn: "do:vpc:vpc-default".to_string(),
            name: "default-nyc3".to_string(),
            ip_range: "10.116.0.0/20".to_string(),
            region: "nyc3".to_string(),
            default: true,
            created_at: CREATED_AT.to_string(),
            ..Default::default()
        });
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state())
    }
}

/// Provider metadata backed by `fake`, independent of the environment
pub fn meta(fake: &Arc<FakeCloud>) -> Meta {
    let config = Config::builder()
        .token("test-token")
        .build_with(|_| None)
        .unwrap();
    Meta::from_services(config, fake.clone())
}

pub fn config(value: serde_json::Value) -> docean_cloud::AttributeMap {
    value.as_object().cloned().unwrap()
}

#[async_trait]
impl AccountService for FakeCloud {
    async fn get(&self) -> Result<Account> {
        Ok(Account {
            uuid: "acct-1".to_string(),
            email: "ops@example.com".to_string(),
            email_verified: true,
            droplet_limit: 25,
            status: "active".to_string(),
        })
    }
}

#[async_trait]
impl ActionsService for FakeCloud {
    async fn get(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            if let Some((volume_id, droplet_id)) = s.pending_detaches.remove(&id) {
                s.detach_now(&volume_id, droplet_id);
                s.log(format!("detached {volume_id} {droplet_id}"));
            }
        });
        Ok(Action {
            id,
            status: ACTION_COMPLETED.to_string(),
            completed_at: Some(CREATED_AT.to_string()),
            ..Default::default()
        })
    }
}

// ============ Droplets ============

#[async_trait]
impl DropletsService for FakeCloud {
    async fn get(&self, id: i64) -> Result<Droplet> {
        self.with(|s| {
            if let Some(left) = s.shutting_down.get_mut(&id) {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    s.shutting_down.remove(&id);
                    s.droplet_mut(id)?.status = "off".to_string();
                    s.log(format!("off {id}"));
                }
            }
            s.droplets.get(&id).cloned().ok_or_else(|| not_found("droplet", id))
        })
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<Droplet>> {
        self.with(|s| Ok(Page::last(s.droplets.values().cloned().collect())))
    }

    async fn create(&self, req: &DropletCreateRequest) -> Result<Droplet> {
        self.with(|s| {
            let id = s.next();
            let (memory, vcpus, disk) = size_spec(&req.size);
            let image = match &req.image {
                DropletCreateImage::Id(id) => DropletImage {
                    id: *id,
                    ..Default::default()
                },
                DropletCreateImage::Slug(slug) => DropletImage {
                    id: 1000,
                    slug: slug.clone(),
                    ..Default::default()
                },
            };
            let mut features = Vec::new();
            if req.backups {
                features.push("backups".to_string());
            }
            if req.monitoring {
                features.push("monitoring".to_string());
            }
            let v6 = if req.ipv6 {
                vec![NetworkV6 {
                    ip_address: format!("2604:A880::{id}"),
                    netmask: 64,
                    network_type: "public".to_string(),
                    ..Default::default()
                }]
            } else {
                Vec::new()
            };
            let droplet = Droplet {
                id,
                name: req.name.clone(),
                memory,
                vcpus,
                disk,
                region: Some(Region {
                    slug: req.region.clone(),
                    available: true,
                    ..Default::default()
                }),
                image: Some(image),
                size_slug: req.size.clone(),
                volume_ids: req.volumes.clone(),
                features,
                status: "active".to_string(),
                networks: Some(Networks {
                    v4: vec![
                        NetworkV4 {
                            ip_address: format!("203.0.113.{id}"),
                            network_type: "public".to_string(),
                            ..Default::default()
                        },
                        NetworkV4 {
                            ip_address: format!("10.116.0.{id}"),
                            network_type: "private".to_string(),
                            ..Default::default()
                        },
                    ],
                    v6,
                }),
                created_at: CREATED_AT.to_string(),
                tags: req.tags.clone(),
                vpc_uuid: if req.vpc_uuid.is_empty() {
                    "vpc-default".to_string()
                } else {
                    req.vpc_uuid.clone()
                },
                ..Default::default()
            };
            for volume in &req.volumes {
                if let Some(v) = s.volumes.get_mut(volume) {
                    v.droplet_ids.push(id);
                }
            }
            s.log(format!("create droplet {}", req.name));
            s.droplets.insert(id, droplet.clone());
            s.project_resources
                .entry(DEFAULT_PROJECT.to_string())
                .or_default()
                .push(droplet.urn());
            Ok(droplet)
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.with(|s| {
            let droplet = s.droplets.remove(&id).ok_or_else(|| not_found("droplet", id))?;
            for volume in s.volumes.values_mut() {
                volume.droplet_ids.retain(|d| *d != id);
            }
            s.unassign(&droplet.urn());
            s.log(format!("delete droplet {id}"));
            Ok(())
        })
    }
}

#[async_trait]
impl DropletActionsService for FakeCloud {
    async fn power_on(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?.status = "active".to_string();
            s.log(format!("power_on {id}"));
            Ok(s.action("power_on", id))
        })
    }

    async fn power_off(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            let droplet = s.droplet_mut(id)?;
            if droplet.status == "off" {
                return Err(api_error(422, "Droplet is already powered off."));
            }
            droplet.status = "off".to_string();
            s.log(format!("power_off {id}"));
            Ok(s.action("power_off", id))
        })
    }

    async fn shutdown(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            let polls = s.shutdown_polls;
            let droplet = s.droplet_mut(id)?;
            if droplet.status == "off" {
                return Err(api_error(422, "Droplet is already powered off."));
            }
            if polls == 0 {
                droplet.status = "off".to_string();
            } else {
                s.shutting_down.insert(id, polls);
            }
            s.log(format!("shutdown {id}"));
            Ok(s.action("shutdown", id))
        })
    }

    /// Disks never shrink; the droplet must be off
    async fn resize(&self, id: i64, size: &str, resize_disk: bool) -> Result<Action> {
        self.with(|s| {
            let droplet = s.droplet_mut(id)?;
            if droplet.status != "off" {
                return Err(api_error(422, "droplet must be powered off to resize"));
            }
            let (memory, vcpus, disk) = size_spec(size);
            if disk < droplet.disk {
                return Err(api_error(
                    422,
                    format!("size {size} has a smaller disk than the droplet"),
                ));
            }
            droplet.size_slug = size.to_string();
            droplet.memory = memory;
            droplet.vcpus = vcpus;
            if resize_disk {
                droplet.disk = disk;
            }
            s.log(format!("resize {id} {size} resize_disk={resize_disk}"));
            Ok(s.action("resize", id))
        })
    }

    async fn rename(&self, id: i64, name: &str) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?.name = name.to_string();
            s.log(format!("rename {id} {name}"));
            Ok(s.action("rename", id))
        })
    }

    async fn enable_ipv6(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            let droplet = s.droplet_mut(id)?;
            if let Some(networks) = droplet.networks.as_mut() {
                networks.v6.push(NetworkV6 {
                    ip_address: format!("2604:A880::{id}"),
                    netmask: 64,
                    network_type: "public".to_string(),
                    ..Default::default()
                });
            }
            s.log(format!("enable_ipv6 {id}"));
            Ok(s.action("enable_ipv6", id))
        })
    }

    async fn enable_private_networking(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?;
            s.log(format!("enable_private_networking {id}"));
            Ok(s.action("enable_private_networking", id))
        })
    }

    async fn enable_backups(&self, id: i64, policy: Option<&DropletBackupPolicy>) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?.features.push("backups".to_string());
            let plan = policy.map(|p| p.plan.as_str()).unwrap_or("default");
            s.log(format!("enable_backups {id} {plan}"));
            Ok(s.action("enable_backups", id))
        })
    }

    async fn change_backup_policy(&self, id: i64, policy: &DropletBackupPolicy) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?;
            s.log(format!("change_backup_policy {id} {}", policy.plan));
            Ok(s.action("change_backup_policy", id))
        })
    }

    async fn disable_backups(&self, id: i64) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(id)?.features.retain(|f| f != "backups");
            s.log(format!("disable_backups {id}"));
            Ok(s.action("disable_backups", id))
        })
    }
}

// ============ Volumes ============

#[async_trait]
impl VolumesService for FakeCloud {
    async fn get(&self, id: &str) -> Result<Volume> {
        self.with(|s| s.volumes.get(id).cloned().ok_or_else(|| not_found("volume", id)))
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<Volume>> {
        self.with(|s| Ok(Page::last(s.volumes.values().cloned().collect())))
    }

    async fn create(&self, req: &VolumeCreateRequest) -> Result<Volume> {
        self.with(|s| {
            let id = format!("vol-{}", s.next());
            s.add_volume(&id, &req.region, req.size_gigabytes);
            let volume = s.volumes.get_mut(&id).ok_or_else(|| not_found("volume", &id))?;
            volume.name = req.name.clone();
            volume.description = req.description.clone();
            volume.filesystem_type = req.filesystem_type.clone();
            volume.filesystem_label = req.filesystem_label.clone();
            volume.tags = req.tags.clone();
            let volume = volume.clone();
            s.log(format!("create volume {}", req.name));
            Ok(volume)
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            let volume = s.volumes.get(id).ok_or_else(|| not_found("volume", id))?;
            if !volume.droplet_ids.is_empty() {
                return Err(api_error(409, "volume is attached to a droplet"));
            }
            s.volumes.remove(id);
            s.log(format!("delete volume {id}"));
            Ok(())
        })
    }
}

#[async_trait]
impl StorageActionsService for FakeCloud {
    async fn attach(&self, volume_id: &str, droplet_id: i64) -> Result<Action> {
        self.with(|s| {
            let droplet = s.droplet_mut(droplet_id)?;
            if !droplet.volume_ids.iter().any(|v| v == volume_id) {
                droplet.volume_ids.push(volume_id.to_string());
            }
            if let Some(volume) = s.volumes.get_mut(volume_id) {
                volume.droplet_ids.push(droplet_id);
            }
            s.log(format!("attach {volume_id} {droplet_id}"));
            Ok(s.action("attach", droplet_id))
        })
    }

    async fn detach(&self, volume_id: &str, droplet_id: i64) -> Result<Action> {
        self.with(|s| {
            s.droplet_mut(droplet_id)?;
            s.log(format!("detach {volume_id} {droplet_id}"));
            let mut action = s.action("detach", droplet_id);
            if s.slow_detach {
                action.status = ACTION_IN_PROGRESS.to_string();
                action.completed_at = None;
                s.pending_detaches
                    .insert(action.id, (volume_id.to_string(), droplet_id));
            } else {
                s.detach_now(volume_id, droplet_id);
            }
            Ok(action)
        })
    }

    async fn resize(&self, volume_id: &str, size_gigabytes: i64, _region: &str) -> Result<Action> {
        self.with(|s| {
            let volume = s.volumes.get_mut(volume_id).ok_or_else(|| not_found("volume", volume_id))?;
            if size_gigabytes < volume.size_gigabytes {
                return Err(api_error(422, "volumes cannot shrink"));
            }
            volume.size_gigabytes = size_gigabytes;
            s.log(format!("resize volume {volume_id} {size_gigabytes}"));
            Ok(s.action("resize", 0))
        })
    }
}

// ============ Certificates ============

#[async_trait]
impl CertificatesService for FakeCloud {
    async fn get(&self, id: &str) -> Result<Certificate> {
        self.with(|s| s.certificates.get(id).cloned().ok_or_else(|| not_found("certificate", id)))
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<Certificate>> {
        self.with(|s| Ok(Page::last(s.certificates.values().cloned().collect())))
    }

    async fn create(&self, req: &CertificateRequest) -> Result<Certificate> {
        self.with(|s| {
            let id = format!("cert-{:04}-uuid", s.next());
            let certificate = Certificate {
                id: id.clone(),
                name: req.name.clone(),
                dns_names: req.dns_names.clone(),
                not_after: "2025-05-01T12:00:00Z".to_string(),
                sha1_fingerprint: "dfcc9f57d86bf58e321c2c6c31c7a971be244ac7".to_string(),
                created_at: CREATED_AT.to_string(),
                state: "verified".to_string(),
                certificate_type: req.certificate_type.clone(),
            };
            s.certificates.insert(id, certificate.clone());
            s.log(format!("create certificate {}", req.name));
            Ok(certificate)
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            s.certificates.remove(id).ok_or_else(|| not_found("certificate", id))?;
            s.log(format!("delete certificate {id}"));
            Ok(())
        })
    }
}

// ============ CDN ============

#[async_trait]
impl CdnService for FakeCloud {
    async fn get(&self, id: &str) -> Result<Cdn> {
        self.with(|s| s.cdns.get(id).cloned().ok_or_else(|| not_found("cdn", id)))
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<Cdn>> {
        self.with(|s| Ok(Page::last(s.cdns.values().cloned().collect())))
    }

    async fn create(&self, req: &CdnCreateRequest) -> Result<Cdn> {
        self.with(|s| {
            let id = format!("cdn-{}", s.next());
            let origin_host = req.origin.replace(".digitaloceanspaces.com", "");
            let cdn = Cdn {
                id: id.clone(),
                origin: req.origin.clone(),
                endpoint: format!("{origin_host}.cdn.digitaloceanspaces.com"),
                created_at: CREATED_AT.to_string(),
                ttl: if req.ttl == 0 { 3600 } else { req.ttl },
                certificate_id: req.certificate_id.clone(),
                custom_domain: req.custom_domain.clone(),
            };
            s.cdns.insert(id, cdn.clone());
            s.log(format!("create cdn {}", req.origin));
            Ok(cdn)
        })
    }

    async fn update_ttl(&self, id: &str, ttl: u32) -> Result<Cdn> {
        self.with(|s| {
            let cdn = s.cdns.get_mut(id).ok_or_else(|| not_found("cdn", id))?;
            cdn.ttl = ttl;
            let cdn = cdn.clone();
            s.log(format!("update cdn ttl {id} {ttl}"));
            Ok(cdn)
        })
    }

    async fn update_custom_domain(&self, id: &str, req: &CdnUpdateCustomDomainRequest) -> Result<Cdn> {
        self.with(|s| {
            let cdn = s.cdns.get_mut(id).ok_or_else(|| not_found("cdn", id))?;
            cdn.custom_domain = req.custom_domain.clone();
            cdn.certificate_id = req.certificate_id.clone();
            let cdn = cdn.clone();
            s.log(format!("update cdn domain {id} {}", req.custom_domain));
            Ok(cdn)
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            s.cdns.remove(id).ok_or_else(|| not_found("cdn", id))?;
            s.log(format!("delete cdn {id}"));
            Ok(())
        })
    }
}

// ============ Load balancers ============

fn apply_lb_request(lb: &mut LoadBalancer, req: &LoadBalancerRequest) {
    lb.name = req.name.clone();
    lb.algorithm = req.algorithm.clone();
    lb.region = Some(Region {
        slug: req.region.clone(),
        available: true,
        ..Default::default()
    });
    lb.size_slug = req.size_slug.clone();
    lb.size_unit = req.size_unit;
    lb.lb_type = req.lb_type.clone();
    lb.forwarding_rules = req.forwarding_rules.clone();
    lb.health_check = req.health_check.clone();
    lb.sticky_sessions = req.sticky_sessions.clone();
    lb.droplet_ids = req.droplet_ids.clone();
    lb.tag = req.tag.clone();
    lb.redirect_http_to_https = req.redirect_http_to_https;
    lb.enable_proxy_protocol = req.enable_proxy_protocol;
    lb.enable_backend_keepalive = req.enable_backend_keepalive;
    lb.http_idle_timeout_seconds = req.http_idle_timeout_seconds;
    lb.vpc_uuid = req.vpc_uuid.clone();
    lb.project_id = req.project_id.clone();
    lb.disable_lets_encrypt_dns_records = req.disable_lets_encrypt_dns_records;
    lb.firewall = req.firewall.clone();
    lb.domains = req.domains.clone();
    lb.glb_settings = req.glb_settings.clone();
    lb.network = req.network.clone();
}

#[async_trait]
impl LoadBalancersService for FakeCloud {
    async fn get(&self, id: &str) -> Result<LoadBalancer> {
        self.with(|s| s.load_balancers.get(id).cloned().ok_or_else(|| not_found("load balancer", id)))
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<LoadBalancer>> {
        self.with(|s| Ok(Page::last(s.load_balancers.values().cloned().collect())))
    }

    async fn create(&self, req: &LoadBalancerRequest) -> Result<LoadBalancer> {
        self.with(|s| {
            let n = s.next();
            let mut lb = LoadBalancer {
                id: format!("lb-{n}"),
                ip: format!("198.51.100.{n}"),
                status: "active".to_string(),
                created_at: CREATED_AT.to_string(),
                ..Default::default()
            };
            apply_lb_request(&mut lb, req);
            s.load_balancers.insert(lb.id.clone(), lb.clone());
            s.log(format!("create load balancer {}", req.name));
            Ok(lb)
        })
    }

    async fn update(&self, id: &str, req: &LoadBalancerRequest) -> Result<LoadBalancer> {
        self.with(|s| {
            let lb = s.load_balancers.get_mut(id).ok_or_else(|| not_found("load balancer", id))?;
            apply_lb_request(lb, req);
            let lb = lb.clone();
            s.log(format!("update load balancer {id}"));
            Ok(lb)
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            s.load_balancers.remove(id).ok_or_else(|| not_found("load balancer", id))?;
            s.log(format!("delete load balancer {id}"));
            Ok(())
        })
    }
}

// ============ Projects ============

#[async_trait]
impl ProjectsService for FakeCloud {
    async fn list(&self, _opt: ListOptions) -> Result<Page<Project>> {
        self.with(|s| Ok(Page::last(s.projects.values().cloned().collect())))
    }

    async fn get(&self, id: &str) -> Result<Project> {
        self.with(|s| s.projects.get(id).cloned().ok_or_else(|| not_found("project", id)))
    }

    async fn get_default(&self) -> Result<Project> {
        self.with(|s| {
            s.projects
                .values()
                .find(|p| p.is_default)
                .cloned()
                .ok_or_else(|| not_found("project", "default"))
        })
    }

    async fn create(&self, req: &ProjectCreateRequest) -> Result<Project> {
        self.with(|s| {
            let id = format!("proj-{}", s.next());
            let project = Project {
                id: id.clone(),
                owner_uuid: "acct-1".to_string(),
                owner_id: 1,
                name: req.name.clone(),
                description: req.description.clone(),
                purpose: req.purpose.clone(),
                environment: req.environment.clone(),
                is_default: false,
                created_at: CREATED_AT.to_string(),
                updated_at: CREATED_AT.to_string(),
            };
            s.projects.insert(id.clone(), project.clone());
            s.project_resources.insert(id, Vec::new());
            s.log(format!("create project {}", req.name));
            Ok(project)
        })
    }

    async fn update(&self, id: &str, req: &ProjectUpdateRequest) -> Result<Project> {
        self.with(|s| {
            let project = s.projects.get_mut(id).ok_or_else(|| not_found("project", id))?;
            if let Some(name) = &req.name {
                project.name = name.clone();
            }
            if let Some(description) = &req.description {
                project.description = description.clone();
            }
            if let Some(purpose) = &req.purpose {
                project.purpose = purpose.clone();
            }
            if let Some(environment) = &req.environment {
                project.environment = environment.clone();
            }
            if let Some(is_default) = req.is_default {
                project.is_default = is_default;
            }
            let project = project.clone();
            s.log(format!("update project {id}"));
            Ok(project)
        })
    }

    /// Answers 412 while the project holds resources or a conflict is
    /// queued, like reassignment that has not settled yet
    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            if !s.projects.contains_key(id) {
                return Err(not_found("project", id));
            }
            s.log(format!("delete project {id}"));
            let holds = s.project_resources.get(id).is_some_and(|urns| !urns.is_empty());
            if s.project_delete_conflicts > 0 || holds {
                s.project_delete_conflicts = s.project_delete_conflicts.saturating_sub(1);
                return Err(api_error(412, "Cannot delete a project with resources."));
            }
            s.projects.remove(id);
            s.project_resources.remove(id);
            Ok(())
        })
    }

    async fn list_resources(&self, id: &str, _opt: ListOptions) -> Result<Page<ProjectResource>> {
        self.with(|s| {
            let urns = s.project_resources.get(id).ok_or_else(|| not_found("project", id))?;
            Ok(Page::last(
                urns.iter()
                    .map(|urn| ProjectResource {
                        urn: urn.clone(),
                        assigned_at: CREATED_AT.to_string(),
                        status: "ok".to_string(),
                    })
                    .collect(),
            ))
        })
    }

    async fn assign_resources(&self, id: &str, urns: &[String]) -> Result<Vec<ProjectResource>> {
        self.with(|s| {
            if !s.projects.contains_key(id) {
                return Err(not_found("project", id));
            }
            for urn in urns {
                s.unassign(urn);
            }
            s.project_resources
                .entry(id.to_string())
                .or_default()
                .extend(urns.iter().cloned());
            s.log(format!("assign {} {}", id, urns.join(",")));
            Ok(urns
                .iter()
                .map(|urn| ProjectResource {
                    urn: urn.clone(),
                    assigned_at: CREATED_AT.to_string(),
                    status: "ok".to_string(),
                })
                .collect())
        })
    }
}

// ============ Tags ============

#[async_trait]
impl TagsService for FakeCloud {
    async fn create(&self, name: &str) -> Result<()> {
        self.with(|s| s.log(format!("create tag {name}")));
        Ok(())
    }

    async fn tag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()> {
        self.with(|s| {
            for resource in resources {
                if let Ok(id) = resource.resource_id.parse::<i64>() {
                    if let Some(droplet) = s.droplets.get_mut(&id) {
                        if !droplet.tags.iter().any(|t| t == name) {
                            droplet.tags.push(name.to_string());
                        }
                    }
                }
                s.log(format!("tag {} {}", resource.resource_id, name));
            }
        });
        Ok(())
    }

    async fn untag_resources(&self, name: &str, resources: &[TaggedResource]) -> Result<()> {
        self.with(|s| {
            for resource in resources {
                if let Ok(id) = resource.resource_id.parse::<i64>() {
                    if let Some(droplet) = s.droplets.get_mut(&id) {
                        droplet.tags.retain(|t| t != name);
                    }
                }
                s.log(format!("untag {} {}", resource.resource_id, name));
            }
        });
        Ok(())
    }
}

// ============ Apps ============

#[async_trait]
impl AppsService for FakeCloud {
    async fn get(&self, id: &str) -> Result<App> {
        self.with(|s| s.apps.get(id).cloned().ok_or_else(|| not_found("app", id)))
    }

    async fn list(&self, _opt: ListOptions) -> Result<Page<App>> {
        self.with(|s| Ok(Page::last(s.apps.values().cloned().collect())))
    }

    async fn create(&self, req: &AppCreateRequest) -> Result<App> {
        self.with(|s| {
            let id = format!("app-{}", s.next());
            let project_id = if req.project_id.is_empty() {
                DEFAULT_PROJECT.to_string()
            } else {
                req.project_id.clone()
            };
            let ingress = format!("https://{}.ondigitalocean.app", req.spec.name);
            let app = App {
                id: id.clone(),
                owner_uuid: "acct-1".to_string(),
                spec: Some(req.spec.clone()),
                default_ingress: ingress.clone(),
                live_url: ingress.clone(),
                live_url_base: ingress,
                live_domain: format!("{}.ondigitalocean.app", req.spec.name),
                created_at: CREATED_AT.to_string(),
                updated_at: CREATED_AT.to_string(),
                project_id: project_id.clone(),
                ..Default::default()
            };
            s.apps.insert(id.clone(), app);
            s.unassign(&format!("do:app:{id}"));
            s.project_resources
                .entry(project_id)
                .or_default()
                .push(format!("do:app:{id}"));
            s.start_deployment(&id, "initial deployment");
            s.sync_alerts(&id);
            s.log(format!("create app {}", req.spec.name));
            s.apps.get(&id).cloned().ok_or_else(|| not_found("app", &id))
        })
    }

    async fn update(&self, id: &str, req: &AppUpdateRequest) -> Result<App> {
        self.with(|s| {
            let app = s.apps.get_mut(id).ok_or_else(|| not_found("app", id))?;
            app.spec = Some(req.spec.clone());
            app.updated_at = "2024-05-02T12:00:00Z".to_string();
            s.start_deployment(id, "app spec updated");
            s.sync_alerts(id);
            s.log(format!("update app {id}"));
            s.apps.get(id).cloned().ok_or_else(|| not_found("app", id))
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            s.apps.remove(id).ok_or_else(|| not_found("app", id))?;
            s.deployments.remove(id);
            s.alerts.remove(id);
            s.unassign(&format!("do:app:{id}"));
            s.log(format!("delete app {id}"));
            Ok(())
        })
    }

    async fn list_deployments(&self, app_id: &str, opt: ListOptions) -> Result<Page<Deployment>> {
        self.with(|s| {
            if !s.apps.contains_key(app_id) {
                return Err(not_found("app", app_id));
            }
            let deployments = s.deployments.get(app_id).cloned().unwrap_or_default();
            Ok(Page::last(
                deployments.into_iter().take(opt.per_page as usize).collect(),
            ))
        })
    }

    async fn get_deployment(&self, app_id: &str, deployment_id: &str) -> Result<Deployment> {
        self.with(|s| {
            s.deployments
                .get(app_id)
                .and_then(|deps| deps.iter().find(|d| d.id == deployment_id))
                .cloned()
                .ok_or_else(|| not_found("deployment", deployment_id))
        })
    }

    async fn list_alerts(&self, app_id: &str) -> Result<Vec<AppAlert>> {
        self.with(|s| {
            if !s.apps.contains_key(app_id) {
                return Err(not_found("app", app_id));
            }
            Ok(s.alerts.get(app_id).cloned().unwrap_or_default())
        })
    }

    async fn update_alert_destinations(
        &self,
        app_id: &str,
        alert_id: &str,
        req: &AlertDestinationUpdateRequest,
    ) -> Result<AppAlert> {
        self.with(|s| {
            let alert = s
                .alerts
                .get_mut(app_id)
                .and_then(|alerts| alerts.iter_mut().find(|a| a.id == alert_id))
                .ok_or_else(|| not_found("alert", alert_id))?;
            alert.emails = req.emails.clone();
            alert.slack_webhooks = req.slack_webhooks.clone();
            let alert = alert.clone();
            s.log(format!("route alert {alert_id}"));
            Ok(alert)
        })
    }
}

// ============ Images and VPCs ============

#[async_trait]
impl ImagesService for FakeCloud {
    async fn list(&self, _opt: ListOptions) -> Result<Page<Image>> {
        self.with(|s| Ok(Page::last(s.images.clone())))
    }

    async fn get(&self, id_or_slug: &str) -> Result<Image> {
        self.with(|s| {
            s.images
                .iter()
                .find(|i| i.id.to_string() == id_or_slug || i.slug.as_deref() == Some(id_or_slug))
                .cloned()
                .ok_or_else(|| not_found("image", id_or_slug))
        })
    }
}

#[async_trait]
impl VpcsService for FakeCloud {
    async fn list(&self, _opt: ListOptions) -> Result<Page<Vpc>> {
        self.with(|s| Ok(Page::last(s.vpcs.clone())))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.with(|s| {
            let before = s.vpcs.len();
            s.vpcs.retain(|v| v.id != id);
            if s.vpcs.len() == before {
                return Err(not_found("vpc", id));
            }
            s.log(format!("delete vpc {id}"));
            Ok(())
        })
    }
}
