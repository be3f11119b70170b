//! Shared provider metadata handed to every callback

use docean_api::{
    AccountService, ActionsService, AppsService, CdnService, CertificatesService, Client,
    DropletActionsService, DropletsService, ImagesService, LoadBalancersService, ProjectsService,
    StorageActionsService, TagsService, VolumesService, VpcsService,
};
use docean_cloud::{CloudError, Result};
use docean_config::Config;
use std::sync::Arc;

/// Everything the API surface offers, as one bound
pub trait CloudServices:
    AccountService
    + ActionsService
    + AppsService
    + CdnService
    + CertificatesService
    + DropletActionsService
    + DropletsService
    + ImagesService
    + LoadBalancersService
    + ProjectsService
    + StorageActionsService
    + TagsService
    + VolumesService
    + VpcsService
    + 'static
{
}

impl<T> CloudServices for T where
    T: AccountService
        + ActionsService
        + AppsService
        + CdnService
        + CertificatesService
        + DropletActionsService
        + DropletsService
        + ImagesService
        + LoadBalancersService
        + ProjectsService
        + StorageActionsService
        + TagsService
        + VolumesService
        + VpcsService
        + 'static
{
}

/// API services and configuration
///
/// Built once when the provider is configured and read-only afterwards.
#[derive(Clone)]
pub struct Meta {
    pub config: Config,
    pub account: Arc<dyn AccountService>,
    pub actions: Arc<dyn ActionsService>,
    pub apps: Arc<dyn AppsService>,
    pub cdn: Arc<dyn CdnService>,
    pub certificates: Arc<dyn CertificatesService>,
    pub droplet_actions: Arc<dyn DropletActionsService>,
    pub droplets: Arc<dyn DropletsService>,
    pub images: Arc<dyn ImagesService>,
    pub load_balancers: Arc<dyn LoadBalancersService>,
    pub projects: Arc<dyn ProjectsService>,
    pub storage_actions: Arc<dyn StorageActionsService>,
    pub tags: Arc<dyn TagsService>,
    pub volumes: Arc<dyn VolumesService>,
    pub vpcs: Arc<dyn VpcsService>,
}

impl Meta {
    /// Connect to the API described by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let client = Client::from_config(&config).map_err(CloudError::from)?;
        tracing::debug!("configured API client for {}", client.base_url());
        Ok(Self::from_services(config, Arc::new(client)))
    }

    /// Use one value for every service
    pub fn from_services<S: CloudServices>(config: Config, services: Arc<S>) -> Self {
        Self {
            config,
            account: services.clone(),
            actions: services.clone(),
            apps: services.clone(),
            cdn: services.clone(),
            certificates: services.clone(),
            droplet_actions: services.clone(),
            droplets: services.clone(),
            images: services.clone(),
            load_balancers: services.clone(),
            projects: services.clone(),
            storage_actions: services.clone(),
            tags: services.clone(),
            volumes: services.clone(),
            vpcs: services,
        }
    }
}
