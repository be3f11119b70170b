//! The provider: every resource kind and data source by type name

use crate::app::AppResource;
use crate::cdn::CdnResource;
use crate::certificate::CertificateResource;
use crate::data_sources;
use crate::droplet::DropletResource;
use crate::load_balancer::LoadBalancerResource;
use crate::meta::Meta;
use crate::project::{ProjectResource, ProjectResourcesResource};
use crate::sweepers;
use crate::volume::VolumeResource;
use docean_api::Account;
use docean_cloud::migrate::upgrade_instance;
use docean_cloud::{
    AttributeMap, CloudError, Context, DataSource, Diagnostics, InstanceState, Reconciler,
    Resource, Result, StateManager, SweeperRegistry, read_data_source,
};
use docean_config::Config;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Result of an authentication check
#[derive(Debug, Clone, Default)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub account_info: Option<Account>,
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account: Account) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

pub struct Provider {
    meta: Meta,
    resources: BTreeMap<&'static str, Arc<dyn Resource<Meta>>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource<Meta>>>,
}

impl Provider {
    pub fn new(meta: Meta) -> Self {
        let resources: Vec<Arc<dyn Resource<Meta>>> = vec![
            Arc::new(AppResource::new()),
            Arc::new(CdnResource::new()),
            Arc::new(CertificateResource::new()),
            Arc::new(DropletResource::new()),
            Arc::new(LoadBalancerResource::new()),
            Arc::new(ProjectResource::new()),
            Arc::new(ProjectResourcesResource::new()),
            Arc::new(VolumeResource::new()),
        ];
        let data_sources: Vec<Arc<dyn DataSource<Meta>>> = vec![
            Arc::new(data_sources::droplets()),
            Arc::new(data_sources::images()),
            Arc::new(data_sources::projects()),
        ];
        Self {
            meta,
            resources: resources.into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources.into_iter().map(|s| (s.type_name(), s)).collect(),
        }
    }

    /// Configure from the process environment
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env().map_err(|e| CloudError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(Meta::from_config(config)?))
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn resource(&self, type_name: &str) -> Option<&dyn Resource<Meta>> {
        self.resources.get(type_name).map(|r| r.as_ref())
    }

    pub fn data_source(&self, type_name: &str) -> Option<&dyn DataSource<Meta>> {
        self.data_sources.get(type_name).map(|s| s.as_ref())
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    /// Reconciler for one resource kind
    pub fn reconciler(&self, type_name: &str) -> Result<Reconciler<'_, Meta>> {
        let resource = self
            .resource(type_name)
            .ok_or_else(|| CloudError::msg(format!("unknown resource type '{type_name}'")))?;
        Ok(Reconciler::new(resource, &self.meta))
    }

    pub async fn read_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
        config: &AttributeMap,
    ) -> Result<(InstanceState, Diagnostics)> {
        let source = self
            .data_source(type_name)
            .ok_or_else(|| CloudError::msg(format!("unknown data source '{type_name}'")))?;
        read_data_source(source, ctx, config, &self.meta).await
    }

    /// Verify the configured token against the account endpoint
    pub async fn check_auth(&self, ctx: &Context) -> AuthStatus {
        if !self.meta.config.has_token() {
            return AuthStatus::failed("no API token configured");
        }
        match ctx.run(self.meta.account.get()).await {
            Ok(Ok(account)) => {
                tracing::debug!("authenticated as {}", account.email);
                AuthStatus::ok(account)
            }
            Ok(Err(e)) => AuthStatus::failed(e.to_string()),
            Err(e) => AuthStatus::failed(e.to_string()),
        }
    }

    pub fn sweepers(&self) -> Result<SweeperRegistry<Meta>> {
        sweepers::registry()
    }

    /// Upgrade every instance of a state file to the current schema
    /// versions; returns how many instances changed
    ///
    /// Unknown resource kinds are left untouched. Nothing is written when
    /// no instance needed an upgrade.
    pub async fn upgrade_state_file(&self, ctx: &Context, path: impl AsRef<Path>) -> Result<usize> {
        let manager = StateManager::new(path);
        let mut state = manager.load().await?;

        let mut upgraded = Vec::new();
        for (address, entry) in &state.resources {
            let Some(resource) = self.resource(&entry.resource_type) else {
                tracing::warn!("skipping {} of unknown type {}", address, entry.resource_type);
                continue;
            };
            if entry.instance.schema_version == resource.schema().version {
                continue;
            }
            let instance = upgrade_instance(resource, ctx, &self.meta, entry.instance.clone()).await?;
            upgraded.push((address.clone(), instance));
        }

        if upgraded.is_empty() {
            return Ok(0);
        }
        let count = upgraded.len();
        for (address, instance) in upgraded {
            if let Some(entry) = state.resources.get(&address) {
                let mut entry = entry.clone();
                entry.instance = instance;
                state.set_resource(address, entry);
            }
        }
        manager.save(&state).await?;
        tracing::info!("upgraded {} instance(s) in {}", count, manager.path().display());
        Ok(count)
    }
}
