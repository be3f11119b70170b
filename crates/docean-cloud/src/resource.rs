//! Resource kinds and the reconciliation driver
//!
//! A resource kind implements [`Resource`]: four CRUD callbacks plus
//! optional import, plan customization and state upgrade hooks. The
//! [`Reconciler`] drives one callback per host request, building the
//! [`ResourceData`] handle the callback works on and turning it back into
//! persisted state.

use crate::context::Context;
use crate::data::ResourceData;
use crate::diag::Diagnostics;
use crate::error::{CloudError, Result};
use crate::migrate;
use crate::plan::ResourceDiff;
use crate::schema::Schema;
use crate::state::{AttributeMap, InstanceState};
use crate::timeouts::{TIMEOUTS_KEY, Timeouts};
use crate::validate::validate_config;
use async_trait::async_trait;
use std::sync::Arc;

/// A managed resource kind
///
/// `M` is the provider metadata shared by every callback: API services and
/// configuration, constructed once and read-only afterwards.
#[async_trait]
pub trait Resource<M: Sync>: Send + Sync {
    /// Resource type name, e.g. `digitalocean_droplet`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    /// Default per-operation timeouts
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Create the remote object and set the id; then populate computed
    /// attributes
    async fn create(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics>;

    /// Refresh every attribute; clears the id when the object is gone
    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics>;

    async fn update(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics>;

    /// Delete the remote object; an object that is already gone is success
    async fn delete(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics>;

    /// Adopt an existing object by id
    async fn import(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics> {
        let diags = self.read(ctx, d, meta).await?;
        if d.id().is_empty() {
            return Err(CloudError::msg(format!(
                "cannot import non-existent remote object ({})",
                self.type_name()
            )));
        }
        self.import_defaults(d)?;
        Ok(diags)
    }

    /// Fill attributes that are not server-side facts after an import
    fn import_defaults(&self, _d: &mut ResourceData) -> Result<()> {
        Ok(())
    }

    /// Adjust or reject a planned change
    fn customize_diff(&self, _diff: &mut ResourceDiff, _d: &ResourceData) -> Result<()> {
        Ok(())
    }

    /// Transform raw state written with `from_version` into the next version
    async fn upgrade_state(
        &self,
        _ctx: &Context,
        from_version: u32,
        _raw: AttributeMap,
        _meta: &M,
    ) -> Result<AttributeMap> {
        Err(CloudError::StateUpgrade(format!(
            "{} has no upgrader from version {}",
            self.type_name(),
            from_version
        )))
    }
}

/// A read-only data source
#[async_trait]
pub trait DataSource<M: Sync>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Arc<Schema>;

    async fn read(&self, ctx: &Context, d: &mut ResourceData, meta: &M) -> Result<Diagnostics>;
}

/// Result of one reconciliation step
///
/// The state is reported even when the callback failed, so partially
/// applied changes are not lost.
#[derive(Debug)]
pub struct Outcome {
    pub state: Option<InstanceState>,
    pub result: Result<Diagnostics>,
}

impl Outcome {
    fn failed(state: Option<InstanceState>, err: CloudError) -> Self {
        Self {
            state,
            result: Err(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Carry timeout overrides on the resulting state
    fn with_timeouts(mut self, timeouts: AttributeMap) -> Self {
        if let Some(state) = self.state.as_mut() {
            state.timeouts = timeouts;
        }
        self
    }

    pub fn into_result(self) -> Result<(Option<InstanceState>, Diagnostics)> {
        let diags = self.result?;
        Ok((self.state, diags))
    }
}

/// Drives the callbacks of one resource kind
pub struct Reconciler<'a, M: Sync> {
    resource: &'a dyn Resource<M>,
    meta: &'a M,
}

impl<'a, M: Sync> Reconciler<'a, M> {
    pub fn new(resource: &'a dyn Resource<M>, meta: &'a M) -> Self {
        Self { resource, meta }
    }

    fn timeouts(&self, config: &AttributeMap) -> Result<Timeouts> {
        self.resource.timeouts().with_overrides(config)
    }

    /// Timeouts for callbacks that only see state
    fn stored_timeouts(&self, state: &InstanceState) -> Result<Timeouts> {
        self.resource.timeouts().with_override_map(&state.timeouts)
    }

    fn prepare(&self, prior: Option<&InstanceState>, config: &AttributeMap) -> Result<(ResourceData, Diagnostics)> {
        let schema = self.resource.schema();
        let warnings = validate_config(&schema.block, config)?;
        let d = ResourceData::planned(schema, prior, config).with_timeouts(self.timeouts(config)?);
        Ok((d, warnings))
    }

    /// Plan the change from `prior` to `config`; `None` config plans a delete
    pub async fn plan(
        &self,
        ctx: &Context,
        prior: Option<InstanceState>,
        config: Option<&AttributeMap>,
    ) -> Result<ResourceDiff> {
        let Some(config) = config else {
            return Ok(ResourceDiff::destroy(self.resource.type_name()));
        };
        let prior = match prior {
            Some(state) => Some(self.upgrade(ctx, state).await?),
            None => None,
        };
        let (d, _) = self.prepare(prior.as_ref(), config)?;
        let mut diff = ResourceDiff::compute(self.resource.type_name(), &d);
        self.resource.customize_diff(&mut diff, &d)?;
        Ok(diff)
    }

    /// Bring stored state up to the current schema version
    pub async fn upgrade(&self, ctx: &Context, state: InstanceState) -> Result<InstanceState> {
        migrate::upgrade_instance(self.resource, ctx, self.meta, state).await
    }

    pub async fn create(&self, ctx: &Context, config: &AttributeMap) -> Outcome {
        let (mut d, mut diags) = match self.prepare(None, config) {
            Ok(prepared) => prepared,
            Err(e) => return Outcome::failed(None, e),
        };
        tracing::info!("creating {}", self.resource.type_name());
        let result = self.resource.create(ctx, &mut d, self.meta).await;
        finish(d, result.map(|more| {
            diags.extend(more);
            diags
        }))
        .with_timeouts(config_timeouts(config))
    }

    pub async fn read(&self, ctx: &Context, state: InstanceState) -> Outcome {
        let state = match self.upgrade(ctx, state).await {
            Ok(state) => state,
            Err(e) => return Outcome::failed(None, e),
        };
        let timeouts = match self.stored_timeouts(&state) {
            Ok(timeouts) => timeouts,
            Err(e) => return Outcome::failed(Some(state), e),
        };
        let mut d = ResourceData::from_state(self.resource.schema(), &state).with_timeouts(timeouts);
        let result = self.resource.read(ctx, &mut d, self.meta).await;
        if result.is_ok() && d.id().is_empty() {
            tracing::info!("{} {} is gone", self.resource.type_name(), state.id);
        }
        finish(d, result).with_timeouts(state.timeouts)
    }

    pub async fn update(&self, ctx: &Context, state: InstanceState, config: &AttributeMap) -> Outcome {
        let prior = match self.upgrade(ctx, state).await {
            Ok(state) => state,
            Err(e) => return Outcome::failed(None, e),
        };
        let (mut d, mut diags) = match self.prepare(Some(&prior), config) {
            Ok(prepared) => prepared,
            Err(e) => return Outcome::failed(Some(prior), e),
        };
        tracing::info!("updating {} {}", self.resource.type_name(), prior.id);
        let result = self.resource.update(ctx, &mut d, self.meta).await;
        finish(d, result.map(|more| {
            diags.extend(more);
            diags
        }))
        .with_timeouts(config_timeouts(config))
    }

    pub async fn delete(&self, ctx: &Context, state: InstanceState) -> Outcome {
        let timeouts = match self.stored_timeouts(&state) {
            Ok(timeouts) => timeouts,
            Err(e) => return Outcome::failed(Some(state), e),
        };
        let mut d = ResourceData::from_state(self.resource.schema(), &state).with_timeouts(timeouts);
        tracing::info!("deleting {} {}", self.resource.type_name(), state.id);
        match self.resource.delete(ctx, &mut d, self.meta).await {
            Ok(diags) => Outcome {
                state: None,
                result: Ok(diags),
            },
            Err(e) => Outcome::failed(Some(state), e),
        }
    }

    pub async fn import(&self, ctx: &Context, id: &str) -> Outcome {
        let mut d = ResourceData::new(self.resource.schema()).with_timeouts(self.resource.timeouts());
        d.set_id(id);
        tracing::info!("importing {} {}", self.resource.type_name(), id);
        let result = self.resource.import(ctx, &mut d, self.meta).await;
        finish(d, result)
    }
}

fn finish(d: ResourceData, result: Result<Diagnostics>) -> Outcome {
    Outcome {
        state: d.state(),
        result,
    }
}

fn config_timeouts(config: &AttributeMap) -> AttributeMap {
    config
        .get(TIMEOUTS_KEY)
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default()
}

/// Runs a data source against its configuration
pub async fn read_data_source<M: Sync>(
    source: &dyn DataSource<M>,
    ctx: &Context,
    config: &AttributeMap,
    meta: &M,
) -> Result<(InstanceState, Diagnostics)> {
    let schema = source.schema();
    let mut diags = validate_config(&schema.block, config)?;
    let mut d = ResourceData::planned(schema, None, config);
    diags.extend(source.read(ctx, &mut d, meta).await?);
    let state = d
        .state()
        .ok_or_else(|| CloudError::DataList(format!("{} did not set an id", source.type_name())))?;
    Ok((state, diags))
}
