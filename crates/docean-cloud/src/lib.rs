//! docean reconciliation engine
//!
//! The machinery shared by every DigitalOcean resource kind: a typed
//! attribute tree over a schema, plan computation, configuration
//! validation, waiting on asynchronous cloud operations, retrying
//! transient preconditions, schema-versioned state upgrades, generic list
//! data sources and the test sweeper registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 docean-provider                  │
//! │   droplet, volume, certificate, cdn, app, ...    │
//! └─────────────────┬───────────────────────────────┘
//!                   │ impl Resource<Meta>
//! ┌─────────────────▼───────────────────────────────┐
//! │                  docean-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  Reconciler  │  │ ResourceData │ schema/value │
//! │  └──────────────┘  └──────────────┘             │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ waiter/retry │  │ migrate/state│ datalist    │
//! │  └──────────────┘  └──────────────┘ sweep       │
//! └───────┬─────────────────────────────────────────┘
//!         │ dyn ActionsService, ...
//! ┌───────▼───────┐
//! │  docean-api   │
//! └───────────────┘
//! ```

pub mod context;
pub mod data;
pub mod datalist;
pub mod diag;
pub mod error;
pub mod hash;
pub mod migrate;
pub mod plan;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod state;
pub mod sweep;
pub mod timeouts;
pub mod validate;
pub mod value;
pub mod waiter;

pub use context::Context;
pub use data::ResourceData;
pub use datalist::{DataList, Filter, ListSource, MatchBy, Record, Sort};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{CloudError, Result};
pub use plan::{AttrDiff, ChangeAction, Plan, PlanSummary, ResourceDiff};
pub use resource::{DataSource, Outcome, Reconciler, Resource, read_data_source};
pub use retry::{RetryError, retry, retry_on_precondition};
pub use schema::{AttrType, Attribute, Block, Schema};
pub use state::{AttributeMap, InstanceState, ResourceState, StateFile, StateManager};
pub use sweep::{DEFAULT_PREFIX, SweepReport, Sweeper, SweeperRegistry};
pub use timeouts::{Operation, Timeouts};
pub use validate::validate_config;
pub use value::{HashedSet, SetHasher, Value, set_diff};
pub use waiter::{StateChangeConf, wait_for_action, wait_for_action_with};
