//! DigitalOcean resource kinds for the docean engine
//!
//! Droplets, volumes, certificates, CDN endpoints, load balancers,
//! projects and App Platform apps, the `droplets`, `images` and `projects`
//! list data sources, and the sweepers that clean up after acceptance
//! tests. [`Provider`] ties them together under their type names.

pub mod app;
pub mod cdn;
pub mod certificate;
pub mod data_sources;
pub mod droplet;
pub mod fields;
pub mod load_balancer;
pub mod meta;
pub mod pagination;
pub mod project;
pub mod provider;
pub mod sweepers;
pub mod tags;
pub mod volume;

pub use meta::{CloudServices, Meta};
pub use provider::{AuthStatus, Provider};
