//! DigitalOcean API client
//!
//! A typed, async client for the subset of the DigitalOcean v2 API that the
//! provider manages. Each API area is exposed as a service trait implemented
//! by [`Client`], so callers can depend on `Arc<dyn DropletsService>` and
//! substitute in-memory fakes under test.
//!
//! # Services
//!
//! - **Compute**: droplets, droplet actions, images, volumes, storage actions
//! - **Networking**: load balancers, VPCs, CDN endpoints, certificates
//! - **Organization**: projects, tags, account
//! - **App Platform**: apps, deployments, alerts

pub mod account;
pub mod actions;
pub mod apps;
pub mod cdn;
pub mod certificates;
pub mod client;
pub mod droplets;
pub mod error;
pub mod images;
pub mod load_balancers;
pub mod pagination;
pub mod projects;
pub mod tags;
pub mod volumes;
pub mod vpcs;

// Re-exports
pub use account::{Account, AccountService};
pub use actions::{ACTION_COMPLETED, ACTION_ERRORED, ACTION_IN_PROGRESS, Action, ActionsService};
pub use apps::{App, AppSpec, AppsService, Deployment};
pub use cdn::{Cdn, CdnService};
pub use certificates::{Certificate, CertificateRequest, CertificatesService};
pub use client::{Client, RetryPolicy};
pub use droplets::{Droplet, DropletActionsService, DropletCreateRequest, DropletsService};
pub use error::{ApiError, Error, Result};
pub use images::{Image, ImagesService};
pub use load_balancers::{LoadBalancer, LoadBalancerRequest, LoadBalancersService};
pub use pagination::{Links, ListOptions, Meta, Page};
pub use projects::{Project, ProjectResource, ProjectsService};
pub use tags::{TaggedResource, TagsService};
pub use volumes::{StorageActionsService, Volume, VolumeCreateRequest, VolumesService};
pub use vpcs::{Vpc, VpcsService};
