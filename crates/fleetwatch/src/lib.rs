//! Fleetwatch core: probes a fleet of network endpoints on a fixed tick and
//! rolls per-endpoint reachability up into a per-site health verdict.
//!
//! The pieces fit together like this: the [`monitoring::ProbeScheduler`]
//! pulls active endpoints from a [`Catalog`], fans probes out under a
//! concurrency bound, writes results through a [`store::StatusStore`], and
//! derives one [`monitoring::SiteStatus`] per site once every probe of the
//! cycle has landed. [`StatusService`] is the read-side facade the API layer
//! consumes.

pub mod catalog;
pub mod config;
pub mod database;
pub mod monitoring;
pub mod service;
pub mod store;

pub use catalog::{Catalog, Endpoint, LibsqlCatalog};
pub use config::{ProbeSettings, SettingsError};
pub use service::StatusService;
