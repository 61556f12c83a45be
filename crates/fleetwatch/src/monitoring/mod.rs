//! The probe-and-aggregate engine: probe executor, tick scheduler, site
//! rollup, history retention, and the notification cooldown gate.

pub mod aggregator;
pub mod cooldown;
pub mod prober;
pub mod retention;
pub mod scheduler;
pub mod types;

pub use cooldown::CooldownGate;
pub use prober::{PingProber, Prober};
pub use retention::{RetentionCleanup, RetentionPolicy};
pub use scheduler::ProbeScheduler;
pub use types::{EndpointStatus, HistoryPoint, RollupStatus, SiteStatus, Verdict};
