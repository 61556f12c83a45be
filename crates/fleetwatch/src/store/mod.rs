//! Durable storage for current statuses, endpoint history, and notification
//! stamps.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStatusStore;
pub use sqlite::LibsqlStatusStore;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::monitoring::types::{EndpointStatus, HistoryPoint, SiteStatus};

/// How long a status entry stays current before reads treat it as absent.
/// A status that is never refreshed eventually reads back as missing, which
/// is how staleness becomes observable downstream.
pub const STATUS_TTL: Duration = Duration::from_secs(600);

/// Shared storage contract for the scheduler, the retention task, and the
/// read-side service.
///
/// Implementations must tolerate many concurrent writers. Each probe task
/// owns a disjoint endpoint key, so last-write-wins per key is sufficient.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Overwrite the current status of one endpoint.
    async fn put_endpoint_status(&self, status: &EndpointStatus) -> Result<()>;

    /// Current status of one endpoint, if fresh enough.
    async fn endpoint_status(&self, endpoint_id: i64) -> Result<Option<EndpointStatus>>;

    /// Current statuses of every endpoint, in a single round trip.
    async fn all_endpoint_statuses(&self) -> Result<HashMap<i64, EndpointStatus>>;

    /// Overwrite the rollup for one site.
    async fn put_site_status(&self, status: &SiteStatus) -> Result<()>;

    /// Current rollup for one site, if fresh enough.
    async fn site_status(&self, site_id: i64) -> Result<Option<SiteStatus>>;

    /// Append one history point. Points are never mutated afterwards.
    async fn append_history(&self, point: &HistoryPoint) -> Result<()>;

    /// History points for one endpoint within `[start, end]`, ascending by
    /// time.
    async fn endpoint_history(
        &self,
        endpoint_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>>;

    /// Delete history points strictly older than `cutoff`; returns how many
    /// were removed. Idempotent and safe to run concurrently with appends.
    async fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// When a notification of this type was last recorded for the site.
    async fn last_notification(
        &self,
        site_id: i64,
        event_type: &str,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Record that a notification of this type was sent.
    async fn record_notification(
        &self,
        site_id: i64,
        event_type: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()>;
}
