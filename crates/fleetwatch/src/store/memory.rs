use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{STATUS_TTL, StatusStore};
use crate::monitoring::types::{EndpointStatus, HistoryPoint, SiteStatus};

/// In-memory store with the same freshness semantics as the durable one.
/// Backs the test suite and works for single-process embeddings.
pub struct MemoryStatusStore {
    status_ttl: Duration,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    endpoint_statuses: HashMap<i64, EndpointStatus>,
    site_statuses: HashMap<i64, SiteStatus>,
    history: HashMap<i64, Vec<HistoryPoint>>,
    notifications: HashMap<(i64, String), DateTime<Utc>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::with_ttl(STATUS_TTL)
    }

    pub fn with_ttl(status_ttl: Duration) -> Self {
        Self { status_ttl, inner: RwLock::default() }
    }

    fn is_fresh(&self, checked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(checked_at)
            .to_std()
            .map(|age| age < self.status_ttl)
            // A timestamp in the future is fresh by definition.
            .unwrap_or(true)
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put_endpoint_status(&self, status: &EndpointStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.endpoint_statuses.insert(status.endpoint_id, status.clone());
        Ok(())
    }

    async fn endpoint_status(&self, endpoint_id: i64) -> Result<Option<EndpointStatus>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .endpoint_statuses
            .get(&endpoint_id)
            .filter(|status| self.is_fresh(status.checked_at, now))
            .cloned())
    }

    async fn all_endpoint_statuses(&self) -> Result<HashMap<i64, EndpointStatus>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .endpoint_statuses
            .iter()
            .filter(|(_, status)| self.is_fresh(status.checked_at, now))
            .map(|(id, status)| (*id, status.clone()))
            .collect())
    }

    async fn put_site_status(&self, status: &SiteStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.site_statuses.insert(status.site_id, status.clone());
        Ok(())
    }

    async fn site_status(&self, site_id: i64) -> Result<Option<SiteStatus>> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        Ok(inner
            .site_statuses
            .get(&site_id)
            .filter(|status| self.is_fresh(status.checked_at, now))
            .cloned())
    }

    async fn append_history(&self, point: &HistoryPoint) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.history.entry(point.endpoint_id).or_default().push(point.clone());
        Ok(())
    }

    async fn endpoint_history(
        &self,
        endpoint_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        let inner = self.inner.read().await;
        let mut points: Vec<HistoryPoint> = inner
            .history
            .get(&endpoint_id)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut removed = 0u64;

        for points in inner.history.values_mut() {
            let before = points.len();
            points.retain(|p| p.timestamp >= cutoff);
            removed += (before - points.len()) as u64;
        }

        Ok(removed)
    }

    async fn last_notification(
        &self,
        site_id: i64,
        event_type: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let inner = self.inner.read().await;
        Ok(inner.notifications.get(&(site_id, event_type.to_string())).copied())
    }

    async fn record_notification(
        &self,
        site_id: i64,
        event_type: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.notifications.insert((site_id, event_type.to_string()), sent_at);
        Ok(())
    }
}
