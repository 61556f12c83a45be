//! Read-side facade over the catalog and the status store.
//!
//! The API layer talks to this type only. Site rollups are recomputed from
//! the current endpoint statuses on every call, with the same aggregation
//! the scheduler uses, so a read between probe cycles reflects expiry
//! immediately instead of echoing the last persisted rollup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::catalog::Catalog;
use crate::monitoring::aggregator::compute_site_status;
use crate::monitoring::types::{EndpointStatus, HistoryPoint, SiteStatus};
use crate::monitoring::CooldownGate;
use crate::store::StatusStore;

pub struct StatusService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn StatusStore>,
    cooldown: CooldownGate,
    notification_cooldown: Duration,
}

impl StatusService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn StatusStore>,
        notification_cooldown: Duration,
    ) -> Self {
        let cooldown = CooldownGate::new(Arc::clone(&store));
        Self { catalog, store, cooldown, notification_cooldown }
    }

    /// Current status of one endpoint. `None` when never probed or expired.
    pub async fn endpoint_status(&self, endpoint_id: i64) -> Result<Option<EndpointStatus>> {
        self.store.endpoint_status(endpoint_id).await
    }

    /// Rollup for one site, derived from the current endpoint statuses.
    pub async fn site_status(&self, site_id: i64) -> Result<SiteStatus> {
        let endpoints = self.catalog.list_endpoints_for_site(site_id).await?;
        let now = Utc::now();

        if endpoints.is_empty() {
            return Ok(compute_site_status(site_id, &endpoints, &HashMap::new(), now));
        }

        let statuses = self.store.all_endpoint_statuses().await?;
        Ok(compute_site_status(site_id, &endpoints, &statuses, now))
    }

    /// History points for one endpoint within `[start, end]`, ascending.
    pub async fn endpoint_history(
        &self,
        endpoint_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        self.store.endpoint_history(endpoint_id, start, end).await
    }

    /// Whether a notification for this (site, event type) pair may be sent.
    pub async fn should_notify(&self, site_id: i64, event_type: &str) -> Result<bool> {
        self.cooldown.should_notify(site_id, event_type, self.notification_cooldown).await
    }

    /// Stamp a sent notification, closing the gate for the cooldown window.
    pub async fn record_notification(&self, site_id: i64, event_type: &str) -> Result<()> {
        self.cooldown.record_notification(site_id, event_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::catalog::Endpoint;
    use crate::monitoring::types::{RollupStatus, Verdict};
    use crate::store::MemoryStatusStore;

    struct StaticCatalog {
        endpoints: Vec<Endpoint>,
    }

    #[async_trait]
    impl Catalog for StaticCatalog {
        async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>> {
            Ok(self.endpoints.clone())
        }

        async fn list_endpoints_for_site(&self, site_id: i64) -> Result<Vec<Endpoint>> {
            Ok(self
                .endpoints
                .iter()
                .filter(|e| e.site_id == site_id)
                .cloned()
                .collect())
        }
    }

    fn endpoint(id: i64, site_id: i64, is_critical: bool) -> Endpoint {
        Endpoint {
            id,
            site_id,
            name: format!("endpoint-{id}"),
            hostname: format!("10.0.0.{id}"),
            is_critical,
            check_interval_secs: 10,
            retries: 3,
            timeout_ms: 10_000,
            active: true,
        }
    }

    fn service(endpoints: Vec<Endpoint>) -> (Arc<MemoryStatusStore>, StatusService) {
        let store = Arc::new(MemoryStatusStore::new());
        let service = StatusService::new(
            Arc::new(StaticCatalog { endpoints }),
            Arc::clone(&store) as Arc<dyn StatusStore>,
            Duration::from_secs(300),
        );
        (store, service)
    }

    #[tokio::test]
    async fn unknown_endpoint_reads_as_absent() {
        let (_store, service) = service(vec![]);
        assert!(service.endpoint_status(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_site_rolls_up_green() {
        let (_store, service) = service(vec![]);

        let status = service.site_status(1).await.unwrap();
        assert_eq!(status.status, RollupStatus::Green);
        assert_eq!(status.total_count, 0);
    }

    #[tokio::test]
    async fn rollup_reflects_current_endpoint_statuses() {
        let (store, service) = service(vec![
            endpoint(1, 1, false),
            endpoint(2, 1, true),
            endpoint(3, 2, false),
        ]);

        store.put_endpoint_status(&EndpointStatus::new(1).unreachable("no reply")).await.unwrap();
        store.put_endpoint_status(&EndpointStatus::new(2).reachable(3.0)).await.unwrap();
        store.put_endpoint_status(&EndpointStatus::new(3).reachable(5.0)).await.unwrap();

        let site_one = service.site_status(1).await.unwrap();
        assert_eq!(site_one.status, RollupStatus::Yellow);
        assert_eq!(site_one.online_count, 1);
        assert_eq!(site_one.offline_count, 1);
        assert!(!site_one.critical_offline);

        // The other site's down endpoint never leaks into this rollup.
        let site_two = service.site_status(2).await.unwrap();
        assert_eq!(site_two.status, RollupStatus::Green);
        assert_eq!(site_two.total_count, 1);
    }

    #[tokio::test]
    async fn unprobed_endpoints_count_as_unreachable() {
        let (store, service) = service(vec![endpoint(1, 1, false), endpoint(2, 1, false)]);

        store.put_endpoint_status(&EndpointStatus::new(1).reachable(2.0)).await.unwrap();

        let status = service.site_status(1).await.unwrap();
        assert_eq!(status.status, RollupStatus::Yellow);
        assert_eq!(status.offline_count, 1);
    }

    #[tokio::test]
    async fn on_demand_rollup_matches_the_persisted_one() {
        let (store, service) = service(vec![endpoint(1, 1, true), endpoint(2, 1, false)]);

        store.put_endpoint_status(&EndpointStatus::new(1).unreachable("no reply")).await.unwrap();
        store.put_endpoint_status(&EndpointStatus::new(2).reachable(4.0)).await.unwrap();

        // Persist what a scheduler cycle would have written.
        let endpoints = service.catalog.list_endpoints_for_site(1).await.unwrap();
        let statuses = store.all_endpoint_statuses().await.unwrap();
        let persisted = compute_site_status(1, &endpoints, &statuses, Utc::now());
        store.put_site_status(&persisted).await.unwrap();

        let on_demand = service.site_status(1).await.unwrap();
        assert_eq!(on_demand.status, persisted.status);
        assert_eq!(on_demand.online_count, persisted.online_count);
        assert_eq!(on_demand.offline_count, persisted.offline_count);
        assert_eq!(on_demand.total_count, persisted.total_count);
        assert_eq!(on_demand.critical_offline, persisted.critical_offline);
    }

    #[tokio::test]
    async fn history_passes_through_the_store() {
        let (store, service) = service(vec![endpoint(1, 1, false)]);
        let now = Utc::now();

        store
            .append_history(&HistoryPoint {
                endpoint_id: 1,
                timestamp: now - chrono::Duration::hours(1),
                verdict: Verdict::Reachable,
                latency_ms: Some(2.0),
            })
            .await
            .unwrap();

        let points = service
            .endpoint_history(1, now - chrono::Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
    }

    #[tokio::test]
    async fn notification_gate_round_trips() {
        let (_store, service) = service(vec![]);

        assert!(service.should_notify(1, "down").await.unwrap());
        service.record_notification(1, "down").await.unwrap();
        assert!(!service.should_notify(1, "down").await.unwrap());
        assert!(service.should_notify(1, "recovered").await.unwrap());
    }
}
