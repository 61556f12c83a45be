use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::aggregator::compute_site_status;
use super::prober::Prober;
use super::types::HistoryPoint;
use crate::catalog::{Catalog, Endpoint};
use crate::config::ProbeSettings;
use crate::store::StatusStore;

/// Drives the probe-and-aggregate cycle on a fixed tick.
///
/// Every active endpoint is probed each tick; admission into execution is
/// gated by a semaphore so at most `max_concurrent_probes` probes are in
/// flight at once, no matter how large the catalog is. Site aggregation only
/// starts after every probe task of the cycle has completed and written its
/// status.
pub struct ProbeScheduler {
    catalog: Arc<dyn Catalog>,
    prober: Arc<dyn Prober>,
    store: Arc<dyn StatusStore>,
    settings: ProbeSettings,
    stop: CancellationToken,
}

impl ProbeScheduler {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        prober: Arc<dyn Prober>,
        store: Arc<dyn StatusStore>,
        settings: ProbeSettings,
    ) -> Self {
        Self { catalog, prober, store, settings, stop: CancellationToken::new() }
    }

    /// Request a stop. The loop exits before the next cycle starts; an
    /// in-flight cycle drains first.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run until `cancel` fires or [`ProbeScheduler::stop`] is called,
    /// whichever comes first. Cancellation is cooperative: it is only
    /// checked between cycles, so in-flight probes always finish and write
    /// their results.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            max_concurrent = self.settings.max_concurrent_probes,
            tick_secs = self.settings.tick_interval_secs,
            "probe scheduler started"
        );

        let mut ticker = interval(Duration::from_secs(self.settings.tick_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("probe cycle failed: {e:#}");
                    }
                }
            }
        }

        info!("probe scheduler stopped");
    }

    /// One full probe-and-aggregate cycle.
    ///
    /// Only the catalog fetch can fail the cycle as a whole; probe and store
    /// errors are logged per endpoint or per site and never cross over to
    /// their siblings.
    pub(crate) async fn run_cycle(&self) -> Result<()> {
        let endpoints = self.catalog.list_active_endpoints().await?;
        if endpoints.is_empty() {
            return Ok(());
        }

        debug!("probing {} endpoints", endpoints.len());

        let mut by_site: HashMap<i64, Vec<Endpoint>> = HashMap::new();
        for endpoint in &endpoints {
            by_site.entry(endpoint.site_id).or_default().push(endpoint.clone());
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_probes));
        let mut tasks = JoinSet::new();

        for endpoint in endpoints {
            let endpoint = apply_defaults(endpoint, &self.settings);
            let semaphore = Arc::clone(&semaphore);
            let prober = Arc::clone(&self.prober);
            let store = Arc::clone(&self.store);

            tasks.spawn(async move {
                // The semaphore is never closed while a cycle runs.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let status = prober.probe(&endpoint).await;

                if let Err(e) = store.put_endpoint_status(&status).await {
                    warn!(endpoint = %endpoint.name, "failed to write endpoint status: {e:#}");
                }
                if let Err(e) = store.append_history(&HistoryPoint::from(&status)).await {
                    warn!(endpoint = %endpoint.name, "failed to append history: {e:#}");
                }
            });
        }

        // Full barrier: aggregation must only see this cycle's writes.
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("probe task panicked: {e}");
            }
        }

        let statuses = match self.store.all_endpoint_statuses().await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!("skipping aggregation, bulk status read failed: {e:#}");
                return Ok(());
            }
        };

        let now = Utc::now();
        for (site_id, site_endpoints) in &by_site {
            let rollup = compute_site_status(*site_id, site_endpoints, &statuses, now);
            if let Err(e) = self.store.put_site_status(&rollup).await {
                warn!(site_id, "failed to write site status: {e:#}");
            }
        }

        Ok(())
    }
}

/// Fill unset per-endpoint probe parameters from the configured defaults.
fn apply_defaults(mut endpoint: Endpoint, settings: &ProbeSettings) -> Endpoint {
    if endpoint.retries == 0 {
        endpoint.retries = settings.default_retries;
    }
    if endpoint.timeout_ms == 0 {
        endpoint.timeout_ms = settings.default_timeout_ms;
    }
    endpoint
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::monitoring::types::{EndpointStatus, RollupStatus};
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
            Ok(self.endpoints.iter().filter(|e| e.site_id == site_id).cloned().collect())
        }
    }

    struct FailingCatalog;

    #[async_trait]
    impl Catalog for FailingCatalog {
        async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>> {
            Err(anyhow!("catalog unavailable"))
        }

        async fn list_endpoints_for_site(&self, _site_id: i64) -> Result<Vec<Endpoint>> {
            Err(anyhow!("catalog unavailable"))
        }
    }

    /// Prober that tracks the in-flight high-water mark and marks endpoints
    /// whose hostname starts with "down" as unreachable.
    struct FakeProber {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl FakeProber {
        fn new(delay: Duration) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, endpoint: &Endpoint) -> EndpointStatus {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let status = EndpointStatus::new(endpoint.id);
            if endpoint.hostname.starts_with("down") {
                status.unreachable("no reply")
            } else {
                status.reachable(1.0)
            }
        }
    }

    fn endpoint(id: i64, site_id: i64, hostname: &str, critical: bool) -> Endpoint {
        Endpoint {
            id,
            site_id,
            name: format!("ep-{id}"),
            hostname: hostname.to_string(),
            is_critical: critical,
            check_interval_secs: 60,
            retries: 1,
            timeout_ms: 100,
            active: true,
        }
    }

    fn scheduler(
        endpoints: Vec<Endpoint>,
        prober: Arc<FakeProber>,
        store: Arc<MemoryStatusStore>,
        max_concurrent: usize,
    ) -> ProbeScheduler {
        let settings = ProbeSettings {
            max_concurrent_probes: max_concurrent,
            tick_interval_secs: 1,
            ..Default::default()
        };
        ProbeScheduler::new(Arc::new(StaticCatalog { endpoints }), prober, store, settings)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_probes_never_exceed_the_bound() {
        let endpoints: Vec<Endpoint> =
            (0..1000).map(|i| endpoint(i, i % 10, "10.0.0.1", false)).collect();
        let prober = Arc::new(FakeProber::new(Duration::from_millis(2)));
        let store = Arc::new(MemoryStatusStore::new());

        let sched = scheduler(endpoints, Arc::clone(&prober), Arc::clone(&store), 10);
        sched.run_cycle().await.unwrap();

        assert!(prober.max_in_flight.load(Ordering::SeqCst) <= 10);
        assert_eq!(store.all_endpoint_statuses().await.unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn every_site_gets_a_rollup_after_the_barrier() {
        let endpoints = vec![
            endpoint(1, 1, "10.0.0.1", false),
            endpoint(2, 1, "down.example", false),
            endpoint(3, 2, "down.example", true),
            endpoint(4, 2, "10.0.0.4", false),
        ];
        let prober = Arc::new(FakeProber::new(Duration::from_millis(1)));
        let store = Arc::new(MemoryStatusStore::new());

        let sched = scheduler(endpoints, prober, Arc::clone(&store), 4);
        sched.run_cycle().await.unwrap();

        let site1 = store.site_status(1).await.unwrap().unwrap();
        assert_eq!(site1.status, RollupStatus::Yellow);
        assert_eq!(site1.online_count, 1);
        assert_eq!(site1.offline_count, 1);
        assert!(!site1.critical_offline);

        let site2 = store.site_status(2).await.unwrap().unwrap();
        assert_eq!(site2.status, RollupStatus::Red);
        assert!(site2.critical_offline);
    }

    #[tokio::test]
    async fn empty_catalog_skips_the_cycle() {
        let prober = Arc::new(FakeProber::new(Duration::ZERO));
        let store = Arc::new(MemoryStatusStore::new());

        let sched = scheduler(Vec::new(), prober, Arc::clone(&store), 4);
        sched.run_cycle().await.unwrap();

        assert!(store.all_endpoint_statuses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_failure_aborts_only_the_cycle() {
        let store = Arc::new(MemoryStatusStore::new());
        let sched = ProbeScheduler::new(
            Arc::new(FailingCatalog),
            Arc::new(FakeProber::new(Duration::ZERO)),
            Arc::clone(&store) as Arc<dyn StatusStore>,
            ProbeSettings::default(),
        );

        assert!(sched.run_cycle().await.is_err());
        assert!(store.all_endpoint_statuses().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_drains_in_flight_probes() {
        let endpoints: Vec<Endpoint> =
            (0..50).map(|i| endpoint(i, 1, "10.0.0.1", false)).collect();
        let prober = Arc::new(FakeProber::new(Duration::from_millis(10)));
        let store = Arc::new(MemoryStatusStore::new());

        let sched =
            Arc::new(scheduler(endpoints, prober, Arc::clone(&store), 10));
        let cancel = CancellationToken::new();

        let handle = {
            let sched = Arc::clone(&sched);
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        // Cancel while the first cycle is still in flight.
        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        // The cycle drained: every endpoint wrote its status.
        assert_eq!(store.all_endpoint_statuses().await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn stop_request_ends_the_run_loop() {
        let prober = Arc::new(FakeProber::new(Duration::ZERO));
        let store = Arc::new(MemoryStatusStore::new());
        let sched = Arc::new(scheduler(
            vec![endpoint(1, 1, "10.0.0.1", false)],
            prober,
            store,
            4,
        ));

        let handle = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run(CancellationToken::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        sched.stop();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[test]
    fn defaults_fill_unset_probe_parameters() {
        let settings = ProbeSettings::default();
        let mut raw = endpoint(1, 1, "10.0.0.1", false);
        raw.retries = 0;
        raw.timeout_ms = 0;

        let filled = apply_defaults(raw, &settings);
        assert_eq!(filled.retries, settings.default_retries);
        assert_eq!(filled.timeout_ms, settings.default_timeout_ms);

        let explicit = apply_defaults(endpoint(2, 1, "10.0.0.2", false), &settings);
        assert_eq!(explicit.retries, 1);
        assert_eq!(explicit.timeout_ms, 100);
    }
}
