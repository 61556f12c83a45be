//! Age-based eviction of endpoint history.
//!
//! History points are appended on every probe and would grow without bound;
//! a background task prunes everything older than the retention window once
//! an hour.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::store::StatusStore;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// How far back history points are kept.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub history_retention_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { history_retention_days: 90 }
    }
}

impl RetentionPolicy {
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(self.history_retention_days)
    }
}

/// Prunes expired history points, once or periodically.
pub struct RetentionCleanup {
    store: Arc<dyn StatusStore>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(store: Arc<dyn StatusStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// Prune once. Idempotent; safe to run while probes are appending.
    pub async fn prune_once(&self) -> Result<u64> {
        let cutoff = self.policy.cutoff(Utc::now());
        let removed = self.store.prune_history(cutoff).await?;

        if removed > 0 {
            info!(removed, "pruned expired history points");
        } else {
            debug!("no history points past retention");
        }

        Ok(removed)
    }

    /// Spawn the hourly background cleanup task.
    pub fn start_periodic_cleanup(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                ticker.tick().await;

                if let Err(e) = self.prune_once().await {
                    warn!("history cleanup failed: {e:#}");
                }
            }
        })
    }
}
