use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use crate::store::StatusStore;

/// Decides whether a notification for a (site, event type) pair may be sent.
///
/// The gate never records anything on the read path. Callers stamp the
/// notification with [`CooldownGate::record_notification`] only after a
/// successful send, so a failed delivery does not start the cooldown window.
pub struct CooldownGate {
    store: Arc<dyn StatusStore>,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// True when no notification of this type was ever recorded for the
    /// site, or when the last one is at least `cooldown` old.
    pub async fn should_notify(
        &self,
        site_id: i64,
        event_type: &str,
        cooldown: Duration,
    ) -> Result<bool> {
        match self.store.last_notification(site_id, event_type).await? {
            None => Ok(true),
            Some(sent_at) => {
                let elapsed = Utc::now().signed_duration_since(sent_at);
                Ok(elapsed >= chrono::Duration::from_std(cooldown)?)
            }
        }
    }

    /// Stamp a successfully sent notification, starting the cooldown window.
    pub async fn record_notification(&self, site_id: i64, event_type: &str) -> Result<()> {
        self.store.record_notification(site_id, event_type, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStatusStore;

    const COOLDOWN: Duration = Duration::from_secs(300);

    fn gate() -> (Arc<MemoryStatusStore>, CooldownGate) {
        let store = Arc::new(MemoryStatusStore::new());
        let gate = CooldownGate::new(Arc::clone(&store) as Arc<dyn StatusStore>);
        (store, gate)
    }

    #[tokio::test]
    async fn fresh_pair_always_notifies() {
        let (_store, gate) = gate();
        assert!(gate.should_notify(1, "down", COOLDOWN).await.unwrap());
    }

    #[tokio::test]
    async fn recorded_notification_blocks_within_the_window() {
        let (_store, gate) = gate();

        gate.record_notification(1, "down").await.unwrap();
        assert!(!gate.should_notify(1, "down", COOLDOWN).await.unwrap());

        // Other event types and sites are tracked independently.
        assert!(gate.should_notify(1, "recovered", COOLDOWN).await.unwrap());
        assert!(gate.should_notify(2, "down", COOLDOWN).await.unwrap());
    }

    #[tokio::test]
    async fn elapsed_cooldown_opens_the_gate_again() {
        let (store, gate) = gate();

        let long_ago = Utc::now() - chrono::Duration::seconds(301);
        store.record_notification(1, "down", long_ago).await.unwrap();

        assert!(gate.should_notify(1, "down", COOLDOWN).await.unwrap());
    }
}
