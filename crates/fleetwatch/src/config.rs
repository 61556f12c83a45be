use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for the probe scheduler and its collaborators.
///
/// Threaded explicitly through construction; nothing in the core reads
/// process-global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Upper bound on simultaneously in-flight probes.
    pub max_concurrent_probes: usize,
    /// Fixed cycle period. Every active endpoint is probed each tick,
    /// regardless of its own `check_interval_secs`.
    pub tick_interval_secs: u64,
    /// Age-based eviction window for history points.
    pub history_retention_days: i64,
    /// Default minimum spacing between notifications of one kind per site.
    pub notification_cooldown_secs: u64,
    /// Probe attempts per endpoint when the catalog does not say otherwise.
    pub default_retries: u32,
    /// Per-attempt probe timeout when the catalog does not say otherwise.
    pub default_timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 150,
            tick_interval_secs: 10,
            history_retention_days: 90,
            notification_cooldown_secs: 300,
            default_retries: 3,
            default_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("max_concurrent_probes must be greater than zero")]
    ZeroConcurrency,
    #[error("tick_interval_secs must be greater than zero")]
    ZeroTickInterval,
    #[error("history_retention_days must be greater than zero")]
    ZeroRetention,
    #[error("default_retries must be greater than zero")]
    ZeroRetries,
    #[error("default_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

impl ProbeSettings {
    /// Startup validation. An invalid value here is fatal; nothing about
    /// these settings is recoverable mid-run.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrent_probes == 0 {
            return Err(SettingsError::ZeroConcurrency);
        }
        if self.tick_interval_secs == 0 {
            return Err(SettingsError::ZeroTickInterval);
        }
        if self.history_retention_days <= 0 {
            return Err(SettingsError::ZeroRetention);
        }
        if self.default_retries == 0 {
            return Err(SettingsError::ZeroRetries);
        }
        if self.default_timeout_ms == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ProbeSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_concurrent_probes, 150);
        assert_eq!(settings.tick_interval_secs, 10);
        assert_eq!(settings.history_retention_days, 90);
        assert_eq!(settings.notification_cooldown_secs, 300);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let settings = ProbeSettings { max_concurrent_probes: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroConcurrency)));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let settings = ProbeSettings { tick_interval_secs: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroTickInterval)));
    }

    #[test]
    fn non_positive_retention_is_rejected() {
        let settings = ProbeSettings { history_retention_days: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroRetention)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let settings = ProbeSettings { default_timeout_ms: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroTimeout)));
    }
}
