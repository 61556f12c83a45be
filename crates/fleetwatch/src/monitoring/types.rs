use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of probing one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Reachable,
    Unreachable,
}

impl Verdict {
    pub fn is_reachable(self) -> bool {
        matches!(self, Verdict::Reachable)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Reachable => write!(f, "reachable"),
            Verdict::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Current status of one endpoint. Superseded, never merged, by the next
/// measurement for the same endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub endpoint_id: i64,

    pub verdict: Verdict,

    /// Mean round-trip time across successful attempts; absent when
    /// unreachable.
    pub latency_ms: Option<f64>,

    pub checked_at: DateTime<Utc>,

    /// Free-text diagnostic; states the failure reason when unreachable.
    pub message: String,
}

impl EndpointStatus {
    /// Start a status for this endpoint, unreachable until proven otherwise.
    pub fn new(endpoint_id: i64) -> Self {
        Self {
            endpoint_id,
            verdict: Verdict::Unreachable,
            latency_ms: None,
            checked_at: Utc::now(),
            message: String::new(),
        }
    }

    pub fn reachable(mut self, latency_ms: f64) -> Self {
        self.verdict = Verdict::Reachable;
        self.latency_ms = Some(latency_ms);
        self.message = "OK".to_string();
        self
    }

    pub fn unreachable(mut self, message: impl Into<String>) -> Self {
        self.verdict = Verdict::Unreachable;
        self.latency_ms = None;
        self.message = message.into();
        self
    }
}

/// One appended, never mutated, point of an endpoint's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub endpoint_id: i64,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
    pub latency_ms: Option<f64>,
}

impl From<&EndpointStatus> for HistoryPoint {
    fn from(status: &EndpointStatus) -> Self {
        Self {
            endpoint_id: status.endpoint_id,
            timestamp: status.checked_at,
            verdict: status.verdict,
            latency_ms: status.latency_ms,
        }
    }
}

/// Tri-state rollup verdict for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupStatus {
    Green,
    Yellow,
    Red,
}

impl std::fmt::Display for RollupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollupStatus::Green => write!(f, "green"),
            RollupStatus::Yellow => write!(f, "yellow"),
            RollupStatus::Red => write!(f, "red"),
        }
    }
}

/// Derived health of one site. Overwritten in place every cycle; the counts
/// always sum to `total_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub site_id: i64,
    pub status: RollupStatus,
    pub online_count: u32,
    pub offline_count: u32,
    pub total_count: u32,
    pub critical_offline: bool,
    pub checked_at: DateTime<Utc>,
}
