use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;

use super::{STATUS_TTL, StatusStore};
use crate::database::{LibsqlManager, LibsqlPool};
use crate::monitoring::types::{EndpointStatus, HistoryPoint, RollupStatus, SiteStatus, Verdict};

/// libsql-backed store shared by the worker and the API server.
///
/// All timestamps are stored as unix milliseconds. Status freshness is a
/// per-row `expires_at` column compared against the read time, so an entry
/// that is never refreshed simply stops matching.
pub struct LibsqlStatusStore {
    pool: LibsqlPool,
    status_ttl: Duration,
}

impl LibsqlStatusStore {
    pub fn new(pool: LibsqlPool) -> Self {
        Self::with_ttl(pool, STATUS_TTL)
    }

    pub fn with_ttl(pool: LibsqlPool, status_ttl: Duration) -> Self {
        Self { pool, status_ttl }
    }

    async fn conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn verdict_from_db(raw: &str) -> Verdict {
    match raw {
        "reachable" => Verdict::Reachable,
        _ => Verdict::Unreachable,
    }
}

fn rollup_from_db(raw: &str) -> RollupStatus {
    match raw {
        "green" => RollupStatus::Green,
        "yellow" => RollupStatus::Yellow,
        _ => RollupStatus::Red,
    }
}

fn status_from_row(row: &libsql::Row) -> Result<EndpointStatus> {
    let verdict: String = row.get(1)?;
    Ok(EndpointStatus {
        endpoint_id: row.get(0)?,
        verdict: verdict_from_db(&verdict),
        latency_ms: row.get::<Option<f64>>(2)?,
        message: row.get(3)?,
        checked_at: from_millis(row.get(4)?),
    })
}

#[async_trait]
impl StatusStore for LibsqlStatusStore {
    async fn put_endpoint_status(&self, status: &EndpointStatus) -> Result<()> {
        let conn = self.conn().await?;
        let checked_at = millis(status.checked_at);
        let expires_at = checked_at + self.status_ttl.as_millis() as i64;

        conn.execute(
            "INSERT INTO endpoint_status
                (endpoint_id, verdict, latency_ms, message, checked_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(endpoint_id) DO UPDATE SET
                verdict = excluded.verdict,
                latency_ms = excluded.latency_ms,
                message = excluded.message,
                checked_at = excluded.checked_at,
                expires_at = excluded.expires_at",
            params![
                status.endpoint_id,
                status.verdict.to_string(),
                status.latency_ms,
                status.message.clone(),
                checked_at,
                expires_at
            ],
        )
        .await?;

        Ok(())
    }

    async fn endpoint_status(&self, endpoint_id: i64) -> Result<Option<EndpointStatus>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT endpoint_id, verdict, latency_ms, message, checked_at
                 FROM endpoint_status
                 WHERE endpoint_id = ? AND expires_at > ?",
                params![endpoint_id, millis(Utc::now())],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(status_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn all_endpoint_statuses(&self) -> Result<HashMap<i64, EndpointStatus>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT endpoint_id, verdict, latency_ms, message, checked_at
                 FROM endpoint_status
                 WHERE expires_at > ?",
                params![millis(Utc::now())],
            )
            .await?;

        let mut statuses = HashMap::new();
        while let Some(row) = rows.next().await? {
            let status = status_from_row(&row)?;
            statuses.insert(status.endpoint_id, status);
        }
        Ok(statuses)
    }

    async fn put_site_status(&self, status: &SiteStatus) -> Result<()> {
        let conn = self.conn().await?;
        let checked_at = millis(status.checked_at);
        let expires_at = checked_at + self.status_ttl.as_millis() as i64;

        conn.execute(
            "INSERT INTO site_status
                (site_id, status, online_count, offline_count, total_count,
                 critical_offline, checked_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(site_id) DO UPDATE SET
                status = excluded.status,
                online_count = excluded.online_count,
                offline_count = excluded.offline_count,
                total_count = excluded.total_count,
                critical_offline = excluded.critical_offline,
                checked_at = excluded.checked_at,
                expires_at = excluded.expires_at",
            params![
                status.site_id,
                status.status.to_string(),
                i64::from(status.online_count),
                i64::from(status.offline_count),
                i64::from(status.total_count),
                i64::from(status.critical_offline),
                checked_at,
                expires_at
            ],
        )
        .await?;

        Ok(())
    }

    async fn site_status(&self, site_id: i64) -> Result<Option<SiteStatus>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT site_id, status, online_count, offline_count, total_count,
                        critical_offline, checked_at
                 FROM site_status
                 WHERE site_id = ? AND expires_at > ?",
                params![site_id, millis(Utc::now())],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let status: String = row.get(1)?;
            Ok(Some(SiteStatus {
                site_id: row.get(0)?,
                status: rollup_from_db(&status),
                online_count: row.get::<i64>(2)? as u32,
                offline_count: row.get::<i64>(3)? as u32,
                total_count: row.get::<i64>(4)? as u32,
                critical_offline: row.get::<i64>(5)? != 0,
                checked_at: from_millis(row.get(6)?),
            }))
        } else {
            Ok(None)
        }
    }

    async fn append_history(&self, point: &HistoryPoint) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO endpoint_history (endpoint_id, timestamp, verdict, latency_ms)
             VALUES (?, ?, ?, ?)",
            params![
                point.endpoint_id,
                millis(point.timestamp),
                point.verdict.to_string(),
                point.latency_ms
            ],
        )
        .await?;

        Ok(())
    }

    async fn endpoint_history(
        &self,
        endpoint_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT endpoint_id, timestamp, verdict, latency_ms
                 FROM endpoint_history
                 WHERE endpoint_id = ? AND timestamp BETWEEN ? AND ?
                 ORDER BY timestamp ASC",
                params![endpoint_id, millis(start), millis(end)],
            )
            .await?;

        let mut points = Vec::new();
        while let Some(row) = rows.next().await? {
            let verdict: String = row.get(2)?;
            points.push(HistoryPoint {
                endpoint_id: row.get(0)?,
                timestamp: from_millis(row.get(1)?),
                verdict: verdict_from_db(&verdict),
                latency_ms: row.get::<Option<f64>>(3)?,
            });
        }
        Ok(points)
    }

    async fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn().await?;
        let removed = conn
            .execute("DELETE FROM endpoint_history WHERE timestamp < ?", params![millis(cutoff)])
            .await?;
        Ok(removed)
    }

    async fn last_notification(
        &self,
        site_id: i64,
        event_type: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn().await?;
        let mut rows = conn
            .query(
                "SELECT sent_at FROM notification_log WHERE site_id = ? AND event_type = ?",
                params![site_id, event_type],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(from_millis(row.get(0)?)))
        } else {
            Ok(None)
        }
    }

    async fn record_notification(
        &self,
        site_id: i64,
        event_type: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            "INSERT INTO notification_log (site_id, event_type, sent_at)
             VALUES (?, ?, ?)
             ON CONFLICT(site_id, event_type) DO UPDATE SET sent_at = excluded.sent_at",
            params![site_id, event_type, millis(sent_at)],
        )
        .await?;

        Ok(())
    }
}
