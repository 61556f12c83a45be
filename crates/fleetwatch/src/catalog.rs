use anyhow::Result;
use async_trait::async_trait;
use libsql::params;
use serde::{Deserialize, Serialize};

use crate::database::LibsqlPool;

/// A monitored network endpoint, as configured in the catalog.
///
/// The scheduler fetches the endpoint list once per cycle and treats each
/// entry as an immutable snapshot for the duration of that cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub site_id: i64,
    pub name: String,
    /// Hostname or IP literal.
    pub hostname: String,
    /// A site with any unreachable critical endpoint rolls up red.
    pub is_critical: bool,
    /// Informational only: every active endpoint is probed each tick.
    pub check_interval_secs: u64,
    /// Probe attempts per cycle; 0 means "use the configured default".
    pub retries: u32,
    /// Per-attempt timeout; 0 means "use the configured default".
    pub timeout_ms: u64,
    pub active: bool,
}

/// Read-only access to the endpoint catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All endpoints currently flagged active, across every site.
    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>>;

    /// Active endpoints belonging to one site.
    async fn list_endpoints_for_site(&self, site_id: i64) -> Result<Vec<Endpoint>>;
}

const ENDPOINT_COLUMNS: &str = "id, site_id, name, hostname, is_critical, \
                                check_interval_seconds, retries, timeout_ms, active";

/// Catalog backed by the libsql database.
pub struct LibsqlCatalog {
    pool: LibsqlPool,
}

impl LibsqlCatalog {
    pub fn new(pool: LibsqlPool) -> Self {
        Self { pool }
    }
}

fn endpoint_from_row(row: &libsql::Row) -> Result<Endpoint> {
    Ok(Endpoint {
        id: row.get(0)?,
        site_id: row.get(1)?,
        name: row.get(2)?,
        hostname: row.get(3)?,
        is_critical: row.get::<i64>(4)? != 0,
        check_interval_secs: row.get::<i64>(5)? as u64,
        retries: row.get::<i64>(6)? as u32,
        timeout_ms: row.get::<i64>(7)? as u64,
        active: row.get::<i64>(8)? != 0,
    })
}

#[async_trait]
impl Catalog for LibsqlCatalog {
    async fn list_active_endpoints(&self) -> Result<Vec<Endpoint>> {
        let conn = self.pool.get().await?;
        let mut rows = conn
            .query(&format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE active = 1"), ())
            .await?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await? {
            endpoints.push(endpoint_from_row(&row)?);
        }
        Ok(endpoints)
    }

    async fn list_endpoints_for_site(&self, site_id: i64) -> Result<Vec<Endpoint>> {
        let conn = self.pool.get().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE site_id = ? AND active = 1"
                ),
                params![site_id],
            )
            .await?;

        let mut endpoints = Vec::new();
        while let Some(row) = rows.next().await? {
            endpoints.push(endpoint_from_row(&row)?);
        }
        Ok(endpoints)
    }
}
