use anyhow::Result;
use libsql::Connection;

/// Current schema version. Bump when adding a migration.
const SCHEMA_VERSION: i32 = 1;

/// Run database migrations.
///
/// Single source of truth for the schema; both the worker and the API server
/// call this at startup and whichever gets there first applies the changes.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current = current_version(conn).await?;
    if current >= SCHEMA_VERSION {
        tracing::debug!("database schema is up to date (version {current})");
        return Ok(());
    }

    tracing::info!("running migrations from version {current} to {SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn).await?;
        record_migration(conn, 1, "initial schema").await?;
    }

    tracing::info!("database migrations completed (now at version {SCHEMA_VERSION})");
    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, chrono::Utc::now().timestamp(), description],
    )
    .await?;
    Ok(())
}

/// v1: catalog tables plus everything the status store needs.
///
/// Timestamps are unix milliseconds throughout.
async fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            hostname TEXT NOT NULL,
            is_critical INTEGER NOT NULL DEFAULT 0,
            check_interval_seconds INTEGER NOT NULL DEFAULT 60,
            retries INTEGER NOT NULL DEFAULT 3,
            timeout_ms INTEGER NOT NULL DEFAULT 10000,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoint_status (
            endpoint_id INTEGER PRIMARY KEY,
            verdict TEXT NOT NULL,
            latency_ms REAL,
            message TEXT NOT NULL DEFAULT '',
            checked_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS site_status (
            site_id INTEGER PRIMARY KEY,
            status TEXT NOT NULL,
            online_count INTEGER NOT NULL,
            offline_count INTEGER NOT NULL,
            total_count INTEGER NOT NULL,
            critical_offline INTEGER NOT NULL,
            checked_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS endpoint_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            endpoint_id INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            verdict TEXT NOT NULL,
            latency_ms REAL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_endpoint_history_endpoint_time
            ON endpoint_history (endpoint_id, timestamp)",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notification_log (
            site_id INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            sent_at INTEGER NOT NULL,
            PRIMARY KEY (site_id, event_type)
        )",
        (),
    )
    .await?;

    Ok(())
}
