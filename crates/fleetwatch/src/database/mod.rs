/// Database plumbing: connection pooling and schema migrations.
///
/// The catalog tables (`sites`, `endpoints`) and the status-store tables all
/// live in one local libsql database so the worker and the API server can
/// share a single file.
pub mod migrations;
pub mod pool;

pub use pool::{LibsqlManager, LibsqlPool};

use anyhow::Result;

/// Open (or create) the local database at `path`, run migrations, and wrap
/// the handle in a connection pool.
pub async fn open_pool(path: &str) -> Result<LibsqlPool> {
    let database = libsql::Builder::new_local(path).build().await?;
    let pool = LibsqlPool::builder(LibsqlManager::new(database)).build()?;

    let conn = pool.get().await?;
    migrations::run_migrations(&conn).await?;

    Ok(pool)
}
