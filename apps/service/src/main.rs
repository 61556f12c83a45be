//! Fleetwatch worker: runs the probe scheduler and the history retention
//! task against a local database until interrupted.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fleetwatch::catalog::{Catalog, LibsqlCatalog};
use fleetwatch::database;
use fleetwatch::monitoring::{PingProber, Prober, ProbeScheduler, RetentionCleanup, RetentionPolicy};
use fleetwatch::store::{LibsqlStatusStore, StatusStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "fleetwatch-service", about = "Probes the fleet and records its health")]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/fleetwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref()).context("failed to load config")?;
    config.probing.validate().context("invalid probe settings")?;

    let pool = database::open_pool(&config.database.path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.path))?;

    let catalog: Arc<dyn Catalog> = Arc::new(LibsqlCatalog::new(pool.clone()));
    let store: Arc<dyn StatusStore> = Arc::new(LibsqlStatusStore::new(pool));
    let prober: Arc<dyn Prober> = Arc::new(PingProber::new().context("failed to open ICMP sockets")?);

    let cleanup = RetentionCleanup::new(
        Arc::clone(&store),
        RetentionPolicy { history_retention_days: config.probing.history_retention_days },
    );
    let cleanup_task = cleanup.start_periodic_cleanup();

    let scheduler = Arc::new(ProbeScheduler::new(catalog, prober, store, config.probing));
    let cancel = CancellationToken::new();

    let run = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested, draining in-flight probes");

    cancel.cancel();
    run.await.context("scheduler task panicked")?;
    cleanup_task.abort();

    Ok(())
}
