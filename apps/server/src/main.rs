#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use fleetwatch::catalog::{Catalog, LibsqlCatalog};
use fleetwatch::store::{LibsqlStatusStore, StatusStore};
use fleetwatch::{ProbeSettings, StatusService, database};

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let addr: SocketAddr = env_or("BIND_ADDR", "0.0.0.0:8080").parse()?;
    let database_path = env_or("DATABASE_PATH", "fleetwatch.db");

    let pool = database::open_pool(&database_path)
        .await
        .with_context(|| format!("failed to open database at {database_path}"))?;

    let catalog: Arc<dyn Catalog> = Arc::new(LibsqlCatalog::new(pool.clone()));
    let store: Arc<dyn StatusStore> = Arc::new(LibsqlStatusStore::new(pool));
    let cooldown = Duration::from_secs(ProbeSettings::default().notification_cooldown_secs);
    let service = web::Data::new(StatusService::new(catalog, store, cooldown));

    run_server(addr, service).await
}

async fn run_server(addr: SocketAddr, service: web::Data<StatusService>) -> Result<(), AppError> {
    HttpServer::new(move || App::new().app_data(service.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
