use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use tenant_admin_api::config::config;
use tenant_admin_api::database::{DatabaseManager, MemoryStore, PgStore, Store, StoreError};
use tenant_admin_api::mail::LogMailer;
use tenant_admin_api::services::seed::{bootstrap_admin, seed_default_configs};
use tenant_admin_api::{app, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config();
    telemetry::init(config.environment);
    config.validate().context("invalid configuration")?;
    info!("Starting Tenant Admin API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match config.database.url {
        Some(_) => {
            let pool = DatabaseManager::connect_or_lazy(&config.database).await?;
            let store = PgStore::new(pool);
            match store.ping().await {
                Ok(()) => info!("Database schema is up to date"),
                Err(StoreError::Unavailable(e)) => {
                    warn!("Database unreachable, migrations deferred to first use: {}", e)
                }
                Err(e) => return Err(e).context("database migrations failed"),
            }
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    match seed_default_configs(store.as_ref()).await {
        Ok(0) => {}
        Ok(created) => info!(created, "Default configuration seeded"),
        Err(e) => warn!("Skipping configuration seed: {}", e),
    }
    if let Err(e) = bootstrap_admin(store.as_ref(), &config.admin).await {
        warn!("Skipping admin bootstrap: {}", e);
    }

    let state = AppState::new(store, config.clone(), Arc::new(LogMailer));
    let app = app(state);

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Tenant Admin API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
