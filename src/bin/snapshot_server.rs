use dotenvy::dotenv;
use eyre::WrapErr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use portfolio_snapshot_ingest::config;
use portfolio_snapshot_ingest::db::store::{MemorySnapshotStore, RedisSnapshotStore, SnapshotStore};
use portfolio_snapshot_ingest::http;
use portfolio_snapshot_ingest::logging;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load environment variables from .env file (optional for the server)
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = config::Config::load()?;
    info!(mode = %cfg.mode, key_prefix = %cfg.snapshot_key_prefix, "Loaded configuration and initialized logging");

    // Store handle is built once and shared by every request
    let store: Arc<dyn SnapshotStore> = if std::env::args().any(|arg| arg == "--memory") {
        warn!("Using in-memory snapshot store, nothing will be persisted");
        Arc::new(MemorySnapshotStore::new())
    } else {
        Arc::new(RedisSnapshotStore::new(&cfg).wrap_err("Failed to create Redis snapshot store")?)
    };

    let app = http::configure_routes(store);

    let listener = TcpListener::bind(cfg.bind_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "Snapshot server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("Server error")?;

    info!("Snapshot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {:?}", e);
        return;
    }
    info!("Shutdown signal received");
}
