//! Artesia Service - HTTP API for credit-metered photo conversions
//!
//! This is the main entry point for the artesia service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artesia_core::StyleCatalog;
use artesia_ledger::LedgerOptions;
use artesia_service::{create_router, AppState, ServiceConfig};
use artesia_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,artesia=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Artesia Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        openai_configured = %config.openai_api_key.is_some(),
        jwt_configured = %config.auth_jwt_secret.is_some(),
        free_trial_credits = config.free_trial_credits,
        "Service configuration loaded"
    );

    let catalog = match &config.styles_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading style catalog");
            StyleCatalog::from_json_file(path)?
        }
        None => StyleCatalog::builtin()?,
    };
    tracing::info!(styles = catalog.len(), "Style catalog ready");

    let store = open_store(&config)?;

    // Reconcile conversions stranded by a previous crash before accepting new ones
    let options = LedgerOptions {
        transform_timeout: Duration::from_secs(config.transform_timeout_seconds),
        ..LedgerOptions::default()
    };
    let recovered = artesia_ledger::recover_interrupted(store.as_ref(), &options).await?;
    if recovered > 0 {
        tracing::warn!(recovered, "Refunded interrupted conversions");
    }

    let state = AppState::new(store, Arc::new(catalog), config.clone());

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(artesia_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("RocksDB backend not compiled in - using in-memory store");
    Ok(Arc::new(artesia_store::MemoryStore::new()))
}
