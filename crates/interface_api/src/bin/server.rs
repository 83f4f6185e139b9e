//! Coverage Engine - API Server Binary
//!
//! This binary starts the HTTP API server for the coverage calculation engine.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration and an empty catalog
//! cargo run --bin coverage-api
//!
//! # Run with a catalog snapshot
//! API_CATALOG_PATH=catalog.json API_PORT=9000 cargo run --bin coverage-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_LOG_LEVEL` - Log filter: trace, debug, info, warn, error (default: info)
//! * `API_JSON_LOGS` - Emit JSON log lines (default: false)
//! * `API_CATALOG_PATH` - JSON catalog snapshot to load at startup
//! * `API_ENGINE__*` - Engine settings, e.g. `API_ENGINE__CACHE_TTL_SECS=60`

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_coverage::InMemoryCoverageStore;
use interface_api::{config::ApiConfig, create_router, AppState};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration and the catalog, and starts
/// the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API configuration")?;
    init_tracing(&config.log_level, config.json_logs);
    config
        .engine
        .validate()
        .context("invalid engine configuration")?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting coverage API server"
    );

    let store = load_store(config.catalog_path.as_deref()).await?;
    let app = create_router(AppState::new(store, config.engine.clone()));

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Loads the catalog snapshot, or starts with an empty store.
async fn load_store(path: Option<&str>) -> anyhow::Result<Arc<InMemoryCoverageStore>> {
    let store = match path {
        Some(path) => {
            tracing::info!(path, "Loading catalog snapshot");
            InMemoryCoverageStore::load(path)
                .await
                .with_context(|| format!("failed to load catalog {}", path))?
        }
        None => {
            tracing::warn!("No catalog configured, starting with an empty store");
            InMemoryCoverageStore::new()
        }
    };
    Ok(Arc::new(store))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
