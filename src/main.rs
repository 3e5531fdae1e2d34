//! Emojipay Gateway - Cross-chain payments settled through emoji receipts
//!
//! The gateway stores emoji-coded receipts and pays them out by driving
//! cross-chain swaps through the Fusion+ protocol: quote, allowance,
//! hash-locked order placement, and settlement monitoring.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod api;
mod config;
mod error;
mod metrics;
mod prices;
mod receipts;
mod swap;
mod tokens;

use config::Settings;
use metrics::MetricsServer;
use receipts::ReceiptStore;
use swap::SwapTracker;

/// Completed attempts older than this are dropped from the tracker.
const TRACKER_MAX_AGE_SECS: i64 = 86_400;
const TRACKER_CLEANUP_INTERVAL_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Emojipay Gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Arc::new(Settings::load()?);
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    // Initialize database connection
    let store = Arc::new(ReceiptStore::new(&settings.database).await?);
    info!("Database connection established");

    // Run migrations
    store.run_migrations().await?;
    info!("Database migrations complete");

    let tracker = Arc::new(SwapTracker::new());

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let settings = settings.clone();
        let store = store.clone();
        let tracker = tracker.clone();
        async move {
            if let Err(e) = api::run_server(settings, store, tracker).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Tracker cleanup loop
    let cleanup_handle = tokio::spawn({
        let tracker = tracker.clone();
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(
                    TRACKER_CLEANUP_INTERVAL_SECS,
                ))
                .await;
                tracker.cleanup(TRACKER_MAX_AGE_SECS);
            }
        }
    });

    info!("Emojipay Gateway is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    api_handle.abort();
    cleanup_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Emojipay Gateway stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,emojipay_gateway=debug,sqlx=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
