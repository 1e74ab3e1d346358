//! Catalog Pool - Main entry point.
//!
//! Opens the configured pools, serves the health endpoint until a shutdown
//! signal arrives, then closes every pool.

use catalog_pool::config::Config;
use catalog_pool::context::ServiceContext;
use catalog_pool::db::PoolManager;
use catalog_pool::http;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    info!("Starting catalog-pool v{}", env!("CARGO_PKG_VERSION"));

    let settings = match config.database_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let ctx = Arc::new(ServiceContext::new());
    let manager = PoolManager::new(settings);

    // Startup fails loudly if any pool cannot be opened
    if let Err(e) = manager.open(&ctx).await {
        error!(error = %e, suggestion = ?e.suggestion(), "Failed to open database pools");
        return Err(e.into());
    }

    let result = http::serve(
        Arc::clone(&ctx),
        &config.http_bind_addr(),
        http::wait_for_signal(),
    )
    .await;

    info!("Closing database pools");
    PoolManager::close(&ctx).await;

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
