//! Health endpoint for the hosting binary.
//!
//! `GET /healthz` checks out one connection from every published pool and
//! runs `SELECT 1`. Any unhealthy pool, or no pools at all, answers 503.

use crate::context::ServiceContext;
use crate::error::{DbError, DbResult};
use crate::models::PoolStatus;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// Upper bound on a full health check across all pools.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub pools: Vec<PoolStatus>,
}

/// Build the router.
pub fn router(ctx: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .with_state(ctx)
}

async fn healthz(State(ctx): State<Arc<ServiceContext>>) -> DbResult<Json<HealthReport>> {
    let pools = ctx.pool_set().await?;
    let statuses = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, pools.check())
        .await
        .map_err(|_| DbError::timeout("health check", HEALTH_CHECK_TIMEOUT.as_secs()))?;

    if let Some(bad) = statuses.iter().find(|s| !s.healthy) {
        return Err(DbError::unavailable(format!(
            "pool {} is unhealthy: {}",
            bad.role,
            bad.error.as_deref().unwrap_or("unknown error")
        )));
    }

    Ok(Json(HealthReport {
        status: "ok",
        pools: statuses,
    }))
}

/// Serve the router until `shutdown` resolves.
pub async fn serve(
    ctx: Arc<ServiceContext>,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> DbResult<()> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        DbError::config(format!(
            "Failed to bind to {}: {}. Check that the port is available",
            bind_addr, e
        ))
    })?;
    info!(addr = %bind_addr, "Health endpoint listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server error");
            DbError::internal(format!("HTTP server error: {}", e))
        })?;

    info!("HTTP server stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
