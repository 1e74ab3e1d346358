//! Pool lifecycle for the whole process.
//!
//! [`PoolManager::open`] builds the [`ConnectionInitializer`] from settings,
//! opens the primary pool and then each secondary pool in order, and
//! publishes the resulting [`PoolSet`] into the [`ServiceContext`].
//! Opening is all-or-nothing: if any pool fails, every pool already opened
//! is closed before the error is returned.
//!
//! [`PoolManager::close`] closes the primary and every secondary pool.

use crate::config::{DatabaseSettings, PoolSizing};
use crate::context::ServiceContext;
use crate::db::init::{ConnectionHook, ConnectionInitializer};
use crate::db::pool::{PoolHandle, PoolSet};
use crate::error::DbResult;
use crate::models::PoolRole;
use std::sync::Arc;
use tracing::{info, warn};

/// Create the primary pool and every secondary pool, then open them in order.
pub async fn open_pool_set<H: ConnectionHook>(
    primary_url: &str,
    secondary_urls: &[String],
    sizing: &PoolSizing,
    hook: Arc<H>,
) -> DbResult<PoolSet> {
    let primary = PoolHandle::create(PoolRole::Primary, primary_url, sizing, Arc::clone(&hook))?;

    let secondaries = secondary_urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            PoolHandle::create(PoolRole::Secondary(index), url, sizing, Arc::clone(&hook))
        })
        .collect::<DbResult<Vec<_>>>();
    let secondaries = match secondaries {
        Ok(secondaries) => secondaries,
        Err(e) => {
            primary.close().await;
            return Err(e);
        }
    };

    let pools = PoolSet::new(primary, secondaries);
    pools.open().await?;
    Ok(pools)
}

/// Owns pool creation and teardown for the hosting application.
#[derive(Debug, Clone)]
pub struct PoolManager {
    settings: DatabaseSettings,
}

impl PoolManager {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Initializer built from the configured schemas and SQL resources.
    pub fn initializer(&self) -> ConnectionInitializer {
        ConnectionInitializer::new(
            self.settings.schemas.clone(),
            self.settings.sql_resources.clone(),
        )
    }

    /// Open all pools with the configured initializer and publish them.
    pub async fn open(&self, ctx: &ServiceContext) -> DbResult<Arc<PoolSet>> {
        self.open_with_hook(ctx, Arc::new(self.initializer())).await
    }

    /// Open all pools with a caller-supplied hook and publish them.
    pub async fn open_with_hook<H: ConnectionHook>(
        &self,
        ctx: &ServiceContext,
        hook: Arc<H>,
    ) -> DbResult<Arc<PoolSet>> {
        self.settings.validate()?;

        info!(
            secondaries = self.settings.secondary_urls.len(),
            schemas = ?self.settings.schemas,
            sql_resources = self.settings.sql_resources.len(),
            min_size = self.settings.sizing.min_size,
            max_size = self.settings.sizing.max_size,
            "Opening database pools"
        );

        let pools = Arc::new(
            open_pool_set(
                &self.settings.primary_url,
                &self.settings.secondary_urls,
                &self.settings.sizing,
                hook,
            )
            .await?,
        );

        if let Some(previous) = ctx.publish(Arc::clone(&pools)).await {
            warn!("Replacing previously published pools, closing them");
            previous.close().await;
        }

        info!(pools = 1 + pools.secondaries().len(), "Database pools ready");
        Ok(pools)
    }

    /// Close every published pool and clear the context.
    pub async fn close(ctx: &ServiceContext) {
        match ctx.take().await {
            Some(pools) => {
                pools.close().await;
                info!("All database pools closed");
            }
            None => info!("No database pools to close"),
        }
    }
}
