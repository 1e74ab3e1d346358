//! Process-wide service state.
//!
//! One [`ServiceContext`] is built at startup and shared by `Arc` with every
//! component that needs pool access. It owns the published [`PoolSet`] for
//! the lifetime of the hosting application.

use crate::db::{PoolHandle, PoolSet};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ServiceContext {
    pools: RwLock<Option<Arc<PoolSet>>>,
}

impl ServiceContext {
    /// Create an empty context (no pools published).
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a pool set, returning the one it replaces.
    pub async fn publish(&self, pools: Arc<PoolSet>) -> Option<Arc<PoolSet>> {
        self.pools.write().await.replace(pools)
    }

    /// Remove the published pool set.
    pub async fn take(&self) -> Option<Arc<PoolSet>> {
        self.pools.write().await.take()
    }

    /// Check if a pool set is published.
    pub async fn is_open(&self) -> bool {
        self.pools.read().await.is_some()
    }

    /// The published pool set.
    pub async fn pool_set(&self) -> DbResult<Arc<PoolSet>> {
        self.pools
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| DbError::unavailable("database pools are not open"))
    }

    /// The primary pool.
    pub async fn primary(&self) -> DbResult<PoolHandle> {
        Ok(self.pool_set().await?.primary().clone())
    }

    /// The secondary pool at `index`, in configured order.
    pub async fn secondary(&self, index: usize) -> DbResult<PoolHandle> {
        let pools = self.pool_set().await?;
        pools.secondary(index).cloned().ok_or_else(|| {
            DbError::unavailable(format!(
                "secondary pool {} is not configured ({} available)",
                index,
                pools.secondaries().len()
            ))
        })
    }
}
