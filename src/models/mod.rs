//! Data models shared across the crate.

pub mod pool;

pub use pool::{PoolRole, PoolState, PoolStatus, mask_url};
