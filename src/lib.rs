//! Catalog Pool Library
//!
//! Lifecycle of a primary PostgreSQL pool plus any number of secondary
//! pools, where every physical connection is initialized identically
//! (JSON codecs, search path, session helper objects) before use.

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod http;
pub mod models;

pub use config::{Config, DatabaseSettings, PoolSizing};
pub use context::ServiceContext;
pub use db::{ConnectionHook, ConnectionInitializer, PoolHandle, PoolManager, PoolSet};
pub use error::{DbError, DbResult, InitError, InitStage};
