//! Database layer.
//!
//! - Structured-value codecs for JSON / JSONB
//! - The `Session` capability used during initialization
//! - The per-connection initialization protocol
//! - Pool handles and the process-wide pool lifecycle

pub mod codec;
pub mod init;
pub mod manager;
pub mod pool;
pub mod session;

pub use codec::{JSON_CODECS, JsonCodec, StructuredValue};
pub use init::{
    CATALOG_SCRIPT_NAME, CATALOG_SQL, ConnectionHook, ConnectionInitializer, SCRATCH_SCHEMA,
    SqlResource,
};
pub use manager::{PoolManager, open_pool_set};
pub use pool::{LEASE_COUNT_SETTING, PoolHandle, PoolSet};
pub use session::Session;
