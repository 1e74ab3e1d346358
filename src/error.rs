//! Error types for pool lifecycle and connection initialization.
//!
//! Two layers, both built with `thiserror`:
//! - [`InitError`]: a single physical connection failed one of the
//!   initialization stages. The connection is discarded and sqlx retries.
//! - [`DbError`]: everything a caller of this crate can observe, including
//!   initialization failures that surfaced through the pool.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Stage of the per-connection initialization protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Codec,
    SearchPath,
    UserSql,
    Catalog,
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec => write!(f, "codec"),
            Self::SearchPath => write!(f, "search_path"),
            Self::UserSql => write!(f, "user_sql"),
            Self::Catalog => write!(f, "catalog"),
        }
    }
}

/// Why a user SQL resource could not be applied.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("execution failed: {0}")]
    Execute(#[from] sqlx::Error),
}

/// Failure of one initialization stage on one physical connection.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Codec registration failed for {type_name}: {source}")]
    CodecRegistration {
        type_name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Setting search_path to '{search_path}' failed: {source}")]
    SchemaPath {
        search_path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("User SQL resource '{resource}' failed: {source}")]
    UserSql {
        resource: String,
        #[source]
        source: ResourceError,
    },

    #[error("Catalog registration failed: {source}")]
    CatalogRegistration {
        #[source]
        source: sqlx::Error,
    },
}

impl InitError {
    pub fn codec(type_name: impl Into<String>, source: sqlx::Error) -> Self {
        Self::CodecRegistration {
            type_name: type_name.into(),
            source,
        }
    }

    pub fn schema_path(search_path: impl Into<String>, source: sqlx::Error) -> Self {
        Self::SchemaPath {
            search_path: search_path.into(),
            source,
        }
    }

    pub fn user_sql(resource: impl Into<String>, source: impl Into<ResourceError>) -> Self {
        Self::UserSql {
            resource: resource.into(),
            source: source.into(),
        }
    }

    pub fn catalog(source: sqlx::Error) -> Self {
        Self::CatalogRegistration { source }
    }

    /// The stage that failed.
    pub fn stage(&self) -> InitStage {
        match self {
            Self::CodecRegistration { .. } => InitStage::Codec,
            Self::SchemaPath { .. } => InitStage::SearchPath,
            Self::UserSql { .. } => InitStage::UserSql,
            Self::CatalogRegistration { .. } => InitStage::Catalog,
        }
    }

    /// Identity of the failing user resource, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::UserSql { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Catalog failures hit every connection identically: a deployment defect.
    pub fn is_deployment_defect(&self) -> bool {
        matches!(self, Self::CatalogRegistration { .. })
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Failed to open pool for {url}: {message}")]
    PoolOpen {
        /// Credentials are masked.
        url: String,
        message: String,
        suggestion: String,
    },

    #[error("Connection initialization failed at stage '{stage}': {0}", stage = .0.stage())]
    Initialization(#[from] InitError),

    #[error("Pool '{pool}' is closed")]
    PoolClosed { pool: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a pool open error. `url` must already be masked.
    pub fn pool_open(
        url: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::PoolOpen {
            url: url.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a pool closed error.
    pub fn pool_closed(pool: impl Into<String>) -> Self {
        Self::PoolClosed { pool: pool.into() }
    }

    /// Create a service unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::PoolOpen { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Initialization(e) if e.is_deployment_defect() => {
                Some("The bundled catalog script failed; check server version and privileges")
            }
            Self::Initialization(_) => {
                Some("Check the configured schemas and SQL files against the database")
            }
            Self::PoolClosed { .. } => Some("The service is shutting down or was restarted"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::Timeout { .. } | Self::Initialization(_)
        )
    }

    /// HTTP status a request handler should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PoolOpen { .. }
            | Self::Initialization(_)
            | Self::PoolClosed { .. }
            | Self::Unavailable { .. }
            | Self::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config { .. } | Self::Database { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(source) => DbError::config(source.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => {
                DbError::unavailable("timed out waiting for a healthy connection")
            }
            sqlx::Error::PoolClosed => DbError::pool_closed("unknown"),
            sqlx::Error::Io(io_err) => {
                DbError::unavailable(format!("I/O error talking to the database: {}", io_err))
            }
            sqlx::Error::Tls(tls_err) => DbError::unavailable(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::internal(format!("Protocol error: {}", msg)),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::internal(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Request handlers see a classified status, never a raw driver error.
impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.to_string(),
            "suggestion": self.suggestion(),
        });
        (status, Json(body)).into_response()
    }
}
