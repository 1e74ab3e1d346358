//! Per-connection initialization protocol.
//!
//! Every physical connection entering a pool runs [`ConnectionInitializer`]
//! before it is lent out. The steps run strictly in this order:
//!
//! 1. register the JSON / JSONB structured-value codecs
//! 2. prefix `pg_temp` and the configured schemas to the server search path
//! 3. execute the user SQL resources, in listed order
//! 4. execute the bundled catalog script
//!
//! The first failing step aborts the rest. The pool then discards the
//! connection, so a partially initialized session is never handed out.

use crate::db::codec::JSON_CODECS;
use crate::db::session::Session;
use crate::error::{InitError, ResourceError};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Connection-local scratch schema holding session helper objects.
pub const SCRATCH_SCHEMA: &str = "pg_temp";

/// Logical name of the bundled catalog script.
pub const CATALOG_SCRIPT_NAME: &str = "dbcatalog.sql";

/// Bundled catalog-registration SQL, always executed last.
pub const CATALOG_SQL: &str = include_str!("../sql/dbcatalog.sql");

/// Hook run by a pool on every new physical connection.
pub trait ConnectionHook: Send + Sync + 'static {
    fn initialize<S: Session>(
        &self,
        session: &mut S,
    ) -> impl Future<Output = Result<(), InitError>> + Send;
}

/// A SQL script executed on every new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlResource {
    /// Read fully from disk each time a connection is initialized.
    File(PathBuf),
    /// Text embedded in the binary, e.g. with `include_str!`.
    Inline { name: String, sql: String },
}

impl SqlResource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn inline(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Inline {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// Identity reported in errors and logs.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Inline { name, .. } => name.clone(),
        }
    }

    async fn load(&self) -> Result<String, ResourceError> {
        match self {
            Self::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            Self::Inline { sql, .. } => Ok(sql.clone()),
        }
    }
}

/// Quote a schema name as a SQL identifier. Case is preserved, no folding.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a value as a SQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Immutable initialization policy shared by every connection of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInitializer {
    extra_schemas: Vec<String>,
    user_sql: Vec<SqlResource>,
}

impl ConnectionInitializer {
    pub fn new(extra_schemas: Vec<String>, user_sql: Vec<SqlResource>) -> Self {
        Self {
            extra_schemas,
            user_sql,
        }
    }

    pub fn extra_schemas(&self) -> &[String] {
        &self.extra_schemas
    }

    pub fn user_sql(&self) -> &[SqlResource] {
        &self.user_sql
    }

    /// Schemas placed ahead of the server search path, scratch schema first.
    pub fn search_path_prefix(&self) -> String {
        std::iter::once(SCRATCH_SCHEMA.to_string())
            .chain(self.extra_schemas.iter().map(|s| quote_ident(s)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Statement prefixing the server search path without replacing it.
    pub fn search_path_sql(&self) -> String {
        format!(
            "SELECT set_config('search_path', {} || ',' || current_setting('search_path', false), false)",
            quote_literal(&self.search_path_prefix())
        )
    }

    async fn register_codecs<S: Session>(&self, session: &mut S) -> Result<(), InitError> {
        for codec in JSON_CODECS {
            session
                .register_codec(codec)
                .await
                .map_err(|e| InitError::codec(codec.qualified_name(), e))?;
        }
        Ok(())
    }

    async fn set_search_path<S: Session>(&self, session: &mut S) -> Result<(), InitError> {
        let prefix = self.search_path_prefix();
        debug!(search_path = %prefix, "Prefixing search_path");
        session
            .execute_script(&self.search_path_sql())
            .await
            .map_err(|e| InitError::schema_path(prefix, e))
    }

    async fn run_user_sql<S: Session>(&self, session: &mut S) -> Result<(), InitError> {
        for resource in &self.user_sql {
            let sql = resource
                .load()
                .await
                .map_err(|e| InitError::user_sql(resource.name(), e))?;
            session
                .execute_script(&sql)
                .await
                .map_err(|e| InitError::user_sql(resource.name(), e))?;
            trace!(resource = %resource.name(), "User SQL applied");
        }
        Ok(())
    }

    async fn register_catalog<S: Session>(&self, session: &mut S) -> Result<(), InitError> {
        session
            .execute_script(CATALOG_SQL)
            .await
            .map_err(InitError::catalog)
    }
}

impl ConnectionHook for ConnectionInitializer {
    async fn initialize<S: Session>(&self, session: &mut S) -> Result<(), InitError> {
        self.register_codecs(session).await?;
        self.set_search_path(session).await?;
        self.run_user_sql(session).await?;
        self.register_catalog(session).await?;
        trace!(catalog = CATALOG_SCRIPT_NAME, "Connection initialized");
        Ok(())
    }
}
