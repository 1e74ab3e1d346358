//! The connection capability used during initialization.
//!
//! Initialization only needs two things from a connection: run a SQL script
//! and register a codec. Keeping that behind [`Session`] lets the
//! initializer run against a recording double in tests.

use crate::db::codec::JsonCodec;
use sqlx::PgConnection;
use sqlx::postgres::types::Oid;
use std::future::Future;
use tracing::trace;

const RESOLVE_TYPE_SQL: &str = "SELECT t.oid \
     FROM pg_catalog.pg_type t \
     JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
     WHERE t.typname = $1 AND n.nspname = $2";

/// A live database session that can be initialized.
pub trait Session: Send {
    /// Execute SQL text verbatim. Multiple statements are allowed.
    fn execute_script(&mut self, sql: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Bind `codec` to its wire type on this session.
    fn register_codec(
        &mut self,
        codec: JsonCodec,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl Session for PgConnection {
    async fn execute_script(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        // Simple query protocol: scripts may hold several statements and $$ bodies.
        sqlx::Executor::execute(&mut *self, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn register_codec(&mut self, codec: JsonCodec) -> Result<(), sqlx::Error> {
        let oid: Oid = sqlx::query_scalar(RESOLVE_TYPE_SQL)
            .bind(codec.type_name())
            .bind(codec.schema())
            .fetch_one(&mut *self)
            .await?;

        if oid.0 != codec.oid() {
            return Err(sqlx::Error::TypeNotFound {
                type_name: format!(
                    "{} resolved to oid {} instead of built-in oid {}",
                    codec.qualified_name(),
                    oid.0,
                    codec.oid()
                ),
            });
        }

        trace!(codec = %codec, oid = oid.0, "Codec registered");
        Ok(())
    }
}
