//! Configuration handling for the catalog pool service.
//!
//! CLI arguments and environment variables are parsed by [`Config`], which
//! is then validated into the explicit [`DatabaseSettings`] consumed by the
//! pool manager.

use crate::db::SqlResource;
use crate::error::{DbError, DbResult};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_SCHEMA: &str = "public";

// Pool sizing defaults
pub const DEFAULT_MIN_CONN_SIZE: u32 = 1;
pub const DEFAULT_MAX_CONN_SIZE: u32 = 10;
pub const DEFAULT_MAX_QUERIES: u64 = 50_000;
pub const DEFAULT_MAX_INACTIVE_CONN_LIFETIME_SECS: u64 = 300;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_POSTGRES_HOST: &str = "localhost";
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Sizing applied identically to the primary and every secondary pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSizing {
    /// Connections kept open even when idle (default: 1)
    pub min_size: u32,
    /// Upper bound on physical connections (default: 10)
    pub max_size: u32,
    /// Checkout budget: times a connection is lent out before it is
    /// retired, counted per checkout rather than per query; 0 disables
    /// (default: 50000)
    pub max_queries: u64,
    /// Idle connections older than this are closed (default: 300s)
    pub max_inactive_lifetime: Duration,
    /// Bound on checkout and on the open-time probe (default: 30s)
    pub acquire_timeout: Duration,
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CONN_SIZE,
            max_size: DEFAULT_MAX_CONN_SIZE,
            max_queries: DEFAULT_MAX_QUERIES,
            max_inactive_lifetime: Duration::from_secs(DEFAULT_MAX_INACTIVE_CONN_LIFETIME_SECS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolSizing {
    /// Validate sizing and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_size == 0 {
            return Err("max_size must be greater than 0".to_string());
        }
        if self.min_size > self.max_size {
            return Err(format!(
                "min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            ));
        }
        if self.acquire_timeout.is_zero() {
            return Err("acquire_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Everything the pool manager needs, with defaults already applied.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Contains credentials - never log unmasked
    pub primary_url: String,
    /// Additional databases opened with the same sizing and initializer.
    pub secondary_urls: Vec<String>,
    pub sizing: PoolSizing,
    /// Schemas placed ahead of the server search path, after `pg_temp`.
    pub schemas: Vec<String>,
    /// Executed in order on every new connection, before the catalog script.
    pub sql_resources: Vec<SqlResource>,
}

impl DatabaseSettings {
    /// Settings for a single database with default sizing and no extras.
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            secondary_urls: Vec::new(),
            sizing: PoolSizing::default(),
            schemas: Vec::new(),
            sql_resources: Vec::new(),
        }
    }

    pub fn with_secondary_urls(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.secondary_urls = urls.into_iter().collect();
        self
    }

    pub fn with_sizing(mut self, sizing: PoolSizing) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_schemas(mut self, schemas: impl IntoIterator<Item = String>) -> Self {
        self.schemas = schemas.into_iter().collect();
        self
    }

    pub fn with_sql_resources(mut self, resources: impl IntoIterator<Item = SqlResource>) -> Self {
        self.sql_resources = resources.into_iter().collect();
        self
    }

    /// Validate URLs and sizing.
    pub fn validate(&self) -> DbResult<()> {
        self.sizing.validate().map_err(DbError::config)?;
        check_postgres_url(&self.primary_url)?;
        for url in &self.secondary_urls {
            check_postgres_url(url)?;
        }
        Ok(())
    }
}

fn check_postgres_url(raw: &str) -> DbResult<()> {
    let url = Url::parse(raw).map_err(|e| DbError::config(format!("Invalid database URL: {e}")))?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(DbError::config(format!(
            "Unsupported database URL scheme '{other}': expected postgres:// or postgresql://"
        ))),
    }
}

/// Configuration for the catalog pool service.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "catalog-pool",
    about = "PostgreSQL pool lifecycle with deterministic per-connection session initialization",
    version,
    author
)]
pub struct Config {
    /// Primary database URL. When absent it is composed from the --postgres-* options.
    #[arg(long, value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Database user (used when --database-url is absent)
    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: Option<String>,

    /// Database password (used when --database-url is absent)
    #[arg(long, env = "POSTGRES_PASS", hide_env_values = true)]
    pub postgres_pass: Option<String>,

    /// Database host (used when --database-url is absent)
    #[arg(long, default_value = DEFAULT_POSTGRES_HOST, env = "POSTGRES_HOST")]
    pub postgres_host: String,

    /// Database port (used when --database-url is absent)
    #[arg(long, default_value_t = DEFAULT_POSTGRES_PORT, env = "POSTGRES_PORT")]
    pub postgres_port: u16,

    /// Database name (used when --database-url is absent)
    #[arg(long, env = "POSTGRES_DBNAME")]
    pub postgres_dbname: Option<String>,

    /// Secondary database URLs, opened with the same settings as the primary.
    #[arg(
        long,
        value_name = "URL",
        env = "DATABASE_URL_LIST",
        value_delimiter = ','
    )]
    pub database_url_list: Vec<String>,

    /// Schemas to expose, in search path order. Names are matched exactly
    /// (case-sensitive), as if double-quoted in SQL.
    #[arg(
        long,
        value_name = "SCHEMA",
        env = "DB_SCHEMAS",
        value_delimiter = ',',
        default_value = DEFAULT_SCHEMA
    )]
    pub schemas: Vec<String>,

    /// SQL files executed on every new connection, in the given order.
    #[arg(
        long = "sql-file",
        value_name = "PATH",
        env = "DB_SQL_FILES",
        value_delimiter = ','
    )]
    pub sql_files: Vec<PathBuf>,

    /// Minimum pool size
    #[arg(long, default_value_t = DEFAULT_MIN_CONN_SIZE, env = "DB_MIN_CONN_SIZE")]
    pub db_min_conn_size: u32,

    /// Maximum pool size
    #[arg(long, default_value_t = DEFAULT_MAX_CONN_SIZE, env = "DB_MAX_CONN_SIZE")]
    pub db_max_conn_size: u32,

    /// Checkout budget per connection: times a connection is lent out
    /// before it is replaced, not a count of queries (0 = unlimited)
    #[arg(long, default_value_t = DEFAULT_MAX_QUERIES, env = "DB_MAX_QUERIES")]
    pub db_max_queries: u64,

    /// Seconds an idle connection may live before it is closed
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_INACTIVE_CONN_LIFETIME_SECS,
        env = "DB_MAX_INACTIVE_CONN_LIFETIME"
    )]
    pub db_max_inactive_conn_lifetime: u64,

    /// Seconds to wait for a connection before failing
    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS, env = "DB_ACQUIRE_TIMEOUT")]
    pub db_acquire_timeout: u64,

    /// HTTP host to bind the health endpoint to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind the health endpoint to
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "HTTP_PORT")]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database_url: None,
            postgres_user: None,
            postgres_pass: None,
            postgres_host: DEFAULT_POSTGRES_HOST.to_string(),
            postgres_port: DEFAULT_POSTGRES_PORT,
            postgres_dbname: None,
            database_url_list: Vec::new(),
            schemas: vec![DEFAULT_SCHEMA.to_string()],
            sql_files: Vec::new(),
            db_min_conn_size: DEFAULT_MIN_CONN_SIZE,
            db_max_conn_size: DEFAULT_MAX_CONN_SIZE,
            db_max_queries: DEFAULT_MAX_QUERIES,
            db_max_inactive_conn_lifetime: DEFAULT_MAX_INACTIVE_CONN_LIFETIME_SECS,
            db_acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Resolve the primary URL: explicit URL first, then the postgres_* parts.
    pub fn primary_url(&self) -> DbResult<String> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }

        let (Some(user), Some(dbname)) = (&self.postgres_user, &self.postgres_dbname) else {
            return Err(DbError::config(
                "No database configured: set DATABASE_URL or POSTGRES_USER and POSTGRES_DBNAME",
            ));
        };

        let mut url = Url::parse("postgresql://localhost")
            .map_err(|e| DbError::internal(format!("Base URL: {e}")))?;
        url.set_host(Some(&self.postgres_host))
            .map_err(|e| DbError::config(format!("Invalid postgres host: {e}")))?;
        // set_username/set_password/set_port only fail for cannot-be-a-base URLs
        let _ = url.set_username(user);
        let _ = url.set_password(self.postgres_pass.as_deref());
        let _ = url.set_port(Some(self.postgres_port));
        url.set_path(dbname);
        Ok(url.to_string())
    }

    /// Pool sizing from the db_* options.
    pub fn pool_sizing(&self) -> PoolSizing {
        PoolSizing {
            min_size: self.db_min_conn_size,
            max_size: self.db_max_conn_size,
            max_queries: self.db_max_queries,
            max_inactive_lifetime: Duration::from_secs(self.db_max_inactive_conn_lifetime),
            acquire_timeout: Duration::from_secs(self.db_acquire_timeout),
        }
    }

    /// Build validated database settings.
    pub fn database_settings(&self) -> DbResult<DatabaseSettings> {
        let schemas = self
            .schemas
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect::<Vec<_>>();

        let secondary_urls = self
            .database_url_list
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect::<Vec<_>>();

        let settings = DatabaseSettings::new(self.primary_url()?)
            .with_secondary_urls(secondary_urls)
            .with_sizing(self.pool_sizing())
            .with_schemas(schemas)
            .with_sql_resources(self.sql_files.iter().cloned().map(SqlResource::File));
        settings.validate()?;
        Ok(settings)
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.schemas, vec!["public".to_string()]);
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::parse_from([
            "catalog-pool",
            "--database-url",
            "postgres://u:p@db:5432/main",
            "--database-url-list",
            "postgres://u:p@a/one,postgres://u:p@b/two",
            "--schemas",
            "public,reporting",
            "--sql-file",
            "a.sql",
            "--sql-file",
            "b.sql",
            "--db-max-conn-size",
            "20",
        ]);
        assert_eq!(config.database_url.as_deref(), Some("postgres://u:p@db:5432/main"));
        assert_eq!(config.database_url_list.len(), 2);
        assert_eq!(config.schemas, vec!["public", "reporting"]);
        assert_eq!(
            config.sql_files,
            vec![PathBuf::from("a.sql"), PathBuf::from("b.sql")]
        );
        assert_eq!(config.db_max_conn_size, 20);
    }

    #[test]
    fn test_primary_url_explicit_wins() {
        let config = Config {
            database_url: Some("postgres://x@h/db".to_string()),
            postgres_user: Some("ignored".to_string()),
            postgres_dbname: Some("ignored".to_string()),
            ..Config::default()
        };
        assert_eq!(config.primary_url().unwrap(), "postgres://x@h/db");
    }

    #[test]
    fn test_primary_url_composed_from_parts() {
        let config = Config {
            postgres_user: Some("app".to_string()),
            postgres_pass: Some("p@ss word".to_string()),
            postgres_host: "db.internal".to_string(),
            postgres_port: 6543,
            postgres_dbname: Some("geo".to_string()),
            ..Config::default()
        };
        let url = config.primary_url().unwrap();
        assert!(url.starts_with("postgresql://app:"));
        assert!(url.ends_with("@db.internal:6543/geo"));
        // Password is percent-encoded, not raw
        assert!(!url.contains("p@ss word"));
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.username(), "app");
    }

    #[test]
    fn test_primary_url_missing() {
        let err = Config::default().primary_url().unwrap_err();
        assert!(matches!(err, DbError::Config { .. }));
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_database_settings_drops_empty_entries() {
        let config = Config {
            database_url: Some("postgres://u@h/db".to_string()),
            schemas: vec!["".to_string(), " public ".to_string(), "data".to_string()],
            database_url_list: vec!["".to_string(), "postgres://u@h2/db2".to_string()],
            sql_files: vec![PathBuf::from("x.sql")],
            ..Config::default()
        };
        let settings = config.database_settings().unwrap();
        assert_eq!(settings.schemas, vec!["public", "data"]);
        assert_eq!(settings.secondary_urls, vec!["postgres://u@h2/db2"]);
        assert_eq!(settings.sql_resources.len(), 1);
        assert_eq!(settings.sql_resources[0].name(), "x.sql");
    }

    #[test]
    fn test_database_settings_rejects_non_postgres_scheme() {
        let config = Config {
            database_url: Some("mysql://u@h/db".to_string()),
            ..Config::default()
        };
        let err = config.database_settings().unwrap_err();
        assert!(err.to_string().contains("mysql"));
    }

    #[test]
    fn test_database_settings_rejects_bad_secondary() {
        let config = Config {
            database_url: Some("postgres://u@h/db".to_string()),
            database_url_list: vec!["not a url".to_string()],
            ..Config::default()
        };
        assert!(config.database_settings().is_err());
    }

    #[test]
    fn test_pool_sizing_defaults() {
        let sizing = PoolSizing::default();
        assert_eq!(sizing.min_size, 1);
        assert_eq!(sizing.max_size, 10);
        assert_eq!(sizing.max_queries, 50_000);
        assert_eq!(sizing.max_inactive_lifetime, Duration::from_secs(300));
        assert_eq!(sizing.acquire_timeout, Duration::from_secs(30));
        assert!(sizing.validate().is_ok());
        assert_eq!(Config::default().pool_sizing(), sizing);
    }

    #[test]
    fn test_pool_sizing_validation_max_zero() {
        let sizing = PoolSizing {
            min_size: 0,
            max_size: 0,
            ..PoolSizing::default()
        };
        assert!(sizing.validate().unwrap_err().contains("max_size"));
    }

    #[test]
    fn test_pool_sizing_validation_min_exceeds_max() {
        let sizing = PoolSizing {
            min_size: 10,
            max_size: 5,
            ..PoolSizing::default()
        };
        let err = sizing.validate().unwrap_err();
        assert!(err.contains("min_size"));
        assert!(err.contains("cannot exceed"));
    }

    #[test]
    fn test_pool_sizing_zero_min_is_allowed() {
        let sizing = PoolSizing {
            min_size: 0,
            ..PoolSizing::default()
        };
        assert!(sizing.validate().is_ok());
    }
}
