//! Backend connection pools and statement execution.
//!
//! Two backends are supported: `SQLite` (embedded, one file) and
//! `PostgreSQL` (networked). [`DbPool`] wraps the matching [`sqlx`] pool and
//! is the only place that knows how a [`Param`] is bound or a row decoded on
//! each backend; everything above it works with [`Statement`]s and
//! [`Record`]s.
//!
//! Queries are built at runtime (not compile-time checked) because table
//! shapes come from [`TableSchema`](crate::schema::TableSchema)s.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Database, PgPool, Postgres, Row, Sqlite, SqlitePool};

use crate::column::ColumnType;
use crate::error::DbError;
use crate::sql::{Param, Statement};
use crate::value::{Record, SqlValue};

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default `PostgreSQL` port.
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// SQL dialect spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Embedded `SQLite`.
    Sqlite,
    /// Networked `PostgreSQL`.
    Postgres,
}

impl Dialect {
    /// Parse a configured backend name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, DbError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(DbError::Config(format!("unknown backend type `{other}`"))),
        }
    }

    /// Canonical backend name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

/// Configuration for the embedded `SQLite` backend.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file; created if missing.
    pub path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout: Duration,
}

impl SqliteConfig {
    /// Configuration for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Configuration for the `PostgreSQL` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login role.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl PostgresConfig {
    /// Create a configuration with default pool settings.
    pub fn new(host: &str, username: &str, password: &str, database: &str) -> Self {
        Self {
            host: host.to_owned(),
            port: DEFAULT_POSTGRES_PORT,
            username: username.to_owned(),
            password: password.to_owned(),
            database: database.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    /// Set the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Fully resolved backend selection.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Embedded `SQLite` file.
    Sqlite(SqliteConfig),
    /// Networked `PostgreSQL` server.
    Postgres(PostgresConfig),
}

impl BackendConfig {
    /// Dialect the configured backend speaks.
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::Postgres(_) => Dialect::Postgres,
        }
    }
}

/// Connection pool for whichever backend was configured.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    /// `SQLite` pool.
    Sqlite(SqlitePool),
    /// `PostgreSQL` pool.
    Postgres(PgPool),
}

impl DbPool {
    /// Connect to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the connection fails.
    pub async fn connect(config: &BackendConfig) -> Result<Self, DbError> {
        match config {
            BackendConfig::Sqlite(cfg) => {
                let options = SqliteConnectOptions::new()
                    .filename(&cfg.path)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(cfg.connect_timeout)
                    .connect_with(options)
                    .await?;

                tracing::info!(
                    path = %cfg.path.display(),
                    max_connections = cfg.max_connections,
                    "Connected to SQLite"
                );
                Ok(Self::Sqlite(pool))
            }
            BackendConfig::Postgres(cfg) => {
                let options = PgConnectOptions::new()
                    .host(&cfg.host)
                    .port(cfg.port)
                    .username(&cfg.username)
                    .password(&cfg.password)
                    .database(&cfg.database);
                let pool = PgPoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .acquire_timeout(cfg.connect_timeout)
                    .idle_timeout(cfg.idle_timeout)
                    .connect_with(options)
                    .await?;

                tracing::info!(
                    host = %cfg.host,
                    database = %cfg.database,
                    max_connections = cfg.max_connections,
                    "Connected to PostgreSQL"
                );
                Ok(Self::Postgres(pool))
            }
        }
    }

    /// Dialect of this pool.
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Execute a statement, returning the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the statement fails.
    pub async fn execute(&self, stmt: &Statement) -> Result<u64, DbError> {
        let affected = match self {
            Self::Sqlite(pool) => {
                let mut query = sqlx::query::<Sqlite>(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite(query, param);
                }
                query.execute(pool).await?.rows_affected()
            }
            Self::Postgres(pool) => {
                let mut query = sqlx::query::<Postgres>(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres(query, param);
                }
                query.execute(pool).await?.rows_affected()
            }
        };
        tracing::trace!(sql = %stmt.sql, affected, "Executed statement");
        Ok(affected)
    }

    /// Run a query and decode each row using `manifest` (column name and
    /// logical type, in select order).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the query or decoding fails.
    pub async fn fetch_all(
        &self,
        stmt: &Statement,
        manifest: &[(String, ColumnType)],
    ) -> Result<Vec<Record>, DbError> {
        match self {
            Self::Sqlite(pool) => {
                let mut query = sqlx::query::<Sqlite>(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite(query, param);
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter()
                    .map(|row| decode_row(manifest, |name, ty| decode_sqlite(row, name, ty)))
                    .collect()
            }
            Self::Postgres(pool) => {
                let mut query = sqlx::query::<Postgres>(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres(query, param);
                }
                let rows = query.fetch_all(pool).await?;
                rows.iter()
                    .map(|row| decode_row(manifest, |name, ty| decode_postgres(row, name, ty)))
                    .collect()
            }
        }
    }

    /// Whether a table named `name` exists in the current database/schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the catalog query fails.
    pub async fn table_exists(&self, name: &str) -> Result<bool, DbError> {
        let count: i64 = match self {
            Self::Sqlite(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                )
                .bind(name)
                .fetch_one(pool)
                .await?
            }
            Self::Postgres(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM pg_catalog.pg_tables WHERE schemaname = current_schema() AND tablename = $1",
                )
                .bind(name)
                .fetch_one(pool)
                .await?
            }
        };
        Ok(count > 0)
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
        tracing::info!(backend = self.dialect().as_str(), "Connection pool closed");
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;
type PostgresQuery<'q> = Query<'q, Postgres, <Postgres as Database>::Arguments<'q>>;

fn bind_sqlite<'q>(query: SqliteQuery<'q>, param: &'q Param) -> SqliteQuery<'q> {
    match &param.value {
        SqlValue::Null => match param.ty {
            ColumnType::Int | ColumnType::Identifier => query.bind(None::<i64>),
            ColumnType::Bool => query.bind(None::<bool>),
            ColumnType::Timestamp => query.bind(None::<DateTime<Utc>>),
            ColumnType::ShortString | ColumnType::MessageString | ColumnType::Text => {
                query.bind(None::<String>)
            }
        },
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Timestamp(t) => query.bind(*t),
    }
}

fn bind_postgres<'q>(query: PostgresQuery<'q>, param: &'q Param) -> PostgresQuery<'q> {
    match &param.value {
        SqlValue::Null => match param.ty {
            ColumnType::Int => query.bind(None::<i32>),
            ColumnType::Identifier => query.bind(None::<i64>),
            ColumnType::Bool => query.bind(None::<bool>),
            ColumnType::Timestamp => query.bind(None::<DateTime<Utc>>),
            ColumnType::ShortString | ColumnType::MessageString | ColumnType::Text => {
                query.bind(None::<String>)
            }
        },
        // INTEGER columns are int4 on PostgreSQL; coercion has already
        // range-checked the value.
        SqlValue::Int(v) if param.ty == ColumnType::Int => match i32::try_from(*v) {
            Ok(narrow) => query.bind(narrow),
            Err(_) => query.bind(*v),
        },
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Text(s) => query.bind(s.as_str()),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Timestamp(t) => query.bind(*t),
    }
}

fn decode_row<F>(manifest: &[(String, ColumnType)], mut decode: F) -> Result<Record, DbError>
where
    F: FnMut(&str, ColumnType) -> Result<SqlValue, sqlx::Error>,
{
    manifest
        .iter()
        .map(|(name, ty)| Ok((name.clone(), decode(name, *ty)?)))
        .collect()
}

fn decode_sqlite(row: &SqliteRow, name: &str, ty: ColumnType) -> Result<SqlValue, sqlx::Error> {
    Ok(match ty {
        ColumnType::Int | ColumnType::Identifier => row.try_get::<Option<i64>, _>(name)?.into(),
        ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.into(),
        ColumnType::Timestamp => row.try_get::<Option<DateTime<Utc>>, _>(name)?.into(),
        ColumnType::ShortString | ColumnType::MessageString | ColumnType::Text => {
            row.try_get::<Option<String>, _>(name)?.into()
        }
    })
}

fn decode_postgres(row: &PgRow, name: &str, ty: ColumnType) -> Result<SqlValue, sqlx::Error> {
    Ok(match ty {
        ColumnType::Int => row.try_get::<Option<i32>, _>(name)?.map(i64::from).into(),
        ColumnType::Identifier => row.try_get::<Option<i64>, _>(name)?.into(),
        ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.into(),
        ColumnType::Timestamp => row.try_get::<Option<DateTime<Utc>>, _>(name)?.into(),
        ColumnType::ShortString | ColumnType::MessageString | ColumnType::Text => {
            row.try_get::<Option<String>, _>(name)?.into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(Dialect::parse("SQLite").ok(), Some(Dialect::Sqlite));
        assert_eq!(Dialect::parse("postgresql").ok(), Some(Dialect::Postgres));
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        assert!(matches!(Dialect::parse("mongodb"), Err(DbError::Config(_))));
    }

    #[test]
    fn postgres_defaults() {
        let cfg = PostgresConfig::new("db.internal", "quire", "secret", "quire");
        assert_eq!(cfg.port, DEFAULT_POSTGRES_PORT);
        assert_eq!(cfg.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(
            BackendConfig::Postgres(cfg.with_port(6543)).dialect(),
            Dialect::Postgres
        );
    }
}
