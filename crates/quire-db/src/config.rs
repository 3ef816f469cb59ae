//! Deserializable backend configuration.
//!
//! [`DataConfig`] is the `[data]` section of the node configuration file.
//! Every field is optional so that file and environment layers can each
//! supply part of it; [`DataConfig::resolve`] turns it into a
//! [`BackendConfig`] and reports whatever is missing.

use std::path::PathBuf;

use serde::Deserialize;

use crate::backend::{BackendConfig, DEFAULT_POSTGRES_PORT, Dialect, PostgresConfig, SqliteConfig};
use crate::error::DbError;

/// Database file used when none is configured.
pub const DEFAULT_SQLITE_PATH: &str = "quire.db";

/// Backend selection and connection parameters as read from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// `sqlite` or `postgres`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Database file (`SQLite`).
    pub path: Option<PathBuf>,
    /// Server host (`PostgreSQL`).
    pub host: Option<String>,
    /// Server port (`PostgreSQL`).
    pub port: Option<u16>,
    /// Login role (`PostgreSQL`).
    pub username: Option<String>,
    /// Login password (`PostgreSQL`).
    pub password: Option<String>,
    /// Database name (`PostgreSQL`).
    pub database: Option<String>,
    /// Pool size override.
    pub max_connections: Option<u32>,
}

fn default_backend() -> String {
    String::from("sqlite")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: Some(PathBuf::from(DEFAULT_SQLITE_PATH)),
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            max_connections: None,
        }
    }
}

impl DataConfig {
    /// Validate the section and build the backend configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an unknown backend or a missing
    /// connection parameter.
    pub fn resolve(&self) -> Result<BackendConfig, DbError> {
        match Dialect::parse(&self.backend)? {
            Dialect::Sqlite => {
                let path = self
                    .path
                    .clone()
                    .ok_or_else(|| missing("path", Dialect::Sqlite))?;
                let mut cfg = SqliteConfig::new(path);
                if let Some(max) = self.max_connections {
                    cfg = cfg.with_max_connections(max);
                }
                Ok(BackendConfig::Sqlite(cfg))
            }
            Dialect::Postgres => {
                let host = required(self.host.as_deref(), "host")?;
                let username = required(self.username.as_deref(), "username")?;
                let password = required(self.password.as_deref(), "password")?;
                let database = required(self.database.as_deref(), "database")?;

                let mut cfg = PostgresConfig::new(host, username, password, database)
                    .with_port(self.port.unwrap_or(DEFAULT_POSTGRES_PORT));
                if let Some(max) = self.max_connections {
                    cfg = cfg.with_max_connections(max);
                }
                Ok(BackendConfig::Postgres(cfg))
            }
        }
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> Result<&'a str, DbError> {
    value.ok_or_else(|| missing(key, Dialect::Postgres))
}

fn missing(key: &str, dialect: Dialect) -> DbError {
    DbError::Config(format!(
        "missing `data.{key}` for the {} backend",
        dialect.as_str()
    ))
}
