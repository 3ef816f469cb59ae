//! Node configuration.
//!
//! Loaded with the `config` crate from two layers, later layers winning:
//!
//! 1. An optional TOML file, `quire.toml` in the working directory or the
//!    path named by `QUIRE_CONFIG`.
//! 2. Environment variables prefixed `QUIRE__`, with `__` separating
//!    nested keys (`QUIRE__DATA__BACKEND=postgres`).
//!
//! ```toml
//! app = "quire"
//!
//! [data]
//! backend = "sqlite"
//! path = "quire.db"
//!
//! [logging]
//! level = "info"
//!
//! [[properties]]
//! store = "user_props"
//! names = ["timezone"]
//! shared = true
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use quire_db::DataConfig;
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "QUIRE_CONFIG";

/// Configuration file read when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "quire.toml";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "QUIRE";

/// Separator between nested keys in environment overrides.
const ENV_SEPARATOR: &str = "__";

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Application name; namespaces non-shared tables and properties.
    #[serde(default = "default_app")]
    pub app: String,
    /// Storage backend.
    #[serde(default)]
    pub data: DataConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Properties to declare at startup.
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// A group of properties declared in one property store.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDecl {
    /// Property store name, e.g. `user_props`.
    pub store: String,
    /// Property names.
    pub names: Vec<String>,
    /// Whether the properties are visible to every application.
    #[serde(default)]
    pub shared: bool,
}

fn default_app() -> String {
    String::from("quire")
}

fn default_level() -> String {
    String::from("info")
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            data: DataConfig::default(),
            logging: LoggingConfig::default(),
            properties: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl NodeConfig {
    /// Load from the configured file (if present) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value has the wrong
    /// type.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_owned());
        Self::load_from(&path)
    }

    /// Load from `path` (optional) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or a value has the wrong
    /// type.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .separator(ENV_SEPARATOR),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document without consulting the environment.
    #[cfg(test)]
    fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use quire_db::BackendConfig;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = NodeConfig::from_toml("").unwrap();
        assert_eq!(cfg.app, "quire");
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
        assert!(cfg.properties.is_empty());
        assert!(matches!(cfg.data.resolve(), Ok(BackendConfig::Sqlite(_))));
    }

    #[test]
    fn full_document() {
        let cfg = NodeConfig::from_toml(
            r#"
            app = "modbot"

            [data]
            backend = "postgres"
            host = "db.internal"
            port = 6543
            username = "quire"
            password = "secret"
            database = "bots"

            [logging]
            level = "debug"
            json = true

            [[properties]]
            store = "user_props"
            names = ["timezone", "locale"]
            shared = true

            [[properties]]
            store = "guild_props"
            names = ["welcome_sent"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.app, "modbot");
        assert!(cfg.logging.json);
        assert_eq!(cfg.properties.len(), 2);
        assert!(cfg.properties.first().unwrap().shared);
        assert!(!cfg.properties.last().unwrap().shared);

        match cfg.data.resolve().unwrap() {
            BackendConfig::Postgres(pg) => {
                assert_eq!(pg.host, "db.internal");
                assert_eq!(pg.port, 6543);
            }
            BackendConfig::Sqlite(_) => panic!("expected postgres"),
        }
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let cfg = NodeConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.app, "quire");
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quire.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "app = \"filebot\"\n[data]\npath = \"bots.db\"").unwrap();

        let cfg = NodeConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.app, "filebot");
        assert_eq!(cfg.data.path, Some(PathBuf::from("bots.db")));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(NodeConfig::from_toml("[data]\nport = \"not a port\"").is_err());
    }
}
