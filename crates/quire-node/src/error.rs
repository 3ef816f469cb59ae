//! Error types for the node binary.
//!
//! [`NodeError`] wraps every failure mode of startup and shutdown so that
//! `main` can propagate with `?`.

/// Top-level error for the node binary.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration file or environment could not be read.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: config::ConfigError,
    },

    /// Opening, checking or writing the store failed.
    #[error("data error: {source}")]
    Data {
        /// The underlying store error.
        #[from]
        source: quire_db::DbError,
    },

    /// Registering or loading settings failed.
    #[error("settings error: {source}")]
    Settings {
        /// The underlying settings error.
        #[from]
        source: quire_settings::SettingError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
