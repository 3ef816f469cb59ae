//! Error types for the settings layer.
//!
//! [`SettingError::BadInput`] and [`SettingError::PermissionDenied`] are
//! per-request failures meant to be shown to the caller; everything else
//! is a storage or programming error.

use quire_db::DbError;

/// Errors that can occur while reading, parsing or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingError {
    /// User input failed to parse or validate. Carries an optional
    /// user-facing message.
    #[error("{}", .0.as_deref().unwrap_or("invalid value"))]
    BadInput(Option<String>),

    /// A permission check rejected the caller.
    #[error("{0}")]
    PermissionDenied(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// No setting is registered under this id.
    #[error("unknown setting `{0}`")]
    UnknownSetting(String),

    /// A setting id was registered twice.
    #[error("setting `{0}` is already registered")]
    Duplicate(String),

    /// Data handed to a storage strategy has the wrong shape for it.
    #[error("setting `{setting}` stores {expected} data")]
    DataMismatch {
        /// Table of the strategy that rejected the data.
        setting: String,
        /// Shape the strategy expects.
        expected: &'static str,
    },
}

impl SettingError {
    /// Bad input with a user-facing message.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput(Some(message.into()))
    }

    /// Whether the error should be rendered to the caller rather than
    /// logged as a failure.
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::BadInput(_) | Self::PermissionDenied(_))
    }
}
