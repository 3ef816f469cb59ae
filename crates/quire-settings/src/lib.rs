//! Typed, cached, permission-gated guild settings for quire.
//!
//! A setting is assembled from parts rather than inherited:
//!
//! ```text
//! SettingSpec
//!     |-- Check (read) / Check (write)   who may see / change it
//!     |-- ValueCodec                     parse, store and render the value
//!     +-- StorageStrategy                ColumnData | BoolData | ListData
//!             |
//!             +-- quire_db::Table        one table per setting, per app
//! ```
//!
//! Specs live in a [`SettingRegistry`] built at startup. Hot-path settings
//! are mirrored in a [`SettingCache`], which every write goes through after
//! the store write succeeds.
//!
//! # Modules
//!
//! - [`ids`] -- guild, user, channel and role ids
//! - [`context`] -- invocation context and permission checks
//! - [`data`] -- storage strategies and stored data
//! - [`codec`] -- value parsing, conversion and display
//! - [`setting`] -- setting descriptors and instances
//! - [`cache`] -- hot-path cache manager
//! - [`registry`] -- static setting registry
//! - [`refresh`] -- periodic cache refresh tasks
//! - [`catalog`] -- built-in guild settings
//! - [`error`] -- setting error types

pub mod cache;
pub mod catalog;
pub mod codec;
pub mod context;
pub mod data;
pub mod error;
pub mod ids;
pub mod refresh;
pub mod registry;
pub mod setting;

// Re-export primary types for convenience.
pub use cache::SettingCache;
pub use codec::{SettingValue, ValueCodec};
pub use context::{Check, Invocation, Permissions};
pub use data::{BoolData, ColumnData, ListData, SettingData, StorageStrategy, WriteOutcome};
pub use error::SettingError;
pub use ids::{ChannelId, GuildId, RoleId, UserId};
pub use registry::SettingRegistry;
pub use setting::{HIDDEN_PLACEHOLDER, Setting, SettingSpec};
