//! Data layer for quire: schema-driven entity stores over `SQLite` and
//! `PostgreSQL`.
//!
//! Tables are declared at runtime as [`TableSchema`]s, turned into DDL for
//! whichever backend is configured, and accessed through two kinds of
//! store: structured [`Table`]s (row CRUD with equality/`IN` filters) and
//! [`PropTable`]s (entity-attribute-value properties with JSON payloads and
//! per-app namespacing).
//!
//! # Architecture
//!
//! ```text
//! DataRegistry (app namespace, one per process)
//!     |
//!     +-- DbPool -------------> SQLite | PostgreSQL
//!     |
//!     +-- Table     (structured; settings tables, version_number)
//!     +-- PropTable (EAV; user_props, guild_props, member_props)
//!             |-- {name}          identity..., property, value
//!             +-- {name}_propmap  property, shared
//! ```
//!
//! # Modules
//!
//! - [`column`] -- logical column types and declarations
//! - [`schema`] -- table schemas and DDL generation
//! - [`value`] -- cell values, rows and filters
//! - [`sql`] -- statement assembly with dialect placeholders
//! - [`backend`] -- connection pools, binding and row decoding
//! - [`table`] -- structured entity store
//! - [`props`] -- EAV entity store
//! - [`codec`] -- JSON codec for property payloads
//! - [`registry`] -- process-wide registry of attached stores
//! - [`catalog`] -- canonical tables and the schema version
//! - [`config`] -- deserializable backend configuration
//! - [`error`] -- shared error types

pub mod backend;
pub mod catalog;
pub mod codec;
pub mod column;
pub mod config;
pub mod error;
pub mod props;
pub mod registry;
pub mod schema;
pub mod sql;
pub mod table;
pub mod value;

// Re-export primary types for convenience.
pub use backend::{BackendConfig, DbPool, Dialect, PostgresConfig, SqliteConfig};
pub use column::{Column, ColumnDefault, ColumnType};
pub use config::DataConfig;
pub use error::{DbError, SchemaError};
pub use props::{PropSchema, PropTable};
pub use registry::DataRegistry;
pub use schema::{TableSchema, TableSchemaBuilder};
pub use table::Table;
pub use value::{Condition, Filter, Record, SqlValue};
