//! Process-wide data registry.
//!
//! [`DataRegistry`] owns the backend pool and every store attached at
//! startup. It is built once, populated with `attach_*` calls, checked with
//! [`DataRegistry::verify_version`], and then shared read-only (typically
//! behind an `Arc`).

use std::collections::BTreeMap;

use crate::backend::{BackendConfig, DbPool, Dialect};
use crate::catalog::{VERSION_COLUMN, version_schema};
use crate::error::DbError;
use crate::props::{PropSchema, PropTable};
use crate::schema::TableSchema;
use crate::table::Table;
use crate::value::Filter;

/// Backend handle plus named structured and property stores.
#[derive(Debug)]
pub struct DataRegistry {
    app: String,
    pool: DbPool,
    tables: BTreeMap<String, Table>,
    props: BTreeMap<String, PropTable>,
}

impl DataRegistry {
    /// Connect to the configured backend under app namespace `app`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the connection fails.
    pub async fn connect(app: &str, config: &BackendConfig) -> Result<Self, DbError> {
        let pool = DbPool::connect(config).await?;
        Ok(Self::with_pool(app, pool))
    }

    /// Build a registry over an existing pool. Several registries with
    /// different app namespaces may share one pool.
    pub fn with_pool(app: &str, pool: DbPool) -> Self {
        tracing::info!(app, backend = pool.dialect().as_str(), "Data registry ready");
        Self {
            app: app.to_owned(),
            pool,
            tables: BTreeMap::new(),
            props: BTreeMap::new(),
        }
    }

    /// App namespace of this registry.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Shared backend pool.
    pub const fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Dialect of the backend.
    pub const fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Register an already-bound store under `name`, replacing any store
    /// previously registered under that name.
    pub fn attach_interface(&mut self, name: &str, table: Table) {
        if self.tables.insert(name.to_owned(), table).is_some() {
            tracing::warn!(store = name, "Replaced attached store");
        }
    }

    /// Bind `schema` to this registry's pool and namespace, create the table
    /// if missing and register it under the table name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if table creation fails.
    pub async fn attach_table(&mut self, schema: TableSchema) -> Result<&Table, DbError> {
        let name = schema.name().to_owned();
        let table = Table::new(schema, self.pool.clone(), &self.app);
        table.ensure_created().await?;
        self.attach_interface(&name, table);
        self.table(&name)
    }

    /// Bind a property store, create its tables if missing, load its propmap
    /// and register it under the store name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Schema`] for an invalid declaration or
    /// [`DbError::Backend`] if creation or the propmap read fails.
    pub async fn attach_props(&mut self, schema: &PropSchema) -> Result<&PropTable, DbError> {
        let store = PropTable::attach(schema, self.pool.clone(), &self.app).await?;
        self.props.insert(schema.name().to_owned(), store);
        self.props(schema.name())
    }

    /// Structured store registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownStore`] if nothing is registered under
    /// `name`.
    pub fn table(&self, name: &str) -> Result<&Table, DbError> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::UnknownStore(name.to_owned()))
    }

    /// Property store registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownStore`] if nothing is registered under
    /// `name`.
    pub fn props(&self, name: &str) -> Result<&PropTable, DbError> {
        self.props
            .get(name)
            .ok_or_else(|| DbError::UnknownStore(name.to_owned()))
    }

    /// Check the stored schema version against `required`.
    ///
    /// On a fresh database the version table is created and seeded with
    /// `required`. An existing table must hold at least one row whose
    /// highest version equals `required`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::VersionMismatch`] if the versions differ or no
    /// row exists, or [`DbError::Backend`] if the check cannot run.
    pub async fn verify_version(&self, required: i64) -> Result<(), DbError> {
        let table = Table::new(version_schema(required)?, self.pool.clone(), &self.app);
        let created = table.ensure_created().await?;

        let found = table
            .select_where(&Filter::new(), Some(&[VERSION_COLUMN]))
            .await?
            .iter()
            .filter_map(|row| row.get_i64(VERSION_COLUMN))
            .max();

        if found != Some(required) {
            tracing::error!(required, ?found, "Schema version mismatch");
            return Err(DbError::VersionMismatch { required, found });
        }

        tracing::info!(version = required, created, "Schema version verified");
        Ok(())
    }

    /// Close the backend pool. Stores must not be used afterwards.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(app = %self.app, "Data registry closed");
    }
}
