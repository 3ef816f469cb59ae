//! EAV-mode entity store: named JSON properties attached to external
//! entities.
//!
//! A [`PropTable`] stores `(identity values..., property) -> JSON value` in
//! one table and keeps a side table, the propmap, recording whether each
//! property name is shared between app namespaces.
//!
//! # Key derivation
//!
//! | Property | Namespace active | Stored under |
//! |----------|------------------|--------------|
//! | non-shared (or unregistered) | yes | `{app}_{property}` |
//! | non-shared (or unregistered) | no (empty app) | `{property}` |
//! | shared | either | `{property}` |
//!
//! The shared flag is read from the propmap on every key derivation, so a
//! property registered by one app namespace is seen at once by every other
//! namespace on the same database. Changing a property's shared flag does
//! not move rows already stored under the old key.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::DbPool;
use crate::codec;
use crate::column::{Column, ColumnType};
use crate::error::{DbError, SchemaError};
use crate::schema::TableSchema;
use crate::table::Table;
use crate::value::{Filter, Record, SqlValue};

/// Column holding the (effective) property name.
pub const PROPERTY_COLUMN: &str = "property";

/// Column holding the JSON payload.
pub const VALUE_COLUMN: &str = "value";

/// Propmap column holding the shared flag.
pub const SHARED_COLUMN: &str = "shared";

/// Declaration of a property store: a name plus its identity columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropSchema {
    name: String,
    key_columns: Vec<String>,
}

impl PropSchema {
    /// A store named `name` keyed by `key_columns` (all identifiers).
    pub fn new(name: &str, key_columns: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            key_columns: key_columns.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    /// Store name (also the values table name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity columns in key order.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Name of the propmap side table.
    pub fn propmap_name(&self) -> String {
        format!("{}_propmap", self.name)
    }

    /// Schema of the values table.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the name or key columns are invalid.
    pub fn values_schema(&self) -> Result<TableSchema, SchemaError> {
        TableSchema::builder(&self.name)
            .columns(
                self.key_columns
                    .iter()
                    .map(|c| Column::new(c, ColumnType::Identifier).primary()),
            )
            .column(Column::new(PROPERTY_COLUMN, ColumnType::MessageString).primary())
            .column(Column::new(VALUE_COLUMN, ColumnType::Text))
            .add_timestamp()
            .build()
    }

    /// Schema of the propmap table.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the store name is invalid.
    pub fn propmap_schema(&self) -> Result<TableSchema, SchemaError> {
        TableSchema::builder(&self.propmap_name())
            .column(Column::new(PROPERTY_COLUMN, ColumnType::ShortString).primary())
            .column(
                Column::new(SHARED_COLUMN, ColumnType::Bool)
                    .required()
                    .default_value(false),
            )
            .build()
    }
}

/// Property store bound to a backend and an app namespace.
#[derive(Debug)]
pub struct PropTable {
    name: String,
    key_columns: Vec<String>,
    app: String,
    values: Table,
    propmap: Table,
}

impl PropTable {
    /// Bind `schema` to `pool`, creating both tables if missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Schema`] for an invalid declaration or
    /// [`DbError::Backend`] if table creation fails.
    pub async fn attach(schema: &PropSchema, pool: DbPool, app: &str) -> Result<Self, DbError> {
        let values = Table::new(schema.values_schema()?, pool.clone(), app);
        let propmap = Table::new(schema.propmap_schema()?, pool, app);
        values.ensure_created().await?;
        propmap.ensure_created().await?;

        Ok(Self {
            name: schema.name().to_owned(),
            key_columns: schema.key_columns().to_vec(),
            app: app.to_owned(),
            values,
            propmap,
        })
    }

    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register property names with the given shared flag.
    ///
    /// Idempotent: names already registered with the same flag cause no
    /// write. A name registered with the other flag is updated in place;
    /// values already stored under its old key are not moved.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Coercion`] for names longer than a short string or
    /// [`DbError::Backend`] if the write fails.
    pub async fn ensure_exists(&self, names: &[&str], shared: bool) -> Result<(), DbError> {
        for name in names {
            let previous = self.registered(name).await?;
            if previous == Some(shared) {
                continue;
            }

            let row = Record::new()
                .with(PROPERTY_COLUMN, *name)
                .with(SHARED_COLUMN, shared);
            self.propmap.upsert(None, &row).await?;

            match previous {
                Some(old) => tracing::warn!(
                    store = %self.name,
                    property = name,
                    from = old,
                    to = shared,
                    "Changed shared flag; existing values keep their old storage key"
                ),
                None => tracing::debug!(
                    store = %self.name,
                    property = name,
                    shared,
                    "Registered property"
                ),
            }
        }
        Ok(())
    }

    /// Whether `property` is registered as shared. Unregistered properties
    /// are not shared.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the propmap read fails.
    pub async fn is_shared(&self, property: &str) -> Result<bool, DbError> {
        Ok(self.registered(property).await?.unwrap_or(false))
    }

    /// Key under which `property` is stored for this app namespace.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the propmap read fails.
    pub async fn storage_key(&self, property: &str) -> Result<String, DbError> {
        if self.app.is_empty() || self.is_shared(property).await? {
            Ok(property.to_owned())
        } else {
            Ok(format!("{}_{property}", self.app))
        }
    }

    /// Shared flag recorded for `property`, if it is registered.
    async fn registered(&self, property: &str) -> Result<Option<bool>, DbError> {
        // Names too long for the propmap can never have been registered.
        if ColumnType::ShortString
            .max_chars()
            .is_some_and(|max| property.chars().count() > max)
        {
            return Ok(None);
        }
        let row = self
            .propmap
            .select_one(
                &Filter::new().eq(PROPERTY_COLUMN, property),
                Some(&[SHARED_COLUMN]),
            )
            .await?;
        Ok(row.map(|r| r.get_bool(SHARED_COLUMN).unwrap_or(false)))
    }

    /// Read a property, returning `None` if no value is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Arity`] if `key` does not have one value per
    /// identity column, [`DbError::Serialization`] if the stored payload
    /// does not decode as `T`, or [`DbError::Backend`] if the read fails.
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: &[SqlValue],
        property: &str,
    ) -> Result<Option<T>, DbError> {
        self.check_arity(key.len())?;
        let filter = self.key_filter(key, property).await?;
        let row = self
            .values
            .select_one(&filter, Some(&[VALUE_COLUMN]))
            .await?;

        match row.as_ref().and_then(|r| r.get_str(VALUE_COLUMN)) {
            Some(payload) => Ok(Some(codec::decode(payload)?)),
            None => Ok(None),
        }
    }

    /// Read a property, returning `default` if no value is stored.
    ///
    /// # Errors
    ///
    /// Same as [`PropTable::get`].
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: &[SqlValue],
        property: &str,
        default: T,
    ) -> Result<T, DbError> {
        Ok(self.get(key, property).await?.unwrap_or(default))
    }

    /// Store a property value, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Arity`] for a malformed key,
    /// [`DbError::Serialization`] if `value` cannot be encoded, or
    /// [`DbError::Backend`] if the write fails.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &[SqlValue],
        property: &str,
        value: &T,
    ) -> Result<(), DbError> {
        self.check_arity(key.len())?;
        let payload = codec::encode(value)?;

        let mut row: Record = self
            .key_columns
            .iter()
            .cloned()
            .zip(key.iter().cloned())
            .collect();
        row.set(PROPERTY_COLUMN, self.storage_key(property).await?);
        row.set(VALUE_COLUMN, payload);
        self.values.upsert(None, &row).await?;

        tracing::debug!(store = %self.name, property, "Stored property");
        Ok(())
    }

    /// Remove a stored value. Returns whether a value was removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Arity`] for a malformed key or
    /// [`DbError::Backend`] if the delete fails.
    pub async fn unset(&self, key: &[SqlValue], property: &str) -> Result<bool, DbError> {
        self.check_arity(key.len())?;
        let filter = self.key_filter(key, property).await?;
        Ok(self.values.delete_where(&filter).await? > 0)
    }

    /// Identity values whose stored `property` decodes equal to `value`.
    ///
    /// Only available on stores with exactly one identity column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Arity`] on multi-column stores,
    /// [`DbError::Serialization`] if `value` cannot be encoded, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn find<T: Serialize + ?Sized>(
        &self,
        property: &str,
        value: &T,
    ) -> Result<Vec<SqlValue>, DbError> {
        let wanted = serde_json::to_value(value)?;
        let matches = self
            .scan(property)
            .await?
            .into_iter()
            .filter(|(_, payload)| {
                codec::decode::<serde_json::Value>(payload).is_ok_and(|v| v == wanted)
            })
            .map(|(id, _)| id)
            .collect();
        Ok(matches)
    }

    /// Identity values with a non-empty stored `property` (not `null`,
    /// `""`, `[]` or `{}`).
    ///
    /// Only available on stores with exactly one identity column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Arity`] on multi-column stores or
    /// [`DbError::Backend`] if the read fails.
    pub async fn find_not_empty(&self, property: &str) -> Result<Vec<SqlValue>, DbError> {
        let found = self
            .scan(property)
            .await?
            .into_iter()
            .filter(|(_, payload)| !codec::is_empty_payload(payload))
            .map(|(id, _)| id)
            .collect();
        Ok(found)
    }

    /// `(identity, payload)` for every stored value of `property`.
    async fn scan(&self, property: &str) -> Result<Vec<(SqlValue, String)>, DbError> {
        let [key_column] = self.key_columns.as_slice() else {
            return Err(DbError::Arity {
                store: self.name.clone(),
                expected: 1,
                got: self.key_columns.len(),
            });
        };

        let filter = Filter::new().eq(PROPERTY_COLUMN, self.storage_key(property).await?);
        let rows = self
            .values
            .select_where(&filter, Some(&[key_column.as_str(), VALUE_COLUMN]))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let payload = row.get_str(VALUE_COLUMN)?.to_owned();
                Some((row.take(key_column)?, payload))
            })
            .collect())
    }

    fn check_arity(&self, got: usize) -> Result<(), DbError> {
        if got == self.key_columns.len() {
            Ok(())
        } else {
            Err(DbError::Arity {
                store: self.name.clone(),
                expected: self.key_columns.len(),
                got,
            })
        }
    }

    async fn key_filter(&self, key: &[SqlValue], property: &str) -> Result<Filter, DbError> {
        let filter = self
            .key_columns
            .iter()
            .zip(key)
            .fold(Filter::new(), |f, (column, value)| f.eq(column, value.clone()));
        Ok(filter.eq(PROPERTY_COLUMN, self.storage_key(property).await?))
    }
}
