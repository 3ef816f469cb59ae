//! Storage strategies: how a setting's data maps onto rows of its table.
//!
//! Every setting owns one structured table namespaced by app and keyed by
//! guild id. Three layouts are supported:
//!
//! - [`ColumnData`] -- one row per guild, the value in a single column
//! - [`BoolData`] -- the row's existence is the value
//! - [`ListData`] -- one row per list item; writes apply a diff
//!
//! None of the writes are transactional. A [`ListData`] write is a delete
//! followed by an insert, so a failure between the two leaves the list
//! partially updated, and concurrent writers to one guild can lose updates.

use std::collections::{BTreeMap, BTreeSet};

use quire_db::{Column, ColumnType, Filter, Record, SchemaError, SqlValue, Table, TableSchema};

use crate::error::SettingError;
use crate::ids::GuildId;

/// Raw stored form of a setting, as read from or written to its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingData {
    /// A single cell ([`ColumnData`]).
    Scalar(SqlValue),
    /// Row presence ([`BoolData`]).
    Flag(bool),
    /// Item column values ([`ListData`]).
    List(Vec<SqlValue>),
}

/// Rows touched by a storage write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Rows inserted or updated.
    pub rows_written: u64,
    /// Rows deleted.
    pub rows_removed: u64,
}

/// Single-column layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnData {
    table: &'static str,
    owner_column: &'static str,
    value_column: &'static str,
    value_type: ColumnType,
    delete_on_none: bool,
    constraint: Option<Vec<&'static str>>,
}

impl ColumnData {
    /// Store values of `value_type` in `table.value_column`, keyed by
    /// `guildid`.
    pub const fn new(table: &'static str, value_column: &'static str, value_type: ColumnType) -> Self {
        Self {
            table,
            owner_column: OWNER_COLUMN,
            value_column,
            value_type,
            delete_on_none: false,
            constraint: None,
        }
    }

    /// Delete the guild's row when the value is cleared, instead of storing
    /// `NULL`.
    #[must_use]
    pub const fn delete_on_none(mut self) -> Self {
        self.delete_on_none = true;
        self
    }

    /// Upsert on `columns` instead of the owner column.
    #[must_use]
    pub fn with_constraint(mut self, columns: &[&'static str]) -> Self {
        self.constraint = Some(columns.to_vec());
        self
    }

    /// Table schema this layout needs.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid names.
    pub fn table_schema(&self) -> Result<TableSchema, SchemaError> {
        let mut builder = TableSchema::builder(self.table)
            .column(Column::new(self.owner_column, ColumnType::Identifier).primary())
            .column(Column::new(self.value_column, self.value_type))
            .add_app();
        if let Some(columns) = &self.constraint {
            builder = builder.unique(columns);
        }
        builder.build()
    }

    /// Read the guild's value; `None` if no row exists.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read(&self, table: &Table, owner: GuildId) -> Result<Option<SettingData>, SettingError> {
        let row = table
            .select_one(&owner_filter(owner), Some(&[self.value_column]))
            .await?;
        Ok(row
            .and_then(|mut r| r.take(self.value_column))
            .map(SettingData::Scalar))
    }

    /// Write the guild's value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::DataMismatch`] for list data or
    /// [`SettingError::Store`] if the write fails.
    pub async fn write(
        &self,
        table: &Table,
        owner: GuildId,
        data: Option<&SettingData>,
    ) -> Result<WriteOutcome, SettingError> {
        let value = match data {
            Some(SettingData::Scalar(v)) => v.clone(),
            Some(SettingData::Flag(b)) => SqlValue::Bool(*b),
            Some(SettingData::List(_)) => return Err(self.mismatch()),
            None => SqlValue::Null,
        };

        if value.is_null() && self.delete_on_none {
            let removed = table.delete_where(&owner_filter(owner)).await?;
            return Ok(WriteOutcome {
                rows_written: 0,
                rows_removed: removed,
            });
        }

        let row = Record::new()
            .with(self.owner_column, owner)
            .with(self.value_column, value);
        let written = table.upsert(self.constraint.as_deref(), &row).await?;
        Ok(WriteOutcome {
            rows_written: written,
            rows_removed: 0,
        })
    }

    /// Every guild with a non-null value.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read_all(&self, table: &Table) -> Result<Vec<(GuildId, SettingData)>, SettingError> {
        let rows = table
            .select_where(&Filter::new(), Some(&[self.owner_column, self.value_column]))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let owner = GuildId(row.get_i64(self.owner_column)?);
                let value = row.take(self.value_column).filter(|v| !v.is_null())?;
                Some((owner, SettingData::Scalar(value)))
            })
            .collect())
    }

    fn mismatch(&self) -> SettingError {
        SettingError::DataMismatch {
            setting: self.table.to_owned(),
            expected: "scalar",
        }
    }
}

/// Row-existence layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolData {
    table: &'static str,
    owner_column: &'static str,
}

impl BoolData {
    /// A guild is "on" while it has a row in `table`.
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            owner_column: OWNER_COLUMN,
        }
    }

    /// Table schema this layout needs.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid names.
    pub fn table_schema(&self) -> Result<TableSchema, SchemaError> {
        TableSchema::builder(self.table)
            .column(Column::new(self.owner_column, ColumnType::Identifier).primary())
            .add_app()
            .build()
    }

    /// Whether the guild has a row.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read(&self, table: &Table, owner: GuildId) -> Result<Option<SettingData>, SettingError> {
        let row = table
            .select_one(&owner_filter(owner), Some(&[self.owner_column]))
            .await?;
        Ok(Some(SettingData::Flag(row.is_some())))
    }

    /// Insert the row for `true`; delete it for `false` or `None`.
    /// Writing `true` twice leaves one row.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::DataMismatch`] for list data or
    /// [`SettingError::Store`] if the write fails.
    pub async fn write(
        &self,
        table: &Table,
        owner: GuildId,
        data: Option<&SettingData>,
    ) -> Result<WriteOutcome, SettingError> {
        let enabled = match data {
            Some(SettingData::Flag(b) | SettingData::Scalar(SqlValue::Bool(b))) => *b,
            Some(SettingData::Scalar(SqlValue::Null)) | None => false,
            Some(SettingData::Scalar(_) | SettingData::List(_)) => {
                return Err(SettingError::DataMismatch {
                    setting: self.table.to_owned(),
                    expected: "boolean",
                });
            }
        };

        if enabled {
            let row = Record::new().with(self.owner_column, owner);
            let written = table.upsert(None, &row).await?;
            Ok(WriteOutcome {
                rows_written: written,
                rows_removed: 0,
            })
        } else {
            let removed = table.delete_where(&owner_filter(owner)).await?;
            Ok(WriteOutcome {
                rows_written: 0,
                rows_removed: removed,
            })
        }
    }

    /// Every guild that has a row.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read_all(&self, table: &Table) -> Result<Vec<(GuildId, SettingData)>, SettingError> {
        let rows = table
            .select_where(&Filter::new(), Some(&[self.owner_column]))
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_i64(self.owner_column))
            .map(|id| (GuildId(id), SettingData::Flag(true)))
            .collect())
    }
}

/// One-row-per-item layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListData {
    table: &'static str,
    owner_column: &'static str,
    item_column: &'static str,
    item_type: ColumnType,
}

impl ListData {
    /// Store list items of `item_type` in `table.item_column`.
    pub const fn new(table: &'static str, item_column: &'static str, item_type: ColumnType) -> Self {
        Self {
            table,
            owner_column: OWNER_COLUMN,
            item_column,
            item_type,
        }
    }

    /// Table schema this layout needs.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid names.
    pub fn table_schema(&self) -> Result<TableSchema, SchemaError> {
        TableSchema::builder(self.table)
            .column(Column::new(self.owner_column, ColumnType::Identifier).primary())
            .column(Column::new(self.item_column, self.item_type).primary())
            .add_app()
            .build()
    }

    /// The guild's items, or `None` when it has none. An empty list and a
    /// list that was never written read the same.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read(&self, table: &Table, owner: GuildId) -> Result<Option<SettingData>, SettingError> {
        let items: Vec<SqlValue> = table
            .select_where(&owner_filter(owner), Some(&[self.item_column]))
            .await?
            .into_iter()
            .filter_map(|mut row| row.take(self.item_column))
            .collect();
        Ok((!items.is_empty()).then_some(SettingData::List(items)))
    }

    /// Replace the guild's items with `data`, touching only the rows that
    /// differ. `None` removes every item.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::DataMismatch`] for non-list data or
    /// [`SettingError::Store`] if a statement fails. A failure after the
    /// delete leaves the removals applied.
    pub async fn write(
        &self,
        table: &Table,
        owner: GuildId,
        data: Option<&SettingData>,
    ) -> Result<WriteOutcome, SettingError> {
        let target: BTreeSet<SqlValue> = match data {
            None => {
                let removed = table.delete_where(&owner_filter(owner)).await?;
                return Ok(WriteOutcome {
                    rows_written: 0,
                    rows_removed: removed,
                });
            }
            Some(SettingData::List(items)) => items.iter().cloned().collect(),
            Some(SettingData::Scalar(_) | SettingData::Flag(_)) => {
                return Err(SettingError::DataMismatch {
                    setting: self.table.to_owned(),
                    expected: "list",
                });
            }
        };

        let current: BTreeSet<SqlValue> = match self.read(table, owner).await? {
            Some(SettingData::List(items)) => items.into_iter().collect(),
            _ => BTreeSet::new(),
        };
        let to_remove: Vec<SqlValue> = current.difference(&target).cloned().collect();
        let to_insert: Vec<Vec<SqlValue>> = target
            .difference(&current)
            .map(|item| vec![SqlValue::from(owner), item.clone()])
            .collect();

        let mut outcome = WriteOutcome::default();
        if !to_remove.is_empty() {
            let filter = owner_filter(owner).any_of(self.item_column, to_remove);
            outcome.rows_removed = table.delete_where(&filter).await?;
        }
        if !to_insert.is_empty() {
            outcome.rows_written = table
                .insert_many(&[self.owner_column, self.item_column], &to_insert)
                .await?;
        }

        tracing::debug!(
            table = self.table,
            guild = %owner,
            inserted = outcome.rows_written,
            removed = outcome.rows_removed,
            "Applied list diff"
        );
        Ok(outcome)
    }

    /// Every guild's items.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read_all(&self, table: &Table) -> Result<Vec<(GuildId, SettingData)>, SettingError> {
        let rows = table
            .select_where(&Filter::new(), Some(&[self.owner_column, self.item_column]))
            .await?;
        let mut grouped: BTreeMap<GuildId, Vec<SqlValue>> = BTreeMap::new();
        for mut row in rows {
            let (Some(owner), Some(item)) = (row.get_i64(self.owner_column), row.take(self.item_column))
            else {
                continue;
            };
            grouped.entry(GuildId(owner)).or_default().push(item);
        }
        Ok(grouped
            .into_iter()
            .map(|(owner, items)| (owner, SettingData::List(items)))
            .collect())
    }
}

/// Storage strategy selected for a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageStrategy {
    /// Single-column layout.
    Column(ColumnData),
    /// Row-existence layout.
    Bool(BoolData),
    /// One-row-per-item layout.
    List(ListData),
}

impl StorageStrategy {
    /// Name of the backing table.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::Column(s) => s.table,
            Self::Bool(s) => s.table,
            Self::List(s) => s.table,
        }
    }

    /// Schema of the backing table.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid names.
    pub fn table_schema(&self) -> Result<TableSchema, SchemaError> {
        match self {
            Self::Column(s) => s.table_schema(),
            Self::Bool(s) => s.table_schema(),
            Self::List(s) => s.table_schema(),
        }
    }

    /// Read one guild's data.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read(&self, table: &Table, owner: GuildId) -> Result<Option<SettingData>, SettingError> {
        match self {
            Self::Column(s) => s.read(table, owner).await,
            Self::Bool(s) => s.read(table, owner).await,
            Self::List(s) => s.read(table, owner).await,
        }
    }

    /// Write one guild's data.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::DataMismatch`] for data of the wrong shape or
    /// [`SettingError::Store`] if the write fails.
    pub async fn write(
        &self,
        table: &Table,
        owner: GuildId,
        data: Option<&SettingData>,
    ) -> Result<WriteOutcome, SettingError> {
        match self {
            Self::Column(s) => s.write(table, owner, data).await,
            Self::Bool(s) => s.write(table, owner, data).await,
            Self::List(s) => s.write(table, owner, data).await,
        }
    }

    /// Read every guild's data.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the read fails.
    pub async fn read_all(&self, table: &Table) -> Result<Vec<(GuildId, SettingData)>, SettingError> {
        match self {
            Self::Column(s) => s.read_all(table).await,
            Self::Bool(s) => s.read_all(table).await,
            Self::List(s) => s.read_all(table).await,
        }
    }
}

impl From<ColumnData> for StorageStrategy {
    fn from(s: ColumnData) -> Self {
        Self::Column(s)
    }
}

impl From<BoolData> for StorageStrategy {
    fn from(s: BoolData) -> Self {
        Self::Bool(s)
    }
}

impl From<ListData> for StorageStrategy {
    fn from(s: ListData) -> Self {
        Self::List(s)
    }
}

/// Owner column shared by every settings table.
pub const OWNER_COLUMN: &str = "guildid";

fn owner_filter(owner: GuildId) -> Filter {
    Filter::new().eq(OWNER_COLUMN, owner)
}
