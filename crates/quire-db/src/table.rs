//! Structured-mode entity store: typed row operations on one table.
//!
//! A [`Table`] binds a [`TableSchema`] to a [`DbPool`]. Every operation is a
//! single statement (bulk inserts are chunked, one statement per chunk), so
//! read-then-write sequences built on top of it are not atomic.
//!
//! Tables declared with the implicit `app` column are namespaced: the
//! registry's app name is added to every filter and every written row, and
//! any `app` value supplied by the caller is ignored.

use std::sync::Arc;

use crate::backend::{DbPool, Dialect};
use crate::column::ColumnType;
use crate::error::DbError;
use crate::schema::{APP_COLUMN, TableSchema};
use crate::sql::{SqlBuilder, Statement};
use crate::value::{Condition, Filter, Record, SqlValue};

/// Default number of rows per multi-row `INSERT`.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Row operations on one table.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<TableSchema>,
    pool: DbPool,
    app: String,
    batch_size: usize,
}

impl Table {
    /// Bind `schema` to `pool` under the `app` namespace.
    pub fn new(schema: TableSchema, pool: DbPool, app: &str) -> Self {
        Self {
            schema: Arc::new(schema),
            pool,
            app: app.to_owned(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the number of rows per multi-row `INSERT`.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// The bound schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Namespace injected into `app`-column tables.
    pub fn app(&self) -> &str {
        &self.app
    }

    const fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// Create the table if it does not exist yet, running its seed
    /// statements only on creation. Returns whether the table was created.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if any DDL statement fails.
    pub async fn ensure_created(&self) -> Result<bool, DbError> {
        if self.pool.table_exists(self.name()).await? {
            return Ok(false);
        }

        for sql in self.schema.create_statements(self.dialect()) {
            self.pool.execute(&Statement::raw(sql)).await?;
        }
        for sql in self.schema.seed_statements() {
            self.pool.execute(&Statement::raw(sql.as_str())).await?;
        }

        tracing::info!(table = self.name(), backend = self.dialect().as_str(), "Created table");
        Ok(true)
    }

    /// Select rows matching `filter`.
    ///
    /// `columns` limits the returned columns; `None` returns all of them.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownColumn`] for undeclared columns,
    /// [`DbError::Coercion`] for filter values of the wrong type, or
    /// [`DbError::Backend`] if the query fails.
    pub async fn select_where(
        &self,
        filter: &Filter,
        columns: Option<&[&str]>,
    ) -> Result<Vec<Record>, DbError> {
        let manifest = match columns {
            None => self.schema.manifest(),
            Some(names) => names
                .iter()
                .map(|name| Ok(((*name).to_owned(), self.column_type(name)?)))
                .collect::<Result<Vec<_>, DbError>>()?,
        };

        let mut b = SqlBuilder::new(self.dialect());
        b.push("SELECT ")
            .push_ident_list(manifest.iter().map(|(name, _)| name.as_str()))
            .push(" FROM ")
            .push_ident(self.name());
        self.push_where(&mut b, filter)?;

        let rows = self.pool.fetch_all(&b.build(), &manifest).await?;
        tracing::debug!(table = self.name(), rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// Select the first row matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Same as [`Table::select_where`].
    pub async fn select_one(
        &self,
        filter: &Filter,
        columns: Option<&[&str]>,
    ) -> Result<Option<Record>, DbError> {
        Ok(self.select_where(filter, columns).await?.into_iter().next())
    }

    /// Insert one row.
    ///
    /// With `allow_replace`, an existing row with the same primary key is
    /// overwritten with the supplied values instead of failing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NoUpsertConstraint`] for `allow_replace` on a
    /// keyless table, [`DbError::UnknownColumn`]/[`DbError::Coercion`] for
    /// invalid values or [`DbError::Backend`] if the insert fails (including
    /// key conflicts when `allow_replace` is false).
    pub async fn insert(&self, row: &Record, allow_replace: bool) -> Result<u64, DbError> {
        if allow_replace {
            return self.upsert(None, row).await;
        }

        let values = self.prepare_row(row)?;
        let mut b = SqlBuilder::new(self.dialect());
        push_insert(&mut b, self.name(), &values);
        let affected = self.pool.execute(&b.build()).await?;

        tracing::debug!(table = self.name(), affected, "Inserted row");
        Ok(affected)
    }

    /// Insert many rows sharing the same column list.
    ///
    /// Rows are written in chunks of at most the batch size, one multi-row
    /// `INSERT` per chunk. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RowShape`] if a row's width differs from
    /// `columns`, [`DbError::UnknownColumn`]/[`DbError::Coercion`] for
    /// invalid values, or [`DbError::Backend`] if an insert fails. Chunks
    /// written before a failure stay written.
    pub async fn insert_many(
        &self,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, DbError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut names: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.is_app_column(c))
            .collect();
        let types = names
            .iter()
            .map(|c| self.column_type(c))
            .collect::<Result<Vec<_>, DbError>>()?;
        if self.schema.has_app_column() {
            names.push(APP_COLUMN);
        }

        let mut total: u64 = 0;
        for chunk in rows.chunks(self.batch_size.max(1)) {
            let mut b = SqlBuilder::new(self.dialect());
            b.push("INSERT INTO ")
                .push_ident(self.name())
                .push(" (")
                .push_ident_list(names.iter().copied())
                .push(") VALUES ");

            for (i, row) in chunk.iter().enumerate() {
                let values = self.prepare_positional(columns, &types, row)?;
                if i > 0 {
                    b.push(", ");
                }
                b.push("(");
                for (j, (ty, value)) in values.into_iter().enumerate() {
                    if j > 0 {
                        b.push(", ");
                    }
                    b.push_bind(ty, value);
                }
                b.push(")");
            }

            let affected = self.pool.execute(&b.build()).await?;
            total = total.saturating_add(affected);
        }

        tracing::debug!(table = self.name(), rows = total, "Bulk inserted rows");
        Ok(total)
    }

    /// Delete rows matching `filter`. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownColumn`]/[`DbError::Coercion`] for invalid
    /// filters or [`DbError::Backend`] if the delete fails.
    pub async fn delete_where(&self, filter: &Filter) -> Result<u64, DbError> {
        let mut b = SqlBuilder::new(self.dialect());
        b.push("DELETE FROM ").push_ident(self.name());
        self.push_where(&mut b, filter)?;

        let affected = self.pool.execute(&b.build()).await?;
        tracing::debug!(table = self.name(), affected, "Deleted rows");
        Ok(affected)
    }

    /// Insert `row`, or on conflict over `constraint` update the supplied
    /// non-constraint columns.
    ///
    /// `constraint` defaults to the primary key. On namespaced tables `app`
    /// is always part of the conflict target. When every supplied column is
    /// part of the target, an existing row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NoUpsertConstraint`] on a keyless table without an
    /// explicit constraint, [`DbError::UnknownColumn`]/[`DbError::Coercion`]
    /// for invalid values, or [`DbError::Backend`] if the statement fails.
    pub async fn upsert(&self, constraint: Option<&[&str]>, row: &Record) -> Result<u64, DbError> {
        let mut target: Vec<&str> = match constraint {
            Some(cols) => {
                for col in cols {
                    self.column_type(col)?;
                }
                cols.to_vec()
            }
            None => self.schema.primary_key(),
        };
        if target.is_empty() {
            return Err(DbError::NoUpsertConstraint(self.name().to_owned()));
        }
        if self.schema.has_app_column() && !target.contains(&APP_COLUMN) {
            target.push(APP_COLUMN);
        }

        let values = self.prepare_row(row)?;
        let mut b = SqlBuilder::new(self.dialect());
        push_insert(&mut b, self.name(), &values);
        b.push(" ON CONFLICT (")
            .push_ident_list(target.iter().copied())
            .push(")");

        let updates: Vec<&str> = values
            .iter()
            .map(|(name, _, _)| name.as_str())
            .filter(|name| !target.contains(name))
            .collect();
        if updates.is_empty() {
            b.push(" DO NOTHING");
        } else {
            b.push(" DO UPDATE SET ");
            for (i, name) in updates.iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_ident(name).push(" = EXCLUDED.").push_ident(name);
            }
        }

        let affected = self.pool.execute(&b.build()).await?;
        tracing::debug!(table = self.name(), affected, "Upserted row");
        Ok(affected)
    }

    fn column_type(&self, column: &str) -> Result<ColumnType, DbError> {
        self.schema
            .column_type(column)
            .ok_or_else(|| DbError::UnknownColumn {
                table: self.name().to_owned(),
                column: column.to_owned(),
            })
    }

    fn is_app_column(&self, column: &str) -> bool {
        self.schema.has_app_column() && column == APP_COLUMN
    }

    /// Coerce a record into `(column, type, value)` triples, replacing any
    /// caller-supplied `app` with this table's namespace.
    fn prepare_row(&self, row: &Record) -> Result<Vec<(String, ColumnType, SqlValue)>, DbError> {
        let mut values = row
            .iter()
            .filter(|(name, _)| !self.is_app_column(name))
            .map(|(name, value)| {
                let ty = self.column_type(name)?;
                Ok((name.to_owned(), ty, ty.coerce(name, value.clone())?))
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        if self.schema.has_app_column() {
            values.push((
                APP_COLUMN.to_owned(),
                ColumnType::ShortString,
                SqlValue::Text(self.app.clone()),
            ));
        }
        Ok(values)
    }

    fn prepare_positional(
        &self,
        columns: &[&str],
        types: &[ColumnType],
        row: &[SqlValue],
    ) -> Result<Vec<(ColumnType, SqlValue)>, DbError> {
        if row.len() != columns.len() {
            return Err(DbError::RowShape {
                table: self.name().to_owned(),
                expected: columns.len(),
                got: row.len(),
            });
        }

        let mut values = columns
            .iter()
            .zip(row)
            .filter(|(name, _)| !self.is_app_column(name))
            .zip(types)
            .map(|((name, value), ty)| Ok((*ty, ty.coerce(name, value.clone())?)))
            .collect::<Result<Vec<_>, DbError>>()?;
        if self.schema.has_app_column() {
            values.push((ColumnType::ShortString, SqlValue::Text(self.app.clone())));
        }
        Ok(values)
    }

    fn push_where(&self, b: &mut SqlBuilder, filter: &Filter) -> Result<(), DbError> {
        let mut first = true;

        for (column, condition) in filter.clauses() {
            if self.is_app_column(column) {
                continue;
            }
            let ty = self.column_type(column)?;
            push_conjunction(b, &mut first);
            match condition {
                Condition::Eq(SqlValue::Null) => {
                    b.push_ident(column).push(" IS NULL");
                }
                Condition::Eq(value) => {
                    let value = ty.coerce(column, value.clone())?;
                    b.push_ident(column).push(" = ").push_bind(ty, value);
                }
                Condition::In(values) if values.is_empty() => {
                    b.push("1 = 0");
                }
                Condition::In(values) => {
                    b.push_ident(column).push(" IN (");
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            b.push(", ");
                        }
                        let value = ty.coerce(column, value.clone())?;
                        b.push_bind(ty, value);
                    }
                    b.push(")");
                }
            }
        }

        if self.schema.has_app_column() {
            push_conjunction(b, &mut first);
            b.push_ident(APP_COLUMN)
                .push(" = ")
                .push_bind(ColumnType::ShortString, SqlValue::Text(self.app.clone()));
        }
        Ok(())
    }
}

fn push_conjunction(b: &mut SqlBuilder, first: &mut bool) {
    b.push(if *first { " WHERE " } else { " AND " });
    *first = false;
}

fn push_insert(b: &mut SqlBuilder, table: &str, values: &[(String, ColumnType, SqlValue)]) {
    b.push("INSERT INTO ").push_ident(table);
    if values.is_empty() {
        b.push(" DEFAULT VALUES");
        return;
    }
    b.push(" (")
        .push_ident_list(values.iter().map(|(name, _, _)| name.as_str()))
        .push(") VALUES (");
    for (i, (_, ty, value)) in values.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_bind(*ty, value.clone());
    }
    b.push(")");
}
