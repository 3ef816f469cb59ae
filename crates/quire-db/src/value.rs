//! Runtime values, rows and filters exchanged with the stores.
//!
//! Stores are schema-driven rather than struct-driven, so rows travel as
//! [`Record`]s (column name to [`SqlValue`]) and predicates as [`Filter`]s.
//! The column-type manifest of the owning schema decides how each value is
//! bound and decoded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// Any integer column.
    Int(i64),
    /// Any string column.
    Text(String),
    /// Boolean column.
    Bool(bool),
    /// Timestamp column.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Whether the value is `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer, if this is an integer value.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The string, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The flag, if this is a boolean value.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A row: column name to value.
///
/// Used both for values handed to `insert`/`upsert` and for rows returned
/// by `select_where`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<String, SqlValue>);

impl Record {
    /// An empty record.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style [`Record::set`].
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set `column` to `value`, replacing any previous value.
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        self.0.insert(column.to_owned(), value.into());
    }

    /// Value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.0.get(column)
    }

    /// Integer value of `column`, if present and an integer.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// String value of `column`, if present and text.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(SqlValue::as_str)
    }

    /// Boolean value of `column`, if present and a flag.
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(SqlValue::as_bool)
    }

    /// Remove and return the value of `column`.
    pub fn take(&mut self, column: &str) -> Option<SqlValue> {
        self.0.remove(column)
    }

    /// Whether `column` is present.
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `(column, value)` pairs in sorted column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no column is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Predicate on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `column = value` (`IS NULL` for [`SqlValue::Null`]).
    Eq(SqlValue),
    /// `column IN (values...)`; an empty list matches nothing.
    In(Vec<SqlValue>),
}

/// Conjunction of column predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// A filter matching every row.
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Require `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.clauses
            .push((column.to_owned(), Condition::Eq(value.into())));
        self
    }

    /// Require `column IN (values...)`.
    #[must_use]
    pub fn any_of<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push((column.to_owned(), Condition::In(values)));
        self
    }

    /// Whether `column` is constrained by this filter.
    pub fn constrains(&self, column: &str) -> bool {
        self.clauses.iter().any(|(c, _)| c == column)
    }

    /// The clauses in insertion order.
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Whether the filter matches every row.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
