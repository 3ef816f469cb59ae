//! Logical column types and column declarations.
//!
//! A [`ColumnType`] names what a column holds independent of the backend;
//! [`ColumnType::physical`] maps it to the type string each
//! [`Dialect`] uses in DDL. [`ColumnType::coerce`] is the runtime side of the
//! same mapping: every value written through a store is checked (and where
//! unambiguous, converted) against the declared type before it is bound.

use chrono::{DateTime, Utc};

use crate::backend::Dialect;
use crate::error::DbError;
use crate::value::SqlValue;

/// Maximum length, in characters, of a [`ColumnType::ShortString`].
pub const SHORT_STRING_LEN: usize = 64;

/// Maximum length, in characters, of a [`ColumnType::MessageString`].
pub const MESSAGE_STRING_LEN: usize = 2048;

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 32-bit integer.
    Int,
    /// 64-bit integer used as a globally unique id.
    Identifier,
    /// String of at most [`SHORT_STRING_LEN`] characters.
    ShortString,
    /// String of at most [`MESSAGE_STRING_LEN`] characters.
    MessageString,
    /// Unbounded text.
    Text,
    /// Boolean flag.
    Bool,
    /// Point in time (UTC).
    Timestamp,
}

impl ColumnType {
    /// Physical type string for `dialect`.
    pub const fn physical(self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Self::Int, _) => "INTEGER",
            (Self::Identifier, Dialect::Sqlite) => "INTEGER",
            (Self::Identifier, Dialect::Postgres) => "BIGINT",
            (Self::ShortString, _) => "VARCHAR(64)",
            (Self::MessageString, _) => "VARCHAR(2048)",
            (Self::Text, _) => "TEXT",
            (Self::Bool, _) => "BOOLEAN",
            (Self::Timestamp, Dialect::Sqlite) => "TIMESTAMP",
            (Self::Timestamp, Dialect::Postgres) => "TIMESTAMPTZ",
        }
    }

    /// Character limit for bounded string types.
    pub const fn max_chars(self) -> Option<usize> {
        match self {
            Self::ShortString => Some(SHORT_STRING_LEN),
            Self::MessageString => Some(MESSAGE_STRING_LEN),
            _ => None,
        }
    }

    /// Whether values of this type are integers.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Identifier)
    }

    /// Whether values of this type are strings.
    pub const fn is_string(self) -> bool {
        matches!(self, Self::ShortString | Self::MessageString | Self::Text)
    }

    /// Check `value` against this type, converting where unambiguous.
    ///
    /// Integers accept integer text, booleans accept `0`/`1`, strings are
    /// bounds-checked and timestamps accept RFC 3339 text. `Null` always
    /// passes; nullability is enforced by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Coercion`] if the value cannot be represented.
    pub fn coerce(self, column: &str, value: SqlValue) -> Result<SqlValue, DbError> {
        let fail = |reason: String| DbError::Coercion {
            column: column.to_owned(),
            ty: self,
            reason,
        };

        match (self, value) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (Self::Int, SqlValue::Int(v)) => i32::try_from(v)
                .map(|_| SqlValue::Int(v))
                .map_err(|e| fail(format!("{v} ({e})"))),
            (Self::Identifier, SqlValue::Int(v)) => Ok(SqlValue::Int(v)),
            (ty, SqlValue::Text(s)) if ty.is_integer() => s
                .trim()
                .parse::<i64>()
                .map_err(|e| fail(format!("text {s:?} ({e})")))
                .and_then(|v| ty.coerce(column, SqlValue::Int(v))),
            (ty, SqlValue::Text(s)) if ty.is_string() => match ty.max_chars() {
                Some(max) if s.chars().count() > max => {
                    Err(fail(format!("{} characters (limit {max})", s.chars().count())))
                }
                _ => Ok(SqlValue::Text(s)),
            },
            (Self::Bool, SqlValue::Bool(b)) => Ok(SqlValue::Bool(b)),
            (Self::Bool, SqlValue::Int(0)) => Ok(SqlValue::Bool(false)),
            (Self::Bool, SqlValue::Int(1)) => Ok(SqlValue::Bool(true)),
            (Self::Timestamp, SqlValue::Timestamp(t)) => Ok(SqlValue::Timestamp(t)),
            (Self::Timestamp, SqlValue::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|t| SqlValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| fail(format!("text {s:?} ({e})"))),
            (_, other) => Err(fail(format!("{other:?}"))),
        }
    }
}

/// Default applied by the backend when an insert omits the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDefault {
    /// A literal value.
    Value(SqlValue),
    /// The insertion time.
    CurrentTimestamp,
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub ty: ColumnType,
    /// Part of the composite primary key.
    pub primary: bool,
    /// Rendered `NOT NULL`.
    pub required: bool,
    /// Backend-side default.
    pub default: Option<ColumnDefault>,
    /// Refresh to the current time on every update (trigger dialects only).
    pub auto_update_timestamp: bool,
}

impl Column {
    /// Declare a nullable, non-key column.
    pub fn new(name: &str, ty: ColumnType) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            primary: false,
            required: false,
            default: None,
            auto_update_timestamp: false,
        }
    }

    /// Mark the column as part of the primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Mark the column `NOT NULL`.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Give the column a literal default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    /// Default the column to the insertion time.
    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(ColumnDefault::CurrentTimestamp);
        self
    }

    /// Refresh the column to the current time whenever the row is updated.
    #[must_use]
    pub const fn auto_update_timestamp(mut self) -> Self {
        self.auto_update_timestamp = true;
        self
    }

    /// Whether the backend rejects `NULL` for this column.
    pub const fn not_null(&self) -> bool {
        self.primary || self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_widens_on_postgres_only() {
        assert_eq!(ColumnType::Identifier.physical(Dialect::Sqlite), "INTEGER");
        assert_eq!(ColumnType::Identifier.physical(Dialect::Postgres), "BIGINT");
        assert_eq!(ColumnType::Timestamp.physical(Dialect::Postgres), "TIMESTAMPTZ");
    }

    #[test]
    fn integer_text_is_parsed() {
        let v = ColumnType::Identifier
            .coerce("guildid", SqlValue::from("  123456789012345678 "))
            .unwrap_or(SqlValue::Null);
        assert_eq!(v, SqlValue::Int(123_456_789_012_345_678));
    }

    #[test]
    fn int_rejects_values_outside_32_bits() {
        let err = ColumnType::Int.coerce("version", SqlValue::Int(i64::from(i32::MAX) + 1));
        assert!(matches!(err, Err(DbError::Coercion { .. })));
    }

    #[test]
    fn short_string_is_bounded() {
        let long = "x".repeat(SHORT_STRING_LEN + 1);
        assert!(ColumnType::ShortString.coerce("prefix", SqlValue::from(long)).is_err());
        let fits = "x".repeat(SHORT_STRING_LEN);
        assert!(ColumnType::ShortString.coerce("prefix", SqlValue::from(fits)).is_ok());
    }

    #[test]
    fn bool_accepts_zero_and_one() {
        assert_eq!(
            ColumnType::Bool.coerce("shared", SqlValue::Int(1)).ok(),
            Some(SqlValue::Bool(true))
        );
        assert!(ColumnType::Bool.coerce("shared", SqlValue::Int(2)).is_err());
    }

    #[test]
    fn null_always_passes() {
        assert_eq!(
            ColumnType::Timestamp.coerce("_timestamp", SqlValue::Null).ok(),
            Some(SqlValue::Null)
        );
    }
}
