//! Error types for the data layer.
//!
//! Startup-fatal conditions (bad configuration, schema mistakes, version
//! mismatch) and per-request failures (arity mistakes, coercion failures,
//! backend I/O) all surface through [`DbError`]. Schema construction has its
//! own [`SchemaError`] so that table definitions can be validated without a
//! connection.

use crate::column::ColumnType;

/// Errors raised while declaring a [`TableSchema`](crate::schema::TableSchema).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The table declares no primary column and was not marked keyless.
    #[error("table `{table}` declares no primary key columns")]
    NoPrimaryKey {
        /// Table being declared.
        table: String,
    },

    /// Two columns share a name (including the implicit `app`/`_timestamp`).
    #[error("table `{table}` declares column `{column}` more than once")]
    DuplicateColumn {
        /// Table being declared.
        table: String,
        /// The repeated column name.
        column: String,
    },

    /// A table or column name is not a plain lowercase SQL identifier.
    #[error("`{0}` is not a valid identifier (expected [a-z_][a-z0-9_]*)")]
    InvalidIdentifier(String),

    /// A unique constraint refers to a column the table does not have.
    #[error("table `{table}` has no column `{column}` for its unique constraint")]
    UnknownConstraintColumn {
        /// Table being declared.
        table: String,
        /// The missing column.
        column: String,
    },
}

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A backend query or connection failed.
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),

    /// A stored value could not be encoded to or decoded from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A table definition is invalid.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Configuration is unusable (unknown backend, missing parameter, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// The stored schema version does not match the compiled-in one.
    #[error("schema version mismatch: required {required}, found {}", found.map_or_else(|| String::from("no version row"), |v| v.to_string()))]
    VersionMismatch {
        /// Version this build requires.
        required: i64,
        /// Highest version present, if any row exists.
        found: Option<i64>,
    },

    /// An EAV operation received the wrong number of identity values.
    #[error("store `{store}` expects {expected} identity value(s), got {got}")]
    Arity {
        /// Store that rejected the call.
        store: String,
        /// Number of identity columns declared.
        expected: usize,
        /// Number of identity values supplied.
        got: usize,
    },

    /// A filter or row referenced a column the table does not declare.
    #[error("table `{table}` has no column `{column}`")]
    UnknownColumn {
        /// Table being accessed.
        table: String,
        /// The unknown column.
        column: String,
    },

    /// A value does not fit the column's logical type.
    #[error("column `{column}` ({ty:?}) cannot hold {reason}")]
    Coercion {
        /// Target column.
        column: String,
        /// Logical type of the column.
        ty: ColumnType,
        /// What went wrong.
        reason: String,
    },

    /// A bulk-insert row does not have one value per insert column.
    #[error("table `{table}` bulk insert expects {expected} value(s) per row, got {got}")]
    RowShape {
        /// Table being written.
        table: String,
        /// Number of insert columns.
        expected: usize,
        /// Number of values in the offending row.
        got: usize,
    },

    /// No store was attached under the requested name.
    #[error("no store attached as `{0}`")]
    UnknownStore(String),

    /// `upsert` was called on a keyless table without an explicit constraint.
    #[error("table `{0}` has no primary key; upsert needs an explicit constraint")]
    NoUpsertConstraint(String),
}

impl DbError {
    /// Whether the failure came from the backend connection rather than
    /// from the caller or the schema.
    ///
    /// Retrying is left to the caller; the stores never retry on their own.
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_without_row_is_readable() {
        let err = DbError::VersionMismatch {
            required: 3,
            found: None,
        };
        assert_eq!(
            err.to_string(),
            "schema version mismatch: required 3, found no version row"
        );
    }

    #[test]
    fn arity_is_not_a_backend_error() {
        let err = DbError::Arity {
            store: String::from("member_props"),
            expected: 2,
            got: 1,
        };
        assert!(!err.is_backend());
    }
}
