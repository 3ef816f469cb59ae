//! Statement assembly with dialect-correct placeholders.
//!
//! Every value reaches the backend as a bound parameter; only identifiers
//! validated by [`crate::schema`] are spliced into SQL text, and they are
//! always quoted.

use crate::backend::Dialect;
use crate::column::ColumnType;
use crate::value::SqlValue;

/// A bound parameter with the logical type of the column it targets.
///
/// The type decides how `NULL` and integers are encoded on each backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Logical type of the target column.
    pub ty: ColumnType,
    /// Value to bind.
    pub value: SqlValue,
}

/// SQL text plus its parameters, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// SQL text with placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Param>,
}

impl Statement {
    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Incremental statement builder.
#[derive(Debug)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<Param>,
}

impl SqlBuilder {
    /// Start an empty statement for `dialect`.
    pub const fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Append raw SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        self.sql.push_str(&quote_ident(ident));
        self
    }

    /// Append a comma-separated list of quoted identifiers.
    pub fn push_ident_list<'a>(&mut self, idents: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for (i, ident) in idents.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(ident);
        }
        self
    }

    /// Append a placeholder and record its parameter.
    pub fn push_bind(&mut self, ty: ColumnType, value: SqlValue) -> &mut Self {
        self.params.push(Param { ty, value });
        match self.dialect {
            Dialect::Sqlite => self.sql.push('?'),
            Dialect::Postgres => {
                self.sql.push('$');
                self.sql.push_str(&self.params.len().to_string());
            }
        }
        self
    }

    /// Finish the statement.
    pub fn build(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Quote an identifier for either dialect.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
