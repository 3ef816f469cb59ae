//! Declarative table schemas and per-dialect DDL generation.
//!
//! A [`TableSchema`] is an ordered list of [`Column`]s under a table name.
//! From it the data layer derives:
//!
//! - `CREATE TABLE` text for each [`Dialect`] with columns in declaration
//!   order and a trailing composite `PRIMARY KEY` over the primary columns,
//! - update triggers for `auto_update_timestamp` columns where the dialect
//!   needs them,
//! - a column-name to [`ColumnType`] manifest used to coerce and decode
//!   values at runtime.
//!
//! Two implicit columns can be requested: an `app` namespace column (primary,
//! so one physical table hosts isolated rows per deployment) and a
//! `_timestamp` column recording insertion/update time.

use std::collections::BTreeSet;

use crate::backend::Dialect;
use crate::column::{Column, ColumnDefault, ColumnType};
use crate::error::SchemaError;
use crate::sql::quote_ident;
use crate::value::SqlValue;

/// Name of the implicit namespace column.
pub const APP_COLUMN: &str = "app";

/// Name of the implicit timestamp column.
pub const TIMESTAMP_COLUMN: &str = "_timestamp";

/// Validated table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    unique: Vec<Vec<String>>,
    seed: Vec<String>,
    has_app: bool,
}

impl TableSchema {
    /// Start declaring a table.
    pub fn builder(name: &str) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.to_owned(),
            columns: Vec::new(),
            unique: Vec::new(),
            seed: Vec::new(),
            add_app: false,
            add_timestamp: false,
            keyless: false,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order, implicit columns last.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column named `name`, if declared.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Logical type of column `name`, if declared.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name).map(|c| c.ty)
    }

    /// Column name to logical type, in declaration order.
    pub fn manifest(&self) -> Vec<(String, ColumnType)> {
        self.columns.iter().map(|c| (c.name.clone(), c.ty)).collect()
    }

    /// Primary-key columns in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Whether the table carries the implicit `app` namespace column.
    pub const fn has_app_column(&self) -> bool {
        self.has_app
    }

    /// Additional `UNIQUE` column sets.
    pub fn unique_constraints(&self) -> &[Vec<String>] {
        &self.unique
    }

    /// Raw statements run once, right after the table is first created.
    pub fn seed_statements(&self) -> &[String] {
        &self.seed
    }

    /// DDL creating the table (and any supporting triggers) on `dialect`.
    ///
    /// Every statement is idempotent.
    pub fn create_statements(&self, dialect: Dialect) -> Vec<String> {
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|col| column_definition(col, dialect))
            .collect();

        let primary = self.primary_key();
        if !primary.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", ident_list(primary)));
        }
        for set in &self.unique {
            defs.push(format!(
                "UNIQUE ({})",
                ident_list(set.iter().map(String::as_str))
            ));
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            defs.join(",\n    ")
        )];
        statements.extend(self.trigger_statements(dialect));
        statements
    }

    /// `SQLite` has no `ON UPDATE` column clause and timestamps there are
    /// informational only, so auto-update is a `PostgreSQL` trigger.
    fn trigger_statements(&self, dialect: Dialect) -> Vec<String> {
        let touched: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.auto_update_timestamp && c.ty == ColumnType::Timestamp)
            .map(|c| c.name.as_str())
            .collect();
        if touched.is_empty() || dialect != Dialect::Postgres {
            return Vec::new();
        }

        let function = quote_ident(&format!("{}_touch", self.name));
        let assignments: String = touched
            .iter()
            .map(|c| format!("    NEW.{} = now();\n", quote_ident(c)))
            .collect();
        vec![
            format!(
                "CREATE OR REPLACE FUNCTION {function}() RETURNS TRIGGER AS $$\nBEGIN\n{assignments}    RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql"
            ),
            format!(
                "CREATE OR REPLACE TRIGGER {function} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE FUNCTION {function}()",
                quote_ident(&self.name)
            ),
        ]
    }
}

/// Builder returned by [`TableSchema::builder`].
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    name: String,
    columns: Vec<Column>,
    unique: Vec<Vec<String>>,
    seed: Vec<String>,
    add_app: bool,
    add_timestamp: bool,
    keyless: bool,
}

impl TableSchemaBuilder {
    /// Append a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append several columns.
    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Declare an additional `UNIQUE` column set.
    #[must_use]
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique
            .push(columns.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    /// Add a raw statement run once after the table is first created,
    /// typically to seed a required row.
    #[must_use]
    pub fn seed(mut self, sql: &str) -> Self {
        self.seed.push(sql.to_owned());
        self
    }

    /// Append the implicit primary `app` namespace column.
    #[must_use]
    pub const fn add_app(mut self) -> Self {
        self.add_app = true;
        self
    }

    /// Append the implicit `_timestamp` column.
    #[must_use]
    pub const fn add_timestamp(mut self) -> Self {
        self.add_timestamp = true;
        self
    }

    /// Permit a table without primary columns. Such a table can only be
    /// upserted with an explicit constraint.
    #[must_use]
    pub const fn allow_keyless(mut self) -> Self {
        self.keyless = true;
        self
    }

    /// Validate and finish the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid identifiers, duplicate column
    /// names, unknown unique-constraint columns, or a missing primary key.
    pub fn build(self) -> Result<TableSchema, SchemaError> {
        let Self {
            name,
            mut columns,
            mut unique,
            seed,
            add_app,
            add_timestamp,
            keyless,
        } = self;

        validate_identifier(&name)?;

        if add_app {
            columns.push(Column::new(APP_COLUMN, ColumnType::ShortString).primary());
            // Upserts on namespaced tables always conflict on `app` too.
            for set in &mut unique {
                if !set.iter().any(|c| c == APP_COLUMN) {
                    set.push(APP_COLUMN.to_owned());
                }
            }
        }
        if add_timestamp {
            columns.push(
                Column::new(TIMESTAMP_COLUMN, ColumnType::Timestamp)
                    .default_now()
                    .auto_update_timestamp(),
            );
        }

        let mut seen = BTreeSet::new();
        for col in &columns {
            validate_identifier(&col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: col.name.clone(),
                });
            }
        }

        for column in unique.iter().flatten() {
            if !seen.contains(column.as_str()) {
                return Err(SchemaError::UnknownConstraintColumn {
                    table: name,
                    column: column.clone(),
                });
            }
        }

        if !keyless && !columns.iter().any(|c| c.primary) {
            return Err(SchemaError::NoPrimaryKey { table: name });
        }

        Ok(TableSchema {
            name,
            columns,
            unique,
            seed,
            has_app: add_app,
        })
    }
}

/// Accept only `[a-z_][a-z0-9_]*` so identifiers are safe to splice into
/// SQL and fold identically on every backend.
fn validate_identifier(ident: &str) -> Result<(), SchemaError> {
    let mut chars = ident.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(ident.to_owned()))
    }
}

fn ident_list<'a>(idents: impl IntoIterator<Item = &'a str>) -> String {
    idents
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_definition(col: &Column, dialect: Dialect) -> String {
    let mut def = format!("{} {}", quote_ident(&col.name), col.ty.physical(dialect));
    if col.not_null() {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        def.push_str(" DEFAULT ");
        def.push_str(&default_literal(default));
    }
    def
}

fn default_literal(default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        ColumnDefault::Value(SqlValue::Null) => String::from("NULL"),
        ColumnDefault::Value(SqlValue::Int(v)) => v.to_string(),
        ColumnDefault::Value(SqlValue::Bool(b)) => String::from(if *b { "TRUE" } else { "FALSE" }),
        ColumnDefault::Value(SqlValue::Text(s)) => format!("'{}'", s.replace('\'', "''")),
        ColumnDefault::Value(SqlValue::Timestamp(t)) => format!("'{}'", t.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> TableSchema {
        TableSchema::builder("guild_prefixes")
            .column(Column::new("guildid", ColumnType::Identifier).primary())
            .column(Column::new("prefix", ColumnType::ShortString).required().default_value("!"))
            .add_app()
            .build()
            .unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn sqlite_ddl_lists_columns_then_primary_key() {
        let ddl = prefixes().create_statements(Dialect::Sqlite);
        assert_eq!(ddl.len(), 1);
        assert_eq!(
            ddl.first().map(String::as_str),
            Some(
                "CREATE TABLE IF NOT EXISTS \"guild_prefixes\" (\n    \"guildid\" INTEGER NOT NULL,\n    \"prefix\" VARCHAR(64) NOT NULL DEFAULT '!',\n    \"app\" VARCHAR(64) NOT NULL,\n    PRIMARY KEY (\"guildid\", \"app\")\n)"
            )
        );
    }

    #[test]
    fn postgres_ddl_uses_bigint_identifiers() {
        let ddl = prefixes().create_statements(Dialect::Postgres);
        let create = ddl.first().cloned().unwrap_or_default();
        assert!(create.contains("\"guildid\" BIGINT NOT NULL"));
    }

    #[test]
    fn timestamp_column_gets_trigger_on_postgres_only() {
        let schema = TableSchema::builder("user_props")
            .column(Column::new("userid", ColumnType::Identifier).primary())
            .add_timestamp()
            .build()
            .unwrap_or_else(|e| panic!("{e}"));

        let pg = schema.create_statements(Dialect::Postgres);
        assert_eq!(pg.len(), 3);
        assert!(pg.iter().any(|s| s.contains("BEFORE UPDATE ON \"user_props\"")));
        assert!(pg.first().is_some_and(|s| s.contains("\"_timestamp\" TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP")));

        let lite = schema.create_statements(Dialect::Sqlite);
        assert_eq!(lite.len(), 1);
    }

    #[test]
    fn manifest_follows_declaration_order() {
        let manifest = prefixes().manifest();
        let names: Vec<&str> = manifest.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["guildid", "prefix", "app"]);
        assert_eq!(prefixes().column_type("app"), Some(ColumnType::ShortString));
    }

    #[test]
    fn missing_primary_key_is_rejected() {
        let err = TableSchema::builder("notes")
            .column(Column::new("body", ColumnType::Text))
            .build();
        assert_eq!(
            err,
            Err(SchemaError::NoPrimaryKey {
                table: String::from("notes")
            })
        );
    }

    #[test]
    fn keyless_tables_must_opt_in() {
        let schema = TableSchema::builder("audit_log")
            .column(Column::new("body", ColumnType::Text))
            .allow_keyless()
            .build();
        assert!(schema.is_ok_and(|s| s.primary_key().is_empty()));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = TableSchema::builder("guild_prefixes")
            .column(Column::new("app", ColumnType::ShortString).primary())
            .add_app()
            .build();
        assert!(matches!(err, Err(SchemaError::DuplicateColumn { column, .. }) if column == "app"));
    }

    #[test]
    fn identifiers_are_restricted() {
        let err = TableSchema::builder("Guild Prefixes")
            .column(Column::new("guildid", ColumnType::Identifier).primary())
            .build();
        assert!(matches!(err, Err(SchemaError::InvalidIdentifier(_))));
    }

    #[test]
    fn unique_constraints_must_name_columns() {
        let err = TableSchema::builder("guild_event_log")
            .column(Column::new("guildid", ColumnType::Identifier).primary())
            .unique(&["channelid"])
            .build();
        assert!(matches!(err, Err(SchemaError::UnknownConstraintColumn { .. })));
    }

    #[test]
    fn namespaced_unique_sets_include_app() {
        let schema = TableSchema::builder("guild_event_log")
            .column(Column::new("guildid", ColumnType::Identifier).primary())
            .column(Column::new("channelid", ColumnType::Identifier))
            .unique(&["channelid"])
            .add_app()
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            schema.unique_constraints(),
            [vec![String::from("channelid"), String::from("app")]]
        );
        let ddl = schema.create_statements(Dialect::Sqlite);
        assert!(ddl.first().is_some_and(|s| s.contains("UNIQUE (\"channelid\", \"app\")")));
    }

    #[test]
    fn seed_statements_are_kept_verbatim() {
        let schema = TableSchema::builder("version_number")
            .column(Column::new("version", ColumnType::Int).primary())
            .seed("INSERT INTO version_number (version) VALUES (1)")
            .build()
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            schema.seed_statements(),
            ["INSERT INTO version_number (version) VALUES (1)"]
        );
    }
}
