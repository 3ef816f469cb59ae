//! Canonical table catalogue: the version table and the three standard
//! property stores.

use crate::column::{Column, ColumnType};
use crate::error::SchemaError;
use crate::props::PropSchema;
use crate::schema::TableSchema;

/// Schema version this build requires.
pub const SCHEMA_VERSION: i64 = 3;

/// Name of the version table.
pub const VERSION_TABLE: &str = "version_number";

/// Column holding the version number.
pub const VERSION_COLUMN: &str = "version";

/// Per-user properties.
pub const USER_PROPS: &str = "user_props";

/// Per-guild properties.
pub const GUILD_PROPS: &str = "guild_props";

/// Per-member (guild + user) properties.
pub const MEMBER_PROPS: &str = "member_props";

/// Version table, seeded with `version` when first created.
///
/// # Errors
///
/// Never fails for the built-in table name; the `Result` mirrors the other
/// schema constructors.
pub fn version_schema(version: i64) -> Result<TableSchema, SchemaError> {
    TableSchema::builder(VERSION_TABLE)
        .column(Column::new(VERSION_COLUMN, ColumnType::Int).primary())
        .add_timestamp()
        .seed(&format!(
            "INSERT INTO {VERSION_TABLE} ({VERSION_COLUMN}) VALUES ({version})"
        ))
        .build()
}

/// Properties keyed by user id.
pub fn user_props() -> PropSchema {
    PropSchema::new(USER_PROPS, &["userid"])
}

/// Properties keyed by guild id.
pub fn guild_props() -> PropSchema {
    PropSchema::new(GUILD_PROPS, &["guildid"])
}

/// Properties keyed by guild id and user id.
pub fn member_props() -> PropSchema {
    PropSchema::new(MEMBER_PROPS, &["guildid", "userid"])
}

/// All standard property stores, in attach order.
pub fn property_stores() -> Vec<PropSchema> {
    vec![user_props(), guild_props(), member_props()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_table_seeds_current_version() {
        let schema = version_schema(SCHEMA_VERSION).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(
            schema.seed_statements(),
            ["INSERT INTO version_number (version) VALUES (3)"]
        );
    }

    #[test]
    fn member_props_has_two_identity_columns() {
        assert_eq!(member_props().key_columns(), ["guildid", "userid"]);
        assert_eq!(property_stores().len(), 3);
    }
}
