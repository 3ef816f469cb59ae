//! Integration tests for the `quire-db` stores.
//!
//! The `SQLite` tests run against a throwaway database file and need no
//! services. The `PostgreSQL` tests require a live server:
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_USER=quire \
//!     -e POSTGRES_PASSWORD=quire_dev -e POSTGRES_DB=quire postgres:16
//! cargo test -p quire-db -- --ignored
//! ```

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use quire_db::catalog::{self, SCHEMA_VERSION};
use quire_db::{
    BackendConfig, Column, ColumnType, DataRegistry, DbError, DbPool, Filter, PostgresConfig,
    PropSchema, Record, SqlValue, SqliteConfig, Table, TableSchema,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

async fn sqlite_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BackendConfig::Sqlite(SqliteConfig::new(dir.path().join("quire.db")));
    let pool = DbPool::connect(&config).await.expect("connect sqlite");
    (dir, pool)
}

fn prefixes_schema() -> TableSchema {
    TableSchema::builder("guild_prefixes")
        .column(Column::new("guildid", ColumnType::Identifier).primary())
        .column(Column::new("prefix", ColumnType::ShortString))
        .add_app()
        .build()
        .expect("valid schema")
}

fn roles_schema() -> TableSchema {
    TableSchema::builder("guild_autoroles")
        .column(Column::new("guildid", ColumnType::Identifier).primary())
        .column(Column::new("roleid", ColumnType::Identifier).primary())
        .add_app()
        .build()
        .expect("valid schema")
}

async fn created(schema: TableSchema, pool: &DbPool, app: &str) -> Table {
    let table = Table::new(schema, pool.clone(), app);
    table.ensure_created().await.expect("create table");
    table
}

// =============================================================================
// Structured mode
// =============================================================================

#[tokio::test]
async fn insert_then_select_where() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(prefixes_schema(), &pool, "alpha").await;

    let row = Record::new().with("guildid", 10_i64).with("prefix", "!");
    assert_eq!(table.insert(&row, false).await.unwrap(), 1);

    let rows = table
        .select_where(&Filter::new().eq("guildid", 10_i64), None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("prefix"), Some("!"));
    assert_eq!(rows[0].get_str("app"), Some("alpha"));
}

#[tokio::test]
async fn insert_without_replace_conflicts() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(prefixes_schema(), &pool, "alpha").await;
    let row = Record::new().with("guildid", 10_i64).with("prefix", "!");

    table.insert(&row, false).await.unwrap();
    let err = table.insert(&row, false).await.unwrap_err();
    assert!(err.is_backend());

    let replaced = Record::new().with("guildid", 10_i64).with("prefix", "?");
    table.insert(&replaced, true).await.unwrap();
    let row = table
        .select_one(&Filter::new().eq("guildid", 10_i64), Some(&["prefix"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get_str("prefix"), Some("?"));
}

#[tokio::test]
async fn app_namespaces_are_isolated() {
    let (_dir, pool) = sqlite_pool().await;
    let alpha = created(prefixes_schema(), &pool, "alpha").await;
    let beta = Table::new(prefixes_schema(), pool.clone(), "beta");

    alpha
        .upsert(None, &Record::new().with("guildid", 1_i64).with("prefix", "a!"))
        .await
        .unwrap();
    beta.upsert(None, &Record::new().with("guildid", 1_i64).with("prefix", "b!"))
        .await
        .unwrap();

    let filter = Filter::new().eq("guildid", 1_i64);
    let a = alpha.select_one(&filter, Some(&["prefix"])).await.unwrap().unwrap();
    let b = beta.select_one(&filter, Some(&["prefix"])).await.unwrap().unwrap();
    assert_eq!(a.get_str("prefix"), Some("a!"));
    assert_eq!(b.get_str("prefix"), Some("b!"));

    assert_eq!(beta.delete_where(&filter).await.unwrap(), 1);
    assert!(alpha.select_one(&filter, None).await.unwrap().is_some());
}

#[tokio::test]
async fn upsert_updates_non_key_columns() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(prefixes_schema(), &pool, "alpha").await;

    for prefix in ["!", "?", "$"] {
        table
            .upsert(None, &Record::new().with("guildid", 5_i64).with("prefix", prefix))
            .await
            .unwrap();
    }

    let rows = table.select_where(&Filter::new(), None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("prefix"), Some("$"));
}

#[tokio::test]
async fn insert_many_and_delete_with_in_filter() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(roles_schema(), &pool, "alpha").await.with_batch_size(2);

    let rows: Vec<Vec<SqlValue>> = (1..=5_i64)
        .map(|role| vec![SqlValue::Int(7), SqlValue::Int(role)])
        .collect();
    let inserted = table
        .insert_many(&["guildid", "roleid"], &rows)
        .await
        .unwrap();
    assert_eq!(inserted, 5);

    let removed = table
        .delete_where(
            &Filter::new()
                .eq("guildid", 7_i64)
                .any_of("roleid", [1_i64, 3, 99]),
        )
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let remaining: Vec<i64> = table
        .select_where(&Filter::new().eq("guildid", 7_i64), Some(&["roleid"]))
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.get_i64("roleid"))
        .collect();
    assert_eq!(remaining.len(), 3);
    assert!(!remaining.contains(&1) && !remaining.contains(&3));
}

#[tokio::test]
async fn empty_in_filter_matches_nothing() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(roles_schema(), &pool, "alpha").await;
    table
        .insert_many(&["guildid", "roleid"], &[vec![SqlValue::Int(1), SqlValue::Int(2)]])
        .await
        .unwrap();

    let none: [i64; 0] = [];
    assert_eq!(
        table
            .delete_where(&Filter::new().any_of("roleid", none))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn bulk_insert_rejects_ragged_rows() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(roles_schema(), &pool, "alpha").await;

    let err = table
        .insert_many(&["guildid", "roleid"], &[vec![SqlValue::Int(1)]])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::RowShape { expected: 2, got: 1, .. }));
}

#[tokio::test]
async fn unknown_columns_and_oversized_strings_are_rejected() {
    let (_dir, pool) = sqlite_pool().await;
    let table = created(prefixes_schema(), &pool, "alpha").await;

    let err = table
        .select_where(&Filter::new().eq("nope", 1_i64), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UnknownColumn { .. }));

    let long = "x".repeat(65);
    let err = table
        .insert(&Record::new().with("guildid", 1_i64).with("prefix", long), false)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Coercion { .. }));
}

#[tokio::test]
async fn keyless_upsert_needs_a_constraint() {
    let (_dir, pool) = sqlite_pool().await;
    let schema = TableSchema::builder("audit_log")
        .column(Column::new("guildid", ColumnType::Identifier))
        .column(Column::new("entry", ColumnType::MessageString))
        .unique(&["guildid"])
        .allow_keyless()
        .build()
        .unwrap();
    let table = created(schema, &pool, "").await;
    let row = Record::new().with("guildid", 1_i64).with("entry", "first");

    assert!(matches!(
        table.upsert(None, &row).await,
        Err(DbError::NoUpsertConstraint(_))
    ));
    assert!(matches!(
        table.insert(&row, true).await,
        Err(DbError::NoUpsertConstraint(_))
    ));
    assert!(table.select_where(&Filter::new(), None).await.unwrap().is_empty());
    table.upsert(Some(&["guildid"]), &row).await.unwrap();
    table
        .upsert(
            Some(&["guildid"]),
            &Record::new().with("guildid", 1_i64).with("entry", "second"),
        )
        .await
        .unwrap();

    let rows = table.select_where(&Filter::new(), None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("entry"), Some("second"));
}

#[tokio::test]
async fn seeds_run_only_on_creation() {
    let (_dir, pool) = sqlite_pool().await;
    let schema = catalog::version_schema(SCHEMA_VERSION).unwrap();

    let first = Table::new(schema.clone(), pool.clone(), "");
    assert!(first.ensure_created().await.unwrap());
    let second = Table::new(schema, pool.clone(), "");
    assert!(!second.ensure_created().await.unwrap());

    let rows = second
        .select_where(&Filter::new(), Some(&["version"]))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

// =============================================================================
// EAV mode
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    nickname: String,
    level: u32,
}

#[tokio::test]
async fn property_roundtrip_and_default() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    let props = registry.attach_props(&catalog::user_props()).await.unwrap();
    props.ensure_exists(&["profile"], false).await.unwrap();

    let key = [SqlValue::Int(42)];
    let profile = Profile {
        nickname: String::from("quill"),
        level: 3,
    };
    props.set(&key, "profile", &profile).await.unwrap();
    assert_eq!(
        props.get::<Profile>(&key, "profile").await.unwrap(),
        Some(profile)
    );

    let other = [SqlValue::Int(43)];
    assert_eq!(props.get::<Profile>(&other, "profile").await.unwrap(), None);
    assert_eq!(props.get_or(&other, "level", 1_u32).await.unwrap(), 1);
}

#[tokio::test]
async fn non_shared_property_is_invisible_to_other_apps() {
    let (_dir, pool) = sqlite_pool().await;
    let mut alpha = DataRegistry::with_pool("alpha", pool.clone());
    let mut beta = DataRegistry::with_pool("beta", pool);
    let schema = catalog::user_props();

    let a = alpha.attach_props(&schema).await.unwrap();
    a.ensure_exists(&["greeting"], false).await.unwrap();
    a.set(&[SqlValue::Int(42)], "greeting", "hi").await.unwrap();
    assert_eq!(
        a.get::<String>(&[SqlValue::Int(42)], "greeting").await.unwrap().as_deref(),
        Some("hi")
    );
    assert_eq!(a.storage_key("greeting").await.unwrap(), "alpha_greeting");

    let b = beta.attach_props(&schema).await.unwrap();
    assert_eq!(
        b.get::<String>(&[SqlValue::Int(42)], "greeting").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn shared_property_is_visible_to_other_apps() {
    let (_dir, pool) = sqlite_pool().await;
    let mut alpha = DataRegistry::with_pool("alpha", pool.clone());
    let mut beta = DataRegistry::with_pool("beta", pool);
    let schema = catalog::guild_props();

    let a = alpha.attach_props(&schema).await.unwrap();
    a.ensure_exists(&["timezone"], true).await.unwrap();
    a.set(&[SqlValue::Int(7)], "timezone", "Europe/Oslo").await.unwrap();

    let b = beta.attach_props(&schema).await.unwrap();
    assert!(b.is_shared("timezone").await.unwrap());
    assert_eq!(
        b.get::<String>(&[SqlValue::Int(7)], "timezone").await.unwrap().as_deref(),
        Some("Europe/Oslo")
    );
}

#[tokio::test]
async fn shared_registration_reaches_apps_attached_earlier() {
    let (_dir, pool) = sqlite_pool().await;
    let mut alpha = DataRegistry::with_pool("alpha", pool.clone());
    let mut beta = DataRegistry::with_pool("beta", pool);
    let schema = catalog::guild_props();

    let a = alpha.attach_props(&schema).await.unwrap();
    let b = beta.attach_props(&schema).await.unwrap();
    assert_eq!(b.storage_key("timezone").await.unwrap(), "beta_timezone");

    a.ensure_exists(&["timezone"], true).await.unwrap();
    a.set(&[SqlValue::Int(7)], "timezone", "Europe/Oslo").await.unwrap();

    assert!(b.is_shared("timezone").await.unwrap());
    assert_eq!(b.storage_key("timezone").await.unwrap(), "timezone");
    assert_eq!(
        b.get::<String>(&[SqlValue::Int(7)], "timezone").await.unwrap().as_deref(),
        Some("Europe/Oslo")
    );

    b.set(&[SqlValue::Int(7)], "timezone", "UTC").await.unwrap();
    assert_eq!(
        a.get::<String>(&[SqlValue::Int(7)], "timezone").await.unwrap().as_deref(),
        Some("UTC")
    );
}

#[tokio::test]
async fn ensure_exists_is_idempotent() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool.clone());
    let props = registry.attach_props(&catalog::user_props()).await.unwrap();

    props.ensure_exists(&["greeting", "badge"], false).await.unwrap();
    props.ensure_exists(&["greeting", "badge"], false).await.unwrap();

    let propmap = Table::new(
        catalog::user_props().propmap_schema().unwrap(),
        pool,
        "alpha",
    );
    let rows = propmap.select_where(&Filter::new(), None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.get_bool("shared") == Some(false)));
}

#[tokio::test]
async fn flipping_shared_flag_does_not_move_values() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    let props = registry.attach_props(&catalog::user_props()).await.unwrap();
    let key = [SqlValue::Int(1)];

    props.ensure_exists(&["badge"], false).await.unwrap();
    props.set(&key, "badge", "gold").await.unwrap();
    props.ensure_exists(&["badge"], true).await.unwrap();

    assert!(props.is_shared("badge").await.unwrap());
    assert_eq!(props.get::<String>(&key, "badge").await.unwrap(), None);
}

#[tokio::test]
async fn arity_mismatch_fails_fast() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    let members = registry.attach_props(&catalog::member_props()).await.unwrap();

    let err = members
        .get::<String>(&[SqlValue::Int(1)], "nickname")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Arity { expected: 2, got: 1, .. }));

    let err = members
        .set(&[SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)], "nickname", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Arity { expected: 2, got: 3, .. }));

    let err = members.find("nickname", "x").await.unwrap_err();
    assert!(matches!(err, DbError::Arity { expected: 1, got: 2, .. }));
}

#[tokio::test]
async fn find_and_find_not_empty() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    let props = registry.attach_props(&catalog::user_props()).await.unwrap();
    props.ensure_exists(&["pronouns", "tags"], false).await.unwrap();

    props.set(&[SqlValue::Int(1)], "pronouns", "they/them").await.unwrap();
    props.set(&[SqlValue::Int(2)], "pronouns", "she/her").await.unwrap();
    props.set(&[SqlValue::Int(3)], "pronouns", "they/them").await.unwrap();

    let mut found = props.find("pronouns", "they/them").await.unwrap();
    found.sort();
    assert_eq!(found, vec![SqlValue::Int(1), SqlValue::Int(3)]);

    let empty: Vec<String> = Vec::new();
    props.set(&[SqlValue::Int(1)], "tags", &empty).await.unwrap();
    props.set(&[SqlValue::Int(2)], "tags", &["art"]).await.unwrap();
    props.set(&[SqlValue::Int(3)], "tags", "").await.unwrap();
    assert_eq!(
        props.find_not_empty("tags").await.unwrap(),
        vec![SqlValue::Int(2)]
    );
}

#[tokio::test]
async fn unset_removes_value() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    let props = registry.attach_props(&catalog::guild_props()).await.unwrap();
    let key = [SqlValue::Int(9)];

    props.set(&key, "motd", "hello").await.unwrap();
    assert!(props.unset(&key, "motd").await.unwrap());
    assert!(!props.unset(&key, "motd").await.unwrap());
    assert_eq!(props.get::<String>(&key, "motd").await.unwrap(), None);
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn version_check_passes_on_fresh_and_matching_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = BackendConfig::Sqlite(SqliteConfig::new(dir.path().join("v.db")));

    let registry = DataRegistry::connect("alpha", &config).await.unwrap();
    registry.verify_version(SCHEMA_VERSION).await.unwrap();
    registry.close().await;

    let registry = DataRegistry::connect("alpha", &config).await.unwrap();
    registry.verify_version(SCHEMA_VERSION).await.unwrap();
    registry.close().await;
}

#[tokio::test]
async fn version_check_rejects_older_version() {
    let (_dir, pool) = sqlite_pool().await;
    let registry = DataRegistry::with_pool("alpha", pool);
    registry.verify_version(2).await.unwrap();

    let err = registry.verify_version(3).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::VersionMismatch {
            required: 3,
            found: Some(2)
        }
    ));
}

#[tokio::test]
async fn version_check_rejects_empty_version_table() {
    let (_dir, pool) = sqlite_pool().await;
    let table = Table::new(catalog::version_schema(3).unwrap(), pool.clone(), "");
    table.ensure_created().await.unwrap();
    table.delete_where(&Filter::new()).await.unwrap();

    let registry = DataRegistry::with_pool("alpha", pool);
    let err = registry.verify_version(3).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::VersionMismatch {
            required: 3,
            found: None
        }
    ));
}

#[tokio::test]
async fn lookups_fail_for_unattached_stores() {
    let (_dir, pool) = sqlite_pool().await;
    let mut registry = DataRegistry::with_pool("alpha", pool);
    registry.attach_table(prefixes_schema()).await.unwrap();

    assert!(registry.table("guild_prefixes").is_ok());
    assert!(matches!(
        registry.table("guild_autoroles"),
        Err(DbError::UnknownStore(_))
    ));
    assert!(matches!(
        registry.props("user_props"),
        Err(DbError::UnknownStore(_))
    ));
}

// =============================================================================
// PostgreSQL
// =============================================================================

fn postgres_config() -> BackendConfig {
    BackendConfig::Postgres(PostgresConfig::new(
        "localhost",
        "quire",
        "quire_dev",
        "quire",
    ))
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance"]
async fn postgres_property_roundtrip() {
    let mut registry = DataRegistry::connect("pgtest", &postgres_config())
        .await
        .expect("Failed to connect to PostgreSQL -- is it running?");
    registry.verify_version(SCHEMA_VERSION).await.unwrap();

    let schema = PropSchema::new("pg_test_props", &["userid"]);
    let props = registry.attach_props(&schema).await.unwrap();
    props.ensure_exists(&["greeting"], false).await.unwrap();
    props
        .set(&[SqlValue::Int(42)], "greeting", "hi")
        .await
        .unwrap();
    assert_eq!(
        props
            .get::<String>(&[SqlValue::Int(42)], "greeting")
            .await
            .unwrap()
            .as_deref(),
        Some("hi")
    );

    // Second write goes through the update trigger.
    props
        .set(&[SqlValue::Int(42)], "greeting", "hello")
        .await
        .unwrap();
    props.unset(&[SqlValue::Int(42)], "greeting").await.unwrap();
    registry.close().await;
}

#[tokio::test]
#[ignore = "requires live PostgreSQL instance"]
async fn postgres_structured_upsert() {
    let pool = DbPool::connect(&postgres_config())
        .await
        .expect("Failed to connect to PostgreSQL -- is it running?");
    let schema = TableSchema::builder("pg_test_counters")
        .column(Column::new("guildid", ColumnType::Identifier).primary())
        .column(Column::new("hits", ColumnType::Int).required().default_value(0_i64))
        .add_app()
        .add_timestamp()
        .build()
        .unwrap();
    let table = created(schema, &pool, "pgtest").await;

    table
        .upsert(None, &Record::new().with("guildid", 1_i64).with("hits", 5_i64))
        .await
        .unwrap();
    let row = table
        .select_one(&Filter::new().eq("guildid", 1_i64), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get_i64("hits"), Some(5));
    assert!(row.get("_timestamp").is_some_and(|v| !v.is_null()));

    table.delete_where(&Filter::new()).await.unwrap();
    pool.close().await;
}
