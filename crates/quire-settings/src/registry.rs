//! Static registry of setting descriptors.
//!
//! Settings are registered explicitly at startup; there is no runtime
//! discovery. The registry also drives table attachment and cache
//! initialisation for everything it holds.

use std::collections::BTreeMap;
use std::sync::Arc;

use quire_db::{DataRegistry, DbError, SchemaError, TableSchema};

use crate::cache::SettingCache;
use crate::error::SettingError;
use crate::setting::SettingSpec;

/// Map from setting id to descriptor.
#[derive(Debug, Default, Clone)]
pub struct SettingRegistry {
    specs: BTreeMap<&'static str, Arc<SettingSpec>>,
}

impl SettingRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Duplicate`] if the id is already taken.
    pub fn register(&mut self, spec: SettingSpec) -> Result<(), SettingError> {
        let id = spec.id();
        if self.specs.contains_key(id) {
            return Err(SettingError::Duplicate(id.to_owned()));
        }
        self.specs.insert(id, Arc::new(spec));
        Ok(())
    }

    /// Setting registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::UnknownSetting`] if nothing is registered
    /// under `id`.
    pub fn get(&self, id: &str) -> Result<&Arc<SettingSpec>, SettingError> {
        self.specs
            .get(id)
            .ok_or_else(|| SettingError::UnknownSetting(id.to_owned()))
    }

    /// All settings, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<SettingSpec>> {
        self.specs.values()
    }

    /// Number of registered settings.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether no setting is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Table schema of every setting, ordered by setting id.
    ///
    /// # Errors
    ///
    /// Returns the first invalid table declaration.
    pub fn schemas(&self) -> Result<Vec<TableSchema>, SchemaError> {
        self.specs.values().map(|s| s.table_schema()).collect()
    }

    /// Create (if missing) and attach the table of every setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] for an invalid table declaration or
    /// if table creation fails.
    pub async fn attach_all(&self, data: &mut DataRegistry) -> Result<(), SettingError> {
        for schema in self.schemas().map_err(DbError::from)? {
            data.attach_table(schema).await?;
        }
        tracing::info!(settings = self.specs.len(), "Attached setting tables");
        Ok(())
    }

    /// Load every cached setting into `cache`. Returns the total number of
    /// entries loaded.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; settings initialised before it stay
    /// loaded.
    pub async fn initialise_all(&self, data: &DataRegistry, cache: &SettingCache) -> Result<usize, SettingError> {
        let mut total: usize = 0;
        for spec in self.specs.values().filter(|s| s.is_cached()) {
            total = total.saturating_add(spec.initialise(data, cache).await?);
        }
        Ok(total)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quire_db::ColumnType;

    use super::*;
    use crate::codec::ValueCodec;
    use crate::data::ColumnData;

    fn spec(id: &'static str) -> SettingSpec {
        SettingSpec::new(
            id,
            ValueCodec::Text { max_len: 8 },
            ColumnData::new("guild_prefix", "prefix", ColumnType::ShortString),
        )
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = SettingRegistry::new();
        registry.register(spec("prefix")).unwrap();
        let err = registry.register(spec("prefix")).unwrap_err();
        assert!(matches!(err, SettingError::Duplicate(id) if id == "prefix"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn schemas_follow_id_order() {
        let mut registry = SettingRegistry::new();
        registry.register(spec("zeta")).unwrap();
        registry
            .register(SettingSpec::new(
                "alpha",
                ValueCodec::Text { max_len: 8 },
                ColumnData::new("guild_alpha", "alpha", ColumnType::ShortString),
            ))
            .unwrap();

        let names: Vec<String> = registry
            .schemas()
            .unwrap()
            .iter()
            .map(|s| s.name().to_owned())
            .collect();
        assert_eq!(names, ["guild_alpha", "guild_prefix"]);
    }

    #[test]
    fn unknown_lookup_fails() {
        let registry = SettingRegistry::new();
        assert!(matches!(
            registry.get("prefix"),
            Err(SettingError::UnknownSetting(_))
        ));
    }
}
