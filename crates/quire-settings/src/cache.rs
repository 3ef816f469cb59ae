//! In-process cache of hot-path setting values.
//!
//! [`SettingCache`] holds one map per cached setting, keyed by guild. Only
//! guilds with a meaningful value are kept: entries equal to the default,
//! cleared values, `false` and empty lists are dropped, so a miss means
//! "use the default".
//!
//! Writers must update the store first and the cache second; a failed
//! store write never reaches the cache.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::codec::SettingValue;
use crate::ids::GuildId;
use crate::setting::SettingSpec;

type SettingMap = HashMap<GuildId, SettingValue>;

/// Cache manager owning every cached setting map.
#[derive(Debug, Default)]
pub struct SettingCache {
    maps: RwLock<HashMap<&'static str, SettingMap>>,
}

impl SettingCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value of `setting` for `guild`.
    pub async fn get(&self, setting: &str, guild: GuildId) -> Option<SettingValue> {
        self.maps
            .read()
            .await
            .get(setting)
            .and_then(|map| map.get(&guild))
            .cloned()
    }

    /// Whether `guild` has a cached value for `setting`.
    pub async fn contains(&self, setting: &str, guild: GuildId) -> bool {
        self.maps
            .read()
            .await
            .get(setting)
            .is_some_and(|map| map.contains_key(&guild))
    }

    /// Record `value` as the current value of `spec` for `guild`, dropping
    /// the entry if the value is not worth keeping.
    pub async fn put(&self, spec: &SettingSpec, guild: GuildId, value: Option<SettingValue>) {
        let mut maps = self.maps.write().await;
        let map = maps.entry(spec.id()).or_default();
        match value.filter(|v| keeps(spec, v)) {
            Some(v) => {
                map.insert(guild, v);
            }
            None => {
                map.remove(&guild);
            }
        }
    }

    /// Forget the cached value of `setting` for `guild`.
    pub async fn invalidate(&self, setting: &str, guild: GuildId) {
        if let Some(map) = self.maps.write().await.get_mut(setting) {
            map.remove(&guild);
        }
    }

    /// Replace the whole map of `spec` with `entries`. Returns the number
    /// of entries kept.
    pub async fn refresh_all(
        &self,
        spec: &SettingSpec,
        entries: impl IntoIterator<Item = (GuildId, SettingValue)>,
    ) -> usize {
        let map: SettingMap = entries
            .into_iter()
            .filter(|(_, v)| keeps(spec, v))
            .collect();
        let count = map.len();
        self.maps.write().await.insert(spec.id(), map);
        count
    }

    /// Number of guilds cached for `setting`.
    pub async fn len(&self, setting: &str) -> usize {
        self.maps.read().await.get(setting).map_or(0, HashMap::len)
    }
}

fn keeps(spec: &SettingSpec, value: &SettingValue) -> bool {
    !value.is_empty() && spec.default_value() != Some(value)
}
