//! Setting descriptors and per-guild setting instances.
//!
//! A [`SettingSpec`] describes one configurable value: its identity and help
//! text, who may read and write it, a [`ValueCodec`] for the value type and
//! a [`StorageStrategy`] for the table layout. Specs are built once and
//! registered in a [`SettingRegistry`](crate::registry::SettingRegistry).
//!
//! A [`Setting`] is a short-lived view of one guild's value:
//!
//! ```text
//! spec.get(data, guild)    -> Setting (read from the store)
//! spec.parse(ctx, guild, s) -> Setting (pending data)
//! setting.write(data, cache) -> store first, then cache
//! ```

use std::time::Duration;

use quire_db::{DataRegistry, SchemaError, TableSchema};

use crate::cache::SettingCache;
use crate::codec::{SettingValue, ValueCodec};
use crate::context::{Check, Invocation};
use crate::data::{SettingData, StorageStrategy, WriteOutcome};
use crate::error::SettingError;
use crate::ids::GuildId;

/// Shown instead of a value the caller is not allowed to read.
pub const HIDDEN_PLACEHOLDER: &str = "Hidden";

/// Description of one setting.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    id: &'static str,
    category: &'static str,
    name: &'static str,
    description: &'static str,
    read_check: Check,
    write_check: Check,
    codec: ValueCodec,
    storage: StorageStrategy,
    default: Option<SettingValue>,
    cached: bool,
    refresh_interval: Option<Duration>,
}

impl SettingSpec {
    /// A setting readable by anyone and writable by guild managers, with no
    /// default and no cache.
    pub fn new(id: &'static str, codec: ValueCodec, storage: impl Into<StorageStrategy>) -> Self {
        Self {
            id,
            category: "General",
            name: id,
            description: "",
            read_check: Check::Anyone,
            write_check: Check::ManageGuild,
            codec,
            storage: storage.into(),
            default: None,
            cached: false,
            refresh_interval: None,
        }
    }

    /// Set the category and display name.
    #[must_use]
    pub const fn with_label(mut self, category: &'static str, name: &'static str) -> Self {
        self.category = category;
        self.name = name;
        self
    }

    /// Set the help text.
    #[must_use]
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the read and write checks.
    #[must_use]
    pub const fn with_checks(mut self, read: Check, write: Check) -> Self {
        self.read_check = read;
        self.write_check = write;
        self
    }

    /// Set the value used when nothing is stored.
    #[must_use]
    pub fn with_default(mut self, default: SettingValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Keep this setting in the [`SettingCache`].
    #[must_use]
    pub const fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Re-read the whole table into the cache every `interval`. Implies
    /// [`SettingSpec::cached`].
    #[must_use]
    pub const fn with_refresh(mut self, interval: Duration) -> Self {
        self.cached = true;
        self.refresh_interval = Some(interval);
        self
    }

    /// Registry key.
    pub const fn id(&self) -> &'static str {
        self.id
    }

    /// Help category.
    pub const fn category(&self) -> &'static str {
        self.category
    }

    /// Display name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Help text.
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Value codec.
    pub const fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Storage strategy.
    pub const fn storage(&self) -> &StorageStrategy {
        &self.storage
    }

    /// Default value.
    pub const fn default_value(&self) -> Option<&SettingValue> {
        self.default.as_ref()
    }

    /// Whether the setting is cached.
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Periodic refresh interval, if any.
    pub const fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    /// Schema of the backing table.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid names.
    pub fn table_schema(&self) -> Result<TableSchema, SchemaError> {
        self.storage.table_schema()
    }

    /// Fail unless `ctx` may read the setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::PermissionDenied`].
    pub fn check_read(&self, ctx: &Invocation) -> Result<(), SettingError> {
        self.read_check.require(ctx)
    }

    /// Fail unless `ctx` may write the setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::PermissionDenied`].
    pub fn check_write(&self, ctx: &Invocation) -> Result<(), SettingError> {
        self.write_check.require(ctx)
    }

    /// Read the guild's current value from the store, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the table is not attached or the
    /// read fails.
    pub async fn get(&self, data: &DataRegistry, guild: GuildId) -> Result<Setting<'_>, SettingError> {
        let table = data.table(self.storage.table_name())?;
        let stored = self.storage.read(table, guild).await?;
        Ok(Setting {
            spec: self,
            guild,
            data: stored,
        })
    }

    /// Parse user input into a setting with pending data. Nothing is
    /// written until [`Setting::write`].
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::BadInput`] if the input does not parse.
    pub fn parse(&self, ctx: &Invocation, guild: GuildId, raw: &str) -> Result<Setting<'_>, SettingError> {
        let value = self.codec.parse(ctx, raw)?;
        Ok(self.with_value(guild, value.as_ref()))
    }

    /// A setting holding `value` as pending data.
    pub fn with_value(&self, guild: GuildId, value: Option<&SettingValue>) -> Setting<'_> {
        Setting {
            spec: self,
            guild,
            data: value.map(|v| self.codec.to_data(v)),
        }
    }

    /// Check write permission, parse `raw` and write it. Returns the
    /// written setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::PermissionDenied`],
    /// [`SettingError::BadInput`] or a storage error.
    pub async fn set_from_input(
        &self,
        data: &DataRegistry,
        cache: &SettingCache,
        ctx: &Invocation,
        guild: GuildId,
        raw: &str,
    ) -> Result<Setting<'_>, SettingError> {
        self.check_write(ctx)?;
        let setting = self.parse(ctx, guild, raw)?;
        setting.write(data, cache).await?;
        Ok(setting)
    }

    /// Load every guild's value into the cache. Returns the number of
    /// entries cached; uncached settings load nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the table is not attached or the
    /// read fails. The cache is left untouched on error.
    pub async fn initialise(&self, data: &DataRegistry, cache: &SettingCache) -> Result<usize, SettingError> {
        if !self.cached {
            return Ok(0);
        }
        let table = data.table(self.storage.table_name())?;
        let rows = self.storage.read_all(table).await?;
        let entries = rows
            .iter()
            .filter_map(|(guild, stored)| Some((*guild, self.codec.from_data(stored)?)));
        let loaded = cache.refresh_all(self, entries).await;

        tracing::info!(setting = self.id, loaded, "Loaded setting cache");
        Ok(loaded)
    }

    /// Multi-line help text: description, accepted input and default.
    pub fn long_description(&self) -> String {
        let default = self.codec.format(self.default.as_ref(), None);
        let mut text = String::new();
        if !self.description.is_empty() {
            text.push_str(self.description);
            text.push_str("\n\n");
        }
        text.push_str("Accepts: ");
        text.push_str(&self.codec.accepts());
        text.push_str("\nDefault: ");
        text.push_str(&default);
        text
    }
}

/// One guild's value of one setting.
#[derive(Debug, Clone)]
pub struct Setting<'s> {
    spec: &'s SettingSpec,
    guild: GuildId,
    data: Option<SettingData>,
}

impl Setting<'_> {
    /// Descriptor of this setting.
    pub const fn spec(&self) -> &SettingSpec {
        self.spec
    }

    /// Owning guild.
    pub const fn guild(&self) -> GuildId {
        self.guild
    }

    /// Raw stored (or pending) data.
    pub const fn data(&self) -> Option<&SettingData> {
        self.data.as_ref()
    }

    /// Value decoded from the data, without falling back to the default.
    pub fn stored_value(&self) -> Option<SettingValue> {
        self.data
            .as_ref()
            .and_then(|d| self.spec.codec.from_data(d))
    }

    /// Effective value: the stored value, or the default when nothing is
    /// stored.
    pub fn value(&self) -> Option<SettingValue> {
        self.stored_value().or_else(|| self.spec.default.clone())
    }

    /// Default value of the setting.
    pub const fn default(&self) -> Option<&SettingValue> {
        self.spec.default.as_ref()
    }

    /// Replace the pending value.
    pub fn set_value(&mut self, value: Option<&SettingValue>) {
        self.data = value.map(|v| self.spec.codec.to_data(v));
    }

    /// Short rendering of the effective value.
    pub fn formatted(&self) -> String {
        self.spec.codec.format(self.value().as_ref(), None)
    }

    /// Rendering for `ctx`: resolves references and hides the value from
    /// callers that fail the read check.
    pub fn formatted_for(&self, ctx: &Invocation) -> String {
        if self.spec.check_read(ctx).is_err() {
            return HIDDEN_PLACEHOLDER.to_owned();
        }
        self.spec.codec.format(self.value().as_ref(), Some(ctx))
    }

    /// Write the data to the store, then update the cache for cached
    /// settings. The cache is not touched if the store write fails.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::Store`] if the table is not attached or the
    /// write fails, or [`SettingError::DataMismatch`] if the data does not
    /// fit the storage strategy.
    pub async fn write(&self, data: &DataRegistry, cache: &SettingCache) -> Result<WriteOutcome, SettingError> {
        let table = data.table(self.spec.storage.table_name())?;
        let outcome = self
            .spec
            .storage
            .write(table, self.guild, self.data.as_ref())
            .await?;

        if self.spec.cached {
            cache.put(self.spec, self.guild, self.stored_value()).await;
        }

        tracing::debug!(
            setting = self.spec.id,
            guild = %self.guild,
            written = outcome.rows_written,
            removed = outcome.rows_removed,
            "Wrote setting"
        );
        Ok(outcome)
    }
}
