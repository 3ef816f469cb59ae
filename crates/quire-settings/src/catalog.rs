//! Built-in guild settings.

use std::time::Duration;

use quire_db::ColumnType;
use quire_db::column::{MESSAGE_STRING_LEN, SHORT_STRING_LEN};

use crate::codec::{SettingValue, ValueCodec};
use crate::context::Check;
use crate::data::{BoolData, ColumnData, ListData};
use crate::error::SettingError;
use crate::registry::SettingRegistry;
use crate::setting::SettingSpec;

/// Command prefix used when a guild has not set one.
pub const DEFAULT_PREFIX: &str = "!";

/// How often the guild blacklist is re-read from the database.
pub const BLACKLIST_REFRESH: Duration = Duration::from_secs(300);

/// Longest accepted command prefix.
const MAX_PREFIX_LEN: usize = 16;

/// Setting ids.
pub mod ids {
    /// Command prefix.
    pub const PREFIX: &str = "prefix";
    /// Commands disabled in the guild.
    pub const DISABLED_COMMANDS: &str = "disabled_commands";
    /// Moderator role.
    pub const MOD_ROLE: &str = "mod_role";
    /// Moderation event log channel.
    pub const EVENT_LOG: &str = "event_log";
    /// Roles given to new members.
    pub const AUTOROLES: &str = "autoroles";
    /// Welcome message for new members.
    pub const GREETING: &str = "greeting";
    /// Whether moderated members are notified by DM.
    pub const DM_ON_MODERATION: &str = "dm_on_moderation";
    /// Whether the guild is barred from using the bot.
    pub const BLACKLISTED: &str = "blacklisted";
}

/// Command prefix (cached for message routing).
pub fn prefix() -> SettingSpec {
    SettingSpec::new(
        ids::PREFIX,
        ValueCodec::Text {
            max_len: MAX_PREFIX_LEN,
        },
        ColumnData::new("guild_prefix", "prefix", ColumnType::ShortString).delete_on_none(),
    )
    .with_label("General", "Prefix")
    .with_description("The prefix the bot listens to for commands in this server.")
    .with_default(SettingValue::Text(DEFAULT_PREFIX.to_owned()))
    .cached()
}

/// Commands disabled in the guild (cached for command dispatch).
pub fn disabled_commands() -> SettingSpec {
    SettingSpec::new(
        ids::DISABLED_COMMANDS,
        ValueCodec::TextList {
            max_len: SHORT_STRING_LEN,
        },
        ListData::new("guild_disabled_commands", "command", ColumnType::ShortString),
    )
    .with_label("General", "Disabled commands")
    .with_description("Commands that cannot be used in this server.")
    .cached()
}

/// Moderator role.
pub fn mod_role() -> SettingSpec {
    SettingSpec::new(
        ids::MOD_ROLE,
        ValueCodec::Role,
        ColumnData::new("guild_mod_role", "roleid", ColumnType::Identifier).delete_on_none(),
    )
    .with_label("Moderation", "Moderator role")
    .with_description("Members with this role may use moderation commands.")
    .with_checks(Check::Moderator, Check::ManageGuild)
}

/// Moderation event log channel.
pub fn event_log() -> SettingSpec {
    SettingSpec::new(
        ids::EVENT_LOG,
        ValueCodec::Channel,
        ColumnData::new("guild_event_log", "channelid", ColumnType::Identifier).delete_on_none(),
    )
    .with_label("Moderation", "Event log")
    .with_description("Channel that receives moderation events.")
    .with_checks(Check::Moderator, Check::ManageGuild)
}

/// Roles given to new members.
pub fn autoroles() -> SettingSpec {
    SettingSpec::new(
        ids::AUTOROLES,
        ValueCodec::RoleList,
        ListData::new("guild_autoroles", "roleid", ColumnType::Identifier),
    )
    .with_label("Members", "Autoroles")
    .with_description("Roles automatically given to members when they join.")
    .with_checks(Check::Anyone, Check::Administrator)
}

/// Welcome message for new members.
pub fn greeting() -> SettingSpec {
    SettingSpec::new(
        ids::GREETING,
        ValueCodec::Text {
            max_len: MESSAGE_STRING_LEN,
        },
        ColumnData::new("guild_greeting", "message", ColumnType::MessageString),
    )
    .with_label("Members", "Greeting")
    .with_description("Message sent when a member joins.")
}

/// Whether moderated members are notified by direct message.
pub fn dm_on_moderation() -> SettingSpec {
    SettingSpec::new(
        ids::DM_ON_MODERATION,
        ValueCodec::Bool {
            on: "Members are notified",
            off: "Members are not notified",
        },
        ColumnData::new("guild_dm_on_moderation", "enabled", ColumnType::Bool),
    )
    .with_label("Moderation", "DM on moderation")
    .with_description("Whether members receive a direct message when they are moderated.")
    .with_default(SettingValue::Bool(true))
}

/// Whether the guild is barred from using the bot. Only bot owners may see
/// or change it; the cache is refreshed periodically.
pub fn blacklisted() -> SettingSpec {
    SettingSpec::new(
        ids::BLACKLISTED,
        ValueCodec::Bool {
            on: "Blacklisted",
            off: "Not blacklisted",
        },
        BoolData::new("guild_blacklist"),
    )
    .with_label("Administration", "Blacklisted")
    .with_description("Blacklisted servers are ignored by the bot.")
    .with_checks(Check::BotOwner, Check::BotOwner)
    .with_refresh(BLACKLIST_REFRESH)
}

/// Registry holding every built-in setting.
///
/// # Errors
///
/// Returns [`SettingError::Duplicate`] if two built-ins share an id.
pub fn builtin_registry() -> Result<SettingRegistry, SettingError> {
    let mut registry = SettingRegistry::new();
    for spec in [
        prefix(),
        disabled_commands(),
        mod_role(),
        event_log(),
        autoroles(),
        greeting(),
        dm_on_moderation(),
        blacklisted(),
    ] {
        registry.register(spec)?;
    }
    Ok(registry)
}
