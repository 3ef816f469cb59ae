//! Invocation context and permission checks.
//!
//! The command layer builds an [`Invocation`] for every request from what
//! the chat platform reports about the caller. Settings consult it twice:
//! permission [`Check`]s decide whether the caller may read or write, and
//! value parsing resolves channel and role references against its
//! directories.

use crate::error::SettingError;
use crate::ids::{ChannelId, GuildId, RoleId, UserId};

/// Guild-level permission flags of the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    /// May change guild configuration.
    pub manage_guild: bool,
    /// Holds every guild permission.
    pub administrator: bool,
}

/// A named entry in a guild directory (channel or role).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named<I> {
    /// Platform id.
    pub id: I,
    /// Display name without any sigil.
    pub name: String,
}

/// Everything a setting needs to know about who is asking, and where.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Guild the request came from; `None` in direct messages.
    pub guild: Option<GuildId>,
    /// Calling user.
    pub author: Option<UserId>,
    /// Caller's guild permissions.
    pub permissions: Permissions,
    /// Caller holds the guild's moderator role.
    pub is_moderator: bool,
    /// Caller is an owner of the bot itself.
    pub is_bot_owner: bool,
    /// Channels of the guild.
    pub channels: Vec<Named<ChannelId>>,
    /// Roles of the guild.
    pub roles: Vec<Named<RoleId>>,
}

impl Invocation {
    /// A caller with no permissions in `guild`.
    pub fn in_guild(guild: GuildId, author: UserId) -> Self {
        Self {
            guild: Some(guild),
            author: Some(author),
            ..Self::default()
        }
    }

    /// Set the caller's guild permissions.
    #[must_use]
    pub const fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Mark the caller as a guild moderator.
    #[must_use]
    pub const fn moderator(mut self) -> Self {
        self.is_moderator = true;
        self
    }

    /// Mark the caller as a bot owner.
    #[must_use]
    pub const fn bot_owner(mut self) -> Self {
        self.is_bot_owner = true;
        self
    }

    /// Add a channel to the guild directory.
    #[must_use]
    pub fn with_channel(mut self, id: ChannelId, name: &str) -> Self {
        self.channels.push(Named {
            id,
            name: name.to_owned(),
        });
        self
    }

    /// Add a role to the guild directory.
    #[must_use]
    pub fn with_role(mut self, id: RoleId, name: &str) -> Self {
        self.roles.push(Named {
            id,
            name: name.to_owned(),
        });
        self
    }

    /// Channel with id `id`, if the guild has it.
    pub fn channel(&self, id: ChannelId) -> Option<&Named<ChannelId>> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Role with id `id`, if the guild has it.
    pub fn role(&self, id: RoleId) -> Option<&Named<RoleId>> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Display name of a channel, or its id when unknown.
    pub fn channel_label(&self, id: ChannelId) -> String {
        self.channel(id)
            .map_or_else(|| id.to_string(), |c| format!("#{}", c.name))
    }

    /// Display name of a role, or its id when unknown.
    pub fn role_label(&self, id: RoleId) -> String {
        self.role(id)
            .map_or_else(|| id.to_string(), |r| format!("@{}", r.name))
    }
}

/// Permission predicate guarding a setting read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Always passes.
    Anyone,
    /// Guild moderators, and anyone who passes [`Check::ManageGuild`].
    Moderator,
    /// Callers with the manage-guild permission, and administrators.
    ManageGuild,
    /// Guild administrators.
    Administrator,
    /// Owners of the bot.
    BotOwner,
}

impl Check {
    /// Whether `ctx` satisfies the predicate. Bot owners pass every check.
    pub const fn passes(self, ctx: &Invocation) -> bool {
        if ctx.is_bot_owner {
            return true;
        }
        let in_guild = ctx.guild.is_some();
        let admin = in_guild && ctx.permissions.administrator;
        let manager = admin || (in_guild && ctx.permissions.manage_guild);
        match self {
            Self::Anyone => true,
            Self::Moderator => manager || (in_guild && ctx.is_moderator),
            Self::ManageGuild => manager,
            Self::Administrator => admin,
            Self::BotOwner => false,
        }
    }

    /// User-facing explanation shown when the check fails.
    pub const fn message(self) -> &'static str {
        match self {
            Self::Anyone => "",
            Self::Moderator => "You must be a guild moderator to do this.",
            Self::ManageGuild => "You need the `Manage Server` permission to do this.",
            Self::Administrator => "You must be a guild administrator to do this.",
            Self::BotOwner => "Only the bot owners can do this.",
        }
    }

    /// Fail with [`SettingError::PermissionDenied`] unless the check passes.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::PermissionDenied`] carrying
    /// [`Check::message`].
    pub fn require(self, ctx: &Invocation) -> Result<(), SettingError> {
        if self.passes(ctx) {
            Ok(())
        } else {
            Err(SettingError::PermissionDenied(self.message().to_owned()))
        }
    }
}
