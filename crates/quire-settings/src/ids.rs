//! Type-safe wrappers around the platform's 64-bit snowflake ids.
//!
//! Guilds, users, channels and roles all share one integer id space on the
//! chat platform; the newtypes keep them from being mixed up at compile
//! time. They are stored in `IDENTIFIER` columns.

use quire_db::SqlValue;
use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `i64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw id.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for SqlValue {
            fn from(id: $name) -> Self {
                Self::Int(id.0)
            }
        }
    };
}

define_id! {
    /// A guild (tenant group); owner of every guild setting.
    GuildId
}

define_id! {
    /// A user account.
    UserId
}

define_id! {
    /// A text channel inside a guild.
    ChannelId
}

define_id! {
    /// A role inside a guild.
    RoleId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_bind_as_integers() {
        assert_eq!(SqlValue::from(GuildId(7)), SqlValue::Int(7));
        assert_eq!(RoleId::from(9).to_string(), "9");
    }
}
