//! Value codecs: parse user input into typed setting values, convert them
//! to and from stored data, and render them for display.

use quire_db::SqlValue;

use crate::context::Invocation;
use crate::data::SettingData;
use crate::error::SettingError;
use crate::ids::{ChannelId, RoleId};

/// Words that clear a setting back to its default.
const CLEAR_WORDS: [&str; 2] = ["none", "reset"];

const TRUE_WORDS: [&str; 6] = ["yes", "true", "on", "enable", "enabled", "1"];
const FALSE_WORDS: [&str; 6] = ["no", "false", "off", "disable", "disabled", "0"];

/// Shown for settings without a value.
pub const NOT_SET: &str = "Not set";

/// Typed setting value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// Free text.
    Text(String),
    /// Reference to a channel.
    Channel(ChannelId),
    /// Reference to a role.
    Role(RoleId),
    /// Boolean flag.
    Bool(bool),
    /// Ordered set of roles.
    Roles(Vec<RoleId>),
    /// Ordered set of short strings.
    TextList(Vec<String>),
}

impl SettingValue {
    /// Whether the value counts as empty: `false`, `""` or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Bool(b) => !b,
            Self::Roles(r) => r.is_empty(),
            Self::TextList(t) => t.is_empty(),
            Self::Channel(_) | Self::Role(_) => false,
        }
    }
}

/// How a setting's value is parsed, stored and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueCodec {
    /// Text of at most `max_len` characters.
    Text {
        /// Maximum length in characters.
        max_len: usize,
    },
    /// A channel of the invoking guild.
    Channel,
    /// A role of the invoking guild.
    Role,
    /// A boolean, displayed with custom strings.
    Bool {
        /// Shown for `true`.
        on: &'static str,
        /// Shown for `false`.
        off: &'static str,
    },
    /// Comma separated roles of the invoking guild.
    RoleList,
    /// Comma or space separated words of at most `max_len` characters.
    TextList {
        /// Maximum length of each item in characters.
        max_len: usize,
    },
}

impl ValueCodec {
    /// Parse raw user input. `none`/`reset` yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError::BadInput`] with a user-facing message when
    /// the input does not parse or does not resolve in `ctx`.
    pub fn parse(&self, ctx: &Invocation, raw: &str) -> Result<Option<SettingValue>, SettingError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(SettingError::bad_input("Please provide a value."));
        }
        if CLEAR_WORDS.iter().any(|w| input.eq_ignore_ascii_case(w)) {
            return Ok(None);
        }

        let value = match self {
            Self::Text { max_len } => SettingValue::Text(bounded(input, *max_len)?.to_owned()),
            Self::Channel => SettingValue::Channel(parse_channel(ctx, input)?),
            Self::Role => SettingValue::Role(parse_role(ctx, input)?),
            Self::Bool { on, off } => SettingValue::Bool(parse_bool(input, on, off)?),
            Self::RoleList => {
                let mut roles = Vec::new();
                for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let role = parse_role(ctx, part)?;
                    if !roles.contains(&role) {
                        roles.push(role);
                    }
                }
                SettingValue::Roles(roles)
            }
            Self::TextList { max_len } => {
                let mut items: Vec<String> = Vec::new();
                for part in input
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|p| !p.is_empty())
                {
                    let item = bounded(part, *max_len)?;
                    if !items.iter().any(|i| i == item) {
                        items.push(item.to_owned());
                    }
                }
                SettingValue::TextList(items)
            }
        };
        Ok(Some(value))
    }

    /// Stored form of `value`.
    pub fn to_data(&self, value: &SettingValue) -> SettingData {
        match value {
            SettingValue::Text(s) => SettingData::Scalar(SqlValue::Text(s.clone())),
            SettingValue::Channel(id) => SettingData::Scalar((*id).into()),
            SettingValue::Role(id) => SettingData::Scalar((*id).into()),
            SettingValue::Bool(b) => SettingData::Flag(*b),
            SettingValue::Roles(ids) => {
                SettingData::List(ids.iter().map(|id| SqlValue::from(*id)).collect())
            }
            SettingValue::TextList(items) => {
                SettingData::List(items.iter().map(|s| SqlValue::Text(s.clone())).collect())
            }
        }
    }

    /// Typed value of stored `data`; `None` when the data is empty or has
    /// the wrong shape for this codec.
    pub fn from_data(&self, data: &SettingData) -> Option<SettingValue> {
        match (self, data) {
            (Self::Text { .. }, SettingData::Scalar(v)) => {
                v.as_str().map(|s| SettingValue::Text(s.to_owned()))
            }
            (Self::Channel, SettingData::Scalar(v)) => {
                v.as_i64().map(|id| SettingValue::Channel(ChannelId(id)))
            }
            (Self::Role, SettingData::Scalar(v)) => v.as_i64().map(|id| SettingValue::Role(RoleId(id))),
            (Self::Bool { .. }, SettingData::Flag(b)) => Some(SettingValue::Bool(*b)),
            (Self::Bool { .. }, SettingData::Scalar(v)) => v.as_bool().map(SettingValue::Bool),
            (Self::RoleList, SettingData::List(items)) => Some(SettingValue::Roles(
                items.iter().filter_map(SqlValue::as_i64).map(RoleId).collect(),
            )),
            (Self::TextList { .. }, SettingData::List(items)) => Some(SettingValue::TextList(
                items
                    .iter()
                    .filter_map(SqlValue::as_str)
                    .map(str::to_owned)
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Short human-readable rendering. References are resolved through
    /// `ctx` when given, and shown as mentions otherwise.
    pub fn format(&self, value: Option<&SettingValue>, ctx: Option<&Invocation>) -> String {
        let Some(value) = value else {
            return match self {
                Self::Bool { off, .. } => (*off).to_owned(),
                _ => NOT_SET.to_owned(),
            };
        };
        match (self, value) {
            (Self::Bool { on, off }, SettingValue::Bool(b)) => (if *b { *on } else { *off }).to_owned(),
            (_, SettingValue::Bool(b)) => b.to_string(),
            (_, SettingValue::Text(s)) => format!("`{s}`"),
            (_, SettingValue::Channel(id)) => {
                ctx.map_or_else(|| format!("<#{id}>"), |c| c.channel_label(*id))
            }
            (_, SettingValue::Role(id)) => role_label(*id, ctx),
            (_, SettingValue::Roles(ids)) if ids.is_empty() => NOT_SET.to_owned(),
            (_, SettingValue::Roles(ids)) => ids
                .iter()
                .map(|id| role_label(*id, ctx))
                .collect::<Vec<_>>()
                .join(", "),
            (_, SettingValue::TextList(items)) if items.is_empty() => NOT_SET.to_owned(),
            (_, SettingValue::TextList(items)) => items
                .iter()
                .map(|s| format!("`{s}`"))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Description of accepted input, for help text.
    pub fn accepts(&self) -> String {
        match self {
            Self::Text { max_len } => format!("Text of at most {max_len} characters."),
            Self::Channel => String::from("A channel mention, id or name."),
            Self::Role => String::from("A role mention, id or name."),
            Self::Bool { on, off } => format!("`yes` ({on}) or `no` ({off})."),
            Self::RoleList => String::from("A comma separated list of role mentions, ids or names."),
            Self::TextList { max_len } => format!(
                "A comma or space separated list of words of at most {max_len} characters."
            ),
        }
    }
}

fn role_label(id: RoleId, ctx: Option<&Invocation>) -> String {
    ctx.map_or_else(|| format!("<@&{id}>"), |c| c.role_label(id))
}

fn bounded(input: &str, max_len: usize) -> Result<&str, SettingError> {
    if input.chars().count() > max_len {
        Err(SettingError::bad_input(format!(
            "`{input}` is too long; the limit is {max_len} characters."
        )))
    } else {
        Ok(input)
    }
}

fn parse_bool(input: &str, on: &str, off: &str) -> Result<bool, SettingError> {
    let hit = |words: &[&str], display: &str| {
        input.eq_ignore_ascii_case(display) || words.iter().any(|w| input.eq_ignore_ascii_case(w))
    };
    if hit(&TRUE_WORDS, on) {
        Ok(true)
    } else if hit(&FALSE_WORDS, off) {
        Ok(false)
    } else {
        Err(SettingError::bad_input(format!(
            "`{input}` is not a valid choice; try `yes` or `no`."
        )))
    }
}

/// Strip `prefix` and `>` from a mention and parse the id inside.
fn mention_id(input: &str, prefix: &str) -> Option<i64> {
    input
        .strip_prefix(prefix)?
        .strip_suffix('>')?
        .parse()
        .ok()
}

fn parse_channel(ctx: &Invocation, input: &str) -> Result<ChannelId, SettingError> {
    let by_id = mention_id(input, "<#")
        .or_else(|| input.parse().ok())
        .map(ChannelId)
        .and_then(|id| ctx.channel(id));
    let name = input.strip_prefix('#').unwrap_or(input);
    by_id
        .or_else(|| ctx.channels.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
        .map(|c| c.id)
        .ok_or_else(|| SettingError::bad_input(format!("Couldn't find a channel matching `{input}`.")))
}

fn parse_role(ctx: &Invocation, input: &str) -> Result<RoleId, SettingError> {
    let by_id = mention_id(input, "<@&")
        .or_else(|| input.parse().ok())
        .map(RoleId)
        .and_then(|id| ctx.role(id));
    let name = input.strip_prefix('@').unwrap_or(input);
    by_id
        .or_else(|| ctx.roles.iter().find(|r| r.name.eq_ignore_ascii_case(name)))
        .map(|r| r.id)
        .ok_or_else(|| SettingError::bad_input(format!("Couldn't find a role matching `{input}`.")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::{GuildId, UserId};

    fn ctx() -> Invocation {
        Invocation::in_guild(GuildId(1), UserId(2))
            .with_channel(ChannelId(100), "mod-log")
            .with_role(RoleId(200), "Moderators")
            .with_role(RoleId(201), "Members")
    }

    #[test]
    fn references_resolve_by_mention_id_and_name() {
        let codec = ValueCodec::Channel;
        for input in ["<#100>", "100", "#mod-log", "Mod-Log"] {
            assert_eq!(
                codec.parse(&ctx(), input).unwrap(),
                Some(SettingValue::Channel(ChannelId(100))),
                "{input}"
            );
        }
        assert_eq!(
            ValueCodec::Role.parse(&ctx(), "<@&201>").unwrap(),
            Some(SettingValue::Role(RoleId(201)))
        );
    }

    #[test]
    fn unknown_reference_is_bad_input() {
        let err = ValueCodec::Channel.parse(&ctx(), "#general").unwrap_err();
        assert!(matches!(err, SettingError::BadInput(Some(_))));
        // Ids must belong to the guild.
        assert!(ValueCodec::Role.parse(&ctx(), "999").is_err());
    }

    #[test]
    fn clear_words_reset() {
        for codec in [ValueCodec::Role, ValueCodec::Text { max_len: 8 }] {
            assert_eq!(codec.parse(&ctx(), " Reset ").unwrap(), None);
            assert_eq!(codec.parse(&ctx(), "none").unwrap(), None);
        }
    }

    #[test]
    fn text_is_bounded() {
        let codec = ValueCodec::Text { max_len: 3 };
        assert_eq!(
            codec.parse(&ctx(), "??!").unwrap(),
            Some(SettingValue::Text(String::from("??!")))
        );
        assert!(matches!(
            codec.parse(&ctx(), "????"),
            Err(SettingError::BadInput(Some(_)))
        ));
        assert!(codec.parse(&ctx(), "   ").is_err());
    }

    #[test]
    fn bool_accepts_display_strings() {
        let codec = ValueCodec::Bool {
            on: "Enabled",
            off: "Disabled",
        };
        assert_eq!(codec.parse(&ctx(), "enabled").unwrap(), Some(SettingValue::Bool(true)));
        assert_eq!(codec.parse(&ctx(), "off").unwrap(), Some(SettingValue::Bool(false)));
        assert!(codec.parse(&ctx(), "maybe").is_err());
        assert_eq!(codec.format(Some(&SettingValue::Bool(true)), None), "Enabled");
        assert_eq!(codec.format(None, None), "Disabled");
    }

    #[test]
    fn lists_dedupe_and_keep_order() {
        let roles = ValueCodec::RoleList
            .parse(&ctx(), "Members, <@&200>, 201")
            .unwrap();
        assert_eq!(roles, Some(SettingValue::Roles(vec![RoleId(201), RoleId(200)])));

        let words = ValueCodec::TextList { max_len: 16 }
            .parse(&ctx(), "ban, kick mute,,kick")
            .unwrap();
        assert_eq!(
            words,
            Some(SettingValue::TextList(vec![
                String::from("ban"),
                String::from("kick"),
                String::from("mute"),
            ]))
        );
    }

    #[test]
    fn data_conversion_matches_storage_shape() {
        let codec = ValueCodec::RoleList;
        let value = SettingValue::Roles(vec![RoleId(1), RoleId(2)]);
        let data = codec.to_data(&value);
        assert_eq!(
            data,
            SettingData::List(vec![SqlValue::Int(1), SqlValue::Int(2)])
        );
        assert_eq!(codec.from_data(&data), Some(value));
        assert_eq!(codec.from_data(&SettingData::Flag(true)), None);
    }

    #[test]
    fn formatting_uses_directory_names() {
        let value = SettingValue::Roles(vec![RoleId(200), RoleId(999)]);
        assert_eq!(
            ValueCodec::RoleList.format(Some(&value), Some(&ctx())),
            "@Moderators, 999"
        );
        assert_eq!(
            ValueCodec::Channel.format(Some(&SettingValue::Channel(ChannelId(5))), None),
            "<#5>"
        );
        assert_eq!(ValueCodec::Role.format(None, None), NOT_SET);
    }
}
