//! Identifiers and inbound message types.
//!
//! Platform ids are 64-bit snowflakes. Mentions use the platform's inline
//! markup: `<#id>` for channels, `<@&id>` for roles.

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake!(
    /// A text channel (or DM channel) on the platform.
    ChannelId
);
snowflake!(
    /// A role inside a guild.
    RoleId
);
snowflake!(
    /// A user account.
    UserId
);
snowflake!(
    /// A guild (server / group space).
    GuildId
);

impl ChannelId {
    /// Inline mention markup, rendered as a link by clients.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

impl RoleId {
    /// Inline mention markup, rendered as a role pill by clients.
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

/// Where a message was sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContext {
    /// One-to-one direct message.
    Direct,
    /// Multi-participant guild channel.
    Guild {
        guild_id: GuildId,
        /// Roles held by the author in this guild
        #[serde(default)]
        member_roles: Vec<RoleId>,
        /// Roles that currently exist in this guild
        #[serde(default)]
        guild_roles: Vec<RoleId>,
    },
}

impl MessageContext {
    pub fn is_direct(&self) -> bool {
        matches!(self, MessageContext::Direct)
    }

    /// Short label used in audit logs.
    pub fn label(&self) -> String {
        match self {
            MessageContext::Direct => "DM".into(),
            MessageContext::Guild { guild_id, .. } => guild_id.to_string(),
        }
    }
}

/// A text message received from the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Author account
    pub author_id: UserId,

    /// Human-readable author name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    /// Channel the message was posted in; replies go here
    pub channel_id: ChannelId,

    /// Direct or guild context
    pub context: MessageContext,

    /// Raw text content
    pub content: String,

    /// Channels referenced with `<#id>`, in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_mentions: Vec<ChannelId>,

    /// Roles referenced with `<@&id>`, in order of appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_mentions: Vec<RoleId>,
}

impl InboundMessage {
    /// Build a message and fill the mention lists from its content.
    pub fn new(
        author_id: UserId,
        channel_id: ChannelId,
        context: MessageContext,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            author_id,
            author_name: None,
            channel_id,
            context,
            channel_mentions: parse_channel_mentions(&content),
            role_mentions: parse_role_mentions(&content),
            content,
        }
    }

    pub fn with_author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Display name for logs: the author name if known, else the id.
    pub fn author_label(&self) -> String {
        self.author_name
            .clone()
            .unwrap_or_else(|| self.author_id.to_string())
    }
}

/// Extract every `<#id>` channel mention from a text.
pub fn parse_channel_mentions(text: &str) -> Vec<ChannelId> {
    parse_mentions(text, "<#").into_iter().map(ChannelId).collect()
}

/// Extract every `<@&id>` role mention from a text.
pub fn parse_role_mentions(text: &str) -> Vec<RoleId> {
    parse_mentions(text, "<@&").into_iter().map(RoleId).collect()
}

fn parse_mentions(text: &str, open: &str) -> Vec<u64> {
    let mut ids = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after = &rest[start + open.len()..];
        match after.find('>') {
            Some(end) => {
                if let Ok(id) = after[..end].parse::<u64>() {
                    ids.push(id);
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    ids
}
