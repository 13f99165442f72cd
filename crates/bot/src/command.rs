//! Command grammar.
//!
//! A command is the prefix-stripped text split on whitespace: the first
//! word (case-insensitive) names the command, the rest are arguments.
//! Channel and role arguments come from the message's parsed mentions.

use loopcast_config::SettingsError;
use loopcast_core::{ChannelId, GatewayError, InboundMessage, RoleId};

/// A parsed, argument-checked command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPrefix(String),
    SetChannel(ChannelId),
    AddMessage(String),
    RemoveMessage(i64),
    ClearMessages,
    ListMessages,
    SetMsgDelay(f64),
    SetLoopDelay(f64),
    SetRole(RoleId),
    ClearRole,
    Ping,
    Status,
    StartLoop,
    StopLoop,
    Help,
}

/// Why a command could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Missing or malformed argument; the text is the reply.
    #[error("{0}")]
    Usage(&'static str),

    #[error("This command can only be used in a server")]
    GuildOnly,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CommandError {
    /// User mistakes, reported verbatim. Everything else is an unexpected failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, CommandError::Gateway(_))
    }
}

impl Command {
    /// Parse a lowercase command name and its arguments.
    pub fn parse(name: &str, args: &[&str], msg: &InboundMessage) -> Result<Self, CommandError> {
        let first = args.first().copied();
        let cmd = match name {
            "setprefix" => {
                let prefix = first.ok_or(CommandError::Usage("Missing required argument: prefix"))?;
                Command::SetPrefix(prefix.to_string())
            }
            "setchannel" => {
                let channel = msg
                    .channel_mentions
                    .first()
                    .filter(|_| first.is_some())
                    .ok_or(CommandError::Usage("Missing channel mention"))?;
                Command::SetChannel(*channel)
            }
            "am" => {
                if args.is_empty() {
                    return Err(CommandError::Usage("Missing message content"));
                }
                Command::AddMessage(args.join(" "))
            }
            "rm" => {
                let raw = first.ok_or(CommandError::Usage("Missing index"))?;
                let index = raw
                    .parse::<i64>()
                    .map_err(|_| CommandError::Usage("Index must be a number"))?;
                Command::RemoveMessage(index)
            }
            "clearmsgs" => Command::ClearMessages,
            "listmsgs" => Command::ListMessages,
            "setmsgdelay" => {
                let raw = first.ok_or(CommandError::Usage("Missing seconds"))?;
                Command::SetMsgDelay(
                    parse_number(raw).ok_or(CommandError::Usage("Seconds must be a number"))?,
                )
            }
            "setloopdelay" => {
                let raw = first.ok_or(CommandError::Usage("Missing minutes"))?;
                Command::SetLoopDelay(
                    parse_number(raw).ok_or(CommandError::Usage("Minutes must be a number"))?,
                )
            }
            "setrole" => {
                if msg.context.is_direct() {
                    return Err(CommandError::GuildOnly);
                }
                let role = msg
                    .role_mentions
                    .first()
                    .filter(|_| first.is_some())
                    .ok_or(CommandError::Usage("Missing role mention"))?;
                Command::SetRole(*role)
            }
            "clearrole" => Command::ClearRole,
            "ping" => Command::Ping,
            "status" => Command::Status,
            "startloop" => Command::StartLoop,
            "stoploop" => Command::StopLoop,
            "help" => Command::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }

    /// Whether the command waits for a yes/no answer before acting.
    pub fn needs_confirmation(&self) -> bool {
        matches!(
            self,
            Command::SetPrefix(_) | Command::SetRole(_) | Command::ClearRole | Command::ClearMessages
        )
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a delay the way users typed it, keeping one decimal for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Help text listing every command with the live prefix.
pub fn help_text(prefix: &str) -> String {
    const ENTRIES: [(&str, &str); 15] = [
        ("setprefix <prefix>", "Change command prefix"),
        ("setchannel <channel>", "Set message channel"),
        ("am <message>", "Add message to loop"),
        ("rm <index>", "Remove message by index"),
        ("clearmsgs", "Clear all messages"),
        ("listmsgs", "List messages"),
        ("setmsgdelay <seconds>", "Set message delay"),
        ("setloopdelay <minutes>", "Set loop delay"),
        ("setrole <role>", "Restrict commands to role"),
        ("clearrole", "Remove role restriction"),
        ("ping", "Check bot latency"),
        ("status", "Show status"),
        ("startloop", "Start message loop"),
        ("stoploop", "Stop message loop"),
        ("help", "Show this help"),
    ];

    let mut text = String::from("**Bot Commands**");
    for (usage, description) in ENTRIES {
        text.push_str(&format!("\n`{prefix}{usage}`: {description}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcast_core::{GuildId, MessageContext, UserId};

    fn dm(content: &str) -> InboundMessage {
        InboundMessage::new(UserId(1), ChannelId(2), MessageContext::Direct, content)
    }

    fn in_guild(content: &str) -> InboundMessage {
        InboundMessage::new(
            UserId(1),
            ChannelId(2),
            MessageContext::Guild {
                guild_id: GuildId(3),
                member_roles: vec![],
                guild_roles: vec![],
            },
            content,
        )
    }

    fn parse(content: &str, msg: &InboundMessage) -> Result<Command, CommandError> {
        let mut parts = content.split_whitespace();
        let name = parts.next().unwrap().to_lowercase();
        let args: Vec<&str> = parts.collect();
        Command::parse(&name, &args, msg)
    }

    fn usage(result: Result<Command, CommandError>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn add_message_rejoins_args() {
        let msg = dm("!am Hello   World");
        assert_eq!(
            parse("am Hello   World", &msg).unwrap(),
            Command::AddMessage("Hello World".into())
        );
        assert_eq!(usage(parse("am", &msg)), "Missing message content");
    }

    #[test]
    fn remove_index_must_be_integer() {
        let msg = dm("!rm");
        assert_eq!(parse("rm 2", &msg).unwrap(), Command::RemoveMessage(2));
        assert_eq!(parse("rm -1", &msg).unwrap(), Command::RemoveMessage(-1));
        assert_eq!(usage(parse("rm", &msg)), "Missing index");
        assert_eq!(usage(parse("rm two", &msg)), "Index must be a number");
        assert_eq!(usage(parse("rm 1.5", &msg)), "Index must be a number");
    }

    #[test]
    fn delays_must_be_finite_numbers() {
        let msg = dm("");
        assert_eq!(parse("setmsgdelay 2.5", &msg).unwrap(), Command::SetMsgDelay(2.5));
        assert_eq!(parse("setloopdelay 0", &msg).unwrap(), Command::SetLoopDelay(0.0));
        assert_eq!(usage(parse("setmsgdelay", &msg)), "Missing seconds");
        assert_eq!(usage(parse("setloopdelay", &msg)), "Missing minutes");
        assert_eq!(usage(parse("setmsgdelay fast", &msg)), "Seconds must be a number");
        assert_eq!(usage(parse("setloopdelay inf", &msg)), "Minutes must be a number");
        assert_eq!(usage(parse("setloopdelay NaN", &msg)), "Minutes must be a number");
    }

    #[test]
    fn channel_comes_from_mentions() {
        let msg = dm("!setchannel <#55>");
        assert_eq!(
            parse("setchannel <#55>", &msg).unwrap(),
            Command::SetChannel(ChannelId(55))
        );
        let msg = dm("!setchannel general");
        assert_eq!(usage(parse("setchannel general", &msg)), "Missing channel mention");
    }

    #[test]
    fn setrole_is_guild_only() {
        let msg = dm("!setrole <@&7>");
        assert!(matches!(parse("setrole <@&7>", &msg), Err(CommandError::GuildOnly)));

        let msg = in_guild("!setrole <@&7>");
        assert_eq!(parse("setrole <@&7>", &msg).unwrap(), Command::SetRole(RoleId(7)));

        let msg = in_guild("!setrole");
        assert_eq!(usage(parse("setrole", &msg)), "Missing role mention");
    }

    #[test]
    fn prefix_argument_required() {
        let msg = dm("");
        assert_eq!(parse("setprefix $", &msg).unwrap(), Command::SetPrefix("$".into()));
        assert_eq!(usage(parse("setprefix", &msg)), "Missing required argument: prefix");
    }

    #[test]
    fn unknown_command() {
        let err = parse("dance", &dm("")).unwrap_err();
        assert!(matches!(err, CommandError::Unknown(ref n) if n == "dance"));
        assert!(err.is_validation());
    }

    #[test]
    fn confirmation_gated_commands() {
        assert!(Command::ClearMessages.needs_confirmation());
        assert!(Command::SetPrefix("$".into()).needs_confirmation());
        assert!(!Command::StopLoop.needs_confirmation());
    }

    #[test]
    fn numbers_render_like_input() {
        assert_eq!(format_number(5.0), "5.0");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn help_uses_live_prefix() {
        let help = help_text("$");
        assert!(help.contains("`$am <message>`: Add message to loop"));
        assert!(help.contains("`$help`: Show this help"));
        assert_eq!(help.lines().count(), 16);
    }
}
