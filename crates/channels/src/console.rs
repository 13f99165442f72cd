//! Console gateway: drive the bot from a terminal.
//!
//! Each stdin line becomes a direct message from a local user; outbound
//! sends are printed to stdout, tagged with the target channel when it is
//! not the console itself. Channel and role mentions are typed inline as
//! `<#id>` and `<@&id>`.

use async_trait::async_trait;
use loopcast_core::error::{GatewayError, SendError};
use loopcast_core::event::GatewayEvent;
use loopcast_core::gateway::Gateway;
use loopcast_core::message::{ChannelId, InboundMessage, MessageContext, UserId};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Channel id the console session replies in.
pub const CONSOLE_CHANNEL: ChannelId = ChannelId(0);

/// Author id of the local user.
pub const CONSOLE_USER: UserId = UserId(0);

/// Interactive console gateway.
pub struct ConsoleGateway {
    user: String,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self {
            user: "console".into(),
        }
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one input line into a console message, skipping blanks.
fn line_to_message(line: &str) -> Option<InboundMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(
        InboundMessage::new(CONSOLE_USER, CONSOLE_CHANNEL, MessageContext::Direct, line)
            .with_author_name("local_user"),
    )
}

fn render(channel: ChannelId, content: &str) -> String {
    if channel == CONSOLE_CHANNEL {
        content.to_string()
    } else {
        format!("[{}] {content}", channel.mention())
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    fn name(&self) -> &str {
        "console"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
        let (tx, rx) = mpsc::channel(32);
        let user = self.user.clone();

        tokio::spawn(async move {
            for event in [GatewayEvent::Connected, GatewayEvent::Ready { user }] {
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            let stdin = io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if matches!(line.trim(), "exit" | "quit" | ":q") {
                            break;
                        }
                        let Some(msg) = line_to_message(&line) else {
                            continue;
                        };
                        if tx.send(GatewayEvent::Message(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx
                            .send(GatewayEvent::Disconnected {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                }
            }
            debug!("Console input closed");
        });

        Ok(rx)
    }

    async fn send(&self, channel: ChannelId, content: &str) -> Result<(), SendError> {
        println!("{}", render(channel, content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcast_core::message::RoleId;

    #[test]
    fn console_gateway_name() {
        assert_eq!(ConsoleGateway::new().name(), "console");
    }

    #[test]
    fn lines_become_direct_messages() {
        assert!(line_to_message("   ").is_none());

        let msg = line_to_message(" !setchannel <#42> ").unwrap();
        assert_eq!(msg.content, "!setchannel <#42>");
        assert_eq!(msg.author_id, CONSOLE_USER);
        assert!(msg.context.is_direct());
        assert_eq!(msg.channel_mentions, vec![ChannelId(42)]);

        let msg = line_to_message("!setrole <@&9>").unwrap();
        assert_eq!(msg.role_mentions, vec![RoleId(9)]);
    }

    #[test]
    fn render_tags_foreign_channels() {
        assert_eq!(render(CONSOLE_CHANNEL, "Pong!"), "Pong!");
        assert_eq!(render(ChannelId(5), "hello"), "[<#5>] hello");
    }

    #[tokio::test]
    async fn send_never_fails() {
        let gw = ConsoleGateway::new();
        assert!(gw.send(ChannelId(1), "broadcast").await.is_ok());
    }
}
