//! Command dispatcher: gate, parse, execute, reply.
//!
//! Messages are handled one at a time, to completion, in arrival order.
//! Gated commands park in the [`ConfirmationBroker`] and finish when the
//! author's answer is handled.

use std::sync::Arc;

use loopcast_config::SettingsStore;
use loopcast_core::{Gateway, InboundMessage};
use tracing::{debug, error, info, warn};

use crate::broadcast::{BroadcastLoop, RetryPolicy};
use crate::command::{Command, CommandError, format_number, help_text};
use crate::confirm::ConfirmationBroker;
use crate::permission::is_authorized;
use crate::reply::send_reply;
use crate::supervisor::LoopSupervisor;

/// Turns inbound messages into settings changes, loop control and replies.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: Arc<dyn Gateway>,
    settings: Arc<SettingsStore>,
    confirmations: Arc<ConfirmationBroker<Command>>,
    supervisor: Arc<LoopSupervisor>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        settings: Arc<SettingsStore>,
        confirmations: Arc<ConfirmationBroker<Command>>,
        supervisor: Arc<LoopSupervisor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            gateway,
            settings,
            confirmations,
            supervisor,
            policy,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn supervisor(&self) -> &Arc<LoopSupervisor> {
        &self.supervisor
    }

    /// Handle one inbound message. Never fails; problems become replies.
    pub async fn handle(&self, msg: &InboundMessage) {
        if let Some(answered) = self.confirmations.offer(msg) {
            let result = self.complete(answered.action, answered.confirmed, msg).await;
            self.report(msg, "confirmation", result).await;
            return;
        }

        let role = self.settings.role_id().await;
        if !is_authorized(role, &msg.context) {
            info!(
                author = %msg.author_label(),
                context = %msg.context.label(),
                "Unauthorized command attempt"
            );
            return;
        }

        let prefix = self.settings.prefix().await;
        let Some(body) = msg.content.strip_prefix(prefix.as_str()) else {
            return;
        };
        let mut parts = body.split_whitespace();
        let Some(name) = parts.next() else {
            return;
        };
        let name = name.to_lowercase();
        let args: Vec<&str> = parts.collect();

        info!(
            author = %msg.author_label(),
            context = %msg.context.label(),
            content = %msg.content,
            "Command received"
        );

        let result = match Command::parse(&name, &args, msg) {
            Ok(cmd) => self.execute(cmd, msg).await,
            Err(e) => Err(e),
        };
        self.report(msg, &name, result).await;
    }

    /// Turn a failed command into a reply.
    async fn report(
        &self,
        msg: &InboundMessage,
        command: &str,
        result: Result<(), CommandError>,
    ) {
        let Err(e) = result else {
            return;
        };
        let text = match &e {
            CommandError::Unknown(_) => {
                format!("Unknown command. Use {}help", self.settings.prefix().await)
            }
            e if e.is_validation() => e.to_string(),
            e => format!("Error: {e}"),
        };
        if e.is_validation() {
            info!(command = %command, reason = %e, "Command rejected");
        } else {
            error!(command = %command, error = %e, "Command failed");
        }
        self.reply(msg, &text).await;
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        send_reply(&*self.gateway, msg.channel_id, text).await;
    }

    /// Park `cmd` until its author answers `prompt`.
    async fn ask(&self, cmd: Command, msg: &InboundMessage, prompt: &str) {
        let canceled = canceled_reply(&cmd);
        if !self
            .confirmations
            .request(&self.gateway, msg, prompt, canceled, cmd)
            .await
        {
            self.reply(msg, canceled).await;
        }
    }

    /// Finish a parked command once its author has answered.
    async fn complete(
        &self,
        cmd: Command,
        confirmed: bool,
        msg: &InboundMessage,
    ) -> Result<(), CommandError> {
        if !confirmed {
            info!(command = ?cmd, "Confirmation declined");
            self.reply(msg, canceled_reply(&cmd)).await;
            return Ok(());
        }

        match cmd {
            Command::SetPrefix(prefix) => {
                self.settings.set_prefix(&prefix).await?;
                info!(prefix = %prefix, "Prefix changed");
                self.reply(msg, &format!("Prefix changed to `{prefix}`")).await;
            }
            Command::ClearMessages => {
                let count = self.settings.clear_messages().await;
                info!(count, "Messages cleared");
                self.reply(msg, "Messages cleared").await;
            }
            Command::SetRole(role) => {
                self.settings.set_role(role).await;
                info!(role = %role, "Role restriction set");
                self.reply(msg, &format!("Commands restricted to {}", role.mention()))
                    .await;
            }
            Command::ClearRole => {
                self.settings.clear_role().await;
                info!("Role restriction cleared");
                self.reply(msg, "Role restriction removed, all users can now use commands")
                    .await;
            }
            other => warn!(command = ?other, "Confirmed a command that needs no confirmation"),
        }
        Ok(())
    }

    async fn execute(&self, cmd: Command, msg: &InboundMessage) -> Result<(), CommandError> {
        if cmd.needs_confirmation() {
            debug!(command = ?cmd, "Command requires confirmation");
        }

        match cmd {
            Command::SetPrefix(prefix) => {
                let prompt = format!("Are you sure you want to change prefix to `{prefix}`?");
                self.ask(Command::SetPrefix(prefix), msg, &prompt).await;
            }
            Command::SetChannel(channel) => {
                self.settings.set_channel(channel).await;
                info!(channel = %channel, "Broadcast channel set");
                self.reply(msg, &format!("Messages will be sent to {}", channel.mention()))
                    .await;
            }
            Command::AddMessage(text) => {
                self.settings.add_message(&text).await?;
                info!(message = %text, "Message added");
                self.reply(msg, &format!("Added message: `{text}`")).await;
            }
            Command::RemoveMessage(index) => {
                let removed = self.settings.remove_message(index).await?;
                info!(index, message = %removed, "Message removed");
                self.reply(msg, &format!("Removed message: `{removed}`")).await;
            }
            Command::ClearMessages => {
                if self.settings.snapshot().await.messages.is_empty() {
                    self.reply(msg, "No messages to clear").await;
                } else {
                    self.ask(Command::ClearMessages, msg, "Clear all messages?").await;
                }
            }
            Command::ListMessages => {
                let messages = self.settings.snapshot().await.messages;
                if messages.is_empty() {
                    self.reply(msg, "No messages set").await;
                } else {
                    self.reply(msg, &format!("Messages:\n{}", numbered(&messages)))
                        .await;
                }
            }
            Command::SetMsgDelay(seconds) => {
                self.settings.set_msg_delay(seconds).await?;
                info!(seconds, "Message delay set");
                self.reply(
                    msg,
                    &format!("Message delay set to {} seconds", format_number(seconds)),
                )
                .await;
            }
            Command::SetLoopDelay(minutes) => {
                self.settings.set_loop_delay(minutes).await?;
                info!(minutes, "Loop delay set");
                self.reply(
                    msg,
                    &format!("Loop delay set to {} minutes", format_number(minutes)),
                )
                .await;
            }
            Command::SetRole(role) => {
                let prompt = format!("Restrict commands to {}?", role.mention());
                self.ask(Command::SetRole(role), msg, &prompt).await;
            }
            Command::ClearRole => {
                if self.settings.role_id().await.is_none() {
                    self.reply(msg, "No role restriction is set").await;
                } else {
                    self.ask(Command::ClearRole, msg, "Remove role restriction for commands?")
                        .await;
                }
            }
            Command::Ping => {
                let latency = self.gateway.latency().await?;
                let ms = latency.as_millis();
                info!(latency_ms = %ms, "Ping");
                self.reply(msg, &format!("Pong! Latency: {ms}ms")).await;
            }
            Command::Status => {
                let text = self.status_text().await;
                self.reply(msg, &text).await;
            }
            Command::StartLoop => {
                if self.supervisor.is_running() {
                    self.reply(msg, "Loop already running").await;
                } else if !self.settings.snapshot().await.is_broadcastable() {
                    self.reply(msg, "Set channel and messages first").await;
                } else {
                    let looper = BroadcastLoop::new(
                        self.gateway.clone(),
                        self.settings.clone(),
                        self.policy,
                    );
                    if self.supervisor.start(move |cancel| looper.run(cancel)) {
                        self.reply(msg, "Loop started").await;
                    } else {
                        self.reply(msg, "Loop already running").await;
                    }
                }
            }
            Command::StopLoop => {
                if self.supervisor.stop() {
                    self.reply(msg, "Loop stopped").await;
                } else {
                    self.reply(msg, "Loop not running").await;
                }
            }
            Command::Help => {
                let prefix = self.settings.prefix().await;
                self.reply(msg, &help_text(&prefix)).await;
            }
        }
        Ok(())
    }

    async fn status_text(&self) -> String {
        let s = self.settings.snapshot().await;
        let channel = s
            .channel_id
            .map(|c| c.mention())
            .unwrap_or_else(|| "Not set".into());
        let messages = if s.messages.is_empty() {
            "None".to_string()
        } else {
            numbered(&s.messages)
        };
        let role = s
            .role_id
            .map(|r| r.mention())
            .unwrap_or_else(|| "None".into());
        let loop_state = if self.supervisor.is_running() {
            "Running"
        } else {
            "Stopped"
        };

        format!(
            "**Bot Status**\n\
             Prefix: `{}`\n\
             Channel: {channel}\n\
             Messages:\n{messages}\n\
             Message Delay: {} seconds\n\
             Loop Delay: {} minutes\n\
             Role: {role}\n\
             Loop Status: {loop_state}",
            s.prefix,
            format_number(s.msg_delay),
            format_number(s.loop_delay),
        )
    }
}

/// Reply sent when a gated command is declined or times out.
fn canceled_reply(cmd: &Command) -> &'static str {
    match cmd {
        Command::SetPrefix(_) => "Prefix change canceled",
        Command::ClearMessages => "Clear canceled",
        Command::SetRole(_) => "Role change canceled",
        Command::ClearRole => "Role restriction removal canceled",
        _ => "Canceled",
    }
}

fn numbered(messages: &[String]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {m}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
