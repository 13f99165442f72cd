//! Scripted in-memory gateway shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use loopcast_core::{
    ChannelId, Gateway, GatewayError, GatewayEvent, GuildId, InboundMessage, MessageContext,
    RoleId, SendError, UserId,
};
use tokio::sync::mpsc;

/// Records every send; replays queued results for sends to broadcast channels.
#[derive(Default)]
pub struct MockGateway {
    sent: Mutex<Vec<(ChannelId, String)>>,
    script: Mutex<VecDeque<Result<(), SendError>>>,
    scripted_channel: Mutex<Option<ChannelId>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned, in order, by sends to `channel`. Exhausted scripts succeed.
    pub fn script(&self, channel: ChannelId, results: Vec<Result<(), SendError>>) {
        *self.scripted_channel.lock().unwrap() = Some(channel);
        self.script.lock().unwrap().extend(results);
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to `channel`, in order.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, t)| t)
            .collect()
    }

    pub fn last_to(&self, channel: ChannelId) -> Option<String> {
        self.sent_to(channel).pop()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, channel: ChannelId, content: &str) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((channel, content.to_string()));
        if *self.scripted_channel.lock().unwrap() == Some(channel) {
            if let Some(result) = self.script.lock().unwrap().pop_front() {
                return result;
            }
        }
        Ok(())
    }

    async fn latency(&self) -> Result<Duration, GatewayError> {
        Ok(Duration::from_millis(42))
    }
}

/// Channel the test user types commands in.
pub const HOME: ChannelId = ChannelId(100);

/// The test user.
pub const ALICE: UserId = UserId(1);

pub fn dm(content: &str) -> InboundMessage {
    InboundMessage::new(ALICE, HOME, MessageContext::Direct, content)
}

pub fn guild_msg(author: UserId, member_roles: &[u64], content: &str) -> InboundMessage {
    InboundMessage::new(
        author,
        HOME,
        MessageContext::Guild {
            guild_id: GuildId(9),
            member_roles: member_roles.iter().copied().map(RoleId).collect(),
            guild_roles: vec![RoleId(7), RoleId(8)],
        },
        content,
    )
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
