//! Gateway events: what a connected session delivers to the bot.

use serde::{Deserialize, Serialize};

use crate::message::InboundMessage;

/// All events a gateway session emits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Transport connected (session not yet ready)
    Connected,

    /// Session established or re-established after a reconnect
    Ready { user: String },

    /// Transport dropped; the adapter may reconnect on its own
    Disconnected { reason: String },

    /// A text message was posted somewhere the identity can see
    Message(InboundMessage),
}

impl GatewayEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Connected => "connected",
            GatewayEvent::Ready { .. } => "ready",
            GatewayEvent::Disconnected { .. } => "disconnected",
            GatewayEvent::Message(_) => "message",
        }
    }
}
