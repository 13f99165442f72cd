//! Gateway trait: the abstraction over the real-time chat platform.
//!
//! A Gateway delivers inbound events (messages, session lifecycle) and
//! accepts outbound text sends. Session management, reconnects and
//! authentication are the adapter's business.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{GatewayError, SendError};
use crate::event::GatewayEvent;
use crate::message::ChannelId;

/// The core Gateway trait.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Human-readable adapter name (e.g., "discord", "console").
    fn name(&self) -> &str;

    /// Open the session and start delivering events.
    ///
    /// The receiver closes when the session ends for good.
    async fn connect(&self) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError>;

    /// Post a text message to a channel.
    async fn send(&self, channel: ChannelId, content: &str) -> Result<(), SendError>;

    /// Measure the round-trip latency to the platform.
    async fn latency(&self) -> Result<Duration, GatewayError> {
        Ok(Duration::ZERO)
    }

    /// Close the session gracefully.
    async fn disconnect(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
