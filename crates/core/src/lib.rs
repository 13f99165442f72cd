//! # Loopcast Core
//!
//! Domain types, traits, and error definitions for the Loopcast chat
//! automation client. This crate has **no I/O**: it defines the model
//! that the gateway adapters, the bot service and the control panel all
//! build against.
//!
//! ## Design Philosophy
//!
//! The messaging platform is reached only through the [`Gateway`] trait.
//! Adapters live in `loopcast-channels`; tests plug in scripted fakes.

pub mod error;
pub mod event;
pub mod gateway;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use error::{GatewayError, SendError};
pub use event::GatewayEvent;
pub use gateway::Gateway;
pub use message::{ChannelId, GuildId, InboundMessage, MessageContext, RoleId, UserId};
