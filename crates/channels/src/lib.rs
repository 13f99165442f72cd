//! Chat gateway adapters for Loopcast.
//!
//! Each adapter implements [`loopcast_core::Gateway`]:
//! - **Discord**: REST sends and latency probes, injected inbound events
//! - **Console**: interactive terminal session (stdin/stdout)

pub mod console;
pub mod discord;

pub use console::ConsoleGateway;
pub use discord::{DiscordConfig, DiscordGateway};
