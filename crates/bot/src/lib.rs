//! Loopcast bot: command handling and the scheduled broadcast loop.
//!
//! [`BotRuntime`] reads gateway events and routes each message through the
//! [`Dispatcher`]: permission gate, prefix grammar, optional yes/no
//! confirmation, then a settings change or loop control. The
//! [`BroadcastLoop`] runs under a [`LoopSupervisor`] that keeps at most one
//! instance alive.

pub mod broadcast;
pub mod command;
pub mod confirm;
pub mod dispatcher;
pub mod permission;
pub mod reply;
pub mod runtime;
pub mod supervisor;

#[cfg(test)]
mod test_support;

pub use broadcast::{BroadcastLoop, PassOutcome, RetryPolicy};
pub use command::{Command, CommandError};
pub use confirm::{Answered, ConfirmationBroker};
pub use dispatcher::Dispatcher;
pub use permission::is_authorized;
pub use runtime::{BotRuntime, RuntimeOptions};
pub use supervisor::LoopSupervisor;
