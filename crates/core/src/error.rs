//! Error types for the Loopcast domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type.

use std::time::Duration;

use thiserror::Error;

use crate::message::ChannelId;

/// Failures of the gateway session itself (connect, auth, heartbeat).
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Gateway connection lost: {0}")]
    ConnectionLost(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of a single outbound message send.
///
/// The broadcast loop branches on these: `Forbidden` aborts a pass,
/// `RateLimited` is retried with backoff, everything else aborts.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("Missing permission to send in channel {channel}: {reason}")]
    Forbidden { channel: ChannelId, reason: String },

    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("Request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {:.2}s", d.as_secs_f64()),
        None => String::new(),
    }
}

impl SendError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, SendError::Forbidden { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SendError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_displays_hint() {
        let err = SendError::RateLimited {
            retry_after: Some(Duration::from_millis(1500)),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 1.50s");

        let bare = SendError::RateLimited { retry_after: None };
        assert_eq!(bare.to_string(), "Rate limited");
    }

    #[test]
    fn forbidden_displays_channel() {
        let err = SendError::Forbidden {
            channel: ChannelId(10),
            reason: "Missing Access".into(),
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("Missing Access"));
    }

    #[test]
    fn classification_helpers() {
        assert!(SendError::RateLimited { retry_after: None }.is_rate_limited());
        assert!(!SendError::UnknownChannel(ChannelId(3)).is_forbidden());
        assert!(!SendError::Network("reset".into()).is_rate_limited());
    }
}
