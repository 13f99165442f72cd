//! The broadcast loop: send every configured message in turn, then wait.
//!
//! Each pass works on a snapshot of the settings taken when it begins, so
//! edits made mid-pass apply from the next pass. Cancellation is observed
//! at every sleep and between messages; a send already in flight always
//! completes.

use std::sync::Arc;
use std::time::Duration;

use loopcast_config::{BotSection, BotSettings, SettingsStore};
use loopcast_core::{ChannelId, Gateway, SendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bounded exponential backoff for rate-limited sends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Rate-limited attempts per message before the pass is abandoned
    pub max_attempts: u32,

    /// First backoff step, doubled on each attempt
    pub base_backoff: Duration,

    /// Used when the server does not say how long to wait
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(bot: &BotSection) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: bot.max_send_attempts.max(1),
            base_backoff: Duration::try_from_secs_f64(bot.base_backoff_secs)
                .unwrap_or(defaults.base_backoff),
            default_retry_after: Duration::try_from_secs_f64(bot.default_retry_after_secs)
                .unwrap_or(defaults.default_retry_after),
        }
    }

    /// Wait before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt));
        retry_after
            .unwrap_or(self.default_retry_after)
            .min(exponential)
    }
}

/// How a single pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every message was delivered.
    Completed { sent: usize },
    /// A send failed; the rest of the pass was skipped.
    Aborted { sent: usize },
    /// The loop was cancelled mid-pass.
    Cancelled,
}

enum DeliveryError {
    Forbidden(SendError),
    GaveUp { attempts: u32 },
    Failed(SendError),
    Cancelled,
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Periodic sender driven by the persisted settings.
pub struct BroadcastLoop {
    gateway: Arc<dyn Gateway>,
    settings: Arc<SettingsStore>,
    policy: RetryPolicy,
}

impl BroadcastLoop {
    pub fn new(gateway: Arc<dyn Gateway>, settings: Arc<SettingsStore>, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            settings,
            policy,
        }
    }

    /// Run passes until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!("Broadcast loop running");
        while !cancel.is_cancelled() {
            let snapshot = self.settings.snapshot().await;
            match snapshot.channel_id {
                Some(channel) if !snapshot.messages.is_empty() => {
                    let outcome = self.run_pass(channel, &snapshot, &cancel).await;
                    debug!(?outcome, "Pass finished");
                    if outcome == PassOutcome::Cancelled {
                        break;
                    }
                }
                _ => debug!("No channel or messages configured, waiting"),
            }
            if !sleep_or_cancel(&cancel, snapshot.loop_delay()).await {
                break;
            }
        }
        info!("Broadcast loop exited");
    }

    /// Send each message of `snapshot` to `channel` once, in order.
    pub async fn run_pass(
        &self,
        channel: ChannelId,
        snapshot: &BotSettings,
        cancel: &CancellationToken,
    ) -> PassOutcome {
        let mut sent = 0;
        for message in &snapshot.messages {
            if cancel.is_cancelled() {
                return PassOutcome::Cancelled;
            }
            match self.deliver(channel, message, cancel).await {
                Ok(()) => {
                    sent += 1;
                    info!(channel = %channel, "Sent message: {message}");
                    if !sleep_or_cancel(cancel, snapshot.msg_delay()).await {
                        return PassOutcome::Cancelled;
                    }
                }
                Err(DeliveryError::Cancelled) => return PassOutcome::Cancelled,
                Err(DeliveryError::Forbidden(e)) => {
                    error!(channel = %channel, error = %e, "No permission to send messages");
                    return PassOutcome::Aborted { sent };
                }
                Err(DeliveryError::GaveUp { attempts }) => {
                    error!(channel = %channel, attempts, "Max retries reached for message: {message}");
                    return PassOutcome::Aborted { sent };
                }
                Err(DeliveryError::Failed(e)) => {
                    error!(channel = %channel, error = %e, "Error sending message");
                    return PassOutcome::Aborted { sent };
                }
            }
        }
        PassOutcome::Completed { sent }
    }

    /// Send one message, retrying while rate limited.
    async fn deliver(
        &self,
        channel: ChannelId,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DeliveryError> {
        let mut attempt = 0;
        loop {
            match self.gateway.send(channel, content).await {
                Ok(()) => return Ok(()),
                Err(SendError::RateLimited { retry_after }) => {
                    let wait = self.policy.backoff(attempt, retry_after);
                    attempt += 1;
                    warn!(
                        channel = %channel,
                        wait_secs = wait.as_secs_f64(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "Rate limited, retrying"
                    );
                    if !sleep_or_cancel(cancel, wait).await {
                        return Err(DeliveryError::Cancelled);
                    }
                    if attempt >= self.policy.max_attempts {
                        return Err(DeliveryError::GaveUp { attempts: attempt });
                    }
                }
                Err(e) if e.is_forbidden() => return Err(DeliveryError::Forbidden(e)),
                Err(e) => return Err(DeliveryError::Failed(e)),
            }
        }
    }
}
