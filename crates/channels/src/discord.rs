//! Discord gateway adapter.
//!
//! Outbound traffic goes through the Discord REST API (`reqwest`): sends,
//! token validation and latency probes. Inbound events are relayed from an
//! in-process injector; the websocket session that would feed it is not
//! part of this crate.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use loopcast_core::error::{GatewayError, SendError};
use loopcast_core::event::GatewayEvent;
use loopcast_core::gateway::Gateway;
use loopcast_core::message::{ChannelId, InboundMessage};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Discord adapter configuration.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token from the Discord Developer Portal.
    pub bot_token: String,
    /// REST API base, e.g. `https://discord.com/api/v10`.
    pub api_base: String,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Discord gateway adapter.
pub struct DiscordGateway {
    config: DiscordConfig,
    client: reqwest::Client,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<GatewayEvent>>>,
}

impl DiscordGateway {
    pub fn new(config: DiscordConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    /// Feed an event into the session as if it came from the websocket.
    pub async fn inject_event(&self, event: GatewayEvent) -> Result<(), GatewayError> {
        let guard = self.inject_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| GatewayError::ConnectionLost("Event channel closed".into())),
            None => Err(GatewayError::ConnectionLost("Gateway not connected".into())),
        }
    }

    /// Inject a message as if it came from Discord.
    pub async fn inject_message(&self, msg: InboundMessage) -> Result<(), GatewayError> {
        self.inject_event(GatewayEvent::Message(msg)).await
    }
}

/// Map a failed send response onto the send taxonomy.
fn classify_send_failure(
    channel: ChannelId,
    status: StatusCode,
    retry_after_header: Option<&str>,
    body: &str,
) -> SendError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::FORBIDDEN => SendError::Forbidden {
            channel,
            reason: message,
        },
        StatusCode::NOT_FOUND => SendError::UnknownChannel(channel),
        StatusCode::TOO_MANY_REQUESTS => {
            let secs = parsed
                .and_then(|b| b.retry_after)
                .or_else(|| retry_after_header.and_then(|h| h.trim().parse::<f64>().ok()));
            SendError::RateLimited {
                retry_after: secs.and_then(|s| Duration::try_from_secs_f64(s).ok()),
            }
        }
        _ => SendError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    fn name(&self) -> &str {
        "discord"
    }

    async fn connect(&self) -> Result<mpsc::Receiver<GatewayEvent>, GatewayError> {
        if self.config.bot_token.is_empty() {
            return Err(GatewayError::NotConfigured("Discord token is empty".into()));
        }

        let response = self
            .client
            .get(self.url("/users/@me"))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                return Err(GatewayError::AuthenticationFailed(
                    "Discord rejected the token".into(),
                ));
            }
            other => {
                return Err(GatewayError::ConnectionLost(format!(
                    "Unexpected status {other} while validating token"
                )));
            }
        }

        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("Failed to parse user: {e}")))?;

        info!(user = %user.username, "Discord gateway starting (inbound via injection)");
        let (tx, rx) = mpsc::channel(64);
        for event in [
            GatewayEvent::Connected,
            GatewayEvent::Ready {
                user: user.username,
            },
        ] {
            tx.send(event)
                .await
                .map_err(|_| GatewayError::ConnectionLost("Event channel closed".into()))?;
        }
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, channel: ChannelId, content: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.url(&format!("/channels/{channel}/messages")))
            .header("Authorization", self.auth())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| SendError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(channel = %channel, content_len = content.len(), "Discord send ok");
            return Ok(());
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let err = classify_send_failure(channel, status, retry_after.as_deref(), &body);
        warn!(channel = %channel, status = status.as_u16(), error = %err, "Discord send failed");
        Err(err)
    }

    async fn latency(&self) -> Result<Duration, GatewayError> {
        let started = Instant::now();
        let response = self
            .client
            .get(self.url("/gateway"))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let elapsed = started.elapsed();
        if !response.status().is_success() {
            return Err(GatewayError::Network(format!(
                "Latency probe returned {}",
                response.status()
            )));
        }
        Ok(elapsed)
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        info!("Discord gateway stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }
}
