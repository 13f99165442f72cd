//! Bot runtime: owns the gateway event stream.
//!
//! One task reads gateway events and handles each message to completion
//! before taking the next, so commands apply in arrival order. Gated
//! commands park in the confirmation broker instead of waiting, and the
//! answer is just the next message in line.

use std::sync::Arc;
use std::time::Duration;

use loopcast_config::{BotSection, SettingsStore};
use loopcast_core::{Gateway, GatewayError, GatewayEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::RetryPolicy;
use crate::confirm::{ConfirmationBroker, DEFAULT_CONFIRM_TIMEOUT};
use crate::dispatcher::Dispatcher;
use crate::supervisor::LoopSupervisor;

/// Tunables for a [`BotRuntime`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub confirm_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl RuntimeOptions {
    pub fn from_config(bot: &BotSection) -> Self {
        Self {
            confirm_timeout: Duration::from_secs(bot.confirm_timeout_secs),
            retry: RetryPolicy::from_config(bot),
        }
    }
}

/// The running bot: gateway, settings, dispatcher and loop supervisor.
pub struct BotRuntime {
    gateway: Arc<dyn Gateway>,
    settings: Arc<SettingsStore>,
    supervisor: Arc<LoopSupervisor>,
    dispatcher: Dispatcher,
}

impl BotRuntime {
    pub fn new(gateway: Arc<dyn Gateway>, settings: Arc<SettingsStore>, options: RuntimeOptions) -> Self {
        let confirmations = Arc::new(ConfirmationBroker::new(options.confirm_timeout));
        let supervisor = Arc::new(LoopSupervisor::new());
        let dispatcher = Dispatcher::new(
            gateway.clone(),
            settings.clone(),
            confirmations,
            supervisor.clone(),
            options.retry,
        );
        Self {
            gateway,
            settings,
            supervisor,
            dispatcher,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn supervisor(&self) -> &Arc<LoopSupervisor> {
        &self.supervisor
    }

    /// Connect and process events until the stream ends or `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), GatewayError> {
        let mut events = self.gateway.connect().await?;
        info!(gateway = %self.gateway.name(), "Gateway session started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        info!("Gateway event stream closed");
                        break;
                    }
                },
            }
        }

        self.supervisor.stop();
        self.gateway.disconnect().await
    }

    /// React to a single gateway event.
    pub async fn handle_event(&self, event: GatewayEvent) {
        debug!(kind = event.kind(), "Gateway event");
        match event {
            GatewayEvent::Connected => info!("Connected to gateway"),
            GatewayEvent::Disconnected { reason } => {
                warn!(reason = %reason, "Disconnected from gateway")
            }
            GatewayEvent::Ready { user } => {
                info!(user = %user, "Logged in");
                self.settings.load().await;
                self.supervisor.reset();
            }
            GatewayEvent::Message(msg) => self.dispatcher.handle(&msg).await,
        }
    }
}
