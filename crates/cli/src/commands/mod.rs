pub mod console;
pub mod onboard;
pub mod panel;
pub mod run;
pub mod status;

use std::sync::Arc;

use loopcast_bot::{BotRuntime, RuntimeOptions};
use loopcast_config::{AppConfig, SettingsStore};
use loopcast_core::Gateway;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run `gateway` under a bot runtime until the session ends or Ctrl-C.
pub(crate) async fn serve(
    config: &AppConfig,
    gateway: Arc<dyn Gateway>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Arc::new(SettingsStore::new(config.settings_path()));
    settings.load().await;

    let runtime = BotRuntime::new(gateway, settings, RuntimeOptions::from_config(&config.bot));

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    runtime.run(shutdown).await?;
    info!("Bot stopped");
    Ok(())
}
