//! `loopcast run`: Connect to Discord and serve commands.

use std::sync::Arc;

use loopcast_channels::{DiscordConfig, DiscordGateway};
use loopcast_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // A missing token is fatal before any session starts.
    let token = config.resolve_token()?;

    let gateway = DiscordGateway::new(DiscordConfig {
        bot_token: token,
        api_base: config.discord.api_base.clone(),
    });

    println!("📣 Loopcast");
    println!("   Settings: {}", config.settings_path().display());

    super::serve(&config, Arc::new(gateway)).await
}
