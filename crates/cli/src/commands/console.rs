//! `loopcast console`: Drive the bot from this terminal.

use std::sync::Arc;

use loopcast_channels::ConsoleGateway;
use loopcast_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📣 Loopcast console");
    println!("   Settings: {}", config.settings_path().display());
    println!("   Type commands such as `!help`; mention channels as <#id>, roles as <@&id>.");
    println!("   Type 'exit' or press Ctrl+D to quit.\n");

    super::serve(&config, Arc::new(ConsoleGateway::new())).await
}
