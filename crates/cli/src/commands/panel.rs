//! `loopcast panel`: Start the web control panel.

use loopcast_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.panel.port = port;
    }

    println!("📣 Loopcast Panel");
    println!("   Listening: http://{}:{}", config.panel.host, config.panel.port);
    println!("   Credentials: {}", config.credentials_path().display());

    loopcast_panel::start(config).await?;

    Ok(())
}
