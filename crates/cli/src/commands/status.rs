//! `loopcast status`: Show configuration and persisted settings.

use loopcast_config::{AppConfig, SettingsStore};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let settings = SettingsStore::new(config.settings_path());
    settings.load().await;
    let s = settings.snapshot().await;

    println!("📣 Loopcast Status");
    println!("==================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Data dir:       {}", config.data_dir.display());
    println!("  Panel:          {}:{}", config.panel.host, config.panel.port);
    println!(
        "  Token:          {}",
        if config.resolve_token().is_ok() { "configured" } else { "missing" }
    );
    println!();
    println!("  Prefix:         {}", s.prefix);
    println!(
        "  Channel:        {}",
        s.channel_id.map(|c| c.to_string()).unwrap_or_else(|| "not set".into())
    );
    println!("  Messages:       {}", s.messages.len());
    for (i, msg) in s.messages.iter().enumerate() {
        println!("    {}. {msg}", i + 1);
    }
    println!("  Message delay:  {} s", s.msg_delay);
    println!("  Loop delay:     {} min", s.loop_delay);
    println!(
        "  Role:           {}",
        s.role_id.map(|r| r.to_string()).unwrap_or_else(|| "none".into())
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file - run `loopcast onboard` first");
    }

    Ok(())
}
