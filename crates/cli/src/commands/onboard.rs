//! `loopcast onboard`: First-time setup.

use loopcast_config::{AppConfig, CredentialStore};

pub async fn run(token: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📣 Loopcast - First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir)?;
        println!("✅ Created data directory: {}", config.data_dir.display());
    }

    let credentials = CredentialStore::new(config.credentials_path(), &config.discord.token_env);
    match token {
        Some(token) => {
            credentials.set(&token)?;
            println!("✅ Stored token in {}", credentials.path().display());
        }
        None if config.resolve_token().is_err() => {
            println!("\n📝 Next steps:");
            println!(
                "   1. Put {}=<token> in {} (or run `loopcast panel`)",
                config.discord.token_env,
                credentials.path().display()
            );
            println!("   2. Run: loopcast run");
            println!("   3. In Discord, send `!help` to the bot\n");
        }
        None => {}
    }

    println!("🎉 Setup complete! Run `loopcast run` to start the bot.\n");

    Ok(())
}
