//! Loopcast CLI: the main entry point.
//!
//! Commands:
//! - `run`: Connect to Discord and serve commands
//! - `console`: Drive the bot from this terminal
//! - `panel`: Start the web control panel (supervises `run`)
//! - `status`: Show configuration and persisted settings
//! - `onboard`: Create the config and data directories

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "loopcast",
    about = "Loopcast - scheduled chat broadcasts driven by in-chat commands",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and start handling commands
    Run,

    /// Run the bot against an interactive terminal session
    Console,

    /// Start the web control panel
    Panel {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and bot settings
    Status,

    /// Initialize configuration and data directory
    Onboard {
        /// Store this bot token in the credential file
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run => commands::run::run().await?,
        Commands::Console => commands::console::run().await?,
        Commands::Panel { port } => commands::panel::run(port).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Onboard { token } => commands::onboard::run(token).await?,
    }

    Ok(())
}
