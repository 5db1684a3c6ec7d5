//! Complimenter CLI — the main entry point.
//!
//! Commands:
//! - `run`        — Start the Telegram bot
//! - `chat`       — Talk to the bot in the terminal
//! - `compliment` — Produce one compliment and print it
//! - `history`    — Show a user's stored messages
//! - `doctor`     — Diagnose configuration and storage

use clap::{Parser, Subcommand};
use complimenter_config::AppConfig;
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(
    name = "complimenter",
    about = "Complimenter — a Telegram bot that writes compliments",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ./complimenter.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Telegram bot (long polling)
    Run,

    /// Chat with the bot in the terminal
    Chat {
        /// Keep history in memory only
        #[arg(long)]
        ephemeral: bool,

        /// User id to chat as
        #[arg(short, long, default_value = "local_user")]
        user: String,
    },

    /// Produce one compliment from a user's stored context
    Compliment {
        /// Category name or synonym (appearance, характер, ...)
        #[arg(short, long, default_value = "character")]
        category: String,

        #[arg(short, long, default_value = "local_user")]
        user: String,
    },

    /// Show the most recent stored messages of a user
    History {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Diagnose configuration and storage
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let _log_guard = logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Run => commands::run::run(&config).await?,
        Commands::Chat { ephemeral, user } => commands::chat::run(&config, ephemeral, user).await?,
        Commands::Compliment { category, user } => {
            commands::compliment::run(&config, &category, &user).await?
        }
        Commands::History { user, limit } => commands::history::run(&config, &user, limit).await?,
        Commands::Doctor => commands::doctor::run(&config, cli.config.as_deref()).await?,
    }

    Ok(())
}
