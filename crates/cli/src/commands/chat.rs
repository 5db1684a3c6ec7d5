//! `complimenter chat` — the bot over stdin/stdout.

use super::CommandResult;
use complimenter_agent::dispatch;
use complimenter_channels::CliChannel;
use complimenter_config::AppConfig;
use std::sync::Arc;

pub async fn run(config: &AppConfig, ephemeral: bool, user: String) -> CommandResult {
    let bot = super::build_bot(config, ephemeral).await?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Complimenter — Interactive Mode       ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Recipient: {}", config.bot.recipient_name);
    println!("  Model:     {}", config.remote.model);
    println!(
        "  History:   {}",
        if ephemeral {
            "in memory".to_string()
        } else {
            config.storage.db_path.display().to_string()
        }
    );
    println!();
    println!("  /start, /type <category>, or any text.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    dispatch::serve(Arc::new(CliChannel::new(user)), bot).await?;

    println!();
    println!("  Goodbye! 👋");
    Ok(())
}
