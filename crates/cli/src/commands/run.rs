//! `complimenter run` — the Telegram bot.

use super::CommandResult;
use complimenter_agent::dispatch;
use complimenter_channels::{TelegramChannel, TelegramConfig};
use complimenter_config::AppConfig;
use complimenter_core::channel::Channel;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: &AppConfig) -> CommandResult {
    let token = config.require_bot_token()?;
    let bot = super::build_bot(config, false).await?;
    let channel = Arc::new(TelegramChannel::new(TelegramConfig::new(token))?);

    info!(
        db = %config.storage.db_path.display(),
        model = %config.remote.model,
        local = config.local.enabled,
        "Bot starting"
    );

    tokio::select! {
        result = dispatch::serve(channel.clone(), bot) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            channel.stop().await?;
        }
    }

    Ok(())
}
