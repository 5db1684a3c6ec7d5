//! `complimenter doctor` — diagnose configuration and storage.

use super::CommandResult;
use complimenter_config::{AppConfig, CONFIG_FILE_NAME};
use complimenter_core::provider::Provider;
use std::path::Path;

pub async fn run(config: &AppConfig, config_path: Option<&Path>) -> CommandResult {
    println!("🩺 Complimenter Doctor — System Diagnostics");
    println!("===========================================\n");

    let mut issues = 0;

    let path = config_path.unwrap_or(Path::new(CONFIG_FILE_NAME));
    if path.exists() {
        println!("  ✅ Config file {} valid", path.display());
    } else {
        println!("  ℹ️  No config file at {}, using defaults + environment", path.display());
    }

    if config.require_bot_token().is_ok() {
        println!("  ✅ Telegram bot token configured");
    } else {
        println!("  ❌ TELEGRAM_BOT_TOKEN not set — `complimenter run` will refuse to start");
        issues += 1;
    }

    let pipeline = super::build_pipeline(config)?;
    if config.has_remote_key() {
        let remote = super::build_remote(config)?;
        match remote.health_check().await {
            Ok(true) => println!("  ✅ Remote API reachable ({})", config.remote.model),
            Ok(false) => {
                println!("  ⚠️  Remote API rejected the key at {}", config.remote.base_url);
                issues += 1;
            }
            Err(e) => {
                println!("  ⚠️  Remote API unreachable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⚠️  OPENROUTER_API_KEY not set — remote tier skipped");
        issues += 1;
    }

    if !config.local.enabled {
        println!("  ℹ️  Local model disabled");
    } else if cfg!(feature = "local") {
        println!("  ✅ Local model: {} (loaded on first use)", config.local.model);
    } else {
        println!("  ⚠️  Local model configured but built without the `local` feature");
        issues += 1;
    }
    if let Some(status) = pipeline.local_status() {
        println!("      status: {status}");
    }

    match super::open_store(config, false).await {
        Ok(store) => println!(
            "  ✅ Database ready at {} ({})",
            config.storage.db_path.display(),
            store.name()
        ),
        Err(e) => {
            println!("  ❌ Database error: {e}");
            issues += 1;
        }
    }

    println!("  ✅ Logs written to {}", config.logging.dir.display());

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. Rule-based replies still work.");
    }

    Ok(())
}
