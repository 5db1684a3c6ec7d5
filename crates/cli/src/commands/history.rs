//! `complimenter history` — a user's recent messages.

use super::CommandResult;
use complimenter_config::AppConfig;

pub async fn run(config: &AppConfig, user: &str, limit: usize) -> CommandResult {
    let store = super::open_store(config, false).await?;
    let total = store.count(user).await?;
    let records = store.recent(user, limit).await?;

    println!("📜 History for {user} ({} of {total})", records.len());
    println!("==============================");
    if records.is_empty() {
        println!("  (no messages)");
    }
    for record in records {
        println!(
            "  {}  {:<6} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.role.as_str(),
            record.content
        );
    }
    Ok(())
}
