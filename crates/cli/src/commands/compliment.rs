//! `complimenter compliment` — one compliment, printed.

use super::CommandResult;
use complimenter_config::AppConfig;
use complimenter_core::category::Category;

pub async fn run(config: &AppConfig, category: &str, user: &str) -> CommandResult {
    let bot = super::build_bot(config, false).await?;
    let category = Category::normalize(category);

    let compliment = bot.preview(user, category).await?;
    println!("{}", compliment.text);
    eprintln!("  ({category}, via {})", compliment.tier);
    Ok(())
}
