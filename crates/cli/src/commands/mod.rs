//! Subcommands and the wiring they share.

pub mod chat;
pub mod compliment;
pub mod doctor;
pub mod history;
pub mod run;

use complimenter_agent::{ComplimentBot, ComplimentPipeline, PromptTemplate};
use complimenter_config::AppConfig;
use complimenter_core::error::{MemoryError, ProviderError};
use complimenter_core::memory::ContextStore;
use complimenter_memory::{InMemoryContextStore, SqliteContextStore};
use complimenter_providers::{LocalGenerator, OpenAiCompatProvider, RuleBasedResponder};
use std::sync::Arc;
use tracing::info;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// The SQLite store at `storage.db_path`, or an in-memory one.
pub async fn open_store(
    config: &AppConfig,
    ephemeral: bool,
) -> Result<Arc<dyn ContextStore>, MemoryError> {
    if ephemeral {
        info!("Using in-memory context store");
        return Ok(Arc::new(InMemoryContextStore::new()));
    }
    Ok(Arc::new(SqliteContextStore::open(&config.storage.db_path).await?))
}

/// The OpenRouter-compatible remote tier from `[remote]`.
pub fn build_remote(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    OpenAiCompatProvider::new(
        "openrouter",
        &config.remote.base_url,
        config.remote.api_key.clone(),
        &config.remote.model,
    )
}

/// Remote, local and rule-based tiers as configured.
pub fn build_pipeline(config: &AppConfig) -> Result<ComplimentPipeline, ProviderError> {
    let recipient = &config.bot.recipient_name;
    let template = match &config.bot.prompt_template {
        Some(template) => PromptTemplate::new(template, recipient),
        None => PromptTemplate::with_default(recipient),
    };

    let remote = build_remote(config)?;
    if !config.has_remote_key() {
        info!("OPENROUTER_API_KEY not set, remote generation disabled");
    }

    let local = if config.local.enabled {
        LocalGenerator::with_default_loader(&config.local.model, config.local.max_new_tokens)
    } else {
        LocalGenerator::disabled("local model disabled in config")
    };

    Ok(
        ComplimentPipeline::new(RuleBasedResponder::new(recipient), template)
            .with_remote(Arc::new(remote))
            .with_local(Arc::new(local)),
    )
}

/// Store, pipeline and bot, ready for a channel.
pub async fn build_bot(
    config: &AppConfig,
    ephemeral: bool,
) -> Result<Arc<ComplimentBot>, Box<dyn std::error::Error>> {
    let store = open_store(config, ephemeral).await?;
    let pipeline = build_pipeline(config)?;
    Ok(Arc::new(
        ComplimentBot::new(store, Arc::new(pipeline)).with_context_limit(config.bot.context_limit),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use complimenter_core::category::Category;
    use complimenter_core::provider::{Provider, Tier};
    use complimenter_providers::LocalStatus;

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.local.enabled = false;
        config.bot.recipient_name = "Маша".into();
        config
    }

    #[tokio::test]
    async fn offline_bot_uses_rule_based_tier() {
        let bot = build_bot(&offline_config(), true).await.unwrap();
        let compliment = bot.compliment("u", Category::Appearance).await.unwrap();
        assert_eq!(compliment.tier, Tier::RuleBased);
        assert!(compliment.text.starts_with("Маша,"));
        assert_eq!(bot.store().count("u").await.unwrap(), 1);
    }

    #[test]
    fn disabled_local_tier_reports_failed() {
        let pipeline = build_pipeline(&offline_config()).unwrap();
        assert!(!pipeline.has_remote());
        assert!(matches!(pipeline.local_status(), Some(LocalStatus::Failed { .. })));
    }

    #[test]
    fn remote_tier_follows_remote_section() {
        let mut config = offline_config();
        assert!(!build_remote(&config).unwrap().is_configured());

        config.remote.api_key = Some("sk-test".into());
        let remote = build_remote(&config).unwrap();
        assert!(remote.is_configured());
        assert_eq!(remote.name(), "openrouter");
        assert!(build_pipeline(&config).unwrap().has_remote());
    }

    #[test]
    fn custom_template_is_used() {
        let mut config = offline_config();
        config.bot.prompt_template = Some("{recipient}/{category}/{context}".into());
        let pipeline = build_pipeline(&config).unwrap();
        assert_eq!(
            pipeline.template().render(Category::Character, &[]),
            "Маша/character/Нет"
        );
    }
}
