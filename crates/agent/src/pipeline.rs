//! The compliment pipeline: remote → local → rule-based.
//!
//! Every tier is tried at most once per request. Tier errors are logged and
//! turn into progression to the next tier, so [`ComplimentPipeline::produce`]
//! always returns text.

use crate::prompt::PromptTemplate;
use complimenter_core::category::Category;
use complimenter_core::message::ContextMessage;
use complimenter_core::provider::{Compliment, GenerationRequest, Provider, Tier};
use complimenter_providers::local::{LocalGenerator, LocalStatus};
use complimenter_providers::rule_based::RuleBasedResponder;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Longest prompt prefix written to the debug log.
const PROMPT_LOG_CHARS: usize = 1000;

pub struct ComplimentPipeline {
    remote: Option<Arc<dyn Provider>>,
    local: Option<Arc<LocalGenerator>>,
    fallback: RuleBasedResponder,
    template: PromptTemplate,
}

impl ComplimentPipeline {
    /// A pipeline with only the rule-based tier.
    pub fn new(fallback: RuleBasedResponder, template: PromptTemplate) -> Self {
        Self {
            remote: None,
            local: None,
            fallback,
            template,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn Provider>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_local(mut self, local: Arc<LocalGenerator>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Current state of the local tier, `None` when it is not wired in.
    pub fn local_status(&self) -> Option<LocalStatus> {
        self.local.as_ref().map(|l| l.status())
    }

    pub fn has_remote(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.is_configured())
    }

    /// Produce a compliment for `category` given the recent context.
    pub async fn produce(
        &self,
        user_id: &str,
        category: Category,
        context: &[ContextMessage],
    ) -> Compliment {
        let prompt = self.template.render(category, context);
        let preview: String = prompt.chars().take(PROMPT_LOG_CHARS).collect();
        debug!(user_id, category = %category, prompt = %preview, "Final prompt");

        if let Some(remote) = self.remote.as_ref().filter(|r| r.is_configured()) {
            match remote.generate(GenerationRequest::new(prompt.as_str())).await {
                Ok(text) => {
                    info!(user_id, tier = %Tier::Remote, provider = remote.name(), "Compliment generated");
                    return Compliment::new(text, Tier::Remote);
                }
                Err(e) => {
                    warn!(
                        user_id,
                        provider = remote.name(),
                        error = %e,
                        "Remote generation failed, trying local model"
                    );
                }
            }
        }

        if let Some(local) = &self.local {
            match local.try_initialize().await {
                LocalStatus::Ready => match local.generate(&prompt).await {
                    Ok(text) if !text.is_empty() => {
                        info!(user_id, tier = %Tier::Local, model = local.model_name(), "Compliment generated");
                        return Compliment::new(text, Tier::Local);
                    }
                    Ok(_) => warn!(user_id, "Local model returned empty text"),
                    Err(e) => warn!(user_id, error = %e, "Local generation failed"),
                },
                status => debug!(user_id, status = %status, "Local model not available"),
            }
        }

        warn!(user_id, tier = %Tier::RuleBased, "Using rule-based fallback");
        Compliment::new(self.fallback.respond(category, context), Tier::RuleBased)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use complimenter_core::error::ProviderError;
    use complimenter_providers::local::{EngineLoader, LocalEngine};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// A remote provider returning a fixed outcome and counting calls.
    struct MockRemote {
        outcome: Result<String, ProviderError>,
        configured: bool,
        call_count: Mutex<usize>,
    }

    impl MockRemote {
        fn ok(text: &str) -> Self {
            Self {
                outcome: Ok(text.into()),
                configured: true,
                call_count: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "boom".into(),
                }),
                ..Self::ok("")
            }
        }

        fn unconfigured() -> Self {
            Self {
                configured: false,
                ..Self::ok("never")
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for MockRemote {
        fn name(&self) -> &str {
            "mock"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, _request: GenerationRequest) -> Result<String, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    /// Returns `Ok(text)`, or a generation error when `text` is `None`.
    struct FixedEngine(Option<String>);

    impl LocalEngine for FixedEngine {
        fn generate(&mut self, _prompt: &str, _max: u32) -> Result<String, ProviderError> {
            self.0
                .clone()
                .ok_or_else(|| ProviderError::ModelUnavailable("sampling failed".into()))
        }
    }

    struct FixedLoader {
        output: Option<String>,
        broken_engine: bool,
        delay: Duration,
        call_count: Mutex<usize>,
    }

    impl FixedLoader {
        fn new(output: Option<&str>) -> Self {
            Self {
                output: output.map(String::from),
                broken_engine: false,
                delay: Duration::ZERO,
                call_count: Mutex::new(0),
            }
        }

        fn broken_engine() -> Self {
            Self {
                broken_engine: true,
                ..Self::new(Some("unused"))
            }
        }

        fn slow(output: &str, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(Some(output))
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    impl EngineLoader for FixedLoader {
        fn load(&self, _model: &str) -> Result<Box<dyn LocalEngine>, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            std::thread::sleep(self.delay);
            match &self.output {
                Some(_) if self.broken_engine => Ok(Box::new(FixedEngine(None))),
                Some(text) => Ok(Box::new(FixedEngine(Some(text.clone())))),
                None => Err(ProviderError::ModelUnavailable("no weights".into())),
            }
        }
    }

    fn base() -> ComplimentPipeline {
        ComplimentPipeline::new(
            RuleBasedResponder::default(),
            PromptTemplate::with_default("Оля"),
        )
    }

    #[tokio::test]
    async fn remote_success_short_circuits() {
        let remote = Arc::new(MockRemote::ok("Ты прекрасна!"));
        let loader = Arc::new(FixedLoader::new(Some("local")));
        let pipeline = base()
            .with_remote(remote.clone())
            .with_local(Arc::new(LocalGenerator::new("m", 8, loader.clone())));

        let compliment = pipeline.produce("u", Category::Appearance, &[]).await;
        assert_eq!(compliment, Compliment::new("Ты прекрасна!", Tier::Remote));
        assert_eq!(remote.calls(), 1);
        assert_eq!(loader.calls(), 0);
        assert_eq!(pipeline.local_status(), Some(LocalStatus::Uninitialized));
    }

    #[tokio::test]
    async fn remote_failure_falls_to_local() {
        let remote = Arc::new(MockRemote::failing());
        let loader = Arc::new(FixedLoader::new(Some("  Ты умница!  ")));
        let pipeline = base()
            .with_remote(remote.clone())
            .with_local(Arc::new(LocalGenerator::new("m", 8, loader.clone())));

        let compliment = pipeline.produce("u", Category::Character, &[]).await;
        assert_eq!(compliment.tier, Tier::Local);
        assert_eq!(compliment.text, "Ты умница!");
        assert_eq!(remote.calls(), 1);
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn unconfigured_remote_is_skipped() {
        let remote = Arc::new(MockRemote::unconfigured());
        let pipeline = base().with_remote(remote.clone());

        let compliment = pipeline.produce("u", Category::Character, &[]).await;
        assert_eq!(compliment.tier, Tier::RuleBased);
        assert_eq!(remote.calls(), 0);
        assert!(!pipeline.has_remote());
    }

    #[tokio::test]
    async fn no_tiers_equals_fallback() {
        let context = vec![ContextMessage::user("привет")];
        for category in Category::ALL {
            let compliment = base().produce("u", category, &context).await;
            assert_eq!(compliment.tier, Tier::RuleBased);
            assert_eq!(
                compliment.text,
                RuleBasedResponder::default().respond(category, &context)
            );
        }
    }

    #[tokio::test]
    async fn failed_local_init_uses_fallback_and_is_not_retried() {
        let loader = Arc::new(FixedLoader::new(None));
        let pipeline = base().with_local(Arc::new(LocalGenerator::new("m", 8, loader.clone())));

        for _ in 0..3 {
            let compliment = pipeline.produce("u", Category::Achievements, &[]).await;
            assert_eq!(compliment.tier, Tier::RuleBased);
        }
        assert_eq!(loader.calls(), 1);
        assert!(matches!(pipeline.local_status(), Some(LocalStatus::Failed { .. })));
    }

    #[tokio::test]
    async fn empty_local_output_falls_through() {
        let loader = Arc::new(FixedLoader::new(Some("   ")));
        let pipeline = base().with_local(Arc::new(LocalGenerator::new("m", 8, loader)));

        let compliment = pipeline.produce("u", Category::Appearance, &[]).await;
        assert_eq!(compliment.tier, Tier::RuleBased);
        assert!(compliment.text.contains("улыбка"));
    }

    #[tokio::test]
    async fn local_generation_error_falls_through() {
        let loader = Arc::new(FixedLoader::broken_engine());
        let pipeline = base().with_local(Arc::new(LocalGenerator::new("m", 8, loader.clone())));

        let compliment = pipeline.produce("u", Category::Character, &[]).await;
        assert_eq!(compliment.tier, Tier::RuleBased);
        assert!(compliment.text.contains("доброе"));
        assert_eq!(pipeline.local_status(), Some(LocalStatus::Ready));
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn requests_during_local_load_get_fallback_immediately() {
        let loader = Arc::new(FixedLoader::slow("Ты чудесная!", Duration::from_millis(500)));
        let pipeline = Arc::new(
            base().with_local(Arc::new(LocalGenerator::new("m", 8, loader.clone()))),
        );

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.produce("a", Category::Appearance, &[]).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pipeline.local_status(), Some(LocalStatus::Loading));

        let started = Instant::now();
        let second = pipeline.produce("b", Category::Appearance, &[]).await;
        assert_eq!(second.tier, Tier::RuleBased);
        assert!(started.elapsed() < Duration::from_millis(200));

        let first = first.await.unwrap();
        assert_eq!(first, Compliment::new("Ты чудесная!", Tier::Local));
        assert_eq!(loader.calls(), 1);
    }
}
