//! Local generator — a lazily loaded on-device model.
//!
//! The model is loaded at most once per process. Loading and inference are
//! CPU-bound, so both run on the blocking pool. A failed load is remembered
//! and never retried; callers see it through [`LocalGenerator::status`].

use complimenter_core::error::ProviderError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Default token budget for one local generation.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 120;

/// A loaded model able to continue a prompt.
///
/// Implementations may return the prompt followed by the continuation;
/// the generator strips an echoed prompt.
pub trait LocalEngine: Send {
    fn generate(&mut self, prompt: &str, max_new_tokens: u32) -> Result<String, ProviderError>;
}

/// Loads a [`LocalEngine`] by model name. Called from a blocking thread.
pub trait EngineLoader: Send + Sync {
    fn load(&self, model_name: &str) -> Result<Box<dyn LocalEngine>, ProviderError>;
}

/// Loader used when no inference runtime is compiled in.
pub struct UnavailableLoader;

impl EngineLoader for UnavailableLoader {
    fn load(&self, model_name: &str) -> Result<Box<dyn LocalEngine>, ProviderError> {
        Err(ProviderError::ModelUnavailable(format!(
            "cannot load '{model_name}': built without the `local` feature"
        )))
    }
}

/// The loader for this build: Candle with the `local` feature, otherwise
/// [`UnavailableLoader`].
pub fn default_loader() -> Arc<dyn EngineLoader> {
    #[cfg(feature = "local")]
    {
        Arc::new(crate::candle::CandleLoader)
    }
    #[cfg(not(feature = "local"))]
    {
        Arc::new(UnavailableLoader)
    }
}

/// Lifecycle of the local model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalStatus {
    Uninitialized,
    Loading,
    Ready,
    Failed { reason: String },
}

impl std::fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalStatus::Uninitialized => f.write_str("uninitialized"),
            LocalStatus::Loading => f.write_str("loading"),
            LocalStatus::Ready => f.write_str("ready"),
            LocalStatus::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

type SharedEngine = Arc<Mutex<Box<dyn LocalEngine>>>;

/// Clears the loading flag when the load finishes or its caller goes away.
struct LoadingFlag<'a>(&'a AtomicBool);

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The local generation tier.
pub struct LocalGenerator {
    model_name: String,
    max_new_tokens: u32,
    loader: Arc<dyn EngineLoader>,
    loading: AtomicBool,
    outcome: OnceCell<Result<SharedEngine, String>>,
}

impl LocalGenerator {
    pub fn new(
        model_name: impl Into<String>,
        max_new_tokens: u32,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            max_new_tokens,
            loader,
            loading: AtomicBool::new(false),
            outcome: OnceCell::new(),
        }
    }

    /// A generator using [`default_loader`].
    pub fn with_default_loader(model_name: impl Into<String>, max_new_tokens: u32) -> Self {
        Self::new(model_name, max_new_tokens, default_loader())
    }

    /// A generator that is already `Failed` and never loads anything.
    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            model_name: String::new(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            loader: Arc::new(UnavailableLoader),
            loading: AtomicBool::new(false),
            outcome: OnceCell::new_with(Some(Err(reason.into()))),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    pub fn status(&self) -> LocalStatus {
        match self.outcome.get() {
            Some(Ok(_)) => LocalStatus::Ready,
            Some(Err(reason)) => LocalStatus::Failed {
                reason: reason.clone(),
            },
            None if self.loading.load(Ordering::SeqCst) => LocalStatus::Loading,
            None => LocalStatus::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(_)))
    }

    /// Load the model unless a load has already completed.
    ///
    /// Concurrent first callers share one load and all observe its outcome.
    pub async fn ensure_initialized(&self) -> LocalStatus {
        self.outcome.get_or_init(|| self.load()).await;
        self.status()
    }

    /// Like [`Self::ensure_initialized`], but never waits on a load started
    /// by another caller: while one is in flight this returns `Loading`.
    pub async fn try_initialize(&self) -> LocalStatus {
        if self.outcome.initialized() {
            return self.status();
        }
        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return LocalStatus::Loading;
        }
        let _flag = LoadingFlag(&self.loading);
        self.ensure_initialized().await
    }

    async fn load(&self) -> Result<SharedEngine, String> {
        self.loading.store(true, Ordering::SeqCst);
        let _flag = LoadingFlag(&self.loading);
        info!(model = %self.model_name, "Loading local fallback model");

        let loader = self.loader.clone();
        let name = self.model_name.clone();
        match tokio::task::spawn_blocking(move || loader.load(&name)).await {
            Ok(Ok(engine)) => {
                info!(model = %self.model_name, "Local model ready");
                Ok(Arc::new(Mutex::new(engine)))
            }
            Ok(Err(e)) => {
                warn!(model = %self.model_name, error = %e, "Failed to initialize local model");
                Err(e.to_string())
            }
            Err(e) => {
                warn!(model = %self.model_name, error = %e, "Model loading task failed");
                Err(format!("model loading task failed: {e}"))
            }
        }
    }

    /// Generate with the configured token budget.
    pub async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.generate_with_limit(prompt, self.max_new_tokens).await
    }

    /// Continue `prompt` with at most `max_new_tokens` new tokens.
    ///
    /// Does not trigger initialization; call [`Self::ensure_initialized`] first.
    pub async fn generate_with_limit(
        &self,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<String, ProviderError> {
        let engine = match self.outcome.get() {
            Some(Ok(engine)) => engine.clone(),
            Some(Err(reason)) => return Err(ProviderError::ModelUnavailable(reason.clone())),
            None => {
                return Err(ProviderError::ModelUnavailable(
                    "local model not initialized".into(),
                ));
            }
        };

        let owned_prompt = prompt.to_string();
        let raw = tokio::task::spawn_blocking(move || {
            let mut guard = engine.blocking_lock();
            guard.generate(&owned_prompt, max_new_tokens)
        })
        .await
        .map_err(|e| ProviderError::ModelUnavailable(format!("Inference task panicked: {e}")))??;

        let text = strip_echo(prompt, &raw);
        debug!(model = %self.model_name, chars = text.chars().count(), "Local generation complete");
        Ok(text)
    }
}

/// Drop a leading copy of the prompt and surrounding whitespace.
fn strip_echo(prompt: &str, output: &str) -> String {
    output
        .strip_prefix(prompt)
        .unwrap_or(output)
        .trim()
        .to_string()
}
