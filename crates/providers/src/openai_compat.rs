//! OpenAI-compatible remote generator.
//!
//! Works with OpenRouter, OpenAI and any endpoint exposing
//! `POST {base_url}/chat/completions`. Each call sends the whole prompt as a
//! single user message and returns `choices[0].message.content`.

use async_trait::async_trait;
use complimenter_core::error::ProviderError;
use complimenter_core::provider::{GenerationRequest, Provider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Wall-clock limit for one completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Sampling temperature sent with every request.
pub const TEMPERATURE: f32 = 0.8;
/// Output token budget sent with every request.
pub const MAX_TOKENS: u32 = 200;

/// A remote chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// A missing `api_key` is allowed here; every `generate` call then fails
    /// with [`ProviderError::NotConfigured`] before any request is sent.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            client,
        })
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(model: &str, prompt: &str) -> ApiRequest {
        ApiRequest {
            model: model.to_string(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Pull `choices[0].message.content` out of a success body.
    fn parse_content(body: &str) -> Result<String, ProviderError> {
        let api_response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::MalformedResponse("Choice has no message content".into()))?;

        Ok(content.trim().to_string())
    }

    /// Send one completion request for `prompt`.
    pub async fn complete_prompt(
        &self,
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(format!("No API key for provider '{}'", self.name))
        })?;
        let model = model_override.unwrap_or(&self.model);

        debug!(provider = %self.name, model = %model, "Sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&Self::build_body(model, prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(format!(
                        "'{}' did not answer within {}s",
                        self.name,
                        REQUEST_TIMEOUT.as_secs()
                    ))
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            warn!(provider = %self.name, status = status.as_u16(), body = %body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        Self::parse_content(&body).inspect_err(|e| {
            warn!(provider = %self.name, error = %e, "Unexpected response format");
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        self.complete_prompt(&request.prompt, request.model.as_deref())
            .await
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(false);
        };
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
