//! OpenAI-compatible chat completions backend
//!
//! Serves both OpenAI and GitHub Models, which speak the same protocol at
//! different base URLs.

use crate::client::{CompletionClient, CompletionOptions};
use crate::error::ProviderError;
use crate::settings::{GithubSettings, OpenAiSettings, GITHUB_TOKEN_ENV, OPENAI_API_KEY_ENV};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions client
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    backend: &'static str,
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleClient {
    /// OpenAI backend
    ///
    /// # Errors
    /// Returns [`ProviderError::Permanent`] when no API key is configured.
    pub fn openai(settings: &OpenAiSettings) -> Result<Self, ProviderError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            ProviderError::permanent(format!(
                "openai api key missing: set llm_settings.openai.api_key or {OPENAI_API_KEY_ENV}"
            ))
        })?;
        let mut client = Self::build(
            "openai",
            &settings.base_url,
            api_key,
            &settings.model,
            settings.timeout,
        )?;
        client.max_tokens = settings.max_tokens;
        client.temperature = settings.temperature;
        Ok(client)
    }

    /// GitHub Models backend
    ///
    /// # Errors
    /// Returns [`ProviderError::Permanent`] when no token is configured.
    pub fn github(settings: &GithubSettings) -> Result<Self, ProviderError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            ProviderError::permanent(format!(
                "github token missing: set llm_settings.github.api_key or {GITHUB_TOKEN_ENV}"
            ))
        })?;
        Self::build(
            "github",
            &settings.base_url,
            api_key,
            &settings.model,
            settings.timeout,
        )
    }

    fn build(
        backend: &'static str,
        base_url: &str,
        api_key: String,
        model: &str,
        timeout: u64,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout.max(1)))
            .build()
            .map_err(|e| ProviderError::permanent(format!("cannot build http client: {e}")))?;
        Ok(Self {
            backend,
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_tokens: None,
            temperature: None,
        })
    }

    /// Target URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        self.backend
    }

    async fn complete(
        &self,
        request: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: request,
            }],
            max_tokens: self.max_tokens.unwrap_or(options.max_tokens),
            temperature: self.temperature.unwrap_or(options.temperature),
        };

        tracing::debug!(backend = self.backend, model = %self.model, chars = request.len(), "sending chat request");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(self.backend, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(self.backend, status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(self.backend, &e))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::transient(format!("{} response had no message content", self.backend))
            })
    }
}
