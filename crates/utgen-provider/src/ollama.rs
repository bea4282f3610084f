//! Ollama backend (`/api/generate`, non-streaming)

use crate::client::{CompletionClient, CompletionOptions};
use crate::error::ProviderError;
use crate::settings::OllamaSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BACKEND: &str = "ollama";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    /// Create client from settings
    ///
    /// # Errors
    /// Returns [`ProviderError::Permanent`] if the HTTP client cannot be built.
    pub fn new(settings: &OllamaSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout.max(1)))
            .build()
            .map_err(|e| ProviderError::permanent(format!("cannot build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/api/generate", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
        })
    }

    /// Target URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn complete(
        &self,
        request: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: request,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };

        tracing::debug!(model = %self.model, chars = request.len(), "sending ollama request");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(BACKEND, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(BACKEND, status, &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(BACKEND, &e))?;
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;

    fn settings(base_url: String) -> OllamaSettings {
        OllamaSettings {
            base_url,
            model: "codellama:7b".into(),
            timeout: 5,
        }
    }

    #[tokio::test]
    async fn sends_generate_request() {
        let (base, request) = serve_once(200, r#"{"response":"```cpp\nTEST(A, B) {}\n```","done":true}"#).await;
        let client = OllamaClient::new(&settings(base)).unwrap();

        let text = client
            .complete("write tests", &CompletionOptions::default())
            .await
            .unwrap();
        assert!(text.contains("TEST(A, B)"));

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /api/generate"));
        assert!(raw.contains(r#""stream":false"#));
        assert!(raw.contains(r#""num_predict":4096"#));
        assert!(raw.contains(r#""model":"codellama:7b""#));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (base, _request) = serve_once(503, "overloaded").await;
        let client = OllamaClient::new(&settings(base)).unwrap();
        let err = client
            .complete("x", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn not_found_is_permanent() {
        let (base, _request) = serve_once(404, r#"{"error":"model not found"}"#).await;
        let client = OllamaClient::new(&settings(base)).unwrap();
        let err = client
            .complete("x", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OllamaClient::new(&settings(format!("http://{addr}"))).unwrap();
        let err = client
            .complete("x", &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
