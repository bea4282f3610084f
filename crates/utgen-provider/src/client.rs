//! Completion client capability

use crate::error::ProviderError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Prompt used by [`CompletionClient::probe`]
pub const PROBE_PROMPT: &str = "Hello, respond with 'OK' if you can see this message.";

/// Sampling options for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// A text-generation backend
///
/// One implementation per backend, selected once at startup. Implementations
/// classify every failure as [`ProviderError::Transient`] or
/// [`ProviderError::Permanent`]; retrying is the caller's job.
#[async_trait]
pub trait CompletionClient: Send + Sync + Debug {
    /// Backend name for logs and reports
    fn name(&self) -> &str;

    /// Send one request and return the generated text
    ///
    /// # Errors
    /// Transient or permanent [`ProviderError`].
    async fn complete(
        &self,
        request: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;

    /// Connection test: a short prompt that must come back non-empty
    ///
    /// # Errors
    /// Propagates the error of the underlying request.
    async fn probe(&self, options: &CompletionOptions) -> Result<bool, ProviderError> {
        let answer = self.complete(PROBE_PROMPT, options).await?;
        Ok(!answer.trim().is_empty())
    }
}
