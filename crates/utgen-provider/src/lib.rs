//! utgen Completion Providers
//!
//! The [`CompletionClient`] capability and its backends:
//!
//! - [`OllamaClient`]: local Ollama server
//! - [`OpenAiCompatibleClient`]: OpenAI and GitHub Models chat completions
//!
//! The backend is chosen once at startup with [`build_client`].

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod client;
mod error;
mod ollama;
mod openai;
mod settings;

#[cfg(test)]
mod test_server;

pub use client::{CompletionClient, CompletionOptions, PROBE_PROMPT};
pub use error::ProviderError;
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;
pub use settings::{
    GithubSettings, OllamaSettings, OpenAiSettings, ProviderKind, ProviderSettings,
    GITHUB_TOKEN_ENV, OPENAI_API_KEY_ENV,
};

use std::sync::Arc;

/// Build the configured backend
///
/// # Errors
/// Returns [`ProviderError::Permanent`] when the selected backend is missing
/// credentials or its HTTP client cannot be built.
pub fn build_client(settings: &ProviderSettings) -> Result<Arc<dyn CompletionClient>, ProviderError> {
    let client: Arc<dyn CompletionClient> = match settings.provider {
        ProviderKind::Ollama => Arc::new(OllamaClient::new(&settings.ollama)?),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatibleClient::openai(&settings.openai)?),
        ProviderKind::Github => Arc::new(OpenAiCompatibleClient::github(&settings.github)?),
    };
    tracing::info!(provider = client.name(), model = settings.model(), "completion provider selected");
    Ok(client)
}
