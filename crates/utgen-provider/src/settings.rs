//! Provider connection settings
//!
//! Deserialized from the `llm_settings` section of the generator config.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable consulted when `openai.api_key` is absent
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable consulted when `github.api_key` is absent
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    #[serde(alias = "open_ai")]
    OpenAi,
    Github,
}

impl ProviderKind {
    /// Config spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local Ollama server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "codellama:13b".into(),
            timeout: 300,
        }
    }
}

/// OpenAI chat completions
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Overrides the request-level value when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Overrides the request-level value when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4".into(),
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: None,
            temperature: None,
            timeout: 300,
        }
    }
}

impl OpenAiSettings {
    /// Key from the file, falling back to [`OPENAI_API_KEY_ENV`]
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), OPENAI_API_KEY_ENV)
    }
}

impl fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// GitHub Models (OpenAI-compatible)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4".into(),
            base_url: "https://models.inference.ai.azure.com".into(),
            timeout: 300,
        }
    }
}

impl GithubSettings {
    /// Key from the file, falling back to [`GITHUB_TOKEN_ENV`]
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), GITHUB_TOKEN_ENV)
    }
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Backend selection plus per-backend connection parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub provider: ProviderKind,
    pub ollama: OllamaSettings,
    pub openai: OpenAiSettings,
    pub github: GithubSettings,
}

impl ProviderSettings {
    /// Model name of the selected backend
    #[must_use]
    pub fn model(&self) -> &str {
        match self.provider {
            ProviderKind::Ollama => &self.ollama.model,
            ProviderKind::OpenAi => &self.openai.model,
            ProviderKind::Github => &self.github.model,
        }
    }
}

fn resolve_key(configured: Option<&str>, env: &str) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string)
        .or_else(|| std::env::var(env).ok().filter(|k| !k.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let settings: ProviderSettings =
            serde_yaml::from_str("provider: github\ngithub:\n  model: gpt-4o-mini\n").unwrap();
        assert_eq!(settings.provider, ProviderKind::Github);
        assert_eq!(settings.model(), "gpt-4o-mini");
        assert_eq!(settings.github.base_url, "https://models.inference.ai.azure.com");
        assert_eq!(settings.ollama, OllamaSettings::default());
    }

    #[test]
    fn configured_key_wins() {
        let settings = OpenAiSettings {
            api_key: Some("sk-file".into()),
            ..OpenAiSettings::default()
        };
        assert_eq!(settings.resolved_api_key().as_deref(), Some("sk-file"));
    }

    #[test]
    fn debug_redacts_keys() {
        let settings = GithubSettings {
            api_key: Some("ghp_secret".into()),
            ..GithubSettings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
