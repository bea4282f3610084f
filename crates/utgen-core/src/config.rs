//! Generator configuration
//!
//! Loaded once from YAML, validated, then shared read-only as
//! `Arc<GeneratorConfig>`. Every field has a default, so a partial file (or
//! no file at all) is a working configuration.

use crate::error::ConfigError;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use utgen_artifact::DEFAULT_SOURCE_EXTENSIONS;
use utgen_provider::{CompletionOptions, ProviderSettings};

/// Conventional config location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/llm_config.yaml";

/// Longest accepted delay between retry attempts, in seconds
pub const MAX_RETRY_DELAY_SECS: f64 = 3600.0;

/// Complete generator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub llm_settings: LlmSettings,
    pub generation_settings: GenerationSettings,
    pub pipeline_settings: PipelineSettings,
}

/// Provider selection plus request behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    #[serde(flatten)]
    pub providers: ProviderSettings,
    pub request_settings: RequestSettings,
}

/// Per-request retry and sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Total attempts per request
    pub max_retries: u32,
    /// Seconds between attempts
    pub retry_delay: f64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub backoff: Backoff,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: 2.0,
            temperature: 0.1,
            max_tokens: 4096,
            backoff: Backoff::Fixed,
        }
    }
}

/// What to generate and when to stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tests_per_function: u32,
    pub include_edge_cases: bool,
    pub include_error_handling: bool,
    /// Percent, 0 to 100
    pub target_line_coverage: f64,
    /// Percent, 0 to 100
    pub target_branch_coverage: f64,
    /// Seconds for configure + build
    pub build_timeout: u64,
    /// Seconds for running the tests (and gcov)
    pub test_timeout: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tests_per_function: 5,
            include_edge_cases: true,
            include_error_handling: true,
            target_line_coverage: 80.0,
            target_branch_coverage: 70.0,
            build_timeout: 120,
            test_timeout: 60,
        }
    }
}

/// Loop budgets and run-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Fix revisions allowed per unit
    pub max_fix_attempts: u32,
    /// Refinement revisions allowed per unit
    pub max_refine_attempts: u32,
    /// Ceiling on revisions per unit across all stages
    pub max_iterations: u32,
    /// Units processed concurrently
    pub workers: usize,
    /// Seconds before the whole run is cancelled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout: Option<u64>,
    /// Characters of build log kept in prompts (tail)
    pub prompt_log_limit: usize,
    pub source_extensions: Vec<String>,
    /// Directory of YAML template overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions_dir: Option<PathBuf>,
    /// Scratch directory for per-unit build workspaces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_fix_attempts: 3,
            max_refine_attempts: 3,
            max_iterations: 10,
            workers: 2,
            run_timeout: None,
            prompt_log_limit: 8000,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            instructions_dir: None,
            work_dir: None,
        }
    }
}

impl GeneratorConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`, falling back to defaults when the file is absent
    ///
    /// # Errors
    /// - [`ConfigError::Io`] if the file exists but cannot be read
    /// - [`ConfigError::Yaml`] for malformed YAML
    /// - [`ConfigError::Invalid`] if validation fails
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without validating
    ///
    /// # Errors
    /// Returns the YAML error.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Render as YAML
    ///
    /// # Errors
    /// Returns [`ConfigError::Render`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Render)
    }

    /// Check ranges and budgets
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation_settings;
        for (field, value) in [
            ("target_line_coverage", generation.target_line_coverage),
            ("target_branch_coverage", generation.target_branch_coverage),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::invalid(field, format!("must be within 0-100, got {value}")));
            }
        }
        if generation.build_timeout == 0 {
            return Err(ConfigError::invalid("build_timeout", "must be positive"));
        }
        if generation.test_timeout == 0 {
            return Err(ConfigError::invalid("test_timeout", "must be positive"));
        }

        let request = &self.llm_settings.request_settings;
        if request.max_retries == 0 {
            return Err(ConfigError::invalid("max_retries", "must allow at least one attempt"));
        }
        if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&request.retry_delay) {
            return Err(ConfigError::invalid(
                "retry_delay",
                format!(
                    "must be between 0 and {MAX_RETRY_DELAY_SECS} seconds, got {}",
                    request.retry_delay
                ),
            ));
        }

        let pipeline = &self.pipeline_settings;
        if pipeline.max_fix_attempts == 0 {
            return Err(ConfigError::invalid("max_fix_attempts", "must be positive"));
        }
        if pipeline.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", "must be positive"));
        }
        if pipeline.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be positive"));
        }
        if pipeline.run_timeout == Some(0) {
            return Err(ConfigError::invalid("run_timeout", "must be positive when set"));
        }
        if pipeline.source_extensions.is_empty() {
            return Err(ConfigError::invalid("source_extensions", "must not be empty"));
        }
        Ok(())
    }

    /// Retry policy for every adapter call
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let request = &self.llm_settings.request_settings;
        RetryPolicy {
            max_attempts: request.max_retries,
            delay: Duration::try_from_secs_f64(request.retry_delay.clamp(0.0, MAX_RETRY_DELAY_SECS))
                .unwrap_or(Duration::ZERO),
            backoff: request.backoff,
        }
    }

    /// Sampling options for completion requests
    #[must_use]
    pub fn completion_options(&self) -> CompletionOptions {
        let request = &self.llm_settings.request_settings;
        CompletionOptions {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    /// Guidance sentence derived from the generation flags
    #[must_use]
    pub fn test_guidance(&self) -> String {
        let generation = &self.generation_settings;
        let mut parts = Vec::new();
        if generation.include_edge_cases {
            parts.push("Cover edge cases such as boundary values, empty inputs and extremes.");
        }
        if generation.include_error_handling {
            parts.push("Test error handling paths, including thrown exceptions and invalid arguments.");
        }
        parts.join(" ")
    }

    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_settings.build_timeout)
    }

    #[must_use]
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_settings.test_timeout)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.pipeline_settings.run_timeout.map(Duration::from_secs)
    }

    /// Set coverage targets (percent)
    #[must_use]
    pub fn with_targets(mut self, line: f64, branch: f64) -> Self {
        self.generation_settings.target_line_coverage = line;
        self.generation_settings.target_branch_coverage = branch;
        self
    }

    /// Set retry budget and fixed delay
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.llm_settings.request_settings.max_retries = max_retries;
        self.llm_settings.request_settings.retry_delay = retry_delay.as_secs_f64();
        self
    }

    /// Set fix and refine budgets
    #[must_use]
    pub fn with_budgets(mut self, max_fix_attempts: u32, max_refine_attempts: u32) -> Self {
        self.pipeline_settings.max_fix_attempts = max_fix_attempts;
        self.pipeline_settings.max_refine_attempts = max_refine_attempts;
        self
    }

    /// Set the per-unit iteration ceiling
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.pipeline_settings.max_iterations = max_iterations;
        self
    }

    /// Set worker count
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pipeline_settings.workers = workers;
        self
    }

    /// Set run timeout
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_settings.run_timeout = Some(timeout.as_secs().max(1));
        self
    }
}
