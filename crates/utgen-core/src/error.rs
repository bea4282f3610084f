//! Error types for utgen core
//!
//! Only startup problems are errors here: invalid configuration, template
//! validation, unreadable input. Everything that happens to a single unit
//! once the pipeline is running ends in a terminal state instead, so one
//! unit never aborts the run.

use crate::state::UnitPhase;
use std::path::PathBuf;
use utgen_artifact::{DiscoveryError, UnitId};
use utgen_prompt::TemplateError;
use utgen_provider::ProviderError;
use utgen_toolchain::ToolchainError;

/// Startup-fatal pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template registry failed validation
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Input tree could not be read
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Provider could not be constructed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Toolchain could not be constructed
    #[error("toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    /// Store export failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Nothing to do
    #[error("no source units found under {0}")]
    NoUnits(PathBuf),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("invalid configuration {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is out of range
    #[error("invalid configuration value: {field} {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Serializing a sample configuration failed
    #[error("cannot render configuration: {0}")]
    Render(#[source] serde_yaml::Error),
}

impl ConfigError {
    /// Create out-of-range error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Artifact store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record for the unit
    #[error("unknown unit: {0}")]
    UnknownUnit(UnitId),

    /// Revisions must be committed in order without gaps
    #[error("unit {unit}: expected revision {expected}, got {actual}")]
    NonMonotonicRevision {
        unit: UnitId,
        expected: u32,
        actual: u32,
    },

    /// A report refers to a revision that was never committed
    #[error("unit {unit}: revision {revision} does not exist")]
    UnknownRevision { unit: UnitId, revision: u32 },

    /// Coverage offered for a revision without a successful build
    #[error("unit {unit}: revision {revision} has not passed the build stage")]
    RevisionNotBuilt { unit: UnitId, revision: u32 },

    /// Terminal state recorded with a non-terminal phase
    #[error("unit {unit}: {phase} is not a terminal state")]
    NotTerminal { unit: UnitId, phase: UnitPhase },

    /// IO error while exporting
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report serialization failed
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
