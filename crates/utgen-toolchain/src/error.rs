//! Toolchain infrastructure errors
//!
//! Compile errors and failing tests are reported through
//! [`utgen_artifact::BuildReport`]. These variants cover the cases where the
//! toolchain itself could not do its job, which fails the unit.

use std::path::PathBuf;
use std::time::Duration;

/// Toolchain error
#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    /// A required program is not installed or not on `PATH`
    #[error("required tool '{tool}' not found: {source}")]
    Missing {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// A step exceeded its time budget
    #[error("{step} timed out after {}s", .limit.as_secs_f64())]
    Timeout { step: String, limit: Duration },

    /// IO error in the unit workspace
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workspace is not in the state a step requires
    #[error("workspace error: {0}")]
    Workspace(String),
}

impl ToolchainError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create timeout error
    pub fn timeout(step: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            step: step.into(),
            limit,
        }
    }

    /// Short machine-friendly kind, used in summaries
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "missing_tool",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
            Self::Workspace(_) => "workspace",
        }
    }
}
