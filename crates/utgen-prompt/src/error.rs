//! Error types for the prompt template engine
//!
//! Lookup and fill failures ([`TemplateError::TemplateMissing`],
//! [`TemplateError::PlaceholderMissing`]) are checked once at startup by
//! [`crate::TemplateRegistry::validate`]; a validated registry never produces
//! them for the stage bindings it was validated against.

use std::path::PathBuf;

/// Template engine errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No template registered under the task name
    #[error("template not found: '{0}'")]
    TemplateMissing(String),

    /// A referenced placeholder was not supplied
    #[error("template '{task}' references placeholder '{placeholder}' which was not supplied")]
    PlaceholderMissing { task: String, placeholder: String },

    /// A referenced placeholder can never be supplied by the stage using the template
    #[error("template '{task}' references '{placeholder}', which no pipeline stage supplies")]
    Unresolvable { task: String, placeholder: String },

    /// Template body is empty
    #[error("template '{0}' has an empty prompt")]
    EmptyTemplate(String),

    /// Two definitions claim the same task name
    #[error("duplicate template definition for task '{task}' in {path}")]
    DuplicateTask { task: String, path: PathBuf },

    /// IO error while loading definitions
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid YAML definition
    #[error("invalid template definition {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl TemplateError {
    /// Create placeholder-missing error
    pub fn placeholder_missing(task: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self::PlaceholderMissing {
            task: task.into(),
            placeholder: placeholder.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
