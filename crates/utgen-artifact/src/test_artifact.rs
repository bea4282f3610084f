//! Generated test artifacts
//!
//! A [`TestArtifact`] is one revision of generated test text. Revisions are
//! immutable; a stage produces a new revision instead of editing the old one.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial generation from source
    Generate,
    /// Build-error repair
    Fix,
    /// Coverage-driven refinement
    Refine,
    /// Coverage measurement (never produces artifacts)
    Measure,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 4] = [Stage::Generate, Stage::Fix, Stage::Refine, Stage::Measure];

    /// Whether this stage produces new artifact revisions
    #[inline]
    #[must_use]
    pub const fn produces_artifacts(self) -> bool {
        !matches!(self, Stage::Measure)
    }

    /// Lowercase stage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Fix => "fix",
            Stage::Refine => "refine",
            Stage::Measure => "measure",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors constructing artifact revisions
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Stage cannot produce artifacts
    #[error("stage {0} does not produce test artifacts")]
    NotProducing(Stage),

    /// Revision chains must start with generation
    #[error("revision {revision} must come from {expected}, not {actual}")]
    WrongOrigin {
        revision: u32,
        expected: &'static str,
        actual: Stage,
    },
}

/// One revision of generated test text
///
/// # Invariants
/// - Revision 0 is always produced by [`Stage::Generate`]
/// - Later revisions are produced by [`Stage::Fix`] or [`Stage::Refine`]
/// - `hash` is always the Blake3 hash of `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestArtifact {
    revision: u32,
    stage: Stage,
    text: Arc<str>,
    hash: ContentHash,
}

impl TestArtifact {
    /// Create revision 0 from generated text
    #[must_use]
    pub fn initial(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        Self {
            revision: 0,
            stage: Stage::Generate,
            hash: ContentHash::compute(text.as_bytes()),
            text,
        }
    }

    /// Produce the next revision from `stage`
    ///
    /// # Errors
    /// Returns [`ArtifactError`] if `stage` is `Generate` or `Measure`.
    pub fn next(&self, stage: Stage, text: impl Into<Arc<str>>) -> Result<Self, ArtifactError> {
        match stage {
            Stage::Fix | Stage::Refine => {}
            Stage::Measure => return Err(ArtifactError::NotProducing(stage)),
            Stage::Generate => {
                return Err(ArtifactError::WrongOrigin {
                    revision: self.revision + 1,
                    expected: "fix or refine",
                    actual: stage,
                })
            }
        }
        let text = text.into();
        Ok(Self {
            revision: self.revision + 1,
            stage,
            hash: ContentHash::compute(text.as_bytes()),
            text,
        })
    }

    /// Revision number (0-based, monotonically increasing)
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Producing stage
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Test source text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Content hash of the text
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_increase() {
        let rev0 = TestArtifact::initial("TEST(A, B) {}");
        assert_eq!(rev0.revision(), 0);
        assert_eq!(rev0.stage(), Stage::Generate);

        let rev1 = rev0.next(Stage::Fix, "TEST(A, C) {}").unwrap();
        let rev2 = rev1.next(Stage::Refine, "TEST(A, D) {}").unwrap();
        assert_eq!(rev1.revision(), 1);
        assert_eq!(rev2.revision(), 2);
        assert_eq!(rev2.stage(), Stage::Refine);
        assert_ne!(rev1.hash(), rev2.hash());
    }

    #[test]
    fn measure_and_generate_cannot_revise() {
        let rev0 = TestArtifact::initial("x");
        assert!(matches!(
            rev0.next(Stage::Measure, "y"),
            Err(ArtifactError::NotProducing(Stage::Measure))
        ));
        assert!(matches!(
            rev0.next(Stage::Generate, "y"),
            Err(ArtifactError::WrongOrigin { revision: 1, .. })
        ));
    }

    #[test]
    fn stage_flags() {
        assert!(Stage::Generate.produces_artifacts());
        assert!(!Stage::Measure.produces_artifacts());
        assert_eq!(Stage::Refine.to_string(), "refine");
    }
}
