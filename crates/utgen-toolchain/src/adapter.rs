//! Build and coverage capabilities consumed by the pipeline

use crate::error::ToolchainError;
use async_trait::async_trait;
use std::fmt::Debug;
use utgen_artifact::{BuildReport, CoverageReport, SourceUnit, TestArtifact};

/// Compiles a test artifact against its source unit and runs it
#[async_trait]
pub trait BuildRunner: Send + Sync + Debug {
    /// Build and execute one revision
    ///
    /// Compile and test failures are returned as an unsuccessful
    /// [`BuildReport`].
    ///
    /// # Errors
    /// [`ToolchainError`] when the toolchain is missing or a step times out.
    async fn build_and_run(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<BuildReport, ToolchainError>;
}

/// Measures coverage of a successfully built revision
#[async_trait]
pub trait CoverageProbe: Send + Sync + Debug {
    /// Measure coverage of `unit` by `artifact`
    ///
    /// Only called after a successful [`BuildRunner::build_and_run`] of the
    /// same revision.
    ///
    /// # Errors
    /// [`ToolchainError`] when coverage data cannot be produced.
    async fn measure(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<CoverageReport, ToolchainError>;
}
