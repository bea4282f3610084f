//! Build and coverage reports
//!
//! Reports are produced by the toolchain adapters and consumed by the
//! pipeline: build logs feed the fix prompt, uncovered lines feed the
//! refinement prompt, and both feed transition decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a compiler or test-runner diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Note,
    /// Failed test assertion
    TestFailure,
}

/// One structured diagnostic line extracted from a build log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::TestFailure => "test failure",
        };
        write!(f, "{}:{}: {}: {}", self.file, self.line, label, self.message)
    }
}

/// Outcome of building and running one test artifact
///
/// Ordinary compile and test failures are represented here, never as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Artifact revision this report belongs to
    pub revision: u32,
    /// Compiled and all tests passed
    pub success: bool,
    /// Exit code of the failing (or last) step, if the process exited normally
    pub exit_code: Option<i32>,
    /// Raw combined log
    pub log: String,
    /// Extracted diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// Successful build and test run
    #[must_use]
    pub fn passed(revision: u32, log: impl Into<String>) -> Self {
        Self {
            revision,
            success: true,
            exit_code: Some(0),
            log: log.into(),
            diagnostics: Vec::new(),
        }
    }

    /// Failed build or test run
    #[must_use]
    pub fn failed(
        revision: u32,
        exit_code: Option<i32>,
        log: impl Into<String>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            revision,
            success: false,
            exit_code,
            log: log.into(),
            diagnostics,
        }
    }

    /// Number of error-level diagnostics
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error | Severity::TestFailure))
            .count()
    }

    /// Diagnostics rendered one per line
    #[must_use]
    pub fn render_diagnostics(&self) -> String {
        self.diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Coverage of one source unit by one artifact revision
///
/// Ratios are in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Artifact revision this report belongs to
    pub revision: u32,
    pub line_coverage: f64,
    pub branch_coverage: f64,
    /// 1-based uncovered line numbers, ascending
    pub uncovered_lines: Vec<u32>,
    /// Uncovered branch identifiers (`L<line>:b<index>`)
    pub uncovered_branches: Vec<String>,
}

impl CoverageReport {
    /// Create a report, clamping ratios into range
    #[must_use]
    pub fn new(revision: u32, line_coverage: f64, branch_coverage: f64) -> Self {
        Self {
            revision,
            line_coverage: clamp_ratio(line_coverage),
            branch_coverage: clamp_ratio(branch_coverage),
            uncovered_lines: Vec::new(),
            uncovered_branches: Vec::new(),
        }
    }

    /// With uncovered lines
    #[must_use]
    pub fn with_uncovered_lines(mut self, mut lines: Vec<u32>) -> Self {
        lines.sort_unstable();
        lines.dedup();
        self.uncovered_lines = lines;
        self
    }

    /// With uncovered branches
    #[must_use]
    pub fn with_uncovered_branches(mut self, branches: Vec<String>) -> Self {
        self.uncovered_branches = branches;
        self
    }

    /// Line coverage as a percentage
    #[inline]
    #[must_use]
    pub fn line_percent(&self) -> f64 {
        self.line_coverage * 100.0
    }

    /// Branch coverage as a percentage
    #[inline]
    #[must_use]
    pub fn branch_percent(&self) -> f64 {
        self.branch_coverage * 100.0
    }

    /// Whether both percentage targets are met
    #[must_use]
    pub fn meets(&self, target_line_percent: f64, target_branch_percent: f64) -> bool {
        self.line_percent() >= target_line_percent && self.branch_percent() >= target_branch_percent
    }

    /// Combined score used to rank revisions
    #[inline]
    #[must_use]
    pub fn score(&self) -> f64 {
        self.line_coverage + self.branch_coverage
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
