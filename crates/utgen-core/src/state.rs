//! Per-unit state machine
//!
//! ```text
//! GENERATING ──► FIXING ◄──────────┐
//!                  │ │             │
//!        (build ok)│ └─(fix)───────┤
//!                  ▼               │
//!              MEASURING ──► REFINING
//!                  │
//!                  ▼
//!              CONVERGED
//! ```
//!
//! Every non-terminal state may also end in EXHAUSTED or FAILED. Terminal
//! states have no outgoing transitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use utgen_artifact::{BuildReport, CoverageReport, Stage, TestArtifact, UnitId};

/// Pipeline state of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitPhase {
    Generating,
    Fixing,
    Measuring,
    Refining,
    Converged,
    Exhausted,
    Failed,
}

impl UnitPhase {
    pub const ALL: [Self; 7] = [
        Self::Generating,
        Self::Fixing,
        Self::Measuring,
        Self::Refining,
        Self::Converged,
        Self::Exhausted,
        Self::Failed,
    ];

    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Converged | Self::Exhausted | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generating => "GENERATING",
            Self::Fixing => "FIXING",
            Self::Measuring => "MEASURING",
            Self::Refining => "REFINING",
            Self::Converged => "CONVERGED",
            Self::Exhausted => "EXHAUSTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for UnitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Illegal transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal state transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: UnitPhase,
    pub to: UnitPhase,
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: UnitPhase) -> Vec<UnitPhase> {
    use UnitPhase::*;
    match from {
        Generating => vec![Fixing, Exhausted, Failed],
        Fixing => vec![Fixing, Measuring, Exhausted, Failed],
        Measuring => vec![Converged, Refining, Exhausted, Failed],
        Refining => vec![Fixing, Exhausted, Failed],
        Converged | Exhausted | Failed => vec![],
    }
}

/// Check a transition
///
/// # Errors
/// Returns [`IllegalTransition`] when `to` is not reachable from `from`.
pub fn validate_transition(from: UnitPhase, to: UnitPhase) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// Why a unit stopped short of convergence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The build kept failing after the allowed fix revisions
    FixBudgetExceeded { attempts: u32 },
    /// Coverage stayed below target after the allowed refinements
    RefineBudgetExceeded { attempts: u32 },
    /// A provider request failed transiently on every attempt
    RetryBudgetExceeded {
        stage: Stage,
        attempts: u32,
        last_error: String,
    },
    /// The per-unit revision ceiling was reached
    IterationCeiling { limit: u32 },
    /// Run timeout or explicit cancellation
    Cancelled,
    /// Non-retryable provider failure
    Provider { stage: Stage, message: String },
    /// Toolchain infrastructure failure
    Toolchain { stage: Stage, message: String },
    /// A template could not be filled
    Template { message: String },
    /// A worker stopped without finishing the unit
    Internal { message: String },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixBudgetExceeded { attempts } => {
                write!(f, "build still failing after {attempts} fix attempts")
            }
            Self::RefineBudgetExceeded { attempts } => {
                write!(f, "coverage below target after {attempts} refinements")
            }
            Self::RetryBudgetExceeded {
                stage,
                attempts,
                last_error,
            } => write!(f, "{stage} request failed {attempts} times: {last_error}"),
            Self::IterationCeiling { limit } => write!(f, "iteration ceiling of {limit} reached"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Provider { stage, message } => write!(f, "provider error during {stage}: {message}"),
            Self::Toolchain { stage, message } => write!(f, "toolchain error during {stage}: {message}"),
            Self::Template { message } => write!(f, "template error: {message}"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

/// Per-stage counters; never reset during a unit's life
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    /// Provider attempts for the initial generation
    pub generate: u32,
    /// Fix revisions requested
    pub fix: u32,
    /// Refinement revisions requested
    pub refine: u32,
    /// Provider attempts across all stages
    pub provider_attempts: u32,
}

/// Working state of one unit while it moves through the pipeline
///
/// Holds shared references to the latest artifact and reports; the store
/// owns the history.
#[derive(Debug, Clone)]
pub struct PipelineState {
    unit: UnitId,
    phase: UnitPhase,
    counters: StageCounters,
    iterations: u32,
    artifact: Option<Arc<TestArtifact>>,
    build: Option<Arc<BuildReport>>,
    coverage: Option<Arc<CoverageReport>>,
    reason: Option<TerminationReason>,
}

impl PipelineState {
    /// Fresh state in GENERATING
    #[must_use]
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            phase: UnitPhase::Generating,
            counters: StageCounters::default(),
            iterations: 0,
            artifact: None,
            build: None,
            coverage: None,
            reason: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> UnitPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn counters(&self) -> StageCounters {
        self.counters
    }

    pub(crate) fn counters_mut(&mut self) -> &mut StageCounters {
        &mut self.counters
    }

    /// Revisions produced so far
    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&Arc<TestArtifact>> {
        self.artifact.as_ref()
    }

    #[must_use]
    pub fn build(&self) -> Option<&Arc<BuildReport>> {
        self.build.as_ref()
    }

    #[must_use]
    pub fn coverage(&self) -> Option<&Arc<CoverageReport>> {
        self.coverage.as_ref()
    }

    #[must_use]
    pub fn reason(&self) -> Option<&TerminationReason> {
        self.reason.as_ref()
    }

    /// Replace the current artifact with a new revision
    pub fn set_artifact(&mut self, artifact: Arc<TestArtifact>) {
        self.iterations += 1;
        self.build = None;
        self.coverage = None;
        self.artifact = Some(artifact);
    }

    pub fn set_build(&mut self, report: Arc<BuildReport>) {
        self.build = Some(report);
    }

    pub fn set_coverage(&mut self, report: Arc<CoverageReport>) {
        self.coverage = Some(report);
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] and leaves the state unchanged when the
    /// move is not allowed.
    pub fn advance(&mut self, to: UnitPhase) -> Result<(), IllegalTransition> {
        validate_transition(self.phase, to)?;
        tracing::debug!(unit = %self.unit, from = %self.phase, to = %to, "state transition");
        self.phase = to;
        Ok(())
    }

    /// Enter a terminal state with a reason
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] when already terminal.
    pub fn terminate(&mut self, to: UnitPhase, reason: TerminationReason) -> Result<(), IllegalTransition> {
        self.advance(to)?;
        self.reason = Some(reason);
        Ok(())
    }

    /// Terminal state forced after an internal fault
    pub(crate) fn force_failed(&mut self, reason: TerminationReason) {
        tracing::error!(unit = %self.unit, from = %self.phase, reason = %reason, "forcing unit to FAILED");
        self.phase = UnitPhase::Failed;
        self.reason = Some(reason);
    }
}
