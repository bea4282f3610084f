//! Run report aggregator
//!
//! Collects one terminal outcome per unit, in whatever order workers finish,
//! and derives the run summary from them. Recording is last-write-wins, so
//! recording the same outcome twice leaves the summary unchanged.

use crate::error::StoreError;
use crate::state::{StageCounters, TerminationReason, UnitPhase};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use ulid::Ulid;
use utgen_artifact::{CoverageReport, UnitId};

/// Terminal outcome of one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutcome {
    pub unit: UnitId,
    pub state: UnitPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminationReason>,
    /// Coverage of the final artifact, when it was measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
    pub iterations: u32,
    pub counters: StageCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_revision: Option<u32>,
}

impl UnitOutcome {
    /// Outcome with only state, coverage and iteration count
    #[must_use]
    pub fn new(unit: UnitId, state: UnitPhase, coverage: Option<CoverageReport>, iterations: u32) -> Self {
        Self {
            unit,
            state,
            reason: None,
            coverage,
            iterations,
            counters: StageCounters::default(),
            final_revision: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: TerminationReason) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.state == UnitPhase::Converged
    }
}

/// Mean and minimum coverage over the measured units (ratios)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageStats {
    pub measured: usize,
    pub mean_line: f64,
    pub mean_branch: f64,
    pub min_line: f64,
    pub min_branch: f64,
}

/// Summary of a whole run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Percent
    pub target_line_coverage: f64,
    /// Percent
    pub target_branch_coverage: f64,
    pub total: usize,
    pub converged: usize,
    pub exhausted: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageStats>,
    /// Mean coverage meets both targets; informational only
    pub aggregate_meets_targets: bool,
    pub units: Vec<UnitOutcome>,
}

impl RunSummary {
    /// Every unit converged (and there was at least one)
    #[must_use]
    pub fn all_converged(&self) -> bool {
        self.total > 0 && self.converged == self.total
    }

    /// Outcome for one unit
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&UnitOutcome> {
        self.units.iter().find(|u| &u.unit == id)
    }
}

/// Thread-safe collector of unit outcomes
#[derive(Debug)]
pub struct ReportAggregator {
    run_id: Ulid,
    started_at: DateTime<Utc>,
    target_line: f64,
    target_branch: f64,
    outcomes: Mutex<BTreeMap<UnitId, UnitOutcome>>,
}

impl ReportAggregator {
    /// Create an aggregator for targets given in percent
    #[must_use]
    pub fn new(target_line_coverage: f64, target_branch_coverage: f64) -> Self {
        Self {
            run_id: Ulid::new(),
            started_at: Utc::now(),
            target_line: target_line_coverage,
            target_branch: target_branch_coverage,
            outcomes: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    /// Record a unit's final state
    ///
    /// # Errors
    /// Returns [`StoreError::NotTerminal`] for a non-terminal state.
    pub fn record(
        &self,
        unit: UnitId,
        state: UnitPhase,
        coverage: Option<CoverageReport>,
        iterations: u32,
    ) -> Result<(), StoreError> {
        self.record_outcome(UnitOutcome::new(unit, state, coverage, iterations))
    }

    /// Record a complete outcome, replacing any earlier one for the unit
    ///
    /// # Errors
    /// Returns [`StoreError::NotTerminal`] for a non-terminal state.
    pub fn record_outcome(&self, outcome: UnitOutcome) -> Result<(), StoreError> {
        if !outcome.state.is_terminal() {
            return Err(StoreError::NotTerminal {
                unit: outcome.unit,
                phase: outcome.state,
            });
        }
        self.outcomes.lock().insert(outcome.unit.clone(), outcome);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, unit: &UnitId) -> bool {
        self.outcomes.lock().contains_key(unit)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.lock().is_empty()
    }

    /// Summary of everything recorded so far
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let units: Vec<UnitOutcome> = self.outcomes.lock().values().cloned().collect();
        let count = |phase: UnitPhase| units.iter().filter(|u| u.state == phase).count();

        let measured: Vec<&CoverageReport> = units.iter().filter_map(|u| u.coverage.as_ref()).collect();
        let coverage = coverage_stats(&measured);
        let aggregate_meets_targets = coverage.is_some_and(|c| {
            c.mean_line * 100.0 >= self.target_line && c.mean_branch * 100.0 >= self.target_branch
        });

        RunSummary {
            run_id: self.run_id.to_string(),
            started_at: self.started_at,
            target_line_coverage: self.target_line,
            target_branch_coverage: self.target_branch,
            total: units.len(),
            converged: count(UnitPhase::Converged),
            exhausted: count(UnitPhase::Exhausted),
            failed: count(UnitPhase::Failed),
            coverage,
            aggregate_meets_targets,
            units,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn coverage_stats(reports: &[&CoverageReport]) -> Option<CoverageStats> {
    if reports.is_empty() {
        return None;
    }
    let n = reports.len() as f64;
    let fold_min = |f: fn(&CoverageReport) -> f64| reports.iter().map(|r| f(r)).fold(f64::INFINITY, f64::min);
    Some(CoverageStats {
        measured: reports.len(),
        mean_line: reports.iter().map(|r| r.line_coverage).sum::<f64>() / n,
        mean_branch: reports.iter().map(|r| r.branch_coverage).sum::<f64>() / n,
        min_line: fold_min(|r| r.line_coverage),
        min_branch: fold_min(|r| r.branch_coverage),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> UnitId {
        UnitId::new(name)
    }

    #[test]
    fn identical_record_is_idempotent() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        let coverage = CoverageReport::new(0, 0.9, 0.8);
        aggregator
            .record(id("a.cpp"), UnitPhase::Converged, Some(coverage.clone()), 1)
            .unwrap();
        let first = aggregator.summary();
        aggregator
            .record(id("a.cpp"), UnitPhase::Converged, Some(coverage), 1)
            .unwrap();
        assert_eq!(aggregator.summary(), first);
        assert_eq!(first.total, 1);
    }

    #[test]
    fn last_write_wins() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        aggregator.record(id("a.cpp"), UnitPhase::Exhausted, None, 3).unwrap();
        aggregator
            .record(id("a.cpp"), UnitPhase::Converged, Some(CoverageReport::new(2, 1.0, 1.0)), 3)
            .unwrap();
        let summary = aggregator.summary();
        assert_eq!((summary.converged, summary.exhausted), (1, 0));
    }

    #[test]
    fn rejects_non_terminal_state() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        assert!(aggregator.record(id("a.cpp"), UnitPhase::Refining, None, 1).is_err());
        assert!(aggregator.is_empty());
    }

    #[test]
    fn counts_and_statistics() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        aggregator
            .record(id("b.cpp"), UnitPhase::Converged, Some(CoverageReport::new(0, 0.9, 0.8)), 1)
            .unwrap();
        aggregator
            .record(id("a.cpp"), UnitPhase::Exhausted, Some(CoverageReport::new(3, 0.5, 0.4)), 4)
            .unwrap();
        aggregator
            .record_outcome(
                UnitOutcome::new(id("c.cpp"), UnitPhase::Failed, None, 0)
                    .with_reason(TerminationReason::Cancelled),
            )
            .unwrap();

        let summary = aggregator.summary();
        assert_eq!((summary.total, summary.converged, summary.exhausted, summary.failed), (3, 1, 1, 1));
        assert!(!summary.all_converged());
        assert_eq!(
            summary.units.iter().map(|u| u.unit.as_str()).collect::<Vec<_>>(),
            vec!["a.cpp", "b.cpp", "c.cpp"]
        );

        let stats = summary.coverage.unwrap();
        assert_eq!(stats.measured, 2);
        assert!((stats.mean_line - 0.7).abs() < 1e-9);
        assert!((stats.min_branch - 0.4).abs() < 1e-9);
        assert!(!summary.aggregate_meets_targets);
    }

    #[test]
    fn empty_run_is_not_converged() {
        let summary = ReportAggregator::new(80.0, 70.0).summary();
        assert_eq!(summary.total, 0);
        assert!(summary.coverage.is_none());
        assert!(!summary.all_converged());
    }

    #[test]
    fn summary_serializes_states_in_caps() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        aggregator.record(id("a.cpp"), UnitPhase::Exhausted, None, 2).unwrap();
        let json = serde_json::to_string(&aggregator.summary()).unwrap();
        assert!(json.contains("\"state\":\"EXHAUSTED\""));
        assert!(json.contains(&aggregator.run_id().to_string()));
    }
}
