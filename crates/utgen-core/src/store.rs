//! Artifact store
//!
//! Holds every revision of every unit's generated tests together with the
//! build and coverage reports produced for them. Writes for one unit are
//! serialized by the map shard lock; workers on different units do not
//! contend beyond that.
//!
//! # Invariants
//! - Revisions of a unit are committed in order, starting at 0, without gaps
//! - Coverage is only accepted for a revision whose build succeeded
//! - The best-known revision is the measured revision with the highest
//!   combined line + branch ratio (first one wins ties)

use crate::error::StoreError;
use crate::state::{TerminationReason, UnitPhase};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use utgen_artifact::{BuildReport, CoverageReport, TestArtifact, UnitId};

/// Final disposition of a unit as committed to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalRecord {
    pub phase: UnitPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TerminationReason>,
    /// Revision whose text is the unit's output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_revision: Option<u32>,
}

/// Everything stored for one unit
#[derive(Debug, Clone, Default)]
pub struct UnitRecord {
    history: Vec<Arc<TestArtifact>>,
    builds: BTreeMap<u32, Arc<BuildReport>>,
    coverage: BTreeMap<u32, Arc<CoverageReport>>,
    best: Option<u32>,
    terminal: Option<TerminalRecord>,
}

impl UnitRecord {
    /// Revision lineage, oldest first
    #[must_use]
    pub fn history(&self) -> &[Arc<TestArtifact>] {
        &self.history
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Arc<TestArtifact>> {
        self.history.last()
    }

    #[must_use]
    pub fn build(&self, revision: u32) -> Option<&Arc<BuildReport>> {
        self.builds.get(&revision)
    }

    #[must_use]
    pub fn coverage(&self, revision: u32) -> Option<&Arc<CoverageReport>> {
        self.coverage.get(&revision)
    }

    #[must_use]
    pub fn terminal(&self) -> Option<&TerminalRecord> {
        self.terminal.as_ref()
    }

    /// Best measured revision, else the last successfully built one, else the latest
    #[must_use]
    pub fn best_known_revision(&self) -> Option<u32> {
        self.best
            .or_else(|| {
                self.builds
                    .iter()
                    .rev()
                    .find(|(_, report)| report.success)
                    .map(|(revision, _)| *revision)
            })
            .or_else(|| self.latest().map(|a| a.revision()))
    }

    #[must_use]
    pub fn best_known(&self) -> Option<&Arc<TestArtifact>> {
        self.best_known_revision()
            .and_then(|r| self.history.get(r as usize))
    }

    /// Artifact chosen as the unit's output once terminal
    #[must_use]
    pub fn final_artifact(&self) -> Option<&Arc<TestArtifact>> {
        self.terminal
            .as_ref()
            .and_then(|t| t.final_revision)
            .and_then(|r| self.history.get(r as usize))
    }
}

/// Concurrent store of unit records
#[derive(Debug, Default)]
pub struct ArtifactStore {
    units: DashMap<UnitId, UnitRecord>,
}

impl ArtifactStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a unit with an empty record
    pub fn begin(&self, unit: &UnitId) {
        self.units.insert(unit.clone(), UnitRecord::default());
    }

    /// Commit the next revision
    ///
    /// # Errors
    /// - [`StoreError::UnknownUnit`] if [`ArtifactStore::begin`] was not called
    /// - [`StoreError::NonMonotonicRevision`] if the revision is out of order
    pub fn commit(&self, unit: &UnitId, artifact: TestArtifact) -> Result<Arc<TestArtifact>, StoreError> {
        let mut record = self
            .units
            .get_mut(unit)
            .ok_or_else(|| StoreError::UnknownUnit(unit.clone()))?;
        let expected = u32::try_from(record.history.len()).unwrap_or(u32::MAX);
        if artifact.revision() != expected {
            return Err(StoreError::NonMonotonicRevision {
                unit: unit.clone(),
                expected,
                actual: artifact.revision(),
            });
        }
        let artifact = Arc::new(artifact);
        record.history.push(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Record the build outcome of a committed revision
    ///
    /// # Errors
    /// - [`StoreError::UnknownUnit`] for an unknown unit
    /// - [`StoreError::UnknownRevision`] if the revision was never committed
    pub fn record_build(&self, unit: &UnitId, report: BuildReport) -> Result<Arc<BuildReport>, StoreError> {
        let mut record = self
            .units
            .get_mut(unit)
            .ok_or_else(|| StoreError::UnknownUnit(unit.clone()))?;
        if report.revision as usize >= record.history.len() {
            return Err(StoreError::UnknownRevision {
                unit: unit.clone(),
                revision: report.revision,
            });
        }
        let report = Arc::new(report);
        record.builds.insert(report.revision, Arc::clone(&report));
        Ok(report)
    }

    /// Record coverage of a successfully built revision
    ///
    /// # Errors
    /// - [`StoreError::UnknownUnit`] for an unknown unit
    /// - [`StoreError::RevisionNotBuilt`] unless the revision built successfully
    pub fn record_coverage(
        &self,
        unit: &UnitId,
        report: CoverageReport,
    ) -> Result<Arc<CoverageReport>, StoreError> {
        let mut record = self
            .units
            .get_mut(unit)
            .ok_or_else(|| StoreError::UnknownUnit(unit.clone()))?;
        let revision = report.revision;
        if !record.builds.get(&revision).is_some_and(|b| b.success) {
            return Err(StoreError::RevisionNotBuilt {
                unit: unit.clone(),
                revision,
            });
        }

        let report = Arc::new(report);
        let improves = record
            .best
            .and_then(|best| record.coverage.get(&best))
            .map_or(true, |best| report.score() > best.score());
        record.coverage.insert(revision, Arc::clone(&report));
        if improves {
            record.best = Some(revision);
        }
        Ok(report)
    }

    /// Commit the terminal state of a unit
    ///
    /// The final revision is the latest one for CONVERGED units and the
    /// best-known one otherwise.
    ///
    /// # Errors
    /// - [`StoreError::UnknownUnit`] for an unknown unit
    /// - [`StoreError::NotTerminal`] for a non-terminal phase
    pub fn finish(
        &self,
        unit: &UnitId,
        phase: UnitPhase,
        reason: Option<TerminationReason>,
    ) -> Result<TerminalRecord, StoreError> {
        if !phase.is_terminal() {
            return Err(StoreError::NotTerminal {
                unit: unit.clone(),
                phase,
            });
        }
        let mut record = self
            .units
            .get_mut(unit)
            .ok_or_else(|| StoreError::UnknownUnit(unit.clone()))?;
        let final_revision = if phase == UnitPhase::Converged {
            record.latest().map(|a| a.revision())
        } else {
            record.best_known_revision()
        };
        let terminal = TerminalRecord {
            phase,
            reason,
            final_revision,
        };
        record.terminal = Some(terminal.clone());
        Ok(terminal)
    }

    /// Snapshot of one unit's record
    #[must_use]
    pub fn record(&self, unit: &UnitId) -> Option<UnitRecord> {
        self.units.get(unit).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn latest(&self, unit: &UnitId) -> Option<Arc<TestArtifact>> {
        self.units.get(unit).and_then(|r| r.latest().cloned())
    }

    #[must_use]
    pub fn best_known(&self, unit: &UnitId) -> Option<Arc<TestArtifact>> {
        self.units.get(unit).and_then(|r| r.best_known().cloned())
    }

    #[must_use]
    pub fn final_artifact(&self, unit: &UnitId) -> Option<Arc<TestArtifact>> {
        self.units.get(unit).and_then(|r| r.final_artifact().cloned())
    }

    #[must_use]
    pub fn coverage(&self, unit: &UnitId, revision: u32) -> Option<Arc<CoverageReport>> {
        self.units.get(unit).and_then(|r| r.coverage(revision).cloned())
    }

    /// Stored unit ids in order
    #[must_use]
    pub fn units(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Write every revision and report under `dir`
    ///
    /// Layout per unit: `<slug>/rev<NNN>_<stage>.<ext>`,
    /// `<slug>/rev<NNN>.build.log`, `<slug>/rev<NNN>.coverage.json` and
    /// `<slug>/outcome.json`.
    ///
    /// # Errors
    /// [`StoreError::Io`] or [`StoreError::Serialize`] on failure.
    pub fn export_history(&self, dir: &Path) -> Result<usize, StoreError> {
        let mut written = 0;
        for unit in self.units() {
            let Some(record) = self.record(&unit) else {
                continue;
            };
            let unit_dir = dir.join(unit.slug());
            std::fs::create_dir_all(&unit_dir).map_err(|e| StoreError::io_error(&unit_dir, e))?;
            let ext = Path::new(unit.as_str())
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("cpp");

            for artifact in record.history() {
                let rev = artifact.revision();
                let path = unit_dir.join(format!("rev{rev:03}_{}.{ext}", artifact.stage()));
                write_file(&path, artifact.text())?;
                written += 1;
                if let Some(build) = record.build(rev) {
                    write_file(&unit_dir.join(format!("rev{rev:03}.build.log")), &build.log)?;
                    written += 1;
                }
                if let Some(coverage) = record.coverage(rev) {
                    let json = serde_json::to_string_pretty(coverage.as_ref())?;
                    write_file(&unit_dir.join(format!("rev{rev:03}.coverage.json")), &json)?;
                    written += 1;
                }
            }
            if let Some(terminal) = record.terminal() {
                let json = serde_json::to_string_pretty(terminal)?;
                write_file(&unit_dir.join("outcome.json"), &json)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), StoreError> {
    std::fs::write(path, contents).map_err(|e| StoreError::io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utgen_artifact::Stage;

    fn unit() -> UnitId {
        UnitId::new("src/calculator.cpp")
    }

    fn started() -> (ArtifactStore, Arc<TestArtifact>) {
        let store = ArtifactStore::new();
        store.begin(&unit());
        let rev0 = store.commit(&unit(), TestArtifact::initial("TEST(A, B) {}")).unwrap();
        (store, rev0)
    }

    #[test]
    fn revisions_must_be_contiguous() {
        let (store, rev0) = started();
        let rev1 = rev0.next(Stage::Fix, "v1").unwrap();
        let rev2 = rev1.next(Stage::Fix, "v2").unwrap();
        assert!(matches!(
            store.commit(&unit(), rev2.clone()),
            Err(StoreError::NonMonotonicRevision { expected: 1, actual: 2, .. })
        ));
        store.commit(&unit(), rev1).unwrap();
        store.commit(&unit(), rev2).unwrap();
        assert_eq!(store.latest(&unit()).unwrap().revision(), 2);
        assert_eq!(store.record(&unit()).unwrap().history().len(), 3);
    }

    #[test]
    fn unknown_unit_rejected() {
        let store = ArtifactStore::new();
        assert!(matches!(
            store.commit(&unit(), TestArtifact::initial("x")),
            Err(StoreError::UnknownUnit(_))
        ));
    }

    #[test]
    fn coverage_requires_successful_build() {
        let (store, _) = started();
        let coverage = CoverageReport::new(0, 0.5, 0.5);
        assert!(matches!(
            store.record_coverage(&unit(), coverage.clone()),
            Err(StoreError::RevisionNotBuilt { revision: 0, .. })
        ));

        store
            .record_build(&unit(), BuildReport::failed(0, Some(1), "boom", vec![]))
            .unwrap();
        assert!(store.record_coverage(&unit(), coverage.clone()).is_err());

        store.record_build(&unit(), BuildReport::passed(0, "ok")).unwrap();
        store.record_coverage(&unit(), coverage).unwrap();
    }

    #[test]
    fn build_for_uncommitted_revision_rejected() {
        let (store, _) = started();
        assert!(matches!(
            store.record_build(&unit(), BuildReport::passed(3, "")),
            Err(StoreError::UnknownRevision { revision: 3, .. })
        ));
    }

    #[test]
    fn best_known_tracks_highest_score() {
        let (store, rev0) = started();
        store.record_build(&unit(), BuildReport::passed(0, "")).unwrap();
        store.record_coverage(&unit(), CoverageReport::new(0, 0.6, 0.4)).unwrap();

        let rev1 = store.commit(&unit(), rev0.next(Stage::Refine, "better").unwrap()).unwrap();
        store.record_build(&unit(), BuildReport::passed(1, "")).unwrap();
        store.record_coverage(&unit(), CoverageReport::new(1, 0.7, 0.5)).unwrap();

        let rev2 = store.commit(&unit(), rev1.next(Stage::Refine, "broken").unwrap()).unwrap();
        store
            .record_build(&unit(), BuildReport::failed(2, Some(1), "", vec![]))
            .unwrap();

        assert_eq!(store.latest(&unit()).unwrap().revision(), rev2.revision());
        assert_eq!(store.best_known(&unit()).unwrap().revision(), 1);

        let terminal = store
            .finish(&unit(), UnitPhase::Exhausted, Some(TerminationReason::RefineBudgetExceeded { attempts: 2 }))
            .unwrap();
        assert_eq!(terminal.final_revision, Some(1));
        assert_eq!(store.final_artifact(&unit()).unwrap().text(), "better");
    }

    #[test]
    fn best_known_without_coverage_prefers_built_revision() {
        let (store, rev0) = started();
        store.record_build(&unit(), BuildReport::passed(0, "")).unwrap();
        store.commit(&unit(), rev0.next(Stage::Fix, "later").unwrap()).unwrap();
        assert_eq!(store.best_known(&unit()).unwrap().revision(), 0);
    }

    #[test]
    fn finish_requires_terminal_phase() {
        let (store, _) = started();
        assert!(matches!(
            store.finish(&unit(), UnitPhase::Fixing, None),
            Err(StoreError::NotTerminal { .. })
        ));
        let terminal = store.finish(&unit(), UnitPhase::Converged, None).unwrap();
        assert_eq!(terminal.final_revision, Some(0));
    }

    #[test]
    fn export_writes_lineage() {
        let (store, rev0) = started();
        store.record_build(&unit(), BuildReport::failed(0, Some(2), "error: x", vec![])).unwrap();
        store.commit(&unit(), rev0.next(Stage::Fix, "fixed").unwrap()).unwrap();
        store.record_build(&unit(), BuildReport::passed(1, "ok")).unwrap();
        store.record_coverage(&unit(), CoverageReport::new(1, 0.9, 0.8)).unwrap();
        store.finish(&unit(), UnitPhase::Converged, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = store.export_history(dir.path()).unwrap();
        assert_eq!(written, 6);

        let unit_dir = dir.path().join(unit().slug());
        assert_eq!(
            std::fs::read_to_string(unit_dir.join("rev001_fix.cpp")).unwrap(),
            "fixed"
        );
        assert!(unit_dir.join("rev000_generate.cpp").is_file());
        assert!(unit_dir.join("rev000.build.log").is_file());
        let outcome = std::fs::read_to_string(unit_dir.join("outcome.json")).unwrap();
        assert!(outcome.contains("CONVERGED"));
    }
}
