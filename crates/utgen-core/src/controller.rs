//! Pipeline controller
//!
//! Drives every unit through GENERATING, FIXING, MEASURING and REFINING until
//! it reaches a terminal state. A bounded pool of workers pulls units from a
//! shared queue; each worker finishes one unit before taking the next.
//!
//! The only suspension points are the three adapter calls and the delays
//! between retries. All of them go through [`retry`], which also observes
//! cancellation, so a cancelled run drains quickly with every in-flight unit
//! ending EXHAUSTED.

use crate::aggregator::{ReportAggregator, RunSummary, UnitOutcome};
use crate::config::GeneratorConfig;
use crate::error::PipelineError;
use crate::retry::{retry, RetryError};
use crate::state::{PipelineState, TerminationReason, UnitPhase};
use crate::store::ArtifactStore;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use utgen_artifact::{render_signatures, CoverageReport, SourceUnit, Stage, TestArtifact};
use utgen_prompt::{
    extract_code_block, placeholders as ph, Placeholders, TemplateRegistry, BUILD_ISSUE_FIXING,
    INITIAL_TEST_GENERATION, PIPELINE_BINDINGS, TEST_REFINEMENT,
};
use utgen_provider::{CompletionClient, ProviderError};
use utgen_toolchain::{BuildRunner, CoverageProbe, ToolchainError};

const NONE: &str = "(none)";
const TRUNCATED: &str = "... (truncated)\n";

/// A step that ends the unit
#[derive(Debug)]
struct Stop {
    phase: UnitPhase,
    reason: TerminationReason,
}

impl Stop {
    fn exhausted(reason: TerminationReason) -> Self {
        Self {
            phase: UnitPhase::Exhausted,
            reason,
        }
    }

    fn failed(reason: TerminationReason) -> Self {
        Self {
            phase: UnitPhase::Failed,
            reason,
        }
    }

    fn internal(error: impl Display) -> Self {
        Self::failed(TerminationReason::Internal {
            message: error.to_string(),
        })
    }

    fn toolchain(stage: Stage, error: RetryError<ToolchainError>) -> Self {
        match error {
            RetryError::Cancelled { .. } => Self::exhausted(TerminationReason::Cancelled),
            RetryError::Fatal { error, .. } | RetryError::Exhausted { last: error, .. } => {
                Self::failed(TerminationReason::Toolchain {
                    stage,
                    message: error.to_string(),
                })
            }
        }
    }
}

type StepResult = Result<UnitPhase, Stop>;

/// Runs the synthesis pipeline over a set of units
#[derive(Debug, Clone)]
pub struct PipelineController {
    config: Arc<GeneratorConfig>,
    templates: Arc<TemplateRegistry>,
    client: Arc<dyn CompletionClient>,
    builder: Arc<dyn BuildRunner>,
    coverage: Arc<dyn CoverageProbe>,
    store: Arc<ArtifactStore>,
    aggregator: Arc<ReportAggregator>,
}

impl PipelineController {
    /// Create a controller
    ///
    /// # Errors
    /// - [`PipelineError::Config`] if the configuration is invalid
    /// - [`PipelineError::Template`] if a required template is missing or
    ///   uses a placeholder its stage cannot supply
    pub fn new(
        config: Arc<GeneratorConfig>,
        templates: Arc<TemplateRegistry>,
        client: Arc<dyn CompletionClient>,
        builder: Arc<dyn BuildRunner>,
        coverage: Arc<dyn CoverageProbe>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        templates.validate(PIPELINE_BINDINGS)?;
        let generation = &config.generation_settings;
        let aggregator = ReportAggregator::new(
            generation.target_line_coverage,
            generation.target_branch_coverage,
        );
        Ok(Self {
            config,
            templates,
            client,
            builder,
            coverage,
            store: Arc::new(ArtifactStore::new()),
            aggregator: Arc::new(aggregator),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn aggregator(&self) -> &Arc<ReportAggregator> {
        &self.aggregator
    }

    /// Process every unit to a terminal state and summarize
    ///
    /// Duplicate unit ids are processed once. Cancelling `cancel` (or the
    /// configured run timeout elapsing) ends in-flight units as EXHAUSTED.
    pub async fn run(&self, units: Vec<SourceUnit>, cancel: &CancellationToken) -> RunSummary {
        let mut seen = HashSet::new();
        let units: Vec<Arc<SourceUnit>> = units
            .into_iter()
            .filter(|u| seen.insert(u.id().clone()))
            .map(Arc::new)
            .collect();
        if units.is_empty() {
            return self.aggregator.summary();
        }

        let cancel = cancel.child_token();
        let timer = self.config.run_timeout().map(|limit| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(limit) => {
                        tracing::warn!(limit_secs = limit.as_secs(), "run timeout reached, cancelling");
                        token.cancel();
                    }
                }
            })
        });

        let workers = self.config.pipeline_settings.workers.clamp(1, units.len());
        tracing::info!(
            run_id = %self.aggregator.run_id(),
            units = units.len(),
            workers,
            provider = self.client.name(),
            "starting run"
        );

        let queue = Arc::new(Mutex::new(units.iter().cloned().collect::<VecDeque<_>>()));
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let controller = self.clone();
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            pool.spawn(async move {
                loop {
                    let next = queue.lock().pop_front();
                    let Some(unit) = next else { break };
                    tracing::debug!(worker, unit = %unit.id(), "worker picked unit");
                    controller.run_unit(&unit, &cancel).await;
                }
            });
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "worker stopped abnormally");
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        // Units left behind by a crashed worker still need a terminal record
        for unit in &units {
            if !self.aggregator.contains(unit.id()) {
                let mut state = PipelineState::new(unit.id().clone());
                state.force_failed(TerminationReason::Internal {
                    message: "worker stopped before the unit finished".into(),
                });
                if self.store.record(unit.id()).is_none() {
                    self.store.begin(unit.id());
                }
                self.finish(&state);
            }
        }

        let summary = self.aggregator.summary();
        tracing::info!(
            run_id = %summary.run_id,
            converged = summary.converged,
            exhausted = summary.exhausted,
            failed = summary.failed,
            "run finished"
        );
        summary
    }

    /// Drive one unit to a terminal state
    pub async fn run_unit(&self, unit: &SourceUnit, cancel: &CancellationToken) -> UnitOutcome {
        let span = tracing::info_span!("unit", unit = %unit.id());
        self.drive(unit, cancel).instrument(span).await
    }

    async fn drive(&self, unit: &SourceUnit, cancel: &CancellationToken) -> UnitOutcome {
        self.store.begin(unit.id());
        let mut state = PipelineState::new(unit.id().clone());
        tracing::info!("unit started");

        loop {
            let step = match state.phase() {
                UnitPhase::Generating => self.generate(unit, &mut state, cancel).await,
                UnitPhase::Fixing => self.fix(unit, &mut state, cancel).await,
                UnitPhase::Measuring => self.measure(unit, &mut state, cancel).await,
                UnitPhase::Refining => self.refine(unit, &mut state, cancel).await,
                UnitPhase::Converged | UnitPhase::Exhausted | UnitPhase::Failed => break,
            };
            let moved = match step {
                Ok(to) => state.advance(to),
                Err(stop) => state.terminate(stop.phase, stop.reason),
            };
            if let Err(illegal) = moved {
                state.force_failed(TerminationReason::Internal {
                    message: illegal.to_string(),
                });
            }
        }

        self.finish(&state)
    }

    async fn generate(&self, unit: &SourceUnit, state: &mut PipelineState, cancel: &CancellationToken) -> StepResult {
        self.check_ceiling(state)?;
        let generation = &self.config.generation_settings;
        let signatures = if unit.signatures().is_empty() {
            "(none detected)".to_string()
        } else {
            render_signatures(unit.signatures())
        };
        let values = self
            .unit_values(unit)
            .with(ph::SIGNATURES, signatures)
            .with(ph::MAX_TESTS_PER_FUNCTION, generation.max_tests_per_function.to_string())
            .with(ph::TEST_GUIDANCE, self.config.test_guidance());

        let prompt = self.fill(INITIAL_TEST_GENERATION, &values)?;
        let text = self.request(Stage::Generate, &prompt, state, cancel).await?;
        self.commit(state, TestArtifact::initial(text))?;
        Ok(UnitPhase::Fixing)
    }

    async fn fix(&self, unit: &SourceUnit, state: &mut PipelineState, cancel: &CancellationToken) -> StepResult {
        let artifact = current(state)?;
        let revision = artifact.revision();
        let builder: &dyn BuildRunner = self.builder.as_ref();
        let target: &TestArtifact = &artifact;

        let built = retry(&self.config.retry_policy(), cancel, "build", move |_| {
            builder.build_and_run(unit, target)
        })
        .await
        .map_err(|err| Stop::toolchain(Stage::Fix, err))?;

        let report = self
            .store
            .record_build(state.unit(), built.value)
            .map_err(Stop::internal)?;
        state.set_build(Arc::clone(&report));
        if report.success {
            tracing::info!(revision, "build passed");
            return Ok(UnitPhase::Measuring);
        }
        tracing::info!(revision, errors = report.error_count(), "build failed");

        let fixes = state.counters().fix;
        if fixes >= self.config.pipeline_settings.max_fix_attempts {
            return Err(Stop::exhausted(TerminationReason::FixBudgetExceeded { attempts: fixes }));
        }
        self.check_ceiling(state)?;
        state.counters_mut().fix += 1;

        let diagnostics = if report.diagnostics.is_empty() {
            NONE.to_string()
        } else {
            report.render_diagnostics()
        };
        let values = self
            .unit_values(unit)
            .with(ph::TEST_CODE, artifact.text())
            .with(ph::BUILD_LOG, log_tail(&report.log, self.config.pipeline_settings.prompt_log_limit))
            .with(ph::DIAGNOSTICS, diagnostics);

        let prompt = self.fill(BUILD_ISSUE_FIXING, &values)?;
        let text = self.request(Stage::Fix, &prompt, state, cancel).await?;
        let next = artifact.next(Stage::Fix, text).map_err(Stop::internal)?;
        self.commit(state, next)?;
        Ok(UnitPhase::Fixing)
    }

    async fn measure(&self, unit: &SourceUnit, state: &mut PipelineState, cancel: &CancellationToken) -> StepResult {
        let artifact = current(state)?;
        let probe: &dyn CoverageProbe = self.coverage.as_ref();
        let target: &TestArtifact = &artifact;

        let measured = retry(&self.config.retry_policy(), cancel, "coverage", move |_| {
            probe.measure(unit, target)
        })
        .await
        .map_err(|err| Stop::toolchain(Stage::Measure, err))?;

        let report = self
            .store
            .record_coverage(state.unit(), measured.value)
            .map_err(Stop::internal)?;
        state.set_coverage(Arc::clone(&report));

        let generation = &self.config.generation_settings;
        let met = report.meets(generation.target_line_coverage, generation.target_branch_coverage);
        tracing::info!(
            revision = report.revision,
            line = %percent(report.line_percent()),
            branch = %percent(report.branch_percent()),
            met,
            "coverage measured"
        );
        Ok(if met { UnitPhase::Converged } else { UnitPhase::Refining })
    }

    async fn refine(&self, unit: &SourceUnit, state: &mut PipelineState, cancel: &CancellationToken) -> StepResult {
        let artifact = current(state)?;
        let coverage = state
            .coverage()
            .cloned()
            .ok_or_else(|| Stop::internal("refinement requested without a coverage report"))?;

        let refinements = state.counters().refine;
        if refinements >= self.config.pipeline_settings.max_refine_attempts {
            return Err(Stop::exhausted(TerminationReason::RefineBudgetExceeded {
                attempts: refinements,
            }));
        }
        self.check_ceiling(state)?;
        state.counters_mut().refine += 1;

        let values = self.refinement_values(unit, &artifact, &coverage);
        let prompt = self.fill(TEST_REFINEMENT, &values)?;
        let text = self.request(Stage::Refine, &prompt, state, cancel).await?;
        let next = artifact.next(Stage::Refine, text).map_err(Stop::internal)?;
        self.commit(state, next)?;
        Ok(UnitPhase::Fixing)
    }

    /// Request a completion under the retry policy and extract its test code
    async fn request(
        &self,
        stage: Stage,
        prompt: &str,
        state: &mut PipelineState,
        cancel: &CancellationToken,
    ) -> Result<String, Stop> {
        let client: &dyn CompletionClient = self.client.as_ref();
        let options = &self.config.completion_options();

        let result = retry(&self.config.retry_policy(), cancel, stage.as_str(), move |attempt| async move {
            tracing::debug!(%stage, attempt, "requesting completion");
            let response = client.complete(prompt, options).await?;
            extract_code_block(&response)
                .ok_or_else(|| ProviderError::transient(format!("{} returned no test code", client.name())))
        })
        .await;

        let attempts = match &result {
            Ok(retried) => retried.attempts,
            Err(err) => err.attempts(),
        };
        let counters = state.counters_mut();
        counters.provider_attempts += attempts;
        if stage == Stage::Generate {
            counters.generate += attempts;
        }

        match result {
            Ok(retried) => Ok(retried.value),
            Err(RetryError::Exhausted { attempts, last }) => {
                Err(Stop::exhausted(TerminationReason::RetryBudgetExceeded {
                    stage,
                    attempts,
                    last_error: last.to_string(),
                }))
            }
            Err(RetryError::Fatal { error, .. }) => Err(Stop::failed(TerminationReason::Provider {
                stage,
                message: error.to_string(),
            })),
            Err(RetryError::Cancelled { .. }) => Err(Stop::exhausted(TerminationReason::Cancelled)),
        }
    }

    fn check_ceiling(&self, state: &PipelineState) -> Result<(), Stop> {
        let limit = self.config.pipeline_settings.max_iterations;
        if state.iterations() >= limit {
            Err(Stop::exhausted(TerminationReason::IterationCeiling { limit }))
        } else {
            Ok(())
        }
    }

    fn fill(&self, task: &str, values: &Placeholders) -> Result<String, Stop> {
        self.templates.fill(task, values).map_err(|err| {
            Stop::failed(TerminationReason::Template {
                message: err.to_string(),
            })
        })
    }

    fn commit(&self, state: &mut PipelineState, artifact: TestArtifact) -> Result<(), Stop> {
        let stored = self
            .store
            .commit(state.unit(), artifact)
            .map_err(Stop::internal)?;
        tracing::debug!(revision = stored.revision(), stage = %stored.stage(), hash = %stored.hash(), "revision committed");
        state.set_artifact(stored);
        Ok(())
    }

    /// Values every template may use
    fn unit_values(&self, unit: &SourceUnit) -> Placeholders {
        let file_name = unit
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_else(|| unit.id().as_str());
        Placeholders::new()
            .with(ph::SOURCE_CODE, unit.source())
            .with(ph::CODE_CONTENT, unit.source())
            .with(ph::ORIGINAL_CODE, unit.source())
            .with(ph::ORIGINAL_FILENAME, file_name)
    }

    fn refinement_values(&self, unit: &SourceUnit, artifact: &TestArtifact, coverage: &CoverageReport) -> Placeholders {
        let generation = &self.config.generation_settings;
        let lines = if coverage.uncovered_lines.is_empty() {
            NONE.to_string()
        } else {
            coverage
                .uncovered_lines
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let branches = if coverage.uncovered_branches.is_empty() {
            NONE.to_string()
        } else {
            coverage.uncovered_branches.join(", ")
        };
        self.unit_values(unit)
            .with(ph::TEST_CODE, artifact.text())
            .with(ph::MAX_TESTS_PER_FUNCTION, generation.max_tests_per_function.to_string())
            .with(ph::TEST_GUIDANCE, self.config.test_guidance())
            .with(ph::UNCOVERED_LINES, lines)
            .with(ph::UNCOVERED_BRANCHES, branches)
            .with(ph::LINE_COVERAGE, percent(coverage.line_percent()))
            .with(ph::BRANCH_COVERAGE, percent(coverage.branch_percent()))
            .with(ph::TARGET_LINE_COVERAGE, format!("{}%", generation.target_line_coverage))
            .with(ph::TARGET_BRANCH_COVERAGE, format!("{}%", generation.target_branch_coverage))
    }

    /// Commit the terminal state to the store and the aggregator
    fn finish(&self, state: &PipelineState) -> UnitOutcome {
        let reason = state.reason().cloned();
        let final_revision = match self.store.finish(state.unit(), state.phase(), reason.clone()) {
            Ok(terminal) => terminal.final_revision,
            Err(err) => {
                tracing::error!(error = %err, "cannot record terminal state");
                state.artifact().map(|a| a.revision())
            }
        };
        let coverage = final_revision
            .and_then(|r| self.store.coverage(state.unit(), r))
            .map(|c| c.as_ref().clone());

        let outcome = UnitOutcome {
            unit: state.unit().clone(),
            state: state.phase(),
            reason,
            coverage,
            iterations: state.iterations(),
            counters: state.counters(),
            final_revision,
        };
        if let Err(err) = self.aggregator.record_outcome(outcome.clone()) {
            tracing::error!(error = %err, "cannot record unit outcome");
        }

        match (&outcome.reason, &outcome.coverage) {
            (None, Some(coverage)) if outcome.converged() => tracing::info!(
                iterations = outcome.iterations,
                line = %percent(coverage.line_percent()),
                branch = %percent(coverage.branch_percent()),
                "unit converged"
            ),
            (reason, _) => tracing::warn!(
                state = %outcome.state,
                iterations = outcome.iterations,
                reason = reason.as_ref().map_or_else(String::new, ToString::to_string),
                "unit did not converge"
            ),
        }
        outcome
    }
}

fn current(state: &PipelineState) -> Result<Arc<TestArtifact>, Stop> {
    state
        .artifact()
        .cloned()
        .ok_or_else(|| Stop::internal(format!("{} without a test artifact", state.phase())))
}

fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Last `limit` characters of a build log
fn log_tail(log: &str, limit: usize) -> String {
    let count = log.chars().count();
    if count <= limit {
        return log.to_string();
    }
    let start = log
        .char_indices()
        .nth(count - limit)
        .map_or(log.len(), |(i, _)| i);
    format!("{TRUNCATED}{}", &log[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_logs_are_kept_whole() {
        assert_eq!(log_tail("error: x\n", 100), "error: x\n");
    }

    #[test]
    fn long_logs_keep_the_tail() {
        let log = format!("{}final error", "x".repeat(50));
        let tail = log_tail(&log, 11);
        assert_eq!(tail, format!("{TRUNCATED}final error"));
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let tail = log_tail("ééééé", 2);
        assert!(tail.ends_with("éé"));
    }

    #[test]
    fn percent_has_one_decimal() {
        assert_eq!(percent(62.5), "62.5%");
        assert_eq!(percent(80.0), "80.0%");
    }
}
