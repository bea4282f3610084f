//! `utgen generate`

use anyhow::Context;
use clap::ArgMatches;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use utgen_artifact::{discover_units, SourceUnit};
use utgen_core::{ArtifactStore, GeneratorConfig, PipelineController, PipelineError, RunSummary, UnitPhase};
use utgen_prompt::TemplateRegistry;
use utgen_provider::build_client;
use utgen_toolchain::{CmakeSettings, CmakeToolchain};

const WORK_DIR: &str = ".utgen-work";
const HISTORY_DIR: &str = ".history";
const OUTPUT_PROJECT: &str = "generated_tests";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenerateArgs {
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) config: PathBuf,
    pub(crate) instructions: Option<PathBuf>,
    pub(crate) workers: Option<usize>,
    pub(crate) keep_history: bool,
    pub(crate) json: bool,
}

impl GenerateArgs {
    pub(crate) fn from_matches(args: &ArgMatches) -> Self {
        let path = |name: &str| args.get_one::<PathBuf>(name).cloned();
        Self {
            input: path("input").unwrap_or_default(),
            output: path("output").unwrap_or_default(),
            config: path("config").unwrap_or_default(),
            instructions: path("instructions"),
            workers: args.get_one::<usize>("workers").copied(),
            keep_history: args.get_flag("keep-history"),
            json: args.get_flag("json"),
        }
    }
}

pub(crate) async fn run(args: GenerateArgs) -> anyhow::Result<i32> {
    let mut config = GeneratorConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    let mut templates = TemplateRegistry::builtin().context("loading built-in prompt templates")?;
    if let Some(dir) = args
        .instructions
        .clone()
        .or_else(|| config.pipeline_settings.instructions_dir.clone())
    {
        let loaded = templates
            .load_dir(&dir)
            .with_context(|| format!("loading prompt templates from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), loaded, "prompt template overrides loaded");
    }

    let work_dir = config
        .pipeline_settings
        .work_dir
        .clone()
        .unwrap_or_else(|| args.output.join(WORK_DIR));
    let units = discover(&args.input, &config.pipeline_settings.source_extensions, &args.output, &work_dir)?;
    tracing::info!(count = units.len(), input = %args.input.display(), "source units discovered");

    let client = build_client(&config.llm_settings.providers).context("selecting completion provider")?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;
    let settings = CmakeSettings::new(work_dir, config.build_timeout(), config.test_timeout());
    let toolchain = Arc::new(CmakeToolchain::new(settings, &units).context("preparing the build toolchain")?);

    let controller = PipelineController::new(
        Arc::new(config),
        Arc::new(templates),
        client,
        toolchain.clone(),
        toolchain.clone(),
    )?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let summary = controller.run(units.clone(), &cancel).await;
    interrupt.abort();

    let written = write_outputs(&args.output, controller.store(), &units, &toolchain)?;
    tracing::info!(files = written.len(), output = %args.output.display(), "outputs written");
    if args.keep_history {
        let history = args.output.join(HISTORY_DIR);
        let files = controller
            .store()
            .export_history(&history)
            .with_context(|| format!("writing history to {}", history.display()))?;
        tracing::info!(files, dir = %history.display(), "history exported");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary).context("rendering summary")?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(i32::from(!summary.all_converged()))
}

/// Discover the units under `input`, leaving out this tool's own output and work trees
pub(crate) fn discover(
    input: &Path,
    extensions: &[String],
    output: &Path,
    work_dir: &Path,
) -> anyhow::Result<Vec<SourceUnit>> {
    let exclude = [output.to_path_buf(), work_dir.to_path_buf()];
    let units = discover_units(input, extensions, &exclude).with_context(|| format!("scanning {}", input.display()))?;
    if units.is_empty() {
        return Err(PipelineError::NoUnits(input.to_path_buf()).into());
    }
    Ok(units)
}

/// Write each unit's final test file and a project file tying them together
pub(crate) fn write_outputs(
    output: &Path,
    store: &ArtifactStore,
    units: &[SourceUnit],
    toolchain: &CmakeToolchain,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut names = HashSet::new();
    for unit in units {
        let Some(artifact) = store.final_artifact(unit.id()) else {
            tracing::warn!(unit = %unit.id(), "no test artifact produced");
            continue;
        };
        let mut name = unit.test_file_name();
        if !names.insert(name.clone()) {
            // same stem in another directory
            name = format!("test_{}.{}", unit.id().slug(), unit.extension());
            names.insert(name.clone());
        }
        let path = output.join(&name);
        std::fs::write(&path, artifact.text()).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    if !names.is_empty() {
        let mut test_files: Vec<String> = names.into_iter().collect();
        test_files.sort();
        let lists = output.join("CMakeLists.txt");
        let project = toolchain.project(OUTPUT_PROJECT, test_files);
        std::fs::write(&lists, project.render()).with_context(|| format!("writing {}", lists.display()))?;
        written.push(lists);
    }
    Ok(written)
}

/// Human-readable run summary
pub(crate) fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} units: {} converged, {} exhausted, {} failed",
        summary.total, summary.converged, summary.exhausted, summary.failed
    );
    for unit in &summary.units {
        let coverage = unit.coverage.as_ref().map_or_else(String::new, |c| {
            format!(" line {:.1}% branch {:.1}%", c.line_percent(), c.branch_percent())
        });
        match (&unit.state, &unit.reason) {
            (UnitPhase::Converged, _) | (_, None) => {
                let _ = writeln!(
                    out,
                    "  {:<9} {} ({} iterations){coverage}",
                    unit.state, unit.unit, unit.iterations
                );
            }
            (state, Some(reason)) => {
                let _ = writeln!(out, "  {state:<9} {}: {reason}{coverage}", unit.unit);
            }
        }
    }
    if let Some(stats) = &summary.coverage {
        let _ = writeln!(
            out,
            "mean coverage: line {:.1}% branch {:.1}% (targets {}% / {}%)",
            stats.mean_line * 100.0,
            stats.mean_branch * 100.0,
            summary.target_line_coverage,
            summary.target_branch_coverage
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use utgen_artifact::{BuildReport, CoverageReport, Stage, TestArtifact, UnitId};
    use utgen_core::{ReportAggregator, TerminationReason};

    fn unit(root: &Path, name: &str) -> SourceUnit {
        SourceUnit::new(UnitId::new(name), root.join(name), "int f() { return 1; }\n")
    }

    #[test]
    fn writes_final_artifacts_and_project() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let units = vec![unit(&src, "calc.cpp"), unit(&src, "nested/calc.cpp"), unit(&src, "idle.cpp")];

        let store = ArtifactStore::new();
        for u in &units[..2] {
            store.begin(u.id());
            let rev0 = store.commit(u.id(), TestArtifact::initial("TEST(A, B) {}\n")).unwrap();
            store.commit(u.id(), rev0.next(Stage::Fix, "TEST(A, C) {}\n").unwrap()).unwrap();
            store.record_build(u.id(), BuildReport::passed(1, "")).unwrap();
            store.finish(u.id(), UnitPhase::Converged, None).unwrap();
        }

        let settings = CmakeSettings::new(dir.path().join("work"), Duration::from_secs(1), Duration::from_secs(1));
        let toolchain = CmakeToolchain::new(settings, &units).unwrap();
        let written = write_outputs(&out, &store, &units, &toolchain).unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(std::fs::read_to_string(out.join("test_calc.cpp")).unwrap(), "TEST(A, C) {}\n");
        let fallback = format!("test_{}.cpp", UnitId::new("nested/calc.cpp").slug());
        assert!(out.join(fallback).is_file());
        let lists = std::fs::read_to_string(out.join("CMakeLists.txt")).unwrap();
        assert!(lists.contains("project(generated_tests CXX)"));
        assert!(lists.contains("test_calc.cpp"));
        assert!(!out.join("test_idle.cpp").exists());
    }

    #[test]
    fn discovery_skips_previous_outputs_inside_the_input_tree() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path();
        let output = input.join("generated_tests");
        let work = input.join("scratch");
        std::fs::create_dir_all(output.join(WORK_DIR).join("calc")).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        std::fs::write(input.join("calc.cpp"), "int add(int a, int b) { return a + b; }\n").unwrap();
        std::fs::write(output.join("test_calc.cpp"), "TEST(Calc, Add) {}\n").unwrap();
        std::fs::write(output.join(WORK_DIR).join("calc/test_calc.cpp"), "TEST(Calc, Add) {}\n").unwrap();
        std::fs::write(work.join("test_calc.cpp"), "TEST(Calc, Add) {}\n").unwrap();

        let extensions = vec!["cpp".to_string()];
        let units = discover(input, &extensions, &output, &work).unwrap();
        let ids: Vec<_> = units.iter().map(|u| u.id().as_str()).collect();
        assert_eq!(ids, vec!["calc.cpp"]);
    }

    #[test]
    fn discovery_without_sources_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = discover(dir.path(), &["cpp".to_string()], &out, &out.join(WORK_DIR)).unwrap_err();
        assert!(err.downcast_ref::<PipelineError>().is_some_and(|e| matches!(e, PipelineError::NoUnits(_))));
    }

    #[test]
    fn summary_lists_reasons_for_unconverged_units() {
        let aggregator = ReportAggregator::new(80.0, 70.0);
        aggregator
            .record(UnitId::new("a.cpp"), UnitPhase::Converged, Some(CoverageReport::new(0, 0.9, 0.75)), 1)
            .unwrap();
        aggregator
            .record_outcome(
                utgen_core::UnitOutcome::new(UnitId::new("b.cpp"), UnitPhase::Exhausted, None, 4)
                    .with_reason(TerminationReason::FixBudgetExceeded { attempts: 3 }),
            )
            .unwrap();

        let text = render_summary(&aggregator.summary());
        assert!(text.starts_with("2 units: 1 converged, 1 exhausted, 0 failed"));
        assert!(text.contains("CONVERGED a.cpp (1 iterations) line 90.0% branch 75.0%"));
        assert!(text.contains("EXHAUSTED b.cpp: build still failing after 3 fix attempts"));
    }
}
