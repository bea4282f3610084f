//! Testing utilities for the utgen workspace
//!
//! Scripted stand-ins for the three pipeline capabilities, plus fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use utgen_artifact::{
    BuildReport, CoverageReport, Diagnostic, Severity, SourceUnit, TestArtifact, UnitId,
};
use utgen_provider::{CompletionClient, CompletionOptions, ProviderError};
use utgen_toolchain::{BuildRunner, CoverageProbe, ToolchainError};

pub const CALCULATOR_SOURCE: &str = r#"#include "calculator.h"
#include <stdexcept>

int Calculator::add(int a, int b) { return a + b; }

int Calculator::divide(int a, int b) {
    if (b == 0) {
        throw std::invalid_argument("division by zero");
    }
    return a / b;
}
"#;

pub fn unit_named(name: &str) -> SourceUnit {
    SourceUnit::new(UnitId::new(name), format!("/src/{name}"), CALCULATOR_SOURCE)
}

pub fn calculator_unit() -> SourceUnit {
    unit_named("calculator.cpp")
}

/// Wrap test text the way models usually answer
pub fn fenced(text: &str) -> String {
    format!("Here are the tests:\n```cpp\n{text}\n```\n")
}

// ---------------------------------------------------------------------------
// Completion

/// One recorded completion request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub prompt: String,
    pub at: Instant,
}

#[derive(Debug)]
struct CompletionScript {
    queue: VecDeque<Result<String, ProviderError>>,
    fallback: Result<String, ProviderError>,
    requests: Vec<RecordedRequest>,
}

/// Completion client answering from a script
///
/// Queued responses are returned in order; once the queue is empty the
/// fallback repeats forever.
#[derive(Debug, Clone)]
pub struct ScriptedCompletion {
    script: Arc<Mutex<CompletionScript>>,
    latency: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn always(response: Result<String, ProviderError>) -> Self {
        Self::sequence(Vec::new(), response)
    }

    pub fn sequence(
        queue: Vec<Result<String, ProviderError>>,
        fallback: Result<String, ProviderError>,
    ) -> Self {
        Self {
            script: Arc::new(Mutex::new(CompletionScript {
                queue: queue.into(),
                fallback,
                requests: Vec::new(),
            })),
            latency: None,
        }
    }

    /// Always answers with a fenced block of `text`
    pub fn answering(text: &str) -> Self {
        Self::always(Ok(fenced(text)))
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.script.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().requests.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().requests.iter().map(|r| r.prompt.clone()).collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let response = {
            let mut script = self.script.lock();
            script.requests.push(RecordedRequest {
                prompt: request.to_string(),
                at: Instant::now(),
            });
            let fallback = script.fallback.clone();
            script.queue.pop_front().unwrap_or(fallback)
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Build

type BuildFn =
    dyn Fn(&SourceUnit, &TestArtifact, usize) -> Result<BuildReport, ToolchainError> + Send + Sync;

/// One recorded build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCall {
    pub unit: UnitId,
    pub revision: u32,
    pub success: Option<bool>,
}

/// Build runner driven by a closure of (unit, artifact, call index)
#[derive(Clone)]
pub struct ScriptedBuild {
    rule: Arc<BuildFn>,
    calls: Arc<Mutex<Vec<BuildCall>>>,
}

impl std::fmt::Debug for ScriptedBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedBuild")
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedBuild {
    pub fn from_fn<F>(rule: F) -> Self
    where
        F: Fn(&SourceUnit, &TestArtifact, usize) -> Result<BuildReport, ToolchainError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            rule: Arc::new(rule),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_pass() -> Self {
        Self::from_fn(|_, artifact, _| Ok(BuildReport::passed(artifact.revision(), "[  PASSED  ]")))
    }

    pub fn always_fail() -> Self {
        Self::from_fn(|unit, artifact, _| Ok(compile_error(unit, artifact)))
    }

    /// Passes only revisions whose text contains `marker`
    pub fn pass_when_contains(marker: &'static str) -> Self {
        Self::from_fn(move |unit, artifact, _| {
            if artifact.text().contains(marker) {
                Ok(BuildReport::passed(artifact.revision(), "[  PASSED  ]"))
            } else {
                Ok(compile_error(unit, artifact))
            }
        })
    }

    /// Toolchain infrastructure failure on every call
    pub fn missing_toolchain() -> Self {
        Self::from_fn(|_, _, _| {
            Err(ToolchainError::Missing {
                tool: "cmake".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            })
        })
    }

    pub fn calls(&self) -> Vec<BuildCall> {
        self.calls.lock().clone()
    }

    /// Revisions of `unit` that built successfully
    pub fn passed_revisions(&self, unit: &UnitId) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter(|c| &c.unit == unit && c.success == Some(true))
            .map(|c| c.revision)
            .collect()
    }
}

pub fn compile_error(unit: &SourceUnit, artifact: &TestArtifact) -> BuildReport {
    let file = unit.test_file_name();
    let message = "'Calculatr' was not declared in this scope";
    BuildReport::failed(
        artifact.revision(),
        Some(2),
        format!("{file}:3:5: error: {message}\n"),
        vec![Diagnostic {
            file,
            line: 3,
            severity: Severity::Error,
            message: message.into(),
        }],
    )
}

#[async_trait]
impl BuildRunner for ScriptedBuild {
    async fn build_and_run(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<BuildReport, ToolchainError> {
        let index = self.calls.lock().len();
        let result = (self.rule)(unit, artifact, index);
        self.calls.lock().push(BuildCall {
            unit: unit.id().clone(),
            revision: artifact.revision(),
            success: result.as_ref().ok().map(|r| r.success),
        });
        result
    }
}

// ---------------------------------------------------------------------------
// Coverage

type CoverageFn =
    dyn Fn(&SourceUnit, &TestArtifact, usize) -> Result<CoverageReport, ToolchainError> + Send + Sync;

/// Coverage probe driven by a closure of (unit, artifact, call index)
#[derive(Clone)]
pub struct ScriptedCoverage {
    rule: Arc<CoverageFn>,
    measured: Arc<Mutex<Vec<(UnitId, u32)>>>,
}

impl std::fmt::Debug for ScriptedCoverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCoverage")
            .field("measured", &self.measured.lock().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedCoverage {
    pub fn from_fn<F>(rule: F) -> Self
    where
        F: Fn(&SourceUnit, &TestArtifact, usize) -> Result<CoverageReport, ToolchainError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            rule: Arc::new(rule),
            measured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Same ratios for every measurement
    pub fn fixed(line: f64, branch: f64) -> Self {
        Self::from_fn(move |_, artifact, _| Ok(report(artifact.revision(), line, branch)))
    }

    /// Ratios per call; the last pair repeats
    pub fn sequence(steps: Vec<(f64, f64)>) -> Self {
        Self::from_fn(move |_, artifact, index| {
            let (line, branch) = steps
                .get(index)
                .or_else(|| steps.last())
                .copied()
                .unwrap_or((0.0, 0.0));
            Ok(report(artifact.revision(), line, branch))
        })
    }

    pub fn measured(&self) -> Vec<(UnitId, u32)> {
        self.measured.lock().clone()
    }
}

fn report(revision: u32, line: f64, branch: f64) -> CoverageReport {
    let uncovered_lines = if line < 1.0 { vec![8] } else { Vec::new() };
    let uncovered_branches = if branch < 1.0 {
        vec!["L7:b1".to_string()]
    } else {
        Vec::new()
    };
    CoverageReport::new(revision, line, branch)
        .with_uncovered_lines(uncovered_lines)
        .with_uncovered_branches(uncovered_branches)
}

#[async_trait]
impl CoverageProbe for ScriptedCoverage {
    async fn measure(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<CoverageReport, ToolchainError> {
        let index = self.measured.lock().len();
        self.measured
            .lock()
            .push((unit.id().clone(), artifact.revision()));
        (self.rule)(unit, artifact, index)
    }
}
