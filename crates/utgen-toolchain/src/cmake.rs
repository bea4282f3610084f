//! CMake + GoogleTest + gcov toolchain
//!
//! Each unit gets its own workspace directory under the configured work dir:
//!
//! ```text
//! <work_dir>/<unit slug>/
//!   CMakeLists.txt
//!   test_<stem>.cpp
//!   .utgen-built          hash of the last successfully built revision
//!   build/                configure and build tree, coverage data
//! ```
//!
//! Only one worker ever touches a given unit, so workspaces need no locking.

use crate::adapter::{BuildRunner, CoverageProbe};
use crate::diagnostics::parse_diagnostics;
use crate::error::ToolchainError;
use crate::gcov::{parse_annotation, parse_summary};
use crate::process::run_step;
use async_trait::async_trait;
use ignore::WalkBuilder;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use utgen_artifact::{BuildReport, ContentHash, CoverageReport, SourceUnit, TestArtifact};

/// Name of the test executable target
pub const TEST_TARGET: &str = "run_tests";

const BUILD_MARKER: &str = ".utgen-built";
const BUILD_DIR: &str = "build";

static MAIN_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*int\s+main\s*\(").expect("main definition pattern is valid")
});

/// Toolchain settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmakeSettings {
    /// Parent of all unit workspaces
    pub work_dir: PathBuf,
    pub cmake_program: String,
    pub gcov_program: String,
    /// Limit for configure and build steps
    pub build_timeout: Duration,
    /// Limit for the test executable and gcov
    pub test_timeout: Duration,
    pub cxx_standard: u32,
}

impl CmakeSettings {
    /// Settings with the default programs
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>, build_timeout: Duration, test_timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            cmake_program: "cmake".into(),
            gcov_program: "gcov".into(),
            build_timeout,
            test_timeout,
            cxx_standard: 17,
        }
    }
}

/// Inputs of a generated `CMakeLists.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmakeProject {
    pub name: String,
    pub cxx_standard: u32,
    /// Test sources relative to the project directory
    pub test_files: Vec<String>,
    /// Code under test, absolute
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
}

impl CmakeProject {
    /// Render the project file
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "cmake_minimum_required(VERSION 3.16)");
        let _ = writeln!(out, "project({} CXX)\n", self.name);
        let _ = writeln!(out, "set(CMAKE_CXX_STANDARD {})", self.cxx_standard);
        let _ = writeln!(out, "set(CMAKE_CXX_STANDARD_REQUIRED ON)\n");
        let _ = writeln!(out, "find_package(GTest REQUIRED)");
        let _ = writeln!(out, "find_package(Threads REQUIRED)\n");
        let _ = writeln!(out, "set(CMAKE_CXX_FLAGS \"${{CMAKE_CXX_FLAGS}} -g -O0 --coverage\")");
        let _ = writeln!(
            out,
            "set(CMAKE_EXE_LINKER_FLAGS \"${{CMAKE_EXE_LINKER_FLAGS}} --coverage\")\n"
        );

        if !self.include_dirs.is_empty() {
            let _ = writeln!(out, "include_directories(");
            for dir in &self.include_dirs {
                let _ = writeln!(out, "    \"{}\"", cmake_path(dir));
            }
            let _ = writeln!(out, ")\n");
        }

        let _ = writeln!(out, "add_executable({TEST_TARGET}");
        for test in &self.test_files {
            let _ = writeln!(out, "    {test}");
        }
        for source in &self.sources {
            let _ = writeln!(out, "    \"{}\"", cmake_path(source));
        }
        let _ = writeln!(out, ")\n");

        let _ = writeln!(
            out,
            "target_link_libraries({TEST_TARGET} GTest::gtest GTest::gtest_main Threads::Threads)\n"
        );
        let _ = writeln!(out, "enable_testing()");
        let _ = writeln!(out, "add_test(NAME unit_tests COMMAND {TEST_TARGET})");
        out
    }
}

fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// [`BuildRunner`] and [`CoverageProbe`] backed by CMake, GoogleTest and gcov
#[derive(Debug, Clone)]
pub struct CmakeToolchain {
    settings: CmakeSettings,
    sources: Vec<PathBuf>,
    include_dirs: Vec<PathBuf>,
}

impl CmakeToolchain {
    /// Create a toolchain linking every unit except those defining `main`
    ///
    /// # Errors
    /// Returns [`ToolchainError::Io`] if a unit path cannot be made absolute.
    pub fn new(settings: CmakeSettings, units: &[SourceUnit]) -> Result<Self, ToolchainError> {
        let mut sources = Vec::new();
        let mut include_dirs = BTreeSet::new();
        for unit in units {
            let path = std::path::absolute(unit.path())
                .map_err(|e| ToolchainError::io_error(unit.path(), e))?;
            if let Some(parent) = path.parent() {
                include_dirs.insert(parent.to_path_buf());
            }
            if defines_main(unit) {
                tracing::debug!(unit = %unit.id(), "excluding unit with main() from test link");
                continue;
            }
            sources.push(path);
        }
        Ok(Self {
            settings,
            sources,
            include_dirs: include_dirs.into_iter().collect(),
        })
    }

    /// Settings in use
    #[must_use]
    pub fn settings(&self) -> &CmakeSettings {
        &self.settings
    }

    /// Sources linked into every test executable
    #[must_use]
    pub fn linked_sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Project description for the given test files
    #[must_use]
    pub fn project(&self, name: &str, test_files: Vec<String>) -> CmakeProject {
        CmakeProject {
            name: name.to_string(),
            cxx_standard: self.settings.cxx_standard,
            test_files,
            sources: self.sources.clone(),
            include_dirs: self.include_dirs.clone(),
        }
    }

    /// Workspace directory of a unit
    #[must_use]
    pub fn workspace(&self, unit: &SourceUnit) -> PathBuf {
        self.settings.work_dir.join(unit.id().slug())
    }

    /// Write the test file and project file of `artifact` into the unit workspace
    ///
    /// # Errors
    /// Returns [`ToolchainError::Io`] on filesystem failures.
    pub fn prepare(&self, unit: &SourceUnit, artifact: &TestArtifact) -> Result<PathBuf, ToolchainError> {
        let workspace = self.workspace(unit);
        let build_dir = workspace.join(BUILD_DIR);
        std::fs::create_dir_all(&build_dir).map_err(|e| ToolchainError::io_error(&build_dir, e))?;

        let marker = workspace.join(BUILD_MARKER);
        if marker.exists() {
            std::fs::remove_file(&marker).map_err(|e| ToolchainError::io_error(&marker, e))?;
        }

        let test_path = workspace.join(unit.test_file_name());
        std::fs::write(&test_path, artifact.text()).map_err(|e| ToolchainError::io_error(&test_path, e))?;

        let project = self.project(&format!("utgen_{}", unit.id().slug()), vec![unit.test_file_name()]);
        let lists = workspace.join("CMakeLists.txt");
        std::fs::write(&lists, project.render()).map_err(|e| ToolchainError::io_error(&lists, e))?;
        Ok(workspace)
    }

    async fn configure_and_build(
        &self,
        workspace: &Path,
        revision: u32,
        log: &mut String,
    ) -> Result<Option<BuildReport>, ToolchainError> {
        let build_dir = workspace.join(BUILD_DIR);
        let build_dir_arg = build_dir.display().to_string();
        let source_arg = workspace.display().to_string();

        let configure_args = ["-S", &source_arg, "-B", &build_dir_arg, "-DCMAKE_BUILD_TYPE=Debug"];
        let configure = run_step(
            "cmake configure",
            &self.settings.cmake_program,
            configure_args,
            workspace,
            self.settings.build_timeout,
        )
        .await?;
        log.push_str(&configure.section(&format!("{} {}", self.settings.cmake_program, configure_args.join(" "))));
        if !configure.success {
            return Ok(Some(BuildReport::failed(
                revision,
                configure.exit_code,
                log.clone(),
                parse_diagnostics(log),
            )));
        }

        let build_args = ["--build", &build_dir_arg];
        let build = run_step(
            "cmake build",
            &self.settings.cmake_program,
            build_args,
            workspace,
            self.settings.build_timeout,
        )
        .await?;
        log.push_str(&build.section(&format!("{} {}", self.settings.cmake_program, build_args.join(" "))));
        if !build.success {
            return Ok(Some(BuildReport::failed(
                revision,
                build.exit_code,
                log.clone(),
                parse_diagnostics(log),
            )));
        }
        Ok(None)
    }
}

#[async_trait]
impl BuildRunner for CmakeToolchain {
    async fn build_and_run(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<BuildReport, ToolchainError> {
        let workspace = self.prepare(unit, artifact)?;
        let revision = artifact.revision();
        let mut log = String::new();

        if let Some(failed) = self.configure_and_build(&workspace, revision, &mut log).await? {
            tracing::debug!(unit = %unit.id(), revision, errors = failed.error_count(), "build failed");
            return Ok(failed);
        }

        let build_dir = workspace.join(BUILD_DIR);
        let executable = build_dir.join(TEST_TARGET);
        if !executable.is_file() {
            return Err(ToolchainError::Workspace(format!(
                "build succeeded but {} was not produced",
                executable.display()
            )));
        }
        remove_coverage_data(&build_dir)?;

        let run = run_step(
            "test run",
            &executable.display().to_string(),
            std::iter::empty::<&str>(),
            &build_dir,
            self.settings.test_timeout,
        )
        .await?;
        log.push_str(&run.section(TEST_TARGET));
        if !run.success {
            tracing::debug!(unit = %unit.id(), revision, "tests failed");
            return Ok(BuildReport::failed(
                revision,
                run.exit_code,
                log.clone(),
                parse_diagnostics(&log),
            ));
        }

        let marker = workspace.join(BUILD_MARKER);
        std::fs::write(&marker, artifact.hash().to_string()).map_err(|e| ToolchainError::io_error(&marker, e))?;
        Ok(BuildReport::passed(revision, log))
    }
}

#[async_trait]
impl CoverageProbe for CmakeToolchain {
    async fn measure(
        &self,
        unit: &SourceUnit,
        artifact: &TestArtifact,
    ) -> Result<CoverageReport, ToolchainError> {
        let workspace = self.workspace(unit);
        let marker = workspace.join(BUILD_MARKER);
        let built = std::fs::read_to_string(&marker).unwrap_or_default();
        if built.trim().parse::<ContentHash>().ok().as_ref() != Some(artifact.hash()) {
            return Err(ToolchainError::Workspace(format!(
                "revision {} of {} has not been built",
                artifact.revision(),
                unit.id()
            )));
        }

        let file_name = unit
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let build_dir = workspace.join(BUILD_DIR);
        let data = find_coverage_data(&build_dir, &file_name)?.ok_or_else(|| {
            ToolchainError::Workspace(format!("no coverage data for {file_name} under {}", build_dir.display()))
        })?;
        let data_dir = data.parent().unwrap_or(&build_dir).to_path_buf();
        let data_name = data
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let output = run_step(
            "gcov",
            &self.settings.gcov_program,
            ["-b", "-c", data_name.as_str()],
            &data_dir,
            self.settings.test_timeout,
        )
        .await?;
        let summary = parse_summary(&output.stdout, &file_name).ok_or_else(|| {
            ToolchainError::Workspace(format!("gcov reported no data for {file_name}"))
        })?;

        let annotation_path = data_dir.join(format!("{file_name}.gcov"));
        let (lines, branches) = match std::fs::read_to_string(&annotation_path) {
            Ok(text) => parse_annotation(&text),
            Err(e) => {
                tracing::warn!(path = %annotation_path.display(), error = %e, "gcov annotation unavailable");
                (Vec::new(), Vec::new())
            }
        };

        tracing::debug!(
            unit = %unit.id(),
            revision = artifact.revision(),
            line = summary.line_coverage,
            branch = summary.branch_coverage,
            "coverage measured"
        );
        Ok(CoverageReport::new(artifact.revision(), summary.line_coverage, summary.branch_coverage)
            .with_uncovered_lines(lines)
            .with_uncovered_branches(branches))
    }
}

fn defines_main(unit: &SourceUnit) -> bool {
    unit.id().stem() == "main" || MAIN_DEFINITION.is_match(unit.source())
}

fn coverage_files(build_dir: &Path) -> impl Iterator<Item = Result<PathBuf, ToolchainError>> + '_ {
    WalkBuilder::new(build_dir)
        .standard_filters(false)
        .build()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let is_data = entry.file_type().is_some_and(|t| t.is_file())
                    && entry.path().extension().is_some_and(|e| e == "gcda");
                is_data.then(|| Ok(entry.into_path()))
            }
            Err(e) => Some(Err(ToolchainError::Workspace(format!(
                "cannot walk {}: {e}",
                build_dir.display()
            )))),
        })
}

fn remove_coverage_data(build_dir: &Path) -> Result<(), ToolchainError> {
    for path in coverage_files(build_dir) {
        let path = path?;
        std::fs::remove_file(&path).map_err(|e| ToolchainError::io_error(&path, e))?;
    }
    Ok(())
}

fn find_coverage_data(build_dir: &Path, file_name: &str) -> Result<Option<PathBuf>, ToolchainError> {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let wanted = [format!("{file_name}.gcda"), format!("{stem}.gcda")];
    for path in coverage_files(build_dir) {
        let path = path?;
        let matches = path
            .file_name()
            .is_some_and(|n| wanted.iter().any(|w| n.to_string_lossy() == w.as_str()));
        if matches {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use utgen_artifact::{Stage, UnitId};

    fn unit(dir: &Path, name: &str, source: &str) -> SourceUnit {
        let path = dir.join(name);
        fs::write(&path, source).unwrap();
        SourceUnit::new(UnitId::new(name), path, source)
    }

    fn settings(work: &Path) -> CmakeSettings {
        CmakeSettings::new(work, Duration::from_secs(10), Duration::from_secs(10))
    }

    #[test]
    fn project_file_lists_tests_and_sources() {
        let project = CmakeProject {
            name: "utgen_calculator_cpp".into(),
            cxx_standard: 17,
            test_files: vec!["test_calculator.cpp".into()],
            sources: vec![PathBuf::from("/src/calculator.cpp")],
            include_dirs: vec![PathBuf::from("/src")],
        };
        let text = project.render();
        assert!(text.starts_with("cmake_minimum_required(VERSION 3.16)\nproject(utgen_calculator_cpp CXX)\n"));
        assert!(text.contains("-g -O0 --coverage"));
        assert!(text.contains("include_directories(\n    \"/src\"\n)"));
        assert!(text.contains("add_executable(run_tests\n    test_calculator.cpp\n    \"/src/calculator.cpp\"\n)"));
        assert!(text.contains("GTest::gtest_main"));
    }

    #[test]
    fn units_defining_main_are_not_linked() {
        let src = tempfile::tempdir().unwrap();
        let units = vec![
            unit(src.path(), "calculator.cpp", "int add(int a, int b) { return a + b; }\n"),
            unit(src.path(), "app.cpp", "#include <cstdio>\nint main(int argc, char** argv) {\n  return 0;\n}\n"),
            unit(src.path(), "main.cpp", "// entry point lives elsewhere\n"),
        ];
        let toolchain = CmakeToolchain::new(settings(src.path()), &units).unwrap();
        let linked: Vec<_> = toolchain
            .linked_sources()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(linked, vec!["calculator.cpp"]);
    }

    #[test]
    fn prepare_writes_workspace_and_clears_marker() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let calc = unit(src.path(), "calculator.cpp", "int add(int a, int b) { return a + b; }\n");
        let toolchain = CmakeToolchain::new(settings(work.path()), std::slice::from_ref(&calc)).unwrap();

        let rev0 = TestArtifact::initial("TEST(Calc, Add) {}\n");
        let workspace = toolchain.prepare(&calc, &rev0).unwrap();
        fs::write(workspace.join(BUILD_MARKER), rev0.hash().to_string()).unwrap();

        let rev1 = rev0.next(Stage::Fix, "TEST(Calc, Add) { EXPECT_EQ(2, add(1, 1)); }\n").unwrap();
        toolchain.prepare(&calc, &rev1).unwrap();

        assert_eq!(
            fs::read_to_string(workspace.join("test_calculator.cpp")).unwrap(),
            rev1.text()
        );
        assert!(workspace.join("CMakeLists.txt").is_file());
        assert!(workspace.join(BUILD_DIR).is_dir());
        assert!(!workspace.join(BUILD_MARKER).exists());
    }

    #[test]
    fn units_that_flatten_alike_get_separate_workspaces() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a")).unwrap();
        let nested = unit(src.path(), "a/b.cpp", "int f() { return 1; }\n");
        let flat = unit(src.path(), "a_b.cpp", "int g() { return 2; }\n");
        let toolchain = CmakeToolchain::new(settings(work.path()), &[nested.clone(), flat.clone()]).unwrap();

        let rev0 = TestArtifact::initial("TEST(F, One) {}\n");
        let nested_ws = toolchain.prepare(&nested, &rev0).unwrap();
        let flat_ws = toolchain.prepare(&flat, &TestArtifact::initial("TEST(G, Two) {}\n")).unwrap();

        assert_ne!(nested_ws, flat_ws);
        assert_eq!(fs::read_to_string(nested_ws.join("test_b.cpp")).unwrap(), rev0.text());
        assert!(flat_ws.join("test_a_b.cpp").is_file());
    }

    #[tokio::test]
    async fn missing_cmake_is_a_toolchain_error() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let calc = unit(src.path(), "calculator.cpp", "int x;\n");
        let mut settings = settings(work.path());
        settings.cmake_program = "utgen-no-such-cmake".into();
        let toolchain = CmakeToolchain::new(settings, std::slice::from_ref(&calc)).unwrap();

        let err = toolchain
            .build_and_run(&calc, &TestArtifact::initial("TEST(A, B) {}\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::Missing { ref tool, .. } if tool == "utgen-no-such-cmake"));
    }

    #[tokio::test]
    async fn measuring_unbuilt_revision_is_rejected() {
        let src = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let calc = unit(src.path(), "calculator.cpp", "int x;\n");
        let toolchain = CmakeToolchain::new(settings(work.path()), std::slice::from_ref(&calc)).unwrap();

        let err = toolchain
            .measure(&calc, &TestArtifact::initial("TEST(A, B) {}\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolchainError::Workspace(_)));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        struct Fixture {
            _src: tempfile::TempDir,
            _work: tempfile::TempDir,
            tools: tempfile::TempDir,
            unit: SourceUnit,
            settings: CmakeSettings,
        }

        fn fixture() -> Fixture {
            let src = tempfile::tempdir().unwrap();
            let work = tempfile::tempdir().unwrap();
            let tools = tempfile::tempdir().unwrap();
            let unit = unit(src.path(), "calculator.cpp", "int add(int a, int b) { return a + b; }\n");
            let settings = settings(work.path());
            Fixture {
                _src: src,
                _work: work,
                tools,
                unit,
                settings,
            }
        }

        #[tokio::test]
        async fn compile_errors_become_a_failed_report() {
            let mut fx = fixture();
            fx.settings.cmake_program = script(
                fx.tools.path(),
                "cmake",
                "if [ \"$1\" = \"--build\" ]; then\n  echo \"test_calculator.cpp:3:5: error: 'ad' was not declared in this scope\" >&2\n  exit 2\nfi\nexit 0\n",
            );
            let toolchain = CmakeToolchain::new(fx.settings, std::slice::from_ref(&fx.unit)).unwrap();

            let report = toolchain
                .build_and_run(&fx.unit, &TestArtifact::initial("TEST(Calc, Add) { ad(1, 1); }\n"))
                .await
                .unwrap();
            assert!(!report.success);
            assert_eq!(report.exit_code, Some(2));
            assert_eq!(report.diagnostics.len(), 1);
            assert_eq!(report.diagnostics[0].line, 3);
            assert!(report.log.contains("--build"));
        }

        #[tokio::test]
        async fn passing_run_then_coverage() {
            let mut fx = fixture();
            let runner = script(
                fx.tools.path(),
                "run_tests.template",
                "mkdir -p CMakeFiles/run_tests.dir\ntouch CMakeFiles/run_tests.dir/calculator.cpp.gcda\necho '[  PASSED  ] 1 test.'\n",
            );
            fx.settings.cmake_program = script(
                fx.tools.path(),
                "cmake",
                &format!("if [ \"$1\" = \"--build\" ]; then\n  cp '{runner}' \"$2/run_tests\"\nfi\nexit 0\n"),
            );
            fx.settings.gcov_program = script(
                fx.tools.path(),
                "gcov",
                "echo \"File '/src/calculator.cpp'\"\necho 'Lines executed:50.00% of 4'\necho 'Taken at least once:25.00% of 4'\necho ''\nprintf '    #####:    2:  return a + b;\\nbranch  0 never executed\\n' > calculator.cpp.gcov\n",
            );
            let toolchain = CmakeToolchain::new(fx.settings, std::slice::from_ref(&fx.unit)).unwrap();

            let artifact = TestArtifact::initial("TEST(Calc, Add) {}\n");
            let report = toolchain.build_and_run(&fx.unit, &artifact).await.unwrap();
            assert!(report.success, "{}", report.log);
            assert!(report.log.contains("[  PASSED  ] 1 test."));

            let coverage = toolchain.measure(&fx.unit, &artifact).await.unwrap();
            assert_eq!(coverage.revision, 0);
            assert!((coverage.line_coverage - 0.5).abs() < 1e-9);
            assert!((coverage.branch_coverage - 0.25).abs() < 1e-9);
            assert_eq!(coverage.uncovered_lines, vec![2]);
            assert_eq!(coverage.uncovered_branches, vec!["L2:b0".to_string()]);
        }

        #[tokio::test]
        async fn slow_step_times_out() {
            let mut fx = fixture();
            fx.settings.cmake_program = script(fx.tools.path(), "cmake", "sleep 5\n");
            fx.settings.build_timeout = Duration::from_millis(200);
            let toolchain = CmakeToolchain::new(fx.settings, std::slice::from_ref(&fx.unit)).unwrap();

            let err = toolchain
                .build_and_run(&fx.unit, &TestArtifact::initial("TEST(A, B) {}\n"))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolchainError::Timeout { ref step, .. } if step == "cmake configure"));
        }
    }
}
