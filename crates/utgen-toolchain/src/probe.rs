//! Toolchain dependency checks

use crate::cmake::CmakeSettings;
use crate::process::run_step;
use std::path::Path;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// C++ compilers tried in order
pub const CANDIDATE_COMPILERS: &[&str] = &["g++", "clang++", "c++"];

/// Availability of one external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub program: String,
    /// First line of `--version`, when the program ran successfully
    pub version: Option<String>,
}

impl ToolStatus {
    /// Whether the program answered
    #[must_use]
    pub fn available(&self) -> bool {
        self.version.is_some()
    }
}

/// Result of probing every program the toolchain needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub cmake: ToolStatus,
    pub compiler: ToolStatus,
    pub gcov: ToolStatus,
}

impl DependencyReport {
    /// Whether everything needed is present
    #[must_use]
    pub fn all_available(&self) -> bool {
        self.cmake.available() && self.compiler.available() && self.gcov.available()
    }

    /// Rows for display
    #[must_use]
    pub fn tools(&self) -> [&ToolStatus; 3] {
        [&self.cmake, &self.compiler, &self.gcov]
    }
}

/// Probe cmake, a C++ compiler and gcov
pub async fn check_dependencies(settings: &CmakeSettings) -> DependencyReport {
    let cwd = std::env::temp_dir();
    let cmake = probe(&settings.cmake_program, &cwd).await;
    let gcov = probe(&settings.gcov_program, &cwd).await;

    let mut compiler = ToolStatus {
        program: CANDIDATE_COMPILERS[0].to_string(),
        version: None,
    };
    for candidate in CANDIDATE_COMPILERS {
        let status = probe(candidate, &cwd).await;
        if status.available() {
            compiler = status;
            break;
        }
    }

    DependencyReport { cmake, compiler, gcov }
}

async fn probe(program: &str, cwd: &Path) -> ToolStatus {
    let version = match run_step("version probe", program, ["--version"], cwd, PROBE_TIMEOUT).await {
        Ok(output) if output.success => output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(ToString::to_string)
            .or_else(|| Some(String::new())),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(program, error = %e, "version probe failed");
            None
        }
    };
    ToolStatus {
        program: program.to_string(),
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_programs_are_unavailable() {
        let mut settings = CmakeSettings::new(std::env::temp_dir(), PROBE_TIMEOUT, PROBE_TIMEOUT);
        settings.cmake_program = "utgen-no-such-cmake".into();
        settings.gcov_program = "utgen-no-such-gcov".into();

        let report = check_dependencies(&settings).await;
        assert!(!report.cmake.available());
        assert!(!report.gcov.available());
        assert!(!report.all_available());
        assert_eq!(report.tools()[0].program, "utgen-no-such-cmake");
    }
}
