//! Compiler and test-runner diagnostic extraction

use regex::Regex;
use std::sync::LazyLock;
use utgen_artifact::{Diagnostic, Severity};

static COMPILER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<file>[^:\s][^:]*):(?P<line>\d+)(?::\d+)?: (?P<severity>fatal error|error|warning|note): (?P<message>.*)$",
    )
    .expect("compiler diagnostic pattern is valid")
});

static GTEST_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<file>[^:\s][^:]*):(?P<line>\d+): Failure$").expect("gtest failure pattern is valid")
});

static LINKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"undefined reference to (?P<symbol>.+)$").expect("linker pattern is valid")
});

/// Extract structured diagnostics from a build or test log
///
/// Recognizes `file:line[:col]: severity: message` compiler lines,
/// GoogleTest `file:line: Failure` blocks (the next non-empty line is the
/// message) and unresolved-symbol linker errors.
#[must_use]
pub fn parse_diagnostics(log: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = log.lines().collect();
    let mut diagnostics = Vec::new();

    for (idx, raw) in lines.iter().enumerate() {
        let line = raw.trim_end();
        if let Some(caps) = COMPILER_LINE.captures(line) {
            let severity = match &caps["severity"] {
                "warning" => Severity::Warning,
                "note" => Severity::Note,
                _ => Severity::Error,
            };
            diagnostics.push(Diagnostic {
                file: caps["file"].to_string(),
                line: caps["line"].parse().unwrap_or(0),
                severity,
                message: caps["message"].trim().to_string(),
            });
        } else if let Some(caps) = GTEST_FAILURE.captures(line) {
            let message = lines[idx + 1..]
                .iter()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .unwrap_or("Failure");
            diagnostics.push(Diagnostic {
                file: caps["file"].to_string(),
                line: caps["line"].parse().unwrap_or(0),
                severity: Severity::TestFailure,
                message: message.to_string(),
            });
        } else if let Some(caps) = LINKER_LINE.captures(line) {
            diagnostics.push(Diagnostic {
                file: "<link>".into(),
                line: 0,
                severity: Severity::Error,
                message: format!("undefined reference to {}", caps["symbol"].trim()),
            });
        }
    }

    diagnostics.dedup();
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compiler_lines() {
        let log = "\
[ 50%] Building CXX object CMakeFiles/run_tests.dir/test_calculator.cpp.o
/work/test_calculator.cpp:12:5: error: 'Calculatr' was not declared in this scope
/work/test_calculator.cpp:30:9: warning: unused variable 'x' [-Wunused-variable]
/work/calculator.h:4:7: note: 'Calculator' declared here
/work/test_calculator.cpp:1:10: fatal error: calc.h: No such file or directory
";
        let diags = parse_diagnostics(log);
        assert_eq!(diags.len(), 4);
        assert_eq!(diags[0].file, "/work/test_calculator.cpp");
        assert_eq!(diags[0].line, 12);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].message, "'Calculatr' was not declared in this scope");
        assert_eq!(diags[1].severity, Severity::Warning);
        assert_eq!(diags[2].severity, Severity::Note);
        assert_eq!(diags[3].severity, Severity::Error);
        assert_eq!(diags[3].message, "calc.h: No such file or directory");
    }

    #[test]
    fn gtest_failures_take_following_line() {
        let log = "\
[ RUN      ] Calc.Divide
/work/test_calculator.cpp:41: Failure

Expected equality of these values:
  calc.divide(6, 3)
[  FAILED  ] Calc.Divide (0 ms)
";
        let diags = parse_diagnostics(log);
        assert_eq!(
            diags,
            vec![Diagnostic {
                file: "/work/test_calculator.cpp".into(),
                line: 41,
                severity: Severity::TestFailure,
                message: "Expected equality of these values:".into(),
            }]
        );
    }

    #[test]
    fn linker_errors() {
        let log = "/usr/bin/ld: test_calculator.cpp.o: in function `Calc_Add_Test::TestBody()':\ntest_calculator.cpp:(.text+0x2a): undefined reference to `Calculator::add(int, int)'\n";
        let diags = parse_diagnostics(log);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "undefined reference to `Calculator::add(int, int)'");
    }

    #[test]
    fn plain_output_has_no_diagnostics() {
        assert!(parse_diagnostics("-- Configuring done\n-- Generating done\n").is_empty());
    }
}
