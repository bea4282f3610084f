//! gcov output parsing
//!
//! Two inputs are parsed: the summary gcov prints with `-b -c`, and the
//! `.gcov` annotation file it writes for each source.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static FILE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^File '(?P<path>.+)'$").expect("file header pattern is valid"));

static PERCENT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<label>Lines executed|Taken at least once):(?P<pct>\d+(?:\.\d+)?)% of (?P<total>\d+)$")
        .expect("percent pattern is valid")
});

static ANNOTATED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<count>[^:]+):\s*(?P<line>\d+):").expect("annotation pattern is valid")
});

static BRANCH_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^branch\s+(?P<index>\d+)\s+(?P<rest>.*)$").expect("branch pattern is valid")
});

/// Per-file totals from the gcov summary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcovSummary {
    /// Ratio of executed lines
    pub line_coverage: f64,
    /// Ratio of branches taken at least once
    pub branch_coverage: f64,
    pub total_lines: u32,
    pub total_branches: u32,
}

/// Find the summary block for `file_name` in gcov stdout
///
/// A file without branches counts as fully branch-covered.
#[must_use]
pub fn parse_summary(stdout: &str, file_name: &str) -> Option<GcovSummary> {
    let mut in_block = false;
    let mut summary: Option<GcovSummary> = None;

    for raw in stdout.lines() {
        let line = raw.trim();
        if let Some(caps) = FILE_HEADER.captures(line) {
            if summary.is_some() {
                break;
            }
            in_block = Path::new(&caps["path"])
                .file_name()
                .is_some_and(|n| n.to_string_lossy() == file_name);
            if in_block {
                summary = Some(GcovSummary {
                    line_coverage: 0.0,
                    branch_coverage: 1.0,
                    total_lines: 0,
                    total_branches: 0,
                });
            }
            continue;
        }
        if !in_block {
            continue;
        }
        let Some(current) = summary.as_mut() else {
            continue;
        };
        if let Some(caps) = PERCENT_OF.captures(line) {
            let ratio = caps["pct"].parse::<f64>().unwrap_or(0.0) / 100.0;
            let total = caps["total"].parse::<u32>().unwrap_or(0);
            if &caps["label"] == "Lines executed" {
                current.line_coverage = ratio;
                current.total_lines = total;
            } else {
                current.branch_coverage = if total == 0 { 1.0 } else { ratio };
                current.total_branches = total;
            }
        } else if line.is_empty() {
            in_block = false;
        }
    }

    summary
}

/// Uncovered lines and branches from a `.gcov` annotation file
///
/// Lines marked `#####` (or `=====`, reachable only via exceptions) are
/// uncovered. A branch is uncovered when gcov reports it `never executed`
/// or taken zero times. Branch ids are `L<line>:b<index>`.
#[must_use]
pub fn parse_annotation(text: &str) -> (Vec<u32>, Vec<String>) {
    let mut uncovered_lines = Vec::new();
    let mut uncovered_branches = Vec::new();
    let mut current_line = 0u32;

    for raw in text.lines() {
        let trimmed = raw.trim_start();
        if let Some(caps) = BRANCH_LINE.captures(trimmed) {
            let rest = caps["rest"].trim();
            let untaken = rest.starts_with("never executed")
                || rest == "taken 0"
                || rest.starts_with("taken 0%")
                || rest.starts_with("taken 0 ");
            if untaken {
                uncovered_branches.push(format!("L{current_line}:b{}", &caps["index"]));
            }
            continue;
        }
        if let Some(caps) = ANNOTATED_LINE.captures(raw) {
            let Ok(line_no) = caps["line"].parse::<u32>() else {
                continue;
            };
            if line_no == 0 {
                continue;
            }
            current_line = line_no;
            let count = caps["count"].trim();
            if count.starts_with("#####") || count.starts_with("=====") {
                uncovered_lines.push(line_no);
            }
        }
    }

    uncovered_lines.sort_unstable();
    uncovered_lines.dedup();
    (uncovered_lines, uncovered_branches)
}
