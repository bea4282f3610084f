//! Best-effort signature extraction
//!
//! Pulls function and class declarations out of source text so prompts can
//! list the public surface of a unit. This is a textual scan: it never fails,
//! and it will miss or mangle exotic declarations. Nothing downstream depends
//! on it being complete.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static FUNCTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?:[\w:<>,*&]+[ \t*&]+)*?)([~\w]+(?:::[~\w]+)*)[ \t]*\(([^()]*)\)[ \t]*(?:const[ \t]*)?(?:override[ \t]*)?(?:final[ \t]*)?(?:noexcept[ \t]*)?(?:->[ \t]*[\w:<>]+[ \t]*)?[{;]",
    )
    .expect("invalid function pattern")
});

static CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:class|struct)[ \t]+(\w+)(?:[ \t]*:[ \t]*(?:public|private|protected)?[ \t]*[\w:]+)?[ \t\r\n]*\{")
        .expect("invalid class pattern")
});

/// Words that look like calls in front of a parenthesis but are not functions.
const NOT_FUNCTIONS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "sizeof", "class", "struct", "enum",
    "else", "do", "new", "delete", "throw",
];

/// Kind of extracted declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    Function,
    Class,
}

/// One extracted declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub kind: SignatureKind,
    pub name: String,
    /// Parameter list as written (functions only)
    pub parameters: String,
    /// Return type as written, empty when absent
    pub return_type: String,
    /// 1-based line of the declaration
    pub line: usize,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignatureKind::Class => write!(f, "class {}", self.name),
            SignatureKind::Function if self.return_type.is_empty() => {
                write!(f, "{}({})", self.name, self.parameters)
            }
            SignatureKind::Function => {
                write!(f, "{} {}({})", self.return_type, self.name, self.parameters)
            }
        }
    }
}

/// Extract class and function signatures from source text
///
/// Results are ordered by line and de-duplicated by name and parameters so a
/// header declaration and its definition collapse into one entry.
#[must_use]
pub fn extract_signatures(source: &str) -> Vec<Signature> {
    let mut found = Vec::new();

    for caps in CLASS_PATTERN.captures_iter(source) {
        let whole = caps.get(0).map_or(0, |m| m.start());
        found.push(Signature {
            kind: SignatureKind::Class,
            name: caps[1].to_string(),
            parameters: String::new(),
            return_type: String::new(),
            line: line_of(source, whole),
        });
    }

    for caps in FUNCTION_PATTERN.captures_iter(source) {
        let name = caps[2].to_string();
        let bare = name.rsplit("::").next().unwrap_or(&name);
        if NOT_FUNCTIONS.contains(&bare) {
            continue;
        }
        let return_type = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        if NOT_FUNCTIONS.contains(&return_type.as_str()) {
            continue;
        }
        let start = caps.get(2).map_or(0, |m| m.start());
        found.push(Signature {
            kind: SignatureKind::Function,
            name,
            parameters: normalize_whitespace(&caps[3]),
            return_type,
            line: line_of(source, start),
        });
    }

    found.sort_by_key(|s| s.line);

    let mut seen = std::collections::HashSet::new();
    found.retain(|s| {
        let bare = s.name.rsplit("::").next().unwrap_or(&s.name).to_string();
        seen.insert((s.kind, bare, s.parameters.clone()))
    });
    found
}

/// Render signatures one per line for prompt context
#[must_use]
pub fn render_signatures(signatures: &[Signature]) -> String {
    signatures
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_of(source: &str, byte_offset: usize) -> usize {
    source[..byte_offset].matches('\n').count() + 1
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r"#pragma once

class Calculator
{
public:
    int add(int a, int b);
    double divide(double a, double b);
    bool isEven(int number) const;
};
";

    const SOURCE: &str = r#"#include "calculator.h"

int Calculator::add(int a, int b) {
    return a + b;
}

double Calculator::divide(double a, double b) {
    if (b == 0.0) {
        throw std::invalid_argument("Division by zero");
    }
    return a / b;
}
"#;

    #[test]
    fn extracts_header_declarations() {
        let sigs = extract_signatures(HEADER);
        let names: Vec<_> = sigs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Calculator", "add", "divide", "isEven"]);
        assert_eq!(sigs[1].parameters, "int a, int b");
        assert_eq!(sigs[1].return_type, "int");
        assert_eq!(sigs[0].line, 3);
    }

    #[test]
    fn skips_control_flow() {
        let sigs = extract_signatures(SOURCE);
        assert!(sigs.iter().all(|s| s.name != "if" && s.name != "throw"));
        assert!(sigs.iter().any(|s| s.name == "Calculator::add"));
    }

    #[test]
    fn deduplicates_declaration_and_definition() {
        let combined = format!("{HEADER}\n{SOURCE}");
        let sigs = extract_signatures(&combined);
        let adds = sigs.iter().filter(|s| s.name.ends_with("add")).count();
        assert_eq!(adds, 1);
    }

    #[test]
    fn renders_bullets() {
        let sigs = extract_signatures(HEADER);
        let text = render_signatures(&sigs);
        assert!(text.starts_with("- class Calculator"));
        assert!(text.contains("- int add(int a, int b)"));
    }
}
