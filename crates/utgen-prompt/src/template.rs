//! Prompt template definitions and placeholder parsing
//!
//! Template bodies use `{name}` placeholders. `{{` and `}}` produce literal
//! braces. Any other brace (for example the body of a code sample) is kept
//! as written, so sample code only needs escaping where it would look like a
//! placeholder.

use crate::error::TemplateError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative template definition as stored in YAML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Stable task identifier (defaults to the file stem when loading a directory)
    #[serde(default)]
    pub task: String,
    /// Human-readable objective
    #[serde(default)]
    pub objective: String,
    /// Ordered requirement list (documentation; also offered as a placeholder)
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Template body with named placeholders
    #[serde(alias = "template")]
    pub prompt_template: String,
}

/// One parsed piece of a template body
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A loaded, parsed prompt template
///
/// Immutable after construction and shared read-only across units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    definition: TemplateDefinition,
    segments: Vec<Segment>,
    placeholders: IndexSet<String>,
}

/// Placeholders the engine fills from the template itself
pub const SELF_PLACEHOLDERS: &[&str] = &["objective", "requirements"];

impl PromptTemplate {
    /// Parse a definition
    ///
    /// # Errors
    /// Returns [`TemplateError::EmptyTemplate`] if the body is blank.
    pub fn parse(definition: TemplateDefinition) -> Result<Self, TemplateError> {
        if definition.prompt_template.trim().is_empty() {
            return Err(TemplateError::EmptyTemplate(definition.task.clone()));
        }
        let segments = parse_segments(&definition.prompt_template);
        let placeholders = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        Ok(Self {
            definition,
            segments,
            placeholders,
        })
    }

    /// Task name
    #[inline]
    #[must_use]
    pub fn task(&self) -> &str {
        &self.definition.task
    }

    /// Objective text
    #[inline]
    #[must_use]
    pub fn objective(&self) -> &str {
        &self.definition.objective
    }

    /// Requirement list
    #[inline]
    #[must_use]
    pub fn requirements(&self) -> &[String] {
        &self.definition.requirements
    }

    /// Underlying definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    /// Placeholder names referenced by the body, in first-use order
    #[must_use]
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(String::as_str)
    }

    /// Placeholders that callers must supply (excludes engine-filled ones)
    #[must_use]
    pub fn required_placeholders(&self) -> Vec<&str> {
        self.placeholders()
            .filter(|p| !SELF_PLACEHOLDERS.contains(p))
            .collect()
    }

    /// Fill the template
    ///
    /// # Errors
    /// Returns [`TemplateError::PlaceholderMissing`] for the first referenced
    /// placeholder absent from `values`.
    pub fn fill(&self, values: &Placeholders) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.definition.prompt_template.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => match name.as_str() {
                    "objective" if !values.contains(name) => out.push_str(self.objective()),
                    "requirements" if !values.contains(name) => {
                        out.push_str(&self.render_requirements());
                    }
                    _ => {
                        let value = values
                            .get(name)
                            .ok_or_else(|| TemplateError::placeholder_missing(self.task(), name))?;
                        out.push_str(value);
                    }
                },
            }
        }
        Ok(out)
    }

    fn render_requirements(&self) -> String {
        self.definition
            .requirements
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Named placeholder values for one fill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<String, String>,
}

impl Placeholders {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value (builder style)
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value for `name`
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Whether `name` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Supplied names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_segments(body: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '{' if chars.get(i + 1).copied().is_some_and(is_ident_start) => {
                let mut end = i + 1;
                while end < chars.len() && is_ident(chars[end]) {
                    end += 1;
                }
                if chars.get(end) == Some(&'}') {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(chars[i + 1..end].iter().collect()));
                    i = end + 1;
                } else {
                    literal.push(c);
                    i += 1;
                }
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
