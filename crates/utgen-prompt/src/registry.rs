//! Template registry
//!
//! Holds every loaded [`PromptTemplate`] keyed by task name. Built-in
//! definitions are compiled in; a directory of YAML definitions may override
//! or extend them. [`TemplateRegistry::validate`] runs once at startup.

use crate::error::TemplateError;
use crate::template::{Placeholders, PromptTemplate, TemplateDefinition, SELF_PLACEHOLDERS};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::Path;

/// Task name of the initial generation template
pub const INITIAL_TEST_GENERATION: &str = "initial_test_generation";
/// Task name of the build-issue fixing template
pub const BUILD_ISSUE_FIXING: &str = "build_issue_fixing";
/// Task name of the refinement template
pub const TEST_REFINEMENT: &str = "test_refinement";

/// Placeholder vocabulary supplied by the pipeline stages
pub mod placeholders {
    pub const SOURCE_CODE: &str = "source_code";
    pub const CODE_CONTENT: &str = "code_content";
    pub const ORIGINAL_CODE: &str = "original_code";
    pub const TEST_CODE: &str = "test_code";
    pub const BUILD_LOG: &str = "build_log";
    pub const DIAGNOSTICS: &str = "diagnostics";
    pub const ORIGINAL_FILENAME: &str = "original_filename";
    pub const SIGNATURES: &str = "signatures";
    pub const MAX_TESTS_PER_FUNCTION: &str = "max_tests_per_function";
    pub const TEST_GUIDANCE: &str = "test_guidance";
    pub const UNCOVERED_LINES: &str = "uncovered_lines";
    pub const UNCOVERED_BRANCHES: &str = "uncovered_branches";
    pub const LINE_COVERAGE: &str = "line_coverage";
    pub const BRANCH_COVERAGE: &str = "branch_coverage";
    pub const TARGET_LINE_COVERAGE: &str = "target_line_coverage";
    pub const TARGET_BRANCH_COVERAGE: &str = "target_branch_coverage";
}

/// Binds a task name to the placeholders the stage using it supplies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBinding {
    pub task: &'static str,
    pub supplies: &'static [&'static str],
}

/// Placeholders supplied by the generation stage
pub const GENERATION_SUPPLIES: &[&str] = &[
    placeholders::SOURCE_CODE,
    placeholders::CODE_CONTENT,
    placeholders::ORIGINAL_FILENAME,
    placeholders::SIGNATURES,
    placeholders::MAX_TESTS_PER_FUNCTION,
    placeholders::TEST_GUIDANCE,
];

/// Placeholders supplied by the fix stage
pub const FIXING_SUPPLIES: &[&str] = &[
    placeholders::SOURCE_CODE,
    placeholders::CODE_CONTENT,
    placeholders::ORIGINAL_CODE,
    placeholders::ORIGINAL_FILENAME,
    placeholders::TEST_CODE,
    placeholders::BUILD_LOG,
    placeholders::DIAGNOSTICS,
];

/// Placeholders supplied by the refinement stage
pub const REFINEMENT_SUPPLIES: &[&str] = &[
    placeholders::SOURCE_CODE,
    placeholders::CODE_CONTENT,
    placeholders::ORIGINAL_CODE,
    placeholders::ORIGINAL_FILENAME,
    placeholders::TEST_CODE,
    placeholders::MAX_TESTS_PER_FUNCTION,
    placeholders::TEST_GUIDANCE,
    placeholders::UNCOVERED_LINES,
    placeholders::UNCOVERED_BRANCHES,
    placeholders::LINE_COVERAGE,
    placeholders::BRANCH_COVERAGE,
    placeholders::TARGET_LINE_COVERAGE,
    placeholders::TARGET_BRANCH_COVERAGE,
];

/// The three templates the pipeline cannot run without
pub const PIPELINE_BINDINGS: &[StageBinding] = &[
    StageBinding {
        task: INITIAL_TEST_GENERATION,
        supplies: GENERATION_SUPPLIES,
    },
    StageBinding {
        task: BUILD_ISSUE_FIXING,
        supplies: FIXING_SUPPLIES,
    },
    StageBinding {
        task: TEST_REFINEMENT,
        supplies: REFINEMENT_SUPPLIES,
    },
];

const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    (
        "initial_test_generation.yaml",
        include_str!("../templates/initial_test_generation.yaml"),
    ),
    (
        "build_issue_fixing.yaml",
        include_str!("../templates/build_issue_fixing.yaml"),
    ),
    (
        "test_refinement.yaml",
        include_str!("../templates/test_refinement.yaml"),
    ),
];

/// Registry of prompt templates keyed by task name
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the compiled-in definitions
    ///
    /// # Errors
    /// Returns an error only if a built-in definition is malformed.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut registry = Self::new();
        for (name, text) in BUILTIN_DEFINITIONS {
            let definition = parse_definition(Path::new(name), text)?;
            registry.insert(definition)?;
        }
        Ok(registry)
    }

    /// Insert or replace a definition
    ///
    /// # Errors
    /// Returns [`TemplateError::EmptyTemplate`] if the body is blank.
    pub fn insert(&mut self, definition: TemplateDefinition) -> Result<(), TemplateError> {
        let template = PromptTemplate::parse(definition)?;
        if self
            .templates
            .insert(template.task().to_string(), template)
            .is_some()
        {
            tracing::debug!("template definition replaced");
        }
        Ok(())
    }

    /// Load every `*.yaml` / `*.yml` definition in `dir`, overriding existing tasks
    ///
    /// A definition without `task` is keyed by its file stem. Two files in the
    /// same directory may not define the same task.
    ///
    /// # Errors
    /// - [`TemplateError::Io`] when the directory or a file cannot be read
    /// - [`TemplateError::Yaml`] for invalid YAML
    /// - [`TemplateError::DuplicateTask`] for clashing files
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let entries = std::fs::read_dir(dir).map_err(|e| TemplateError::io_error(dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TemplateError::io_error(dir, e))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if is_yaml && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen = HashSet::new();
        for path in &paths {
            let text = std::fs::read_to_string(path).map_err(|e| TemplateError::io_error(path, e))?;
            let definition = parse_definition(path, &text)?;
            if !seen.insert(definition.task.clone()) {
                return Err(TemplateError::DuplicateTask {
                    task: definition.task,
                    path: path.clone(),
                });
            }
            tracing::info!(task = %definition.task, path = %path.display(), "loaded template definition");
            self.insert(definition)?;
        }
        Ok(paths.len())
    }

    /// Look up a template
    ///
    /// # Errors
    /// Returns [`TemplateError::TemplateMissing`] for unknown names.
    pub fn get(&self, task: &str) -> Result<&PromptTemplate, TemplateError> {
        self.templates
            .get(task)
            .ok_or_else(|| TemplateError::TemplateMissing(task.to_string()))
    }

    /// Fill the named template
    ///
    /// # Errors
    /// - [`TemplateError::TemplateMissing`] for unknown names
    /// - [`TemplateError::PlaceholderMissing`] for absent values
    pub fn fill(&self, task: &str, values: &Placeholders) -> Result<String, TemplateError> {
        self.get(task)?.fill(values)
    }

    /// Registered task names
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Number of templates
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Startup validation
    ///
    /// Every bound task must exist, and every placeholder it references must
    /// be in its stage's supplied set. Templates not bound to a stage are
    /// checked against the union of all supplied sets.
    ///
    /// # Errors
    /// - [`TemplateError::TemplateMissing`] for a missing bound task
    /// - [`TemplateError::Unresolvable`] for a placeholder no stage supplies
    pub fn validate(&self, bindings: &[StageBinding]) -> Result<(), TemplateError> {
        for binding in bindings {
            let template = self.get(binding.task)?;
            check_supplied(template, binding.supplies.iter().copied())?;
        }

        let union: HashSet<&str> = bindings
            .iter()
            .flat_map(|b| b.supplies.iter().copied())
            .collect();
        for template in self.templates.values() {
            if bindings.iter().any(|b| b.task == template.task()) {
                continue;
            }
            check_supplied(template, union.iter().copied())?;
        }
        Ok(())
    }
}

fn check_supplied<'a>(
    template: &PromptTemplate,
    supplies: impl Iterator<Item = &'a str>,
) -> Result<(), TemplateError> {
    let supplied: HashSet<&str> = supplies.chain(SELF_PLACEHOLDERS.iter().copied()).collect();
    match template.placeholders().find(|p| !supplied.contains(p)) {
        Some(missing) => Err(TemplateError::Unresolvable {
            task: template.task().to_string(),
            placeholder: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn parse_definition(path: &Path, text: &str) -> Result<TemplateDefinition, TemplateError> {
    let mut definition: TemplateDefinition =
        serde_yaml::from_str(text).map_err(|source| TemplateError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    if definition.task.trim().is_empty() {
        definition.task = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(definition)
}
