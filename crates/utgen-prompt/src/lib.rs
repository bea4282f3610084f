//! utgen Prompt Templates
//!
//! Declarative, data-driven prompt templates for the three pipeline tasks,
//! plus extraction of test code from model responses.
//!
//! Templates are YAML documents with a `task`, an `objective`, a list of
//! `requirements` and a `prompt_template` body using `{name}` placeholders.
//! Built-in definitions ship with the crate and can be overridden from an
//! instructions directory.
//!
//! ```rust,ignore
//! use utgen_prompt::{Placeholders, TemplateRegistry, INITIAL_TEST_GENERATION, PIPELINE_BINDINGS};
//!
//! let registry = TemplateRegistry::builtin()?;
//! registry.validate(PIPELINE_BINDINGS)?;
//! let prompt = registry.fill(INITIAL_TEST_GENERATION, &values)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod extract;
mod registry;
mod template;

pub use error::TemplateError;
pub use extract::extract_code_block;
pub use registry::{
    placeholders, StageBinding, TemplateRegistry, BUILD_ISSUE_FIXING, FIXING_SUPPLIES,
    GENERATION_SUPPLIES, INITIAL_TEST_GENERATION, PIPELINE_BINDINGS, REFINEMENT_SUPPLIES,
    TEST_REFINEMENT,
};
pub use template::{Placeholders, PromptTemplate, TemplateDefinition, SELF_PLACEHOLDERS};
