//! utgen Toolchain Adapters
//!
//! The [`BuildRunner`] and [`CoverageProbe`] capabilities, and an
//! implementation over CMake, GoogleTest and gcov ([`CmakeToolchain`]).
//!
//! Ordinary compile and test failures are data ([`BuildReport`] with
//! `success == false`). A [`ToolchainError`] means the toolchain itself
//! failed and the unit cannot proceed.
//!
//! [`BuildReport`]: utgen_artifact::BuildReport

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod adapter;
mod cmake;
mod diagnostics;
mod error;
mod gcov;
mod probe;
mod process;

pub use adapter::{BuildRunner, CoverageProbe};
pub use cmake::{CmakeProject, CmakeSettings, CmakeToolchain, TEST_TARGET};
pub use diagnostics::parse_diagnostics;
pub use error::ToolchainError;
pub use gcov::{parse_annotation, parse_summary, GcovSummary};
pub use probe::{check_dependencies, DependencyReport, ToolStatus, CANDIDATE_COMPILERS};
