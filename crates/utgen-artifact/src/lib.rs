//! utgen Artifact Model
//!
//! The data threaded through the synthesis pipeline.
//!
//! # Core Concepts
//!
//! - [`SourceUnit`]: one immutable file of the code under test
//! - [`TestArtifact`]: one revision of generated test text
//! - [`BuildReport`]: outcome of compiling and running a revision
//! - [`CoverageReport`]: line/branch coverage of a built revision
//! - [`ContentHash`]: Blake3 hash identifying revision text
//!
//! # Example
//!
//! ```rust,ignore
//! use utgen_artifact::{discover_units, TestArtifact, Stage};
//!
//! let units = discover_units(Path::new("src"), &["cpp".into()], &[])?;
//! let rev0 = TestArtifact::initial(generated_text);
//! let rev1 = rev0.next(Stage::Fix, repaired_text)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod hash;
mod report;
mod signature;
mod test_artifact;
mod unit;

pub use hash::{ContentHash, HashError};
pub use report::{BuildReport, CoverageReport, Diagnostic, Severity};
pub use signature::{extract_signatures, render_signatures, Signature, SignatureKind};
pub use test_artifact::{ArtifactError, Stage, TestArtifact};
pub use unit::{discover_units, DiscoveryError, SourceUnit, UnitId, DEFAULT_SOURCE_EXTENSIONS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
