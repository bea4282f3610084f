//! Source units and input-tree discovery
//!
//! A [`SourceUnit`] is one compilation unit of the code under test. Units are
//! discovered once at pipeline start and never change afterwards.

use crate::hash::ContentHash;
use crate::signature::{extract_signatures, Signature};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directories never descended into during discovery
const SKIPPED_DIRS: &[&str] = &["build", ".git"];

/// Header extensions scanned for companion declarations
const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hxx", "h++"];

/// Default source extensions (C++ translation units)
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c++"];

/// Stable identity of a source unit: its path relative to the input root,
/// with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create from a relative path string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().replace('\\', "/"))
    }

    /// Identity as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem of the unit (`src/calculator.cpp` → `calculator`)
    #[must_use]
    pub fn stem(&self) -> &str {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.rsplit_once('.').map_or(file, |(stem, _)| stem)
    }

    /// Filesystem-safe name unique to this identity
    ///
    /// The readable flattening is lossy (`a/b.cpp` and `a_b.cpp` both become
    /// `a_b_cpp`), so it is suffixed with the short hash of the full identity.
    #[must_use]
    pub fn slug(&self) -> String {
        let readable: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{readable}-{}", ContentHash::compute(self.0.as_bytes()).short())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One file of the code under test
///
/// Cheap to clone: the source text is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    id: UnitId,
    path: PathBuf,
    source: Arc<str>,
    signatures: Arc<[Signature]>,
}

impl SourceUnit {
    /// Create a unit from already-loaded text; signatures are extracted here.
    #[must_use]
    pub fn new(id: UnitId, path: impl Into<PathBuf>, source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        let signatures = extract_signatures(&source).into();
        Self {
            id,
            path: path.into(),
            source,
            signatures,
        }
    }

    /// Create a unit with explicit signatures (e.g. merged with a header)
    #[must_use]
    pub fn with_signatures(mut self, signatures: Vec<Signature>) -> Self {
        self.signatures = signatures.into();
        self
    }

    /// Load a unit from disk, scanning a same-stem header if present
    ///
    /// # Errors
    /// Returns [`DiscoveryError::Read`] if the file cannot be read.
    pub fn load(root: &Path, path: &Path) -> Result<Self, DiscoveryError> {
        let source = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = UnitId::new(relative.to_string_lossy());

        let mut signatures = companion_header(path)
            .and_then(|header| std::fs::read_to_string(header).ok())
            .map(|text| extract_signatures(&text))
            .unwrap_or_default();
        for sig in extract_signatures(&source) {
            let bare = sig.name.rsplit("::").next().unwrap_or(&sig.name);
            let known = signatures.iter().any(|s| {
                s.kind == sig.kind
                    && s.name.rsplit("::").next() == Some(bare)
                    && s.parameters == sig.parameters
            });
            if !known {
                signatures.push(sig);
            }
        }

        Ok(Self::new(id, path, source).with_signatures(signatures))
    }

    /// Unit identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Absolute (or caller-relative) path on disk
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Immutable source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Extracted signatures (prompt context only)
    #[inline]
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Source file extension, defaulting to `cpp`
    #[must_use]
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("cpp")
    }

    /// File name of the generated test for this unit (`test_<stem>.<ext>`)
    #[must_use]
    pub fn test_file_name(&self) -> String {
        format!("test_{}.{}", self.id.stem(), self.extension())
    }
}

fn companion_header(path: &Path) -> Option<PathBuf> {
    HEADER_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Errors while discovering source units
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Input root missing or not a directory
    #[error("input directory does not exist: {0}")]
    MissingRoot(PathBuf),

    /// Walker failure
    #[error("failed to walk input tree: {0}")]
    Walk(#[from] ignore::Error),

    /// Unreadable file
    #[error("io error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Discover source units under `root`
///
/// Walks the tree (skipping build and VCS directories and every directory in
/// `exclude`), keeps files whose extension is in `extensions`, and returns
/// units sorted by identity. Exclusions that do not exist are ignored.
///
/// # Errors
/// - [`DiscoveryError::MissingRoot`] if `root` is not a directory
/// - [`DiscoveryError::Walk`] / [`DiscoveryError::Read`] on I/O failures
pub fn discover_units(
    root: &Path,
    extensions: &[String],
    exclude: &[PathBuf],
) -> Result<Vec<SourceUnit>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::MissingRoot(root.to_path_buf()));
    }
    let excluded: Vec<PathBuf> = exclude.iter().filter_map(|p| p.canonicalize().ok()).collect();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if SKIPPED_DIRS.iter().any(|d| *d == name) || name.starts_with("cmake-build-") {
                return false;
            }
            excluded.is_empty() || !entry.path().canonicalize().is_ok_and(|path| excluded.contains(&path))
        })
        .build();

    let mut units = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want.trim_start_matches('.') == ext));
        if matches {
            units.push(SourceUnit::load(root, entry.path())?);
        }
    }

    units.sort_by(|a, b| a.id().cmp(b.id()));
    tracing::debug!(root = %root.display(), count = units.len(), "discovered source units");
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts() -> Vec<String> {
        DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn unit_id_helpers() {
        let id = UnitId::new("src\\math\\calculator.cpp");
        assert_eq!(id.as_str(), "src/math/calculator.cpp");
        assert_eq!(id.stem(), "calculator");
        assert!(id.slug().starts_with("src_math_calculator_cpp-"));
        assert_eq!(id.slug(), UnitId::new("src/math/calculator.cpp").slug());
    }

    #[test]
    fn slugs_differ_for_ids_that_flatten_alike() {
        for (a, b) in [("a/b.cpp", "a_b.cpp"), ("é.cpp", "ü.cpp"), ("x-y.cpp", "x/y.cpp")] {
            let (a, b) = (UnitId::new(a), UnitId::new(b));
            assert_ne!(a.slug(), b.slug(), "{a} and {b}");
            assert!(a.slug().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn discovers_sorted_and_skips_build() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/generated.cpp"), "int x;").unwrap();
        fs::write(root.join("string_utils.cpp"), "int len(const char* s) { return 0; }").unwrap();
        fs::write(root.join("calculator.cpp"), "int add(int a, int b) { return a + b; }").unwrap();
        fs::write(root.join("calculator.h"), "int add(int a, int b);\nint sub(int a, int b);").unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let units = discover_units(root, &exts(), &[]).unwrap();
        let ids: Vec<_> = units.iter().map(|u| u.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["calculator.cpp", "string_utils.cpp"]);

        // header contributes `sub`, source `add` is de-duplicated
        let calc = &units[0];
        let names: Vec<_> = calc.signatures().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["add", "sub"]);
        assert_eq!(calc.test_file_name(), "test_calculator.cpp");
    }

    #[test]
    fn excluded_output_tree_is_not_rediscovered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let output = root.join("generated_tests");
        fs::create_dir_all(output.join(".utgen-work/calc_cpp")).unwrap();
        fs::write(root.join("calc.cpp"), "int add(int a, int b) { return a + b; }").unwrap();
        fs::write(output.join("test_calc.cpp"), "TEST(Calc, Add) {}").unwrap();
        fs::write(output.join(".utgen-work/calc_cpp/test_calc.cpp"), "TEST(Calc, Add) {}").unwrap();

        let everything = discover_units(root, &exts(), &[]).unwrap();
        assert_eq!(everything.len(), 3);

        let exclude = [output, root.join("not-created-yet")];
        let units = discover_units(root, &exts(), &exclude).unwrap();
        let ids: Vec<_> = units.iter().map(|u| u.id().as_str()).collect();
        assert_eq!(ids, vec!["calc.cpp"]);
    }

    #[test]
    fn missing_root_is_error() {
        let err = discover_units(Path::new("/definitely/not/here"), &exts(), &[]).unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingRoot(_)));
    }
}
