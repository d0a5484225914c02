//! Which directory entries take part in directory hashes.

use std::collections::BTreeSet;
use std::path::Path;

/// Entry names that never affect a build product.
const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".DS_Store",
    ".build",
    "build",
    "DerivedData",
    "xcuserdata",
];

/// Filter applied to the immediate entries of every hashed directory.
///
/// Excludes VCS metadata, build-artifact directories, and any configured names
/// or extensions. Symlinks that point back at the directory being hashed (or
/// one of its ancestors) are rejected by the hasher itself, since that check
/// needs the resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashingFilter {
    excluded_names: BTreeSet<String>,
    excluded_extensions: BTreeSet<String>,
}

impl Default for HashingFilter {
    fn default() -> Self {
        Self {
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            excluded_extensions: BTreeSet::new(),
        }
    }
}

impl HashingFilter {
    /// Creates the default filter extended with extra names and extensions.
    ///
    /// Extensions may be given with or without a leading dot.
    pub fn new(
        names: impl IntoIterator<Item = impl Into<String>>,
        extensions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut filter = Self::default();
        filter.excluded_names.extend(names.into_iter().map(Into::into));
        filter.excluded_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_string()),
        );
        filter
    }

    /// Returns `true` if `path` should contribute to its directory's hash.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if self.excluded_names.contains(name) {
            return false;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => !self.excluded_extensions.contains(ext),
            None => true,
        }
    }
}
