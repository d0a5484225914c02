//! The storage abstraction shared by every cache tier.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hoard_common::{is_staging_entry, ContentHash};
use hoard_graph::TargetId;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A key/value store of build artifacts keyed by `(name, fingerprint)`.
///
/// Implementations must be safe to call concurrently for different keys.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Returns `true` if an artifact for `(name, hash)` is available.
    async fn exists(&self, name: &str, hash: &ContentHash) -> Result<bool, CacheError>;

    /// Returns a local path to the artifact for `(name, hash)`.
    ///
    /// Fails with [`CacheError::NotFound`] when the artifact is absent.
    async fn fetch(&self, name: &str, hash: &ContentHash) -> Result<PathBuf, CacheError>;

    /// Stores `paths` as the artifact for `(name, hash)`.
    ///
    /// Storing a key that already exists is a no-op.
    async fn store(&self, name: &str, hash: &ContentHash, paths: &[PathBuf])
        -> Result<(), CacheError>;

    /// Drops any transient local copy [`fetch`](Self::fetch) made for
    /// `(name, hash)`. Tiers that return their own storage do nothing.
    async fn release(&self, _name: &str, _hash: &ContentHash) -> Result<(), CacheError> {
        Ok(())
    }
}

/// The tier an artifact was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// The local disk cache.
    Local,
    /// The remote cache service.
    Remote,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// A successful cache lookup for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    /// The target the artifact was built from.
    pub target: TargetId,
    /// The fingerprint it was looked up with.
    pub hash: ContentHash,
    /// Local path of the artifact.
    pub path: PathBuf,
    /// Where the artifact came from.
    pub tier: CacheTier,
}

/// Returns `true` if `path` is the artifact of `name`: its file stem equals
/// `name` (`Core.xcframework` for `Core`).
pub(crate) fn is_artifact_of(path: &Path, name: &str) -> bool {
    !is_staging_entry(path) && path.file_stem().and_then(|s| s.to_str()) == Some(name)
}

/// Locates the artifact of `name` inside a fingerprint directory.
///
/// Only an entry whose file stem equals `name` matches; other artifacts
/// sharing the fingerprint are never returned.
pub(crate) fn artifact_in(dir: &Path, name: &str) -> Result<Option<PathBuf>, CacheError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(dir, e)),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CacheError::io(dir, e))?.path();
        if is_artifact_of(&path, name) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_prefers_matching_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Core.xcframework")).unwrap();
        std::fs::write(dir.path().join("A.txt"), "x").unwrap();
        let found = artifact_in(dir.path(), "Core").unwrap().unwrap();
        assert_eq!(found, dir.path().join("Core.xcframework"));
    }

    #[test]
    fn other_names_never_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("A.xcframework")).unwrap();
        std::fs::write(dir.path().join("a.bin"), "x").unwrap();
        assert!(artifact_in(dir.path(), "B").unwrap().is_none());
        assert!(artifact_in(dir.path(), "Core").unwrap().is_none());
        assert!(artifact_in(dir.path(), "A").unwrap().is_some());
    }

    #[test]
    fn missing_or_staging_only_directory_has_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        assert!(artifact_in(&dir.path().join("nope"), "Core").unwrap().is_none());
        std::fs::create_dir(dir.path().join(".staging-x")).unwrap();
        assert!(artifact_in(dir.path(), "Core").unwrap().is_none());
    }

    #[test]
    fn tier_display_and_serde() {
        assert_eq!(CacheTier::Remote.to_string(), "remote");
        assert_eq!(serde_json::to_string(&CacheTier::Local).unwrap(), "\"local\"");
    }
}
