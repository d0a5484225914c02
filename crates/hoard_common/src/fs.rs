//! Atomic filesystem helpers shared by the cache tiers.
//!
//! Artifacts are always assembled inside a [`StagingDir`] next to their final
//! location and published with a single `rename`, so a concurrent reader (another
//! build sharing the same cache directory) either sees the complete artifact or
//! nothing at all.

use std::path::{Path, PathBuf};

/// Prefix of every staging entry. Readers skip entries starting with it.
pub const STAGING_PREFIX: &str = ".staging-";

/// Errors raised by the filesystem helpers.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// An I/O error occurred on the given path.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl FsError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A uniquely named scratch directory that is removed on drop unless persisted.
///
/// Dropping a `StagingDir` (for example when the task writing into it is
/// cancelled) deletes everything written so far, leaving no torn artifacts.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    persisted: bool,
}

impl StagingDir {
    /// Creates `<parent>/.staging-<label>-<uuid>`, creating `parent` if needed.
    pub fn new_in(parent: &Path, label: &str) -> Result<Self, FsError> {
        std::fs::create_dir_all(parent).map_err(|e| FsError::io(parent, e))?;
        let path = parent.join(format!("{STAGING_PREFIX}{label}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir(&path).map_err(|e| FsError::io(&path, e))?;
        Ok(Self {
            path,
            persisted: false,
        })
    }

    /// Returns the staging directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically renames the staging directory to `dest`.
    ///
    /// Returns `Ok(false)` when `dest` already exists, in which case the staged
    /// content is discarded on drop.
    pub fn persist_to(mut self, dest: &Path) -> Result<bool, FsError> {
        let moved = rename_into_place(&self.path, dest)?;
        self.persisted = moved;
        Ok(moved)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// Returns `true` if the file name marks a staging entry.
pub fn is_staging_entry(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(STAGING_PREFIX))
}

/// Renames `src` to `dest` unless `dest` already exists.
///
/// Returns `Ok(true)` if the rename happened. Losing a race against another
/// writer publishing the same `dest` is reported as `Ok(false)`.
pub fn rename_into_place(src: &Path, dest: &Path) -> Result<bool, FsError> {
    if dest.exists() {
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FsError::io(parent, e))?;
    }
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(true),
        Err(_) if dest.exists() => Ok(false),
        Err(e) => Err(FsError::io(dest, e)),
    }
}

/// Recursively copies a file, directory, or symlink from `src` to `dest`.
///
/// Symlinks are recreated as symlinks rather than followed.
pub fn copy_path(src: &Path, dest: &Path) -> Result<(), FsError> {
    let meta = std::fs::symlink_metadata(src).map_err(|e| FsError::io(src, e))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = std::fs::read_link(src).map_err(|e| FsError::io(src, e))?;
        return make_symlink(&target, dest);
    }

    if file_type.is_dir() {
        std::fs::create_dir_all(dest).map_err(|e| FsError::io(dest, e))?;
        let entries = std::fs::read_dir(src).map_err(|e| FsError::io(src, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| FsError::io(src, e))?;
            copy_path(&entry.path(), &dest.join(entry.file_name()))?;
        }
        return Ok(());
    }

    std::fs::copy(src, dest).map_err(|e| FsError::io(src, e))?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<(), FsError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| FsError::io(link, e))
}

#[cfg(not(unix))]
fn make_symlink(target: &Path, link: &Path) -> Result<(), FsError> {
    let resolved = link.parent().map_or_else(|| target.to_path_buf(), |p| p.join(target));
    copy_path(&resolved, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_dir_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let staging = StagingDir::new_in(root.path(), "abc").unwrap();
            std::fs::write(staging.path().join("partial"), b"half").unwrap();
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
        assert!(is_staging_entry(&path));
    }

    #[test]
    fn staging_dir_persists_atomically() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingDir::new_in(root.path(), "abc").unwrap();
        std::fs::write(staging.path().join("artifact"), b"full").unwrap();

        let dest = root.path().join("final");
        assert!(staging.persist_to(&dest).unwrap());
        assert_eq!(std::fs::read(dest.join("artifact")).unwrap(), b"full");
    }

    #[test]
    fn persist_onto_existing_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("final");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("artifact"), b"first").unwrap();

        let staging = StagingDir::new_in(root.path(), "abc").unwrap();
        std::fs::write(staging.path().join("artifact"), b"second").unwrap();
        let staged = staging.path().to_path_buf();

        assert!(!staging.persist_to(&dest).unwrap());
        assert_eq!(std::fs::read(dest.join("artifact")).unwrap(), b"first");
        assert!(!staged.exists());
    }

    #[test]
    fn copy_path_copies_nested_directories() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("Core.framework");
        std::fs::create_dir_all(src.join("Headers")).unwrap();
        std::fs::write(src.join("Core"), b"binary").unwrap();
        std::fs::write(src.join("Headers/Core.h"), b"header").unwrap();

        let dest = root.path().join("copy.framework");
        copy_path(&src, &dest).unwrap();
        assert_eq!(std::fs::read(dest.join("Core")).unwrap(), b"binary");
        assert_eq!(std::fs::read(dest.join("Headers/Core.h")).unwrap(), b"header");
    }

    #[cfg(unix)]
    #[test]
    fn copy_path_preserves_symlinks() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(src.join("real"), b"data").unwrap();
        std::os::unix::fs::symlink("real", src.join("link")).unwrap();

        let dest = root.path().join("dest");
        copy_path(&src, &dest).unwrap();
        let link = std::fs::read_link(dest.join("link")).unwrap();
        assert_eq!(link, PathBuf::from("real"));
    }

    #[test]
    fn copy_missing_source_errors() {
        let root = tempfile::tempdir().unwrap();
        let err = copy_path(&root.path().join("missing"), &root.path().join("x")).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
