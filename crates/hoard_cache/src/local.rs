//! The local disk tier.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hoard_common::{copy_path, is_staging_entry, rename_into_place, ContentHash, StagingDir};

use crate::error::CacheError;
use crate::storage::{artifact_in, is_artifact_of, CacheStorage};

/// Directory under a cache root that receives remote downloads before they
/// are written through to the local tier.
pub const DOWNLOADS_DIR: &str = ".downloads";

/// Content-addressed artifact store on the local file system.
///
/// Layout is `<root>/<fingerprint>/<artifact>`, where the artifact of target
/// `name` is the entry whose file stem is `name`. Several targets may share a
/// fingerprint directory. Stores are assembled in a staging directory under
/// `<root>` and each artifact is published with an atomic rename, so
/// concurrent processes sharing the directory never observe a partial
/// artifact. Blocking file work runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct LocalCacheStorage {
    root: PathBuf,
}

impl LocalCacheStorage {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding the artifacts of `hash`.
    pub fn path_for(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }

    /// Lists the fingerprints present in the cache, in order.
    pub async fn entries(&self) -> Result<Vec<ContentHash>, CacheError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_entries(&root)).await?
    }

    /// Removes the artifacts of `hash`. Returns `false` if there were none.
    pub async fn remove(&self, hash: &ContentHash) -> Result<bool, CacheError> {
        let dir = self.path_for(hash);
        tokio::task::spawn_blocking(move || remove_dir(&dir)).await?
    }

    /// Removes every fingerprint not in `live`, plus leftover staging
    /// directories of interrupted stores and the [`DOWNLOADS_DIR`] of remote
    /// fetches. Returns the number of entries removed.
    pub async fn gc(&self, live: &BTreeSet<ContentHash>) -> Result<usize, CacheError> {
        let root = self.root.clone();
        let live = live.clone();
        let removed = tokio::task::spawn_blocking(move || -> Result<usize, CacheError> {
            let mut removed = 0;
            for path in read_root(&root)? {
                let stale = is_staging_entry(&path)
                    || is_downloads(&path)
                    || parse_entry(&path).is_some_and(|hash| !live.contains(&hash));
                if stale && remove_dir(&path)? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
        .await??;
        tracing::info!(removed, root = %self.root.display(), "garbage-collected local cache");
        Ok(removed)
    }

    /// Removes every entry of the cache. Returns the number removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        self.gc(&BTreeSet::new()).await
    }
}

#[async_trait]
impl CacheStorage for LocalCacheStorage {
    async fn exists(&self, name: &str, hash: &ContentHash) -> Result<bool, CacheError> {
        let dir = self.path_for(hash);
        let name = name.to_string();
        let found = tokio::task::spawn_blocking(move || artifact_in(&dir, &name)).await??;
        Ok(found.is_some())
    }

    async fn fetch(&self, name: &str, hash: &ContentHash) -> Result<PathBuf, CacheError> {
        let dir = self.path_for(hash);
        let owned = name.to_string();
        tokio::task::spawn_blocking(move || artifact_in(&dir, &owned))
            .await??
            .ok_or_else(|| CacheError::not_found(name, hash))
    }

    async fn store(
        &self,
        name: &str,
        hash: &ContentHash,
        paths: &[PathBuf],
    ) -> Result<(), CacheError> {
        let root = self.root.clone();
        let dest = self.path_for(hash);
        let label = hash.to_hex();
        let owner = name.to_string();
        let paths = paths.to_vec();

        let published = tokio::task::spawn_blocking(move || {
            publish_artifacts(&root, &dest, &label, &owner, &paths)
        })
        .await??;

        if published > 0 {
            tracing::debug!(name, hash = %hash, tier = "local", published, "stored artifact");
        } else {
            tracing::debug!(name, hash = %hash, tier = "local", "artifact already cached");
        }
        Ok(())
    }
}

/// Copies `paths` into a staging directory and renames each one into `dest`.
///
/// Entries already present in `dest` are kept. The artifact of `owner` is
/// published last, so once it is visible its siblings are too. Returns the
/// number of entries published.
fn publish_artifacts(
    root: &Path,
    dest: &Path,
    label: &str,
    owner: &str,
    paths: &[PathBuf],
) -> Result<usize, CacheError> {
    if !paths.iter().any(|path| is_artifact_of(path, owner)) {
        return Err(CacheError::UnnamedArtifact {
            name: owner.to_string(),
        });
    }

    let mut pending = Vec::new();
    for path in paths {
        let file_name = path.file_name().ok_or_else(|| {
            CacheError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "artifact path has no file name",
                ),
            )
        })?;
        if !dest.join(file_name).exists() {
            pending.push((path, file_name));
        }
    }
    if pending.is_empty() {
        return Ok(0);
    }
    // Stable sort: `false` before `true` puts the owner's artifact last.
    pending.sort_by_key(|(path, _)| is_artifact_of(path, owner));

    let staging = StagingDir::new_in(root, label)?;
    for (path, file_name) in &pending {
        copy_path(path, &staging.path().join(file_name))?;
    }
    let mut published = 0;
    for (_, file_name) in &pending {
        if rename_into_place(&staging.path().join(file_name), &dest.join(file_name))? {
            published += 1;
        }
    }
    Ok(published)
}

fn read_root(root: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CacheError::io(root, e)),
    };
    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry.map_err(|e| CacheError::io(root, e))?.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_downloads(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == DOWNLOADS_DIR)
}

fn parse_entry(path: &Path) -> Option<ContentHash> {
    path.file_name()?.to_str()?.parse().ok()
}

fn list_entries(root: &Path) -> Result<Vec<ContentHash>, CacheError> {
    let mut hashes: Vec<ContentHash> = read_root(root)?
        .iter()
        .filter(|p| p.is_dir())
        .filter_map(|p| parse_entry(p))
        .collect();
    hashes.sort();
    Ok(hashes)
}

fn remove_dir(dir: &Path) -> Result<bool, CacheError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(dir, e)),
    }
}
