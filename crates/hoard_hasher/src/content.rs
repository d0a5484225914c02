//! Primitive content hashing with a fixed canonicalization.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use hoard_common::ContentHash;
use tokio::sync::Semaphore;

use crate::error::HashError;
use crate::filter::HashingFilter;

/// Separator between the hex digests or pairs of a composite hash.
const SEPARATOR: &str = "-";

/// Hashing primitives used to build fingerprints.
///
/// The value hashes are provided: only path hashing needs an implementation,
/// which lets tests substitute an in-memory file system.
#[async_trait]
pub trait ContentHashing: Send + Sync {
    /// Hashes raw bytes.
    fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        ContentHash::from_bytes(data)
    }

    /// Hashes a UTF-8 string.
    fn hash_str(&self, data: &str) -> ContentHash {
        ContentHash::from_str_content(data)
    }

    /// Hashes a boolean as `"true"` or `"false"`.
    fn hash_bool(&self, value: bool) -> ContentHash {
        self.hash_str(if value { "true" } else { "false" })
    }

    /// Hashes an ordered list of strings. Order is significant.
    fn hash_strings(&self, values: &[String]) -> ContentHash {
        self.hash_str(&values.join(SEPARATOR))
    }

    /// Hashes an unordered map as its `key:value` pairs sorted by key.
    fn hash_map(&self, map: &BTreeMap<String, String>) -> ContentHash {
        let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{v}")).collect();
        self.hash_str(&pairs.join(SEPARATOR))
    }

    /// Hashes the hex renderings of `hashes`, joined in the given order.
    fn hash_joined(&self, hashes: &[ContentHash]) -> ContentHash {
        let hex: Vec<String> = hashes.iter().map(ContentHash::to_hex).collect();
        self.hash_str(&hex.join(SEPARATOR))
    }

    /// Hashes the contents of a file or directory tree.
    async fn hash_path(&self, path: &Path) -> Result<ContentHash, HashError>;
}

/// File-system backed [`ContentHashing`].
///
/// Directory entries are hashed concurrently; every file read holds a permit of
/// a shared semaphore so the number of open files stays bounded no matter how
/// many targets or directories are hashed at once.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    filter: HashingFilter,
    permits: Arc<Semaphore>,
}

impl ContentHasher {
    /// Creates a hasher reading at most `max_concurrency` files at a time.
    pub fn new(filter: HashingFilter, max_concurrency: usize) -> Self {
        Self {
            filter,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Returns the directory entry filter.
    pub fn filter(&self) -> &HashingFilter {
        &self.filter
    }

    /// Hashes `path`, or returns `None` if it is a symlink back into `ancestors`.
    fn hash_entry<'a>(
        &'a self,
        path: PathBuf,
        ancestors: Arc<Vec<PathBuf>>,
    ) -> BoxFuture<'a, Result<Option<ContentHash>, HashError>> {
        async move {
            let meta = tokio::fs::symlink_metadata(&path)
                .await
                .map_err(|e| HashError::from_io(&path, e))?;

            let resolved = if meta.file_type().is_symlink() {
                let resolved = tokio::fs::canonicalize(&path)
                    .await
                    .map_err(|e| HashError::from_io(&path, e))?;
                if ancestors.iter().any(|a| a == &resolved) {
                    tracing::debug!(path = %path.display(), "skipping symlink to ancestor");
                    return Ok(None);
                }
                resolved
            } else {
                path
            };

            let meta = tokio::fs::metadata(&resolved)
                .await
                .map_err(|e| HashError::from_io(&resolved, e))?;
            if meta.is_dir() {
                self.hash_directory(resolved, ancestors).await.map(Some)
            } else {
                self.hash_file(&resolved).await.map(Some)
            }
        }
        .boxed()
    }

    async fn hash_directory(
        &self,
        dir: PathBuf,
        ancestors: Arc<Vec<PathBuf>>,
    ) -> Result<ContentHash, HashError> {
        let canonical = tokio::fs::canonicalize(&dir)
            .await
            .map_err(|e| HashError::from_io(&dir, e))?;
        let mut chain = ancestors.as_ref().clone();
        chain.push(canonical);
        let chain = Arc::new(chain);

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| HashError::from_io(&dir, e))?;
        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HashError::from_io(&dir, e))?
        {
            let path = entry.path();
            if self.filter.accepts(&path) {
                children.push(self.hash_entry(path, Arc::clone(&chain)));
            }
        }

        let mut hashes: Vec<ContentHash> = try_join_all(children)
            .await?
            .into_iter()
            .flatten()
            .collect();
        hashes.sort();
        Ok(self.hash_joined(&hashes))
    }

    async fn hash_file(&self, path: &Path) -> Result<ContentHash, HashError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| HashError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| HashError::from_io(path, e))?;
        Ok(self.hash_bytes(&data))
    }
}

/// Per-invocation memo of path hashes.
///
/// Shared by every target hashed in one run so a file referenced by several
/// targets (or a precompiled dependency used by many) is read once.
#[derive(Debug, Default)]
pub struct PathMemo {
    hashes: Mutex<BTreeMap<PathBuf, ContentHash>>,
}

impl PathMemo {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized hash of `path`, hashing it on first use.
    pub async fn hash(
        &self,
        content: &dyn ContentHashing,
        path: &Path,
    ) -> Result<ContentHash, HashError> {
        let cached = self.lock().get(path).copied();
        if let Some(hash) = cached {
            return Ok(hash);
        }
        let hash = content.hash_path(path).await?;
        self.lock().insert(path.to_path_buf(), hash);
        Ok(hash)
    }

    /// Returns the number of distinct paths hashed.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no path has been hashed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, ContentHash>> {
        // A poisoned memo only means another task panicked mid-insert; the map
        // itself is still consistent.
        self.hashes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(HashingFilter::default(), 8)
    }
}

#[async_trait]
impl ContentHashing for ContentHasher {
    async fn hash_path(&self, path: &Path) -> Result<ContentHash, HashError> {
        let hash = self
            .hash_entry(path.to_path_buf(), Arc::new(Vec::new()))
            .await?;
        // Only a symlink into its own ancestor chain yields `None`, and the
        // root has no ancestors.
        Ok(hash.unwrap_or_else(|| self.hash_joined(&[])))
    }
}
