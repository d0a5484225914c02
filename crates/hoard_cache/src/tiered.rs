//! Local-then-remote composite storage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hoard_common::ContentHash;
use hoard_graph::TargetId;

use crate::error::CacheError;
use crate::storage::{CacheItem, CacheStorage, CacheTier};

/// What to do when the remote tier fails with a retryable error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoteFailurePolicy {
    /// Surface the error to the caller.
    #[default]
    Fail,
    /// Log a warning and treat the remote tier as a miss.
    Degrade,
}

type KeyLock = Arc<tokio::sync::Mutex<()>>;
type LockMap = Mutex<HashMap<(String, ContentHash), KeyLock>>;

/// Holds the lock of one `(name, hash)` key. On drop the key is removed from
/// the map unless another operation is holding or waiting for it.
struct KeyGuard<'a> {
    locks: &'a LockMap,
    key: (String, ContentHash),
    lock: KeyLock,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Composite storage: a local tier in front of an optional remote tier.
///
/// Lookups try the local tier first. A remote hit is written through to the
/// local tier and the local path is returned, so the next lookup is local.
/// Operations on the same `(name, hash)` are serialized by a per-key lock;
/// different keys proceed concurrently.
pub struct TieredCacheStorage {
    local: Arc<dyn CacheStorage>,
    remote: Option<Arc<dyn CacheStorage>>,
    policy: RemoteFailurePolicy,
    locks: LockMap,
}

impl TieredCacheStorage {
    /// Creates a tiered storage. Without a remote tier it behaves like `local`.
    pub fn new(
        local: Arc<dyn CacheStorage>,
        remote: Option<Arc<dyn CacheStorage>>,
        policy: RemoteFailurePolicy,
    ) -> Self {
        Self {
            local,
            remote,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if a remote tier is configured.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Returns the failure policy of the remote tier.
    pub fn policy(&self) -> RemoteFailurePolicy {
        self.policy
    }

    async fn lock_key(&self, name: &str, hash: &ContentHash) -> KeyGuard<'_> {
        let key = (name.to_string(), *hash);
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        KeyGuard {
            locks: &self.locks,
            key,
            lock,
            guard: Some(guard),
        }
    }

    /// Applies the failure policy to a remote error. `Ok(())` means "miss".
    fn degrade(&self, name: &str, hash: &ContentHash, err: CacheError) -> Result<(), CacheError> {
        if err.is_not_found() {
            return Ok(());
        }
        if self.policy == RemoteFailurePolicy::Degrade && err.is_retryable() {
            tracing::warn!(name, hash = %hash, tier = "remote", error = %err, "remote cache unavailable, continuing without it");
            return Ok(());
        }
        Err(err)
    }

    /// Looks up `(name, hash)` and returns the local path and its tier of
    /// origin, or `None` on a miss in every tier.
    pub async fn lookup(
        &self,
        name: &str,
        hash: &ContentHash,
    ) -> Result<Option<(PathBuf, CacheTier)>, CacheError> {
        let _guard = self.lock_key(name, hash).await;

        match self.local.fetch(name, hash).await {
            Ok(path) => return Ok(Some((path, CacheTier::Local))),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        let downloaded = match remote.fetch(name, hash).await {
            Ok(path) => path,
            Err(err) => {
                self.degrade(name, hash, err)?;
                return Ok(None);
            }
        };

        self.local.store(name, hash, &[downloaded]).await?;
        let path = self.local.fetch(name, hash).await?;
        if let Err(err) = remote.release(name, hash).await {
            tracing::warn!(name, hash = %hash, error = %err, "could not remove downloaded copy");
        }
        tracing::debug!(name, hash = %hash, tier = "remote", "wrote remote hit through to local cache");
        Ok(Some((path, CacheTier::Remote)))
    }

    /// Like [`lookup`](Self::lookup), producing a [`CacheItem`] for `target`.
    pub async fn fetch_item(
        &self,
        target: &TargetId,
        hash: &ContentHash,
    ) -> Result<Option<CacheItem>, CacheError> {
        Ok(self
            .lookup(&target.name, hash)
            .await?
            .map(|(path, tier)| CacheItem {
                target: target.clone(),
                hash: *hash,
                path,
                tier,
            }))
    }
}

#[async_trait]
impl CacheStorage for TieredCacheStorage {
    async fn exists(&self, name: &str, hash: &ContentHash) -> Result<bool, CacheError> {
        let _guard = self.lock_key(name, hash).await;

        if self.local.exists(name, hash).await? {
            return Ok(true);
        }
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        match remote.exists(name, hash).await {
            Ok(found) => Ok(found),
            Err(err) => self.degrade(name, hash, err).map(|()| false),
        }
    }

    async fn fetch(&self, name: &str, hash: &ContentHash) -> Result<PathBuf, CacheError> {
        self.lookup(name, hash)
            .await?
            .map(|(path, _)| path)
            .ok_or_else(|| CacheError::not_found(name, hash))
    }

    async fn store(
        &self,
        name: &str,
        hash: &ContentHash,
        paths: &[PathBuf],
    ) -> Result<(), CacheError> {
        let _guard = self.lock_key(name, hash).await;

        self.local.store(name, hash, paths).await?;
        if let Some(remote) = &self.remote {
            if let Err(err) = remote.store(name, hash, paths).await {
                self.degrade(name, hash, err)?;
            }
        }
        Ok(())
    }
}
