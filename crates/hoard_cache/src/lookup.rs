//! Batched lookups and stores over many targets.

use std::collections::BTreeMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt, TryStreamExt};
use hoard_common::ContentHash;
use hoard_graph::TargetId;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::storage::{CacheItem, CacheStorage, CacheTier};
use crate::tiered::TieredCacheStorage;

/// Outcome of looking up every fingerprint of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLookupReport {
    /// Hits, in target order.
    pub items: Vec<CacheItem>,
    /// Targets with no artifact in any tier, in target order.
    pub misses: Vec<TargetId>,
    /// Number of hits served by the local tier.
    pub local_hits: usize,
    /// Number of hits downloaded from the remote tier.
    pub remote_hits: usize,
}

impl CacheLookupReport {
    /// Returns the artifact path of every hit, keyed by target.
    pub fn artifacts(&self) -> BTreeMap<TargetId, PathBuf> {
        self.items
            .iter()
            .map(|item| (item.target.clone(), item.path.clone()))
            .collect()
    }

    /// Returns the number of hits.
    pub fn hit_count(&self) -> usize {
        self.items.len()
    }
}

/// An artifact built from source, ready to be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    /// The target it was built from.
    pub target: TargetId,
    /// Fingerprint of the target.
    pub hash: ContentHash,
    /// Paths making up the artifact.
    pub paths: Vec<PathBuf>,
}

/// Looks up every `(target, fingerprint)` pair, at most `concurrency` at a time.
///
/// Any error other than a miss aborts the batch.
pub async fn fetch_hits(
    storage: &TieredCacheStorage,
    targets: &BTreeMap<TargetId, ContentHash>,
    concurrency: usize,
) -> Result<CacheLookupReport, CacheError> {
    let mut results: Vec<(TargetId, Option<CacheItem>)> = stream::iter(targets)
        .map(|(target, hash)| async move {
            let item = storage.fetch_item(target, hash).await?;
            Ok::<_, CacheError>((target.clone(), item))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    results.sort_by(|a, b| a.0.cmp(&b.0));
    let mut report = CacheLookupReport::default();
    for (target, item) in results {
        match item {
            Some(item) => {
                match item.tier {
                    CacheTier::Local => report.local_hits += 1,
                    CacheTier::Remote => report.remote_hits += 1,
                }
                report.items.push(item);
            }
            None => report.misses.push(target),
        }
    }

    tracing::info!(
        hits = report.hit_count(),
        local = report.local_hits,
        remote = report.remote_hits,
        misses = report.misses.len(),
        "cache lookup finished"
    );
    Ok(report)
}

/// Stores every built artifact, at most `concurrency` at a time.
///
/// Returns the number of artifacts stored.
pub async fn store_all(
    storage: &dyn CacheStorage,
    artifacts: &[BuiltArtifact],
    concurrency: usize,
) -> Result<usize, CacheError> {
    stream::iter(artifacts)
        .map(|artifact| async move {
            storage
                .store(&artifact.target.name, &artifact.hash, &artifact.paths)
                .await
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;
    tracing::info!(stored = artifacts.len(), "stored built artifacts");
    Ok(artifacts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalCacheStorage;
    use crate::tiered::RemoteFailurePolicy;
    use std::path::Path;
    use std::sync::Arc;

    fn artifact(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{name}.xcframework"));
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("Info.plist"), name).unwrap();
        path
    }

    #[tokio::test]
    async fn report_splits_hits_and_misses() {
        let work = tempfile::tempdir().unwrap();
        let local = Arc::new(LocalCacheStorage::new(work.path().join("local")));
        let remote = Arc::new(LocalCacheStorage::new(work.path().join("remote")));

        let core = TargetId::new("/p", "Core");
        let net = TargetId::new("/p", "Net");
        let ui = TargetId::new("/p", "UI");
        let hashes: BTreeMap<TargetId, ContentHash> = [
            (core.clone(), ContentHash::from_str_content("core")),
            (net.clone(), ContentHash::from_str_content("net")),
            (ui.clone(), ContentHash::from_str_content("ui")),
        ]
        .into();

        local
            .store("Core", &hashes[&core], &[artifact(work.path(), "Core")])
            .await
            .unwrap();
        remote
            .store("Net", &hashes[&net], &[artifact(work.path(), "Net")])
            .await
            .unwrap();

        let tiered = TieredCacheStorage::new(local, Some(remote), RemoteFailurePolicy::Fail);
        let report = fetch_hits(&tiered, &hashes, 2).await.unwrap();
        assert_eq!(report.hit_count(), 2);
        assert_eq!(report.local_hits, 1);
        assert_eq!(report.remote_hits, 1);
        assert_eq!(report.misses, vec![ui]);
        assert_eq!(report.items[0].target, core);
        assert!(report.artifacts().contains_key(&net));
    }

    #[tokio::test]
    async fn store_all_then_hits() {
        let work = tempfile::tempdir().unwrap();
        let tiered = TieredCacheStorage::new(
            Arc::new(LocalCacheStorage::new(work.path().join("local"))),
            None,
            RemoteFailurePolicy::Fail,
        );
        let built: Vec<BuiltArtifact> = ["A", "B", "C"]
            .iter()
            .map(|name| BuiltArtifact {
                target: TargetId::new("/p", *name),
                hash: ContentHash::from_str_content(name),
                paths: vec![artifact(work.path(), name)],
            })
            .collect();
        assert_eq!(store_all(&tiered, &built, 2).await.unwrap(), 3);

        let hashes: BTreeMap<TargetId, ContentHash> =
            built.iter().map(|b| (b.target.clone(), b.hash)).collect();
        let report = fetch_hits(&tiered, &hashes, 4).await.unwrap();
        assert_eq!(report.local_hits, 3);
        assert!(report.misses.is_empty());
    }

    #[test]
    fn report_serializes() {
        let report = CacheLookupReport {
            misses: vec![TargetId::new("/p", "Core")],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"misses\""));
    }
}
