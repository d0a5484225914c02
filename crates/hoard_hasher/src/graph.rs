//! Fingerprints for every cacheable target of a graph.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use hoard_common::ContentHash;
use hoard_graph::{Graph, GraphError, GraphTarget, GraphTraverser, TargetId};

use crate::content::{ContentHasher, ContentHashing, PathMemo};
use crate::error::HashError;
use crate::profile::{CacheOutputType, CacheProfile};
use crate::target::{HashContext, TargetContentHasher};

/// Result of hashing a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphHashes {
    /// Fingerprint of every target selected by the cacheable predicate.
    pub hashes: BTreeMap<TargetId, ContentHash>,
    /// Number of targets hashed, including non-cacheable dependencies.
    pub hashed_targets: usize,
    /// Number of distinct paths read.
    pub hashed_paths: usize,
}

impl GraphHashes {
    /// Returns the fingerprint of a target, if it was selected.
    pub fn get(&self, id: &TargetId) -> Option<&ContentHash> {
        self.hashes.get(id)
    }

    /// Returns the number of fingerprints.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Returns `true` if no target was selected.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Default cacheable predicate: framework products.
pub fn is_cacheable(target: &GraphTarget<'_>) -> bool {
    target.target.product.is_framework()
}

/// Computes dependency-aware fingerprints for the targets of a graph.
///
/// Targets are hashed level by level (see
/// [`GraphTraverser::dependency_levels`]), so each target's dependencies are
/// fingerprinted before the target itself. Targets in the same level share no
/// edge and are hashed concurrently, at most `max_concurrency` at a time.
#[derive(Clone)]
pub struct GraphContentHasher {
    content: Arc<dyn ContentHashing>,
    max_concurrency: usize,
}

impl Default for GraphContentHasher {
    fn default() -> Self {
        Self::new(Arc::new(ContentHasher::default()), 8)
    }
}

impl GraphContentHasher {
    /// Creates a graph hasher over `content`.
    pub fn new(content: Arc<dyn ContentHashing>, max_concurrency: usize) -> Self {
        Self {
            content,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Fingerprints every target accepted by `include` and, transitively,
    /// the targets it depends on.
    ///
    /// Only targets accepted by `include` are reported in
    /// [`GraphHashes::hashes`]. Fails on cycles, dangling references, and
    /// unreadable sources.
    pub async fn content_hashes(
        &self,
        graph: &Graph,
        include: impl Fn(&GraphTarget<'_>) -> bool,
        profile: &CacheProfile,
        output: CacheOutputType,
        additional_strings: &[String],
    ) -> Result<GraphHashes, HashError> {
        graph.validate()?;
        let traverser = GraphTraverser::new(graph);

        let selected: BTreeSet<TargetId> = traverser
            .targets_matching(|t| include(t))
            .iter()
            .map(GraphTarget::id)
            .collect();

        let mut to_hash = selected.clone();
        for id in &selected {
            let dependencies = traverser.all_dependencies(id)?;
            to_hash.extend(dependencies.iter().filter_map(|d| d.target_id()));
        }

        let paths = PathMemo::new();
        let mut hashes = BTreeMap::new();
        for level in traverser.dependency_levels(&to_hash)? {
            let computed: Vec<(TargetId, ContentHash)> = {
                let ctx = HashContext {
                    profile,
                    output,
                    additional_strings,
                    hashes: &hashes,
                    paths: &paths,
                };
                stream::iter(level)
                    .map(|id| self.hash_target(&traverser, id, &ctx))
                    .buffer_unordered(self.max_concurrency)
                    .try_collect()
                    .await?
            };
            hashes.extend(computed);
        }

        let hashed_targets = hashes.len();
        hashes.retain(|id, _| selected.contains(id));
        tracing::info!(
            targets = hashed_targets,
            cacheable = hashes.len(),
            paths = paths.len(),
            profile = %profile,
            "computed graph fingerprints"
        );

        Ok(GraphHashes {
            hashes,
            hashed_targets,
            hashed_paths: paths.len(),
        })
    }

    async fn hash_target(
        &self,
        traverser: &GraphTraverser<'_>,
        id: TargetId,
        ctx: &HashContext<'_>,
    ) -> Result<(TargetId, ContentHash), HashError> {
        let target = traverser
            .target(&id)
            .ok_or_else(|| GraphError::UnknownTarget {
                name: id.name.clone(),
                project: id.project.clone(),
            })?;
        let dependencies = traverser.direct_dependencies(&id);
        let hash = TargetContentHasher::new(self.content.as_ref())
            .hash(&target, &dependencies, ctx)
            .await
            .map_err(|e| e.in_target(&id.name))?;
        tracing::debug!(target_name = %id.name, hash = %hash, "hashed target");
        Ok((id, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_graph::{GraphDependency, Product, Project, Target};
    use std::path::Path;

    fn profile() -> CacheProfile {
        CacheProfile::new("Debug", "ios")
    }

    fn write(path: &Path, data: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    /// App -> Features -> Core, Utils standalone.
    fn graph(root: &Path) -> Graph {
        let dep = |name: &str| GraphDependency::target(name, root);
        let project = Project::new(root, "P")
            .with_target(Target::new("App", Product::App).with_dependency(dep("Features")))
            .with_target(
                Target::new("Features", Product::Framework)
                    .with_source(root.join("Features/f.swift"))
                    .with_dependency(dep("Core")),
            )
            .with_target(Target::new("Core", Product::Framework).with_source(root.join("Core/a.swift")))
            .with_target(Target::new("Utils", Product::Framework).with_source(root.join("Utils/u.swift")));
        Graph::from_projects("W", root, [project])
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("Features/f.swift"), "features");
        write(&dir.path().join("Core/a.swift"), "core");
        write(&dir.path().join("Utils/u.swift"), "utils");
        dir
    }

    async fn hashes(graph: &Graph) -> GraphHashes {
        GraphContentHasher::default()
            .content_hashes(graph, is_cacheable, &profile(), CacheOutputType::XcFramework, &[])
            .await
            .unwrap()
    }

    fn id(root: &Path, name: &str) -> TargetId {
        TargetId::new(root, name)
    }

    #[tokio::test]
    async fn only_cacheable_targets_reported() {
        let dir = fixture();
        let graph = graph(dir.path());
        let result = hashes(&graph).await;
        assert_eq!(result.len(), 3);
        assert!(result.get(&id(dir.path(), "App")).is_none());
        assert_eq!(result.hashed_targets, 3);
        assert_eq!(result.hashed_paths, 3);
    }

    #[tokio::test]
    async fn deterministic_across_runs() {
        let dir = fixture();
        let graph = graph(dir.path());
        assert_eq!(hashes(&graph).await.hashes, hashes(&graph).await.hashes);
    }

    #[tokio::test]
    async fn leaf_change_ripples_to_dependents_only() {
        let dir = fixture();
        let graph = graph(dir.path());
        let before = hashes(&graph).await;
        write(&dir.path().join("Core/a.swift"), "core changed");
        let after = hashes(&graph).await;

        let root = dir.path();
        assert_ne!(before.get(&id(root, "Core")), after.get(&id(root, "Core")));
        assert_ne!(before.get(&id(root, "Features")), after.get(&id(root, "Features")));
        assert_eq!(before.get(&id(root, "Utils")), after.get(&id(root, "Utils")));
    }

    #[tokio::test]
    async fn additional_strings_salt_every_fingerprint() {
        let dir = fixture();
        let graph = graph(dir.path());
        let plain = hashes(&graph).await;
        let salted = GraphContentHasher::default()
            .content_hashes(
                &graph,
                is_cacheable,
                &profile(),
                CacheOutputType::XcFramework,
                &["tool-2.0".to_string()],
            )
            .await
            .unwrap();
        for (id, hash) in &plain.hashes {
            assert_ne!(salted.get(id), Some(hash));
        }
    }

    #[tokio::test]
    async fn non_cacheable_dependency_still_hashed() {
        let dir = fixture();
        let root = dir.path();
        let project = Project::new(root, "P")
            .with_target(
                Target::new("Core", Product::Framework)
                    .with_dependency(GraphDependency::target("Support", root)),
            )
            .with_target(Target::new("Support", Product::StaticLibrary).with_source(root.join("Utils/u.swift")));
        let graph = Graph::from_projects("W", root, [project]);

        let before = hashes(&graph).await;
        assert_eq!(before.hashed_targets, 2);
        assert_eq!(before.len(), 1);

        write(&root.join("Utils/u.swift"), "utils changed");
        let after = hashes(&graph).await;
        assert_ne!(before.get(&id(root, "Core")), after.get(&id(root, "Core")));
    }

    #[tokio::test]
    async fn missing_source_names_target() {
        let dir = fixture();
        std::fs::remove_file(dir.path().join("Core/a.swift")).unwrap();
        let graph = graph(dir.path());
        let err = GraphContentHasher::default()
            .content_hashes(&graph, is_cacheable, &profile(), CacheOutputType::XcFramework, &[])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("hashing failed for target 'Core'"), "{msg}");
        assert!(msg.contains("a.swift"), "{msg}");
    }

    #[tokio::test]
    async fn cycle_is_fatal() {
        let project = Project::new("/p", "P")
            .with_target(
                Target::new("A", Product::Framework).with_dependency(GraphDependency::target("B", "/p")),
            )
            .with_target(
                Target::new("B", Product::Framework).with_dependency(GraphDependency::target("A", "/p")),
            );
        let graph = Graph::from_projects("W", "/p", [project]);
        let err = GraphContentHasher::default()
            .content_hashes(&graph, is_cacheable, &profile(), CacheOutputType::XcFramework, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HashError::Graph(GraphError::Cycle { .. })));
    }

    #[tokio::test]
    async fn dangling_reference_is_fatal() {
        let project = Project::new("/p", "P").with_target(
            Target::new("A", Product::Framework).with_dependency(GraphDependency::target("Ghost", "/p")),
        );
        let graph = Graph::from_projects("W", "/p", [project]);
        let err = GraphContentHasher::default()
            .content_hashes(&graph, is_cacheable, &profile(), CacheOutputType::XcFramework, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HashError::Graph(GraphError::DanglingDependency { .. })
        ));
    }
}
