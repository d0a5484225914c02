//! Substitutes cache hits with precompiled artifacts and tree-shakes the graph.
//!
//! Given the fingerprint map and the artifact of every cache hit, the mutator
//! produces a new graph in which:
//!
//! - a hit target is replaceable when it is outside the caller's `sources`
//!   set and every target it depends on directly is replaceable too;
//! - every replaceable hit is replaced by a precompiled node pointing at its
//!   artifact, on every edge that referred to it;
//! - a precompiled node keeps its precompiled and SDK dependencies, including
//!   the precompiled nodes of the hits it depended on; packages are already
//!   linked into the artifact;
//! - targets unreachable from the roots (the `sources` targets plus the
//!   entry targets of the input graph, after substitution) are removed, and
//!   so are projects left without targets.
//!
//! The input graph is never modified.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use hoard_common::ContentHash;
use hoard_graph::{
    Adjacency, Graph, GraphDependency, GraphTarget, GraphTraverser, Linking, Project, TargetId,
};
use serde::{Deserialize, Serialize};

use crate::error::MutationError;

/// What the mutator did to each target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    /// Hits replaced by a precompiled node that is still part of the graph.
    pub replaced: Vec<TargetId>,
    /// Targets removed because nothing reachable needs them anymore.
    pub pruned: Vec<TargetId>,
    /// Hits left as source because the caller asked for them.
    pub kept_as_source: Vec<TargetId>,
    /// Hits left as source because a target they depend on is not replaceable.
    pub blocked: Vec<TargetId>,
}

impl MutationReport {
    /// Returns `true` if the graph was not changed.
    pub fn is_unchanged(&self) -> bool {
        self.replaced.is_empty() && self.pruned.is_empty()
    }
}

/// Rewrites a graph so cache hits are consumed as precompiled artifacts.
#[derive(Debug, Clone, Default)]
pub struct CacheGraphMutator {
    sources: BTreeSet<TargetId>,
}

impl CacheGraphMutator {
    /// Creates a mutator that substitutes every hit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mutator that keeps `sources` as source targets even when
    /// they are hits. They also root the tree-shaking walk.
    pub fn with_sources(sources: BTreeSet<TargetId>) -> Self {
        Self { sources }
    }

    /// Returns the targets kept as source.
    pub fn sources(&self) -> &BTreeSet<TargetId> {
        &self.sources
    }

    /// Produces the mutated graph.
    ///
    /// `hashes` is the fingerprint map the hits were looked up with;
    /// `artifacts` maps each hit to its artifact on disk.
    pub fn mutate(
        &self,
        graph: &Graph,
        hashes: &BTreeMap<TargetId, ContentHash>,
        artifacts: &BTreeMap<TargetId, PathBuf>,
    ) -> Result<(Graph, MutationReport), MutationError> {
        let mut report = MutationReport::default();
        let mut candidates = BTreeMap::new();

        for (id, path) in artifacts {
            let target = graph
                .target(id)
                .ok_or_else(|| MutationError::UnknownTarget {
                    target: id.to_string(),
                })?;
            if !hashes.contains_key(id) {
                return Err(MutationError::MissingFingerprint {
                    target: id.name.clone(),
                });
            }
            if self.sources.contains(id) {
                report.kept_as_source.push(id.clone());
                continue;
            }
            candidates.insert(id.clone(), (target, path));
        }

        let mut replaceable = Replaceability::new(graph, &candidates);
        let mut replacements = BTreeMap::<GraphDependency, GraphDependency>::new();
        for (id, (target, path)) in &candidates {
            if !replaceable.check(id) {
                tracing::debug!(target_id = %id, "hit depends on a target built from source");
                report.blocked.push(id.clone());
                continue;
            }
            if !path.exists() {
                return Err(MutationError::MissingArtifact {
                    target: id.name.clone(),
                    path: path.to_path_buf(),
                });
            }
            replacements.insert(target.as_dependency(), precompiled_node(target, path));
        }

        if replacements.is_empty() {
            return Ok((graph.clone(), report));
        }

        let substitute = |dep: &GraphDependency| -> GraphDependency {
            replacements.get(dep).cloned().unwrap_or_else(|| dep.clone())
        };

        let mut adjacency = Adjacency::new();
        for (from, tos) in graph.dependencies() {
            match replacements.get(from) {
                Some(node) => {
                    let kept = tos.iter().map(substitute).filter(keeps_after_precompile);
                    adjacency.entry(node.clone()).or_default().extend(kept);
                }
                None => {
                    let mapped = tos.iter().map(substitute);
                    adjacency.entry(from.clone()).or_default().extend(mapped);
                }
            }
        }

        let traverser = GraphTraverser::new(graph);
        let roots: Vec<GraphDependency> = traverser
            .entry_targets()
            .iter()
            .map(|t| substitute(&t.as_dependency()))
            .chain(
                self.sources
                    .iter()
                    .filter(|id| graph.target(id).is_some())
                    .map(TargetId::as_dependency),
            )
            .collect();
        let reachable = reachable_from(&adjacency, roots);

        let mut projects = BTreeMap::<PathBuf, Project>::new();
        for project in graph.projects().values() {
            let mut mapped = project.clone();
            mapped.targets.clear();
            for (name, target) in &project.targets {
                let id = TargetId::new(&project.path, name.clone());
                let node = id.as_dependency();
                if let Some(precompiled) = replacements.get(&node) {
                    if reachable.contains(precompiled) {
                        report.replaced.push(id);
                    } else {
                        report.pruned.push(id);
                    }
                    continue;
                }
                if !reachable.contains(&node) {
                    report.pruned.push(id);
                    continue;
                }
                let mut target = target.clone();
                target.dependencies = rewrite_dependencies(&target.dependencies, &substitute);
                mapped.targets.insert(name.clone(), target);
            }
            if mapped.targets.is_empty() && !project.targets.is_empty() {
                tracing::debug!(project = %project.path.display(), "project pruned");
                continue;
            }
            projects.insert(mapped.path.clone(), mapped);
        }

        adjacency.retain(|node, _| reachable.contains(node));
        tracing::info!(
            replaced = report.replaced.len(),
            pruned = report.pruned.len(),
            kept_as_source = report.kept_as_source.len(),
            "graph mutated with cached artifacts"
        );

        let mutated = Graph::new(graph.name(), graph.path(), projects, adjacency);
        Ok((mutated, report))
    }
}

/// Memoized "can this hit be replaced" over the dependency graph.
///
/// A hit is replaceable when it is a candidate and all of its direct target
/// dependencies are replaceable. Targets on a cycle are not replaceable.
struct Replaceability<'g, 'c, V> {
    traverser: GraphTraverser<'g>,
    candidates: &'c BTreeMap<TargetId, V>,
    memo: BTreeMap<TargetId, bool>,
}

impl<'g, 'c, V> Replaceability<'g, 'c, V> {
    fn new(graph: &'g Graph, candidates: &'c BTreeMap<TargetId, V>) -> Self {
        Self {
            traverser: GraphTraverser::new(graph),
            candidates,
            memo: BTreeMap::new(),
        }
    }

    fn check(&mut self, id: &TargetId) -> bool {
        if let Some(&known) = self.memo.get(id) {
            return known;
        }
        if !self.candidates.contains_key(id) {
            self.memo.insert(id.clone(), false);
            return false;
        }
        // Provisional until the dependencies are decided.
        self.memo.insert(id.clone(), false);
        let dependencies: Vec<TargetId> = self
            .traverser
            .direct_dependencies(id)
            .iter()
            .filter_map(GraphDependency::target_id)
            .collect();
        let replaceable = dependencies.iter().all(|dependency| self.check(dependency));
        self.memo.insert(id.clone(), replaceable);
        replaceable
    }
}

/// Builds the precompiled node standing in for a hit target.
fn precompiled_node(target: &GraphTarget<'_>, artifact: &Path) -> GraphDependency {
    let is_xcframework = artifact
        .extension()
        .is_some_and(|ext| ext == "xcframework");
    if is_xcframework {
        GraphDependency::PrecompiledXcFramework {
            path: artifact.to_path_buf(),
        }
    } else {
        let linking = if target.target.product.is_static() {
            Linking::Static
        } else {
            Linking::Dynamic
        };
        GraphDependency::PrecompiledFramework {
            path: artifact.to_path_buf(),
            linking,
        }
    }
}

/// Dependencies a precompiled artifact still needs from its consumer.
fn keeps_after_precompile(dep: &GraphDependency) -> bool {
    matches!(
        dep,
        GraphDependency::PrecompiledFramework { .. }
            | GraphDependency::PrecompiledXcFramework { .. }
            | GraphDependency::Sdk { .. }
    )
}

fn rewrite_dependencies(
    dependencies: &[GraphDependency],
    substitute: &impl Fn(&GraphDependency) -> GraphDependency,
) -> Vec<GraphDependency> {
    let mut seen = BTreeSet::new();
    dependencies
        .iter()
        .map(substitute)
        .filter(|dep| seen.insert(dep.clone()))
        .collect()
}

fn reachable_from(
    adjacency: &Adjacency,
    roots: impl IntoIterator<Item = GraphDependency>,
) -> BTreeSet<GraphDependency> {
    let mut reachable = BTreeSet::new();
    let mut queue: VecDeque<GraphDependency> = roots.into_iter().collect();
    while let Some(node) = queue.pop_front() {
        if !reachable.insert(node.clone()) {
            continue;
        }
        if let Some(tos) = adjacency.get(&node) {
            queue.extend(tos.iter().filter(|to| !reachable.contains(*to)).cloned());
        }
    }
    reachable
}
