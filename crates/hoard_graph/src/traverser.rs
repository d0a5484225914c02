//! Read-only dependency queries over a [`Graph`].

use std::collections::{BTreeMap, BTreeSet};

use crate::dependency::{GraphDependency, TargetId};
use crate::error::GraphError;
use crate::graph::{Graph, GraphTarget};
use crate::target::Product;

/// Pure query layer over a borrowed graph.
///
/// Queries never cache across calls: cycle detection uses the path of the
/// current walk, so each call is independent of previous ones.
#[derive(Debug, Clone, Copy)]
pub struct GraphTraverser<'g> {
    graph: &'g Graph,
}

/// DFS node state used by the cycle-checked walks.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl<'g> GraphTraverser<'g> {
    /// Creates a traverser over `graph`.
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// Returns the traversed graph.
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Looks up a target by identity.
    pub fn target(&self, id: &TargetId) -> Option<GraphTarget<'g>> {
        self.graph.target(id)
    }

    /// Looks up the target a dependency node refers to.
    pub fn target_from(&self, dependency: &GraphDependency) -> Option<GraphTarget<'g>> {
        self.graph.target(&dependency.target_id()?)
    }

    /// Returns every target in deterministic order.
    pub fn all_targets(&self) -> Vec<GraphTarget<'g>> {
        self.graph.targets().collect()
    }

    /// Returns the targets satisfying `predicate`.
    pub fn targets_matching(
        &self,
        predicate: impl Fn(&GraphTarget<'g>) -> bool,
    ) -> Vec<GraphTarget<'g>> {
        self.graph.targets().filter(|t| predicate(t)).collect()
    }

    /// Returns the targets with the given name, across all projects.
    pub fn targets_named(&self, name: &str) -> Vec<GraphTarget<'g>> {
        self.targets_matching(|t| t.target.name == name)
    }

    /// Returns the targets carrying `tag`.
    pub fn targets_tagged(&self, tag: &str) -> Vec<GraphTarget<'g>> {
        self.targets_matching(|t| t.target.tags.contains(tag))
    }

    /// Returns the targets building `product`.
    pub fn targets_with_product(&self, product: Product) -> Vec<GraphTarget<'g>> {
        self.targets_matching(|t| t.target.product == product)
    }

    /// Returns the direct dependencies of a target.
    pub fn direct_dependencies(&self, id: &TargetId) -> BTreeSet<GraphDependency> {
        self.graph
            .dependencies()
            .get(&id.as_dependency())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the targets a target directly depends on.
    pub fn direct_target_dependencies(&self, id: &TargetId) -> Vec<GraphTarget<'g>> {
        self.graph
            .dependencies()
            .get(&id.as_dependency())
            .into_iter()
            .flatten()
            .filter_map(|dep| self.target_from(dep))
            .collect()
    }

    /// Returns the nodes that directly depend on a target.
    pub fn dependents(&self, id: &TargetId) -> BTreeSet<GraphDependency> {
        let node = id.as_dependency();
        self.graph
            .dependencies()
            .iter()
            .filter(|(_, tos)| tos.contains(&node))
            .map(|(from, _)| from.clone())
            .collect()
    }

    /// Returns the targets that no other node depends on.
    pub fn entry_targets(&self) -> Vec<GraphTarget<'g>> {
        let depended_on: BTreeSet<&GraphDependency> =
            self.graph.dependencies().values().flatten().collect();
        self.graph
            .targets()
            .filter(|t| !depended_on.contains(&t.as_dependency()))
            .collect()
    }

    /// Returns the transitive dependencies of a target.
    ///
    /// Fails with [`GraphError::Cycle`] if the walk re-enters a node on its own
    /// path, and with [`GraphError::UnknownTarget`] for an unknown `id`.
    pub fn all_dependencies(&self, id: &TargetId) -> Result<BTreeSet<GraphDependency>, GraphError> {
        if self.target(id).is_none() {
            return Err(GraphError::UnknownTarget {
                name: id.name.clone(),
                project: id.project.clone(),
            });
        }

        let root = id.as_dependency();
        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        self.visit(&root, &mut marks, &mut path, &mut order, &|_| true)?;

        let mut all: BTreeSet<GraphDependency> = order.into_iter().collect();
        all.remove(&root);
        Ok(all)
    }

    /// Returns every target in post-order: dependencies before dependents.
    ///
    /// Ties are broken by target identity so the order is deterministic.
    pub fn topological_order(&self) -> Result<Vec<TargetId>, GraphError> {
        let mut marks = BTreeMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        for target in self.graph.targets() {
            self.visit(
                &target.as_dependency(),
                &mut marks,
                &mut path,
                &mut order,
                &GraphDependency::is_target,
            )?;
        }
        Ok(order.iter().filter_map(GraphDependency::target_id).collect())
    }

    /// Partitions `ids` into dependency levels.
    ///
    /// Level 0 holds targets with no dependency inside `ids`; each later level
    /// only depends on earlier ones. Targets within a level share no edge and
    /// can be processed concurrently.
    pub fn dependency_levels(
        &self,
        ids: &BTreeSet<TargetId>,
    ) -> Result<Vec<Vec<TargetId>>, GraphError> {
        let mut level_of: BTreeMap<TargetId, usize> = BTreeMap::new();
        let mut levels: Vec<Vec<TargetId>> = Vec::new();

        for id in self.topological_order()? {
            if !ids.contains(&id) {
                continue;
            }
            let level = self
                .direct_dependencies(&id)
                .iter()
                .filter_map(GraphDependency::target_id)
                .filter_map(|dep| level_of.get(&dep).map(|l| l + 1))
                .max()
                .unwrap_or(0);
            level_of.insert(id.clone(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id);
        }
        Ok(levels)
    }

    /// Post-order DFS from `node`, following edges to nodes accepted by `follow`.
    fn visit(
        &self,
        node: &GraphDependency,
        marks: &mut BTreeMap<GraphDependency, Mark>,
        path: &mut Vec<GraphDependency>,
        order: &mut Vec<GraphDependency>,
        follow: &dyn Fn(&GraphDependency) -> bool,
    ) -> Result<(), GraphError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                cycle.push(node.to_string());
                return Err(GraphError::Cycle { path: cycle });
            }
            None => {}
        }

        marks.insert(node.clone(), Mark::Visiting);
        path.push(node.clone());
        if let Some(children) = self.graph.dependencies().get(node) {
            for child in children.iter().filter(|c| follow(c)) {
                self.visit(child, marks, path, order, follow)?;
            }
        }
        path.pop();
        marks.insert(node.clone(), Mark::Done);
        order.push(node.clone());
        Ok(())
    }
}
