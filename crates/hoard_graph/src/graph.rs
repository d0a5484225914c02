//! The dependency graph value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::dependency::{GraphDependency, GraphEdge, TargetId};
use crate::error::GraphError;
use crate::project::Project;
use crate::target::Target;

/// Adjacency map from a node to its direct dependencies.
pub type Adjacency = BTreeMap<GraphDependency, BTreeSet<GraphDependency>>;

/// A workspace-wide dependency graph.
///
/// Holds projects keyed by their root path and an adjacency map keyed by
/// dependency values (an arena of values, not a pointer graph). A `Graph` is
/// never mutated after construction; cloning and comparing snapshots is cheap
/// enough to do between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    name: String,
    path: PathBuf,
    projects: BTreeMap<PathBuf, Project>,
    #[serde(with = "adjacency_serde")]
    dependencies: Adjacency,
}

/// A target together with the project that declares it.
#[derive(Debug, Clone, Copy)]
pub struct GraphTarget<'g> {
    /// Root path of the owning project.
    pub path: &'g Path,
    /// The owning project.
    pub project: &'g Project,
    /// The target itself.
    pub target: &'g Target,
}

impl GraphTarget<'_> {
    /// Returns the value identity of this target.
    pub fn id(&self) -> TargetId {
        TargetId::new(self.path, self.target.name.clone())
    }

    /// Returns the dependency node referring to this target.
    pub fn as_dependency(&self) -> GraphDependency {
        GraphDependency::target(self.target.name.clone(), self.path)
    }
}

impl Graph {
    /// Creates a graph from projects and an explicit adjacency map.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        projects: BTreeMap<PathBuf, Project>,
        dependencies: Adjacency,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            projects,
            dependencies,
        }
    }

    /// Creates a graph whose adjacency is derived from every target's
    /// dependency list. Each target gets an adjacency entry, possibly empty.
    pub fn from_projects(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        projects: impl IntoIterator<Item = Project>,
    ) -> Self {
        let projects: BTreeMap<PathBuf, Project> =
            projects.into_iter().map(|p| (p.path.clone(), p)).collect();

        let mut dependencies = Adjacency::new();
        for project in projects.values() {
            for target in project.targets.values() {
                let node = GraphDependency::target(target.name.clone(), project.path.clone());
                dependencies
                    .entry(node)
                    .or_default()
                    .extend(target.dependencies.iter().cloned());
            }
        }

        Self::new(name, path, projects, dependencies)
    }

    /// Returns the workspace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the workspace root path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the projects keyed by root path.
    pub fn projects(&self) -> &BTreeMap<PathBuf, Project> {
        &self.projects
    }

    /// Returns the adjacency map.
    pub fn dependencies(&self) -> &Adjacency {
        &self.dependencies
    }

    /// Looks up a target by identity.
    pub fn target(&self, id: &TargetId) -> Option<GraphTarget<'_>> {
        let project = self.projects.get(&id.project)?;
        let target = project.targets.get(&id.name)?;
        Some(GraphTarget {
            path: &project.path,
            project,
            target,
        })
    }

    /// Iterates over every target in project-path, then name order.
    pub fn targets(&self) -> impl Iterator<Item = GraphTarget<'_>> {
        self.projects.values().flat_map(|project| {
            project.targets.values().map(move |target| GraphTarget {
                path: &project.path,
                project,
                target,
            })
        })
    }

    /// Iterates over every edge in node order.
    pub fn edges(&self) -> impl Iterator<Item = GraphEdge> + '_ {
        self.dependencies.iter().flat_map(|(from, tos)| {
            tos.iter().map(move |to| GraphEdge {
                from: from.clone(),
                to: to.clone(),
            })
        })
    }

    /// Returns every node appearing in the adjacency map, as key or value.
    pub fn nodes(&self) -> BTreeSet<&GraphDependency> {
        let mut nodes = BTreeSet::new();
        for (from, tos) in &self.dependencies {
            nodes.insert(from);
            nodes.extend(tos.iter());
        }
        nodes
    }

    /// Checks the dangling-reference invariant.
    ///
    /// Every `Target` node in the adjacency map and every target dependency
    /// declared by a target must resolve to a target of some project.
    pub fn validate(&self) -> Result<(), GraphError> {
        let resolves = |dep: &GraphDependency| match dep.target_id() {
            Some(id) => self.target(&id).is_some(),
            None => true,
        };
        let dangling = |from: String, dep: &GraphDependency| {
            let id = dep.target_id().unwrap_or_else(|| TargetId::new("", ""));
            GraphError::DanglingDependency {
                from,
                name: id.name,
                project: id.project,
            }
        };

        for (from, tos) in &self.dependencies {
            if !resolves(from) {
                return Err(dangling("graph".to_string(), from));
            }
            if let Some(to) = tos.iter().find(|to| !resolves(to)) {
                return Err(dangling(from.to_string(), to));
            }
        }
        for graph_target in self.targets() {
            if let Some(dep) = graph_target.target.dependencies.iter().find(|d| !resolves(d)) {
                return Err(dangling(graph_target.as_dependency().to_string(), dep));
            }
        }
        Ok(())
    }
}

mod adjacency_serde {
    use super::Adjacency;
    use crate::dependency::GraphDependency;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;

    pub fn serialize<S: Serializer>(map: &Adjacency, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Adjacency, D::Error> {
        let entries: Vec<(GraphDependency, BTreeSet<GraphDependency>)> =
            Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
