//! Dependency-graph model and read-only traversal for hoard.
//!
//! A [`Graph`] is an immutable value: projects keyed by path plus an adjacency
//! map keyed by [`GraphDependency`] values. Every transformation (hashing,
//! cache substitution, mapper stages) produces a new `Graph`, so snapshots can
//! be compared and each stage tested in isolation. [`GraphTraverser`] answers
//! dependency queries over a borrowed graph and detects cycles.

#![warn(missing_docs)]

pub mod dependency;
pub mod error;
pub mod graph;
pub mod project;
pub mod target;
pub mod traverser;

pub use dependency::{GraphDependency, GraphEdge, Linking, TargetId};
pub use error::GraphError;
pub use graph::{Adjacency, Graph, GraphTarget};
pub use project::Project;
pub use target::{Product, SourceFile, SourceRole, Target};
pub use traverser::GraphTraverser;
