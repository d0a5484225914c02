//! Content fingerprints for the targets of a dependency graph.
//!
//! [`ContentHasher`] hashes primitive values, files, and directories with a
//! fixed canonicalization. [`GraphContentHasher`] builds on it to give every
//! cacheable target a fingerprint that covers its settings, sources, product,
//! cache profile, and the fingerprints of its dependencies, so a change in a
//! leaf module ripples up to every target that depends on it.

#![warn(missing_docs)]

pub mod content;
pub mod dependencies;
pub mod error;
pub mod filter;
pub mod graph;
pub mod profile;
pub mod target;

pub use content::{ContentHasher, ContentHashing, PathMemo};
pub use dependencies::DependenciesContentHasher;
pub use error::HashError;
pub use filter::HashingFilter;
pub use graph::{is_cacheable, GraphContentHasher, GraphHashes};
pub use profile::{CacheOutputType, CacheProfile};
pub use target::{HashContext, TargetContentHasher};
