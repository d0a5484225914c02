//! Fingerprint contribution of a target's direct dependencies.

use std::collections::{BTreeMap, BTreeSet};

use hoard_common::ContentHash;
use hoard_graph::{GraphDependency, Linking, TargetId};

use crate::content::{ContentHashing, PathMemo};
use crate::error::HashError;

/// Hashes the direct dependencies of one target.
///
/// Target dependencies contribute their already-computed fingerprint, which is
/// what makes a change in a leaf ripple upward without re-reading its sources.
/// Precompiled dependencies contribute the hash of their on-disk content;
/// package and SDK dependencies contribute a hash of their name.
pub struct DependenciesContentHasher<'h> {
    content: &'h dyn ContentHashing,
}

impl<'h> DependenciesContentHasher<'h> {
    /// Creates a dependency hasher over `content`.
    pub fn new(content: &'h dyn ContentHashing) -> Self {
        Self { content }
    }

    /// Hashes `dependencies` of `target` in dependency-identity order.
    pub async fn hash(
        &self,
        target: &TargetId,
        dependencies: &BTreeSet<GraphDependency>,
        hashes: &BTreeMap<TargetId, ContentHash>,
        paths: &PathMemo,
    ) -> Result<ContentHash, HashError> {
        let mut parts = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            parts.push(self.hash_dependency(target, dependency, hashes, paths).await?);
        }
        Ok(self.content.hash_joined(&parts))
    }

    async fn hash_dependency(
        &self,
        target: &TargetId,
        dependency: &GraphDependency,
        hashes: &BTreeMap<TargetId, ContentHash>,
        paths: &PathMemo,
    ) -> Result<ContentHash, HashError> {
        match dependency {
            GraphDependency::Target { name, project } => {
                let id = TargetId::new(project.clone(), name.clone());
                hashes
                    .get(&id)
                    .copied()
                    .ok_or_else(|| HashError::MissingDependencyHash {
                        target: target.name.clone(),
                        dependency: dependency.to_string(),
                    })
            }
            GraphDependency::PrecompiledFramework { path, linking } => {
                let content = paths.hash(self.content, path).await?;
                let linking = match linking {
                    Linking::Static => "static",
                    Linking::Dynamic => "dynamic",
                };
                Ok(self.content.hash_joined(&[content, self.content.hash_str(linking)]))
            }
            GraphDependency::PrecompiledXcFramework { path } => paths.hash(self.content, path).await,
            GraphDependency::Package { product } => {
                Ok(self.content.hash_str(&format!("package:{product}")))
            }
            GraphDependency::Sdk { name } => Ok(self.content.hash_str(&format!("sdk:{name}"))),
        }
    }
}
