//! Fingerprint of a single target.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use hoard_common::ContentHash;
use hoard_graph::{GraphDependency, GraphTarget, TargetId};

use crate::content::{ContentHashing, PathMemo};
use crate::dependencies::DependenciesContentHasher;
use crate::error::HashError;
use crate::profile::{CacheOutputType, CacheProfile};

/// Inputs shared by every target fingerprint of one invocation.
#[derive(Debug, Clone, Copy)]
pub struct HashContext<'a> {
    /// Cache profile the fingerprints are computed for.
    pub profile: &'a CacheProfile,
    /// Kind of artifact that will be cached.
    pub output: CacheOutputType,
    /// Ordered extra salt (e.g., tool version).
    pub additional_strings: &'a [String],
    /// Fingerprints computed so far.
    pub hashes: &'a BTreeMap<TargetId, ContentHash>,
    /// Memo of path hashes for this invocation.
    pub paths: &'a PathMemo,
}

/// Computes the fingerprint of one target from its fields.
///
/// Fields are hashed separately and then joined in a fixed order: target
/// name, effective settings, sources, resources, product and output kind, cache profile,
/// dependency fingerprints, additional strings.
pub struct TargetContentHasher<'h> {
    content: &'h dyn ContentHashing,
}

impl<'h> TargetContentHasher<'h> {
    /// Creates a target hasher over `content`.
    pub fn new(content: &'h dyn ContentHashing) -> Self {
        Self { content }
    }

    /// Fingerprints `target` given its direct `dependencies`.
    ///
    /// Every dependency that is a target must already have a fingerprint in
    /// `ctx.hashes`.
    pub async fn hash(
        &self,
        target: &GraphTarget<'_>,
        dependencies: &BTreeSet<GraphDependency>,
        ctx: &HashContext<'_>,
    ) -> Result<ContentHash, HashError> {
        let content = self.content;
        let settings = target.project.effective_settings(target.target);

        let sources = self
            .hash_paths(target.target.sources.iter().map(|s| s.path.as_path()), ctx.paths)
            .await?;
        let resources = self
            .hash_paths(target.target.resources.iter().map(|p| p.as_path()), ctx.paths)
            .await?;
        let product = content.hash_str(&format!(
            "{}:{}",
            target.target.product.as_str(),
            ctx.output.as_str()
        ));
        let profile = content.hash_strings(&[
            ctx.profile.configuration.clone(),
            ctx.profile.platform.clone(),
        ]);
        let dependencies = DependenciesContentHasher::new(content)
            .hash(&target.id(), dependencies, ctx.hashes, ctx.paths)
            .await?;

        Ok(content.hash_joined(&[
            content.hash_str(&target.target.name),
            content.hash_map(&settings),
            sources,
            resources,
            product,
            profile,
            dependencies,
            content.hash_strings(ctx.additional_strings),
        ]))
    }

    /// Hashes each path, sorts the results, and joins them.
    async fn hash_paths<'p>(
        &self,
        paths: impl Iterator<Item = &'p Path>,
        memo: &PathMemo,
    ) -> Result<ContentHash, HashError> {
        let mut hashes = Vec::new();
        for path in paths {
            hashes.push(memo.hash(self.content, path).await?);
        }
        hashes.sort();
        Ok(self.content.hash_joined(&hashes))
    }
}
