//! The resolve and store stages of a cached build.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_cache::{fetch_hits, store_all, BuiltArtifact, CacheLookupReport, TieredCacheStorage};
use hoard_config::{resolve_profile, HoardConfig};
use hoard_graph::{Graph, TargetId};
use hoard_hasher::{is_cacheable, CacheOutputType, CacheProfile, GraphContentHasher, GraphHashes};
use hoard_mapper::{
    CacheGraphMutator, CacheMapper, GraphMapper, MapperPipeline, MutationReport, SideEffect,
};

use crate::error::DriverError;
use crate::setup::{cache_profile, hasher_from_config, storage_from_config};

/// Per-call options of [`Driver::resolve`].
#[derive(Default)]
pub struct ResolveOptions {
    /// Targets to keep as source even when they are cache hits.
    pub sources: BTreeSet<TargetId>,
    /// Mappers run after the cache mapper, in order.
    pub mappers: Vec<Box<dyn GraphMapper>>,
}

/// Everything [`Driver::resolve`] produced.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The graph to generate.
    pub graph: Graph,
    /// Side effects requested by the mappers, in mapper order.
    pub side_effects: Vec<SideEffect>,
    /// Fingerprints of the cacheable targets.
    pub hashes: GraphHashes,
    /// Hits and misses of the cache lookup.
    pub lookup: CacheLookupReport,
    /// What the cache mapper replaced and pruned.
    pub mutation: MutationReport,
}

/// Resolves cached artifacts for graphs and stores newly built ones.
pub struct Driver {
    storage: Arc<TieredCacheStorage>,
    hasher: GraphContentHasher,
    profile: CacheProfile,
    output: CacheOutputType,
    additional_strings: Vec<String>,
    max_concurrency: usize,
}

impl Driver {
    /// Creates a driver over `storage`.
    pub fn new(
        storage: Arc<TieredCacheStorage>,
        hasher: GraphContentHasher,
        profile: CacheProfile,
        output: CacheOutputType,
    ) -> Self {
        Self {
            storage,
            hasher,
            profile,
            output,
            additional_strings: Vec::new(),
            max_concurrency: 8,
        }
    }

    /// Creates a driver from `hoard.toml` settings.
    ///
    /// `profile` names the cache profile; `None` selects the configured
    /// default.
    pub fn from_config(
        config: &HoardConfig,
        project_dir: &Path,
        profile: Option<&str>,
    ) -> Result<Self, DriverError> {
        let resolved = resolve_profile(config, profile)?;
        let (profile, output) = cache_profile(&resolved);
        let storage = storage_from_config(config, project_dir)?;
        tracing::info!(profile = %resolved.name, "cache driver configured");

        Ok(Self::new(Arc::new(storage), hasher_from_config(config), profile, output)
            .with_additional_strings(config.hashing.additional_strings.clone())
            .with_max_concurrency(config.cache.max_concurrency))
    }

    /// Sets the extra strings mixed into every fingerprint.
    pub fn with_additional_strings(mut self, strings: Vec<String>) -> Self {
        self.additional_strings = strings;
        self
    }

    /// Sets how many cache operations run at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Returns the storage used for lookups and stores.
    pub fn storage(&self) -> &TieredCacheStorage {
        &self.storage
    }

    /// Returns the cache profile fingerprints are computed for.
    pub fn profile(&self) -> &CacheProfile {
        &self.profile
    }

    /// Fingerprints the cacheable targets of `graph`, fetches every hit,
    /// substitutes the hits, then runs `options.mappers`.
    pub async fn resolve(
        &self,
        graph: &Graph,
        options: ResolveOptions,
    ) -> Result<Resolution, DriverError> {
        let hashes = self
            .hasher
            .content_hashes(
                graph,
                is_cacheable,
                &self.profile,
                self.output,
                &self.additional_strings,
            )
            .await?;

        let lookup = fetch_hits(&self.storage, &hashes.hashes, self.max_concurrency).await?;

        let cache_mapper = Arc::new(CacheMapper::new(
            CacheGraphMutator::with_sources(options.sources),
            hashes.hashes.clone(),
            lookup.artifacts(),
        ));
        let mut pipeline = MapperPipeline::new().with(Arc::clone(&cache_mapper));
        for mapper in options.mappers {
            pipeline.push(mapper);
        }
        let (mapped, side_effects) = pipeline.run(graph.clone())?;
        let mutation = cache_mapper.take_report().unwrap_or_default();

        tracing::info!(
            cacheable = hashes.len(),
            hits = lookup.hit_count(),
            misses = lookup.misses.len(),
            replaced = mutation.replaced.len(),
            pruned = mutation.pruned.len(),
            "resolved cached graph"
        );

        Ok(Resolution {
            graph: mapped,
            side_effects,
            hashes,
            lookup,
            mutation,
        })
    }

    /// Stores the artifacts of targets built from source.
    ///
    /// Targets without a fingerprint in `hashes` are not cacheable and are
    /// skipped. Returns the number of artifacts stored.
    pub async fn store_built(
        &self,
        hashes: &GraphHashes,
        built: &BTreeMap<TargetId, Vec<PathBuf>>,
    ) -> Result<usize, DriverError> {
        let artifacts: Vec<BuiltArtifact> = built
            .iter()
            .filter_map(|(target, paths)| match hashes.get(target) {
                Some(hash) => Some(BuiltArtifact {
                    target: target.clone(),
                    hash: *hash,
                    paths: paths.clone(),
                }),
                None => {
                    tracing::debug!(target_id = %target, "skipping non-cacheable target");
                    None
                }
            })
            .collect();

        Ok(store_all(self.storage.as_ref(), &artifacts, self.max_concurrency).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_cache::{LocalCacheStorage, RemoteFailurePolicy};
    use hoard_graph::{GraphDependency, Product, Project, Target};
    use hoard_mapper::MapperError;
    use tempfile::TempDir;

    struct Workspace {
        dir: TempDir,
        graph: Graph,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("app");
            std::fs::create_dir_all(root.join("Core")).unwrap();
            std::fs::write(root.join("Core/a.swift"), "struct A {}").unwrap();
            std::fs::write(root.join("App.swift"), "@main struct App {}").unwrap();

            let project = Project::new(&root, "App")
                .with_target(
                    Target::new("App", Product::App)
                        .with_source(root.join("App.swift"))
                        .with_dependency(GraphDependency::target("Core", &root)),
                )
                .with_target(
                    Target::new("Core", Product::Framework).with_source(root.join("Core/a.swift")),
                );
            let graph = Graph::from_projects("App", &root, [project]);
            Self { dir, graph }
        }

        fn id(&self, name: &str) -> TargetId {
            TargetId::new(self.dir.path().join("app"), name)
        }

        fn driver(&self) -> Driver {
            let local = Arc::new(LocalCacheStorage::new(self.dir.path().join("cache")));
            let storage = TieredCacheStorage::new(local, None, RemoteFailurePolicy::Fail);
            Driver::new(
                Arc::new(storage),
                GraphContentHasher::default(),
                CacheProfile::new("Debug", "ios-simulator"),
                CacheOutputType::XcFramework,
            )
        }

        fn build(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join("build").join(format!("{name}.xcframework"));
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("Info.plist"), name).unwrap();
            path
        }
    }

    struct CountTargets;

    impl GraphMapper for CountTargets {
        fn name(&self) -> &str {
            "count-targets"
        }

        fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
            let count = graph.targets().count().to_string();
            Ok((graph, vec![SideEffect::file("/out/targets", count)]))
        }
    }

    #[tokio::test]
    async fn cold_cache_leaves_graph_unchanged() {
        let ws = Workspace::new();
        let resolution = ws
            .driver()
            .resolve(&ws.graph, ResolveOptions::default())
            .await
            .unwrap();

        assert_eq!(resolution.graph, ws.graph);
        assert_eq!(resolution.hashes.len(), 1);
        assert_eq!(resolution.lookup.misses, vec![ws.id("Core")]);
        assert!(resolution.mutation.is_unchanged());
    }

    #[tokio::test]
    async fn stored_artifact_is_substituted_on_next_resolve() {
        let ws = Workspace::new();
        let driver = ws.driver();
        let cold = driver.resolve(&ws.graph, ResolveOptions::default()).await.unwrap();

        let built = [
            (ws.id("Core"), vec![ws.build("Core")]),
            (ws.id("App"), vec![ws.build("App")]),
        ]
        .into();
        assert_eq!(driver.store_built(&cold.hashes, &built).await.unwrap(), 1);

        let options = ResolveOptions {
            mappers: vec![Box::new(CountTargets)],
            ..Default::default()
        };
        let warm = driver.resolve(&ws.graph, options).await.unwrap();
        assert_eq!(warm.lookup.local_hits, 1);
        assert_eq!(warm.mutation.replaced, vec![ws.id("Core")]);
        assert!(warm.graph.target(&ws.id("Core")).is_none());

        let artifact = warm.lookup.items[0].path.clone();
        let app = warm.graph.target(&ws.id("App")).unwrap();
        assert_eq!(
            app.target.dependencies,
            vec![GraphDependency::PrecompiledXcFramework { path: artifact }]
        );

        // The extra mapper ran on the mutated graph.
        assert_eq!(warm.side_effects, vec![SideEffect::file("/out/targets", "1")]);
    }

    #[tokio::test]
    async fn requested_sources_stay_as_source() {
        let ws = Workspace::new();
        let driver = ws.driver();
        let cold = driver.resolve(&ws.graph, ResolveOptions::default()).await.unwrap();
        let built = [(ws.id("Core"), vec![ws.build("Core")])].into();
        driver.store_built(&cold.hashes, &built).await.unwrap();

        let options = ResolveOptions {
            sources: [ws.id("Core")].into(),
            ..Default::default()
        };
        let warm = driver.resolve(&ws.graph, options).await.unwrap();
        assert_eq!(warm.graph, ws.graph);
        assert_eq!(warm.mutation.kept_as_source, vec![ws.id("Core")]);
    }

    #[tokio::test]
    async fn editing_a_source_misses_again() {
        let ws = Workspace::new();
        let driver = ws.driver();
        let cold = driver.resolve(&ws.graph, ResolveOptions::default()).await.unwrap();
        let built = [(ws.id("Core"), vec![ws.build("Core")])].into();
        driver.store_built(&cold.hashes, &built).await.unwrap();

        std::fs::write(ws.dir.path().join("app/Core/a.swift"), "struct B {}").unwrap();
        let edited = driver.resolve(&ws.graph, ResolveOptions::default()).await.unwrap();
        assert_eq!(edited.lookup.hit_count(), 0);
        assert_ne!(edited.hashes.hashes, cold.hashes.hashes);
    }

    #[tokio::test]
    async fn from_config_uses_configured_cache_dir() {
        let ws = Workspace::new();
        let config = hoard_config::load_config_from_str(
            r#"
[cache]
directory = "cache"
max_concurrency = 2

[profiles.sim]
configuration = "Debug"
platform = "ios-simulator"
"#,
        )
        .unwrap();
        let driver = Driver::from_config(&config, ws.dir.path(), None).unwrap();
        assert_eq!(driver.profile().to_string(), "Debug/ios-simulator");
        assert!(!driver.storage().has_remote());

        let cold = driver.resolve(&ws.graph, ResolveOptions::default()).await.unwrap();
        let built = [(ws.id("Core"), vec![ws.build("Core")])].into();
        driver.store_built(&cold.hashes, &built).await.unwrap();

        let hash = cold.hashes.get(&ws.id("Core")).unwrap();
        assert!(ws.dir.path().join("cache").join(hash.to_hex()).is_dir());
    }
}
