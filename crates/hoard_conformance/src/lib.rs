//! Shared fixtures for the hoard conformance tests.
//!
//! [`Workspace`] writes a small multi-project workspace to a temporary
//! directory and builds its dependency graph:
//!
//! ```text
//! App -> Features -> Core
//! Analytics (framework, nothing depends on it)
//! ```
//!
//! Tests edit sources, build fake artifacts, and drive the cache crates
//! against it.

#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoard_cache::{LocalCacheStorage, RemoteFailurePolicy, TieredCacheStorage};
use hoard_driver::Driver;
use hoard_graph::{Graph, GraphDependency, Product, Project, Target, TargetId};
use hoard_hasher::{CacheOutputType, CacheProfile, GraphContentHasher};
use tempfile::TempDir;

/// Module layout of the fixture: (name, product, direct target dependencies).
const MODULES: &[(&str, Product, &[&str])] = &[
    ("Core", Product::Framework, &[]),
    ("Features", Product::Framework, &["Core"]),
    ("Analytics", Product::Framework, &[]),
    ("App", Product::App, &["Features"]),
];

/// A temporary on-disk workspace with one project per module.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Writes the fixture sources.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Self { dir };
        for (name, _, _) in MODULES {
            workspace.write_source(name, "a.swift", &format!("// {name} a\n"));
            workspace.write_source(name, "b.swift", &format!("// {name} b\n"));
        }
        workspace
    }

    /// Root directory of the workspace.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Root directory of the project for `module`.
    pub fn project_dir(&self, module: &str) -> PathBuf {
        self.root().join("src").join(module)
    }

    /// Identity of the target named `module`.
    pub fn id(&self, module: &str) -> TargetId {
        TargetId::new(self.project_dir(module), module)
    }

    /// Overwrites a source file of `module`.
    pub fn write_source(&self, module: &str, file: &str, content: &str) {
        let dir = self.project_dir(module).join("Sources");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    /// Builds the dependency graph from the files on disk.
    pub fn graph(&self) -> Graph {
        let projects = MODULES.iter().map(|(name, product, deps)| {
            let path = self.project_dir(name);
            let mut target = Target::new(*name, *product)
                .with_source(path.join("Sources/a.swift"))
                .with_source(path.join("Sources/b.swift"))
                .with_setting("SWIFT_VERSION", "5.9");
            for dep in *deps {
                let dep = GraphDependency::target(*dep, self.project_dir(dep));
                target = target.with_dependency(dep);
            }
            Project::new(&path, *name).with_target(target)
        });
        Graph::from_projects("Workspace", self.root(), projects)
    }

    /// Writes a fake built artifact for `module` and returns its path.
    pub fn build_artifact(&self, module: &str, marker: &str) -> PathBuf {
        let path = self
            .root()
            .join("build")
            .join(marker)
            .join(format!("{module}.xcframework"));
        std::fs::create_dir_all(path.join("ios-arm64")).unwrap();
        std::fs::write(path.join("Info.plist"), format!("{module} {marker}")).unwrap();
        std::fs::write(path.join("ios-arm64").join(module), marker).unwrap();
        path
    }

    /// Local cache directory used by [`Workspace::local_storage`].
    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("cache")
    }

    /// A tiered storage with only the local tier.
    pub fn local_storage(&self) -> TieredCacheStorage {
        TieredCacheStorage::new(
            Arc::new(LocalCacheStorage::new(self.cache_dir())),
            None,
            RemoteFailurePolicy::Fail,
        )
    }

    /// A driver over [`Workspace::local_storage`] with a debug simulator profile.
    pub fn driver(&self) -> Driver {
        Driver::new(
            Arc::new(self.local_storage()),
            GraphContentHasher::default(),
            profile(),
            CacheOutputType::XcFramework,
        )
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// The profile used by the fixture driver.
pub fn profile() -> CacheProfile {
    CacheProfile::new("Debug", "ios-simulator")
}

/// Reads every file below `dir` as `(relative path, contents)`, sorted.
pub fn tree_contents(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
        for entry in std::fs::read_dir(dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let relative = path.strip_prefix(base).unwrap().to_path_buf();
                out.push((relative, std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_graph_is_valid() {
        let ws = Workspace::new();
        let graph = ws.graph();
        graph.validate().unwrap();
        assert_eq!(graph.targets().count(), 4);
        assert!(graph.dependencies()[&ws.id("App").as_dependency()]
            .contains(&ws.id("Features").as_dependency()));
    }

    #[test]
    fn artifacts_are_distinct_per_marker() {
        let ws = Workspace::new();
        let a = ws.build_artifact("Core", "one");
        let b = ws.build_artifact("Core", "two");
        assert_ne!(tree_contents(&a), tree_contents(&b));
        assert_eq!(a.file_name(), b.file_name());
    }
}
