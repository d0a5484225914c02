//! Buildable targets and their product kinds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::dependency::GraphDependency;

/// The kind of product a target builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// A runnable application.
    App,
    /// A dynamic framework.
    Framework,
    /// A static framework.
    StaticFramework,
    /// A static library.
    StaticLibrary,
    /// A dynamic library.
    DynamicLibrary,
    /// A resource bundle.
    Bundle,
    /// A unit test bundle.
    UnitTests,
    /// A UI test bundle.
    UiTests,
    /// A command-line executable.
    CommandLineTool,
    /// An application extension.
    AppExtension,
}

impl Product {
    /// Returns the stable name used in fingerprints and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Framework => "framework",
            Self::StaticFramework => "static_framework",
            Self::StaticLibrary => "static_library",
            Self::DynamicLibrary => "dynamic_library",
            Self::Bundle => "bundle",
            Self::UnitTests => "unit_tests",
            Self::UiTests => "ui_tests",
            Self::CommandLineTool => "command_line_tool",
            Self::AppExtension => "app_extension",
        }
    }

    /// Returns `true` for products that build a framework binary.
    ///
    /// This is the default cacheable predicate.
    pub fn is_framework(self) -> bool {
        matches!(self, Self::Framework | Self::StaticFramework)
    }

    /// Returns `true` for products linked statically into their dependents.
    pub fn is_static(self) -> bool {
        matches!(self, Self::StaticFramework | Self::StaticLibrary)
    }

    /// Returns `true` for products that can be launched.
    pub fn is_runnable(self) -> bool {
        matches!(self, Self::App | Self::CommandLineTool | Self::AppExtension)
    }

    /// Returns `true` for test bundles.
    pub fn is_test(self) -> bool {
        matches!(self, Self::UnitTests | Self::UiTests)
    }
}

/// The logical role of a file referenced by a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Compiled source code.
    #[default]
    Source,
    /// A public or project header.
    Header,
    /// A build-phase script.
    Script,
    /// A file copied into the product.
    Resource,
}

/// A file reference with its role in the target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path of the file or directory.
    pub path: PathBuf,
    /// Role of the file.
    #[serde(default)]
    pub role: SourceRole,
}

/// A buildable module of a project.
///
/// Targets are immutable once constructed: the `with_*` builders consume and
/// return the value, and graph transformations produce new targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Name, unique within the owning project.
    pub name: String,
    /// Product kind.
    pub product: Product,
    /// Ordered source file references.
    #[serde(default)]
    pub sources: Vec<SourceFile>,
    /// Resource references.
    #[serde(default)]
    pub resources: Vec<PathBuf>,
    /// Flat build settings.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    /// Ordered dependency references.
    #[serde(default)]
    pub dependencies: Vec<GraphDependency>,
    /// Free-form tags used to select targets.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Target {
    /// Creates a target with no sources, settings, or dependencies.
    pub fn new(name: impl Into<String>, product: Product) -> Self {
        Self {
            name: name.into(),
            product,
            sources: Vec::new(),
            resources: Vec::new(),
            settings: BTreeMap::new(),
            dependencies: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Adds a compiled source file.
    pub fn with_source(self, path: impl Into<PathBuf>) -> Self {
        self.with_file(path, SourceRole::Source)
    }

    /// Adds a file with an explicit role.
    pub fn with_file(mut self, path: impl Into<PathBuf>, role: SourceRole) -> Self {
        self.sources.push(SourceFile {
            path: path.into(),
            role,
        });
        self
    }

    /// Adds a resource.
    pub fn with_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.resources.push(path.into());
        self
    }

    /// Sets a build setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Appends a dependency.
    pub fn with_dependency(mut self, dependency: GraphDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Adds a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}
