//! Dependency identities and edges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Value identity of a target: the project it lives in plus its name.
///
/// Names are only unique within a project, so both parts are needed to key
/// fingerprint and artifact maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId {
    /// Root path of the owning project.
    pub project: PathBuf,
    /// Target name.
    pub name: String,
}

impl TargetId {
    /// Creates a target identity.
    pub fn new(project: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
        }
    }

    /// Returns the dependency node that refers to this target.
    pub fn as_dependency(&self) -> GraphDependency {
        GraphDependency::Target {
            name: self.name.clone(),
            project: self.project.clone(),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.project.display())
    }
}

/// How a precompiled framework is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linking {
    /// Linked into the dependent binary.
    Static,
    /// Loaded at runtime and embedded alongside the dependent product.
    Dynamic,
}

/// Anything a target can depend on.
///
/// Equality is field-wise. The derived ordering (variant first, then fields)
/// is the canonical "dependency identity" order used whenever dependencies
/// must be processed deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphDependency {
    /// A source target in some project of the graph.
    Target {
        /// Target name.
        name: String,
        /// Root path of the project declaring the target.
        project: PathBuf,
    },
    /// A prebuilt `.framework` bundle.
    PrecompiledFramework {
        /// Location of the framework on disk.
        path: PathBuf,
        /// Static or dynamic linking.
        linking: Linking,
    },
    /// A prebuilt multi-platform `.xcframework` bundle.
    PrecompiledXcFramework {
        /// Location of the xcframework on disk.
        path: PathBuf,
    },
    /// A product vended by an external package.
    Package {
        /// Product name.
        product: String,
    },
    /// A platform SDK library or framework.
    Sdk {
        /// SDK name (e.g., "XCTest.framework").
        name: String,
    },
}

impl GraphDependency {
    /// Creates a target dependency.
    pub fn target(name: impl Into<String>, project: impl Into<PathBuf>) -> Self {
        Self::Target {
            name: name.into(),
            project: project.into(),
        }
    }

    /// Creates a package product dependency.
    pub fn package(product: impl Into<String>) -> Self {
        Self::Package {
            product: product.into(),
        }
    }

    /// Creates an SDK dependency.
    pub fn sdk(name: impl Into<String>) -> Self {
        Self::Sdk { name: name.into() }
    }

    /// Returns the target identity if this is a target dependency.
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            Self::Target { name, project } => Some(TargetId::new(project.clone(), name.clone())),
            _ => None,
        }
    }

    /// Returns `true` for `Target` dependencies.
    pub fn is_target(&self) -> bool {
        matches!(self, Self::Target { .. })
    }

    /// Returns `true` for precompiled framework and xcframework dependencies.
    pub fn is_precompiled(&self) -> bool {
        matches!(
            self,
            Self::PrecompiledFramework { .. } | Self::PrecompiledXcFramework { .. }
        )
    }

    /// Returns the on-disk path of a precompiled dependency.
    pub fn precompiled_path(&self) -> Option<&Path> {
        match self {
            Self::PrecompiledFramework { path, .. } | Self::PrecompiledXcFramework { path } => {
                Some(path)
            }
            _ => None,
        }
    }
}

impl fmt::Display for GraphDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target { name, project } => write!(f, "target({name}, {})", project.display()),
            Self::PrecompiledFramework { path, linking } => {
                let linking = match linking {
                    Linking::Static => "static",
                    Linking::Dynamic => "dynamic",
                };
                write!(f, "framework({}, {linking})", path.display())
            }
            Self::PrecompiledXcFramework { path } => write!(f, "xcframework({})", path.display()),
            Self::Package { product } => write!(f, "package({product})"),
            Self::Sdk { name } => write!(f, "sdk({name})"),
        }
    }
}

/// A directed edge `from -> to` of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The dependent node.
    pub from: GraphDependency,
    /// The dependency node.
    pub to: GraphDependency,
}
