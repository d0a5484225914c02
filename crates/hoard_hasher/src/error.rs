//! Error types for content hashing.

use std::path::PathBuf;

use hoard_graph::GraphError;

/// Errors raised while computing fingerprints.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// A referenced source, resource, or precompiled path does not exist.
    #[error("source file not found at {}", path.display())]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Reading a path failed for a reason other than absence.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The graph is structurally invalid (cycle, dangling reference).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A target dependency had no fingerprint when its dependent was hashed.
    ///
    /// Dependencies are always hashed first, so this indicates an internal
    /// scheduling bug rather than bad input.
    #[error("missing fingerprint for dependency '{dependency}' of target '{target}'")]
    MissingDependencyHash {
        /// The target being hashed.
        target: String,
        /// The dependency without a fingerprint.
        dependency: String,
    },

    /// Hashing a specific target failed.
    #[error("hashing failed for target '{target}': {source}")]
    Target {
        /// Name of the target.
        target: String,
        /// The underlying failure.
        source: Box<HashError>,
    },
}

impl HashError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub(crate) fn in_target(self, target: &str) -> Self {
        match self {
            already @ Self::Target { .. } => already,
            other => Self::Target {
                target: target.to_string(),
                source: Box::new(other),
            },
        }
    }
}
