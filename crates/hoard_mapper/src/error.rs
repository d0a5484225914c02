//! Error types for graph mutation and mapper pipelines.

use std::path::PathBuf;

use hoard_graph::GraphError;

/// Errors raised by the cache graph mutator. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// A hit's artifact disappeared between fetch and mutation.
    #[error("cached artifact for target '{target}' is missing at {}", path.display())]
    MissingArtifact {
        /// Name of the target.
        target: String,
        /// The expected artifact path.
        path: PathBuf,
    },

    /// An artifact was supplied for a target that is not in the graph.
    #[error("artifact supplied for unknown target '{target}'")]
    UnknownTarget {
        /// Display form of the target identity.
        target: String,
    },

    /// An artifact was supplied for a target that has no fingerprint.
    #[error("artifact supplied for target '{target}' without a fingerprint")]
    MissingFingerprint {
        /// Name of the target.
        target: String,
    },

    /// The input graph is structurally invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised by mappers and the mapper pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The cache graph mutator failed.
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// A mapper produced or received an invalid graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A mapper rejected its input.
    #[error("{reason}")]
    Rejected {
        /// Description of the failure.
        reason: String,
    },

    /// A mapper of a pipeline failed; the pipeline was aborted.
    #[error("mapper '{mapper}' failed: {source}")]
    Failed {
        /// Name of the failing mapper.
        mapper: String,
        /// The underlying failure.
        source: Box<MapperError>,
    },
}

impl MapperError {
    /// Creates a [`MapperError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}
