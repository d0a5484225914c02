//! Error type for the driver.

use hoard_cache::CacheError;
use hoard_config::ConfigError;
use hoard_graph::GraphError;
use hoard_hasher::HashError;
use hoard_mapper::MapperError;

/// Errors raised while resolving or storing cached artifacts.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The input graph is invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Fingerprinting failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// A cache tier failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The mapper pipeline failed.
    #[error(transparent)]
    Mapper(#[from] MapperError),
}
