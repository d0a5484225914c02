//! Tiered artifact storage for the hoard build cache.
//!
//! Artifacts are keyed by target name and fingerprint. [`LocalCacheStorage`]
//! keeps them on disk under `<root>/<fingerprint>/<artifact>`,
//! [`RemoteCacheStorage`] talks to an HTTP cache service, and
//! [`TieredCacheStorage`] composes the two: local first, remote second, with
//! remote hits written through to the local tier.

#![warn(missing_docs)]

pub mod archive;
pub mod credentials;
pub mod error;
pub mod local;
pub mod lookup;
pub mod remote;
pub mod storage;
pub mod tiered;

pub use credentials::{CredentialsProvider, EnvCredentials, StaticCredentials};
pub use error::CacheError;
pub use local::{LocalCacheStorage, DOWNLOADS_DIR};
pub use lookup::{fetch_hits, store_all, BuiltArtifact, CacheLookupReport};
pub use remote::RemoteCacheStorage;
pub use storage::{CacheItem, CacheStorage, CacheTier};
pub use tiered::{RemoteFailurePolicy, TieredCacheStorage};
