//! End-to-end cache resolution for a dependency graph.
//!
//! The [`Driver`] fingerprints the cacheable targets of a graph, looks the
//! fingerprints up in the tiered cache, substitutes the hits with their
//! precompiled artifacts, and runs any extra mappers over the result. After
//! a build, [`Driver::store_built`] saves freshly built artifacts.

#![warn(missing_docs)]

pub mod driver;
pub mod error;
pub mod setup;

pub use driver::{Driver, Resolution, ResolveOptions};
pub use error::DriverError;
pub use hoard_cache::DOWNLOADS_DIR;
pub use setup::{cache_profile, hasher_from_config, storage_from_config};
