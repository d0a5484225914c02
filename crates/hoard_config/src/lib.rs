//! Parsing and validation of `hoard.toml` cache configuration files.
//!
//! This crate reads the configuration file and produces a strongly-typed
//! [`HoardConfig`] with cache-profile resolution and cache-directory lookup.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_cache_dir, resolve_profile, ResolvedProfile, DEFAULT_PROFILE_NAME};
pub use types::*;
