//! Shared foundational types used across the hoard build cache.
//!
//! This crate provides the [`ContentHash`] digest used as the fingerprint of
//! every cached target, and the atomic filesystem helpers the cache tiers rely
//! on to never expose a partially written artifact.

#![warn(missing_docs)]

pub mod fs;
pub mod hash;

pub use fs::{copy_path, is_staging_entry, rename_into_place, FsError, StagingDir, STAGING_PREFIX};
pub use hash::{ContentHash, ParseContentHashError};
