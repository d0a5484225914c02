//! Graph transformations applied before project generation.
//!
//! A [`GraphMapper`] turns a graph into a new graph plus a list of
//! [`SideEffect`]s for the generator to perform. [`MapperPipeline`] chains
//! mappers in caller order. [`CacheGraphMutator`] (wrapped as
//! [`CacheMapper`]) swaps cache hits for precompiled artifacts and prunes
//! whatever the artifacts make redundant.

#![warn(missing_docs)]

pub mod cache_mapper;
pub mod error;
pub mod mapper;
pub mod mutator;
pub mod side_effect;

pub use cache_mapper::CacheMapper;
pub use error::{MapperError, MutationError};
pub use mapper::{GraphMapper, MapperPipeline, ProjectMapper, ProjectMappersGraphMapper};
pub use mutator::{CacheGraphMutator, MutationReport};
pub use side_effect::{SideEffect, SideEffectState};
