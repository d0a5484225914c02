//! The cache graph mutator as a pipeline stage.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use hoard_common::ContentHash;
use hoard_graph::{Graph, TargetId};

use crate::error::MapperError;
use crate::mapper::GraphMapper;
use crate::mutator::{CacheGraphMutator, MutationReport};
use crate::side_effect::SideEffect;

/// Runs [`CacheGraphMutator`] with a fixed set of fingerprints and hits.
///
/// The report of the last run is kept and can be taken afterwards.
#[derive(Debug)]
pub struct CacheMapper {
    mutator: CacheGraphMutator,
    hashes: BTreeMap<TargetId, ContentHash>,
    artifacts: BTreeMap<TargetId, PathBuf>,
    report: Mutex<Option<MutationReport>>,
}

impl CacheMapper {
    /// Creates a cache mapper.
    pub fn new(
        mutator: CacheGraphMutator,
        hashes: BTreeMap<TargetId, ContentHash>,
        artifacts: BTreeMap<TargetId, PathBuf>,
    ) -> Self {
        Self {
            mutator,
            hashes,
            artifacts,
            report: Mutex::new(None),
        }
    }

    /// Takes the report of the last successful run.
    pub fn take_report(&self) -> Option<MutationReport> {
        self.report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl GraphMapper for CacheMapper {
    fn name(&self) -> &str {
        "cache"
    }

    fn map(&self, graph: Graph) -> Result<(Graph, Vec<SideEffect>), MapperError> {
        let (mutated, report) = self.mutator.mutate(&graph, &self.hashes, &self.artifacts)?;
        *self
            .report
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
        Ok((mutated, Vec::new()))
    }
}
