//! File-system changes requested by mappers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a side effect creates or deletes its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffectState {
    /// The path must exist after generation.
    Present,
    /// The path must not exist after generation.
    Absent,
}

/// A file or directory the generator must create or delete.
///
/// Mappers only describe side effects; performing them is left to the
/// downstream generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SideEffect {
    /// A file with the given contents.
    File {
        /// Location of the file.
        path: PathBuf,
        /// Contents to write when present.
        #[serde(default)]
        contents: Vec<u8>,
        /// Create or delete.
        state: SideEffectState,
    },
    /// A directory.
    Directory {
        /// Location of the directory.
        path: PathBuf,
        /// Create or delete.
        state: SideEffectState,
    },
}

impl SideEffect {
    /// A file to create with `contents`.
    pub fn file(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self::File {
            path: path.into(),
            contents: contents.into(),
            state: SideEffectState::Present,
        }
    }

    /// A file to delete.
    pub fn delete_file(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            contents: Vec::new(),
            state: SideEffectState::Absent,
        }
    }

    /// A directory to create.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory {
            path: path.into(),
            state: SideEffectState::Present,
        }
    }

    /// A directory to delete.
    pub fn delete_directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory {
            path: path.into(),
            state: SideEffectState::Absent,
        }
    }

    /// Returns the affected path.
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path, .. } | Self::Directory { path, .. } => path,
        }
    }

    /// Returns whether the path is created or deleted.
    pub fn state(&self) -> SideEffectState {
        match self {
            Self::File { state, .. } | Self::Directory { state, .. } => *state,
        }
    }
}
