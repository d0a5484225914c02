//! Error types for cache storage.

use std::path::PathBuf;

use hoard_common::FsError;

/// Errors raised by the cache tiers.
///
/// A cache miss is not an error except for [`fetch`] on a single tier, which
/// reports [`CacheError::NotFound`].
///
/// [`fetch`]: crate::CacheStorage::fetch
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The requested artifact is not in the queried tier.
    #[error("no cached artifact for '{name}' with fingerprint {hash}")]
    NotFound {
        /// Artifact (target) name.
        name: String,
        /// Fingerprint in hex form.
        hash: String,
    },

    /// None of the stored paths is the artifact of the target.
    #[error("no artifact named '{name}' among the stored paths")]
    UnnamedArtifact {
        /// Target name the artifact should carry as its file stem.
        name: String,
    },

    /// The remote cache rejected the credentials.
    #[error("remote cache rejected credentials (HTTP {status})")]
    Unauthorized {
        /// The HTTP status returned.
        status: u16,
    },

    /// The remote cache could not be reached or answered unexpectedly.
    #[error("remote cache request failed: {reason}")]
    Network {
        /// Description of the failure.
        reason: String,
        /// Whether retrying (or degrading to local-only) is reasonable.
        retryable: bool,
    },

    /// An artifact bundle has an invalid header or layout.
    #[error("invalid artifact archive: {reason}")]
    InvalidArchive {
        /// Description of the problem.
        reason: String,
    },

    /// The archive checksum does not match its payload.
    #[error("archive checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: String,
        /// Checksum computed from the payload.
        actual: String,
    },

    /// The archive format version is not supported.
    #[error("archive version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The supported format version.
        expected: u32,
        /// The version found in the archive.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The remote cache configuration is invalid.
    #[error("invalid remote cache configuration: {reason}")]
    InvalidRemote {
        /// Description of the problem.
        reason: String,
    },

    /// A blocking cache task panicked or was cancelled.
    #[error("cache task failed: {reason}")]
    Task {
        /// Description of the failure.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` for failures that may succeed on retry.
    ///
    /// The tiered storage uses this to decide whether the remote tier can be
    /// degraded to a miss.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { retryable: true, .. })
    }

    /// Returns `true` for [`CacheError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(name: &str, hash: &hoard_common::ContentHash) -> Self {
        Self::NotFound {
            name: name.to_string(),
            hash: hash.to_hex(),
        }
    }
}

impl From<FsError> for CacheError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::Io { path, source } => Self::Io { path, source },
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            reason: err.to_string(),
            retryable: true,
        }
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_common::ContentHash;

    #[test]
    fn not_found_display() {
        let hash = ContentHash::from_str_content("x");
        let err = CacheError::not_found("Core", &hash);
        let msg = err.to_string();
        assert!(msg.contains("'Core'"));
        assert!(msg.contains(&hash.to_hex()));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_is_retryable() {
        let err = CacheError::Network {
            reason: "connection refused".into(),
            retryable: true,
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "remote cache request failed: connection refused");
    }

    #[test]
    fn unauthorized_is_not_retryable() {
        let err = CacheError::Unauthorized { status: 401 };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn fs_error_converts_to_io() {
        let fs = FsError::Io {
            path: PathBuf::from("/cache/x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let err: CacheError = fs.into();
        assert!(err.to_string().contains("cache I/O error at /cache/x"));
    }

    #[test]
    fn unnamed_artifact_display() {
        let err = CacheError::UnnamedArtifact {
            name: "Core".into(),
        };
        assert_eq!(err.to_string(), "no artifact named 'Core' among the stored paths");
    }

    #[test]
    fn version_mismatch_display() {
        let err = CacheError::VersionMismatch {
            expected: 1,
            actual: 99,
        };
        assert_eq!(err.to_string(), "archive version mismatch: expected 1, got 99");
    }
}
