//! Cache profile and output kind: fingerprint inputs chosen by the caller.

use std::fmt;

/// The build configuration and destination a fingerprint is computed for.
///
/// The same sources built for a different configuration or platform produce a
/// different binary, so both are part of every fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheProfile {
    /// Build configuration (e.g., "Debug").
    pub configuration: String,
    /// Destination platform (e.g., "ios-simulator").
    pub platform: String,
}

impl CacheProfile {
    /// Creates a profile.
    pub fn new(configuration: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            platform: platform.into(),
        }
    }
}

impl fmt::Display for CacheProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.configuration, self.platform)
    }
}

/// The kind of binary artifact cached for a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CacheOutputType {
    /// A single-platform `.framework` bundle.
    Framework,
    /// A multi-platform `.xcframework` bundle.
    #[default]
    XcFramework,
}

impl CacheOutputType {
    /// Returns the stable name used in fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Framework => "framework",
            Self::XcFramework => "xcframework",
        }
    }

    /// Returns the file extension of artifacts of this kind.
    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}
