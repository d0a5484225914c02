//! Configuration types deserialized from `hoard.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// The top-level configuration parsed from `hoard.toml`.
///
/// Every section is optional; an empty file yields a local-only cache with the
/// built-in default profile.
#[derive(Debug, Default, Deserialize)]
pub struct HoardConfig {
    /// Cache location, concurrency and remote tier settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Named cache profiles (e.g., "debug-sim", "release-device").
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
    /// Content hashing settings (exclusions and extra salt).
    #[serde(default)]
    pub hashing: HashingConfig,
}

/// Cache storage configuration.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Local cache directory. Relative paths resolve against the project directory.
    #[serde(default)]
    pub directory: Option<String>,
    /// Maximum number of concurrent hashing and cache I/O tasks.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Profile used when the caller does not name one.
    #[serde(default)]
    pub default_profile: Option<String>,
    /// Remote object storage tier. Local-only caching when absent.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_concurrency: default_max_concurrency(),
            default_profile: None,
            remote: None,
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

/// Remote cache endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the cache service.
    pub url: String,
    /// Project identifier that scopes every request.
    pub project_id: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// What to do when the remote tier is unreachable.
    #[serde(default)]
    pub on_error: RemoteErrorPolicy,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    "HOARD_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Policy applied when the remote tier fails with a network error.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteErrorPolicy {
    /// Surface the error and abort the stage (default).
    #[default]
    Fail,
    /// Log a warning and continue with local-only caching.
    Degrade,
}

/// A named cache profile: the build configuration and platform that
/// fingerprints and artifacts are parameterized over.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Build configuration name (e.g., "Debug", "Release").
    pub configuration: String,
    /// Target platform (e.g., "ios-simulator", "macos").
    pub platform: String,
    /// Shape of the cached artifact.
    #[serde(default)]
    pub output: OutputFormat,
}

/// Shape of the binary artifact produced for cached targets.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single-platform `.framework` bundle.
    Framework,
    /// A multi-platform `.xcframework` bundle (default).
    #[default]
    Xcframework,
}

/// Content hashing configuration.
#[derive(Debug, Default, Deserialize)]
pub struct HashingConfig {
    /// File or directory names skipped when hashing directories.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// File extensions (without the dot) skipped when hashing directories.
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    /// Extra strings mixed into every fingerprint (e.g., toolchain version).
    #[serde(default)]
    pub additional_strings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn output_format_all_variants() {
        for (input, expected) in [
            ("framework", OutputFormat::Framework),
            ("xcframework", OutputFormat::Xcframework),
        ] {
            let toml = format!(
                r#"
[profiles.dev]
configuration = "Debug"
platform = "ios-simulator"
output = "{input}"
"#
            );
            let config = load_config_from_str(&toml).unwrap();
            assert_eq!(config.profiles["dev"].output, expected);
        }
    }

    #[test]
    fn remote_error_policy_variants() {
        for (input, expected) in [
            ("fail", RemoteErrorPolicy::Fail),
            ("degrade", RemoteErrorPolicy::Degrade),
        ] {
            let toml = format!(
                r#"
[cache.remote]
url = "https://cache.example.com"
project_id = "acme/app"
on_error = "{input}"
"#
            );
            let config = load_config_from_str(&toml).unwrap();
            assert_eq!(config.cache.remote.unwrap().on_error, expected);
        }
    }

    #[test]
    fn remote_defaults() {
        let toml = r#"
[cache.remote]
url = "https://cache.example.com"
project_id = "acme/app"
"#;
        let config = load_config_from_str(toml).unwrap();
        let remote = config.cache.remote.unwrap();
        assert_eq!(remote.token_env, "HOARD_TOKEN");
        assert_eq!(remote.timeout_secs, 60);
        assert_eq!(remote.on_error, RemoteErrorPolicy::Fail);
    }

    #[test]
    fn unknown_output_format_rejected() {
        let toml = r#"
[profiles.dev]
configuration = "Debug"
platform = "macos"
output = "dylib"
"#;
        assert!(load_config_from_str(toml).is_err());
    }
}
