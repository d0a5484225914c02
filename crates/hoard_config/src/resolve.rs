//! Profile and cache-directory resolution.

use crate::error::ConfigError;
use crate::types::{HoardConfig, OutputFormat};
use std::path::{Path, PathBuf};

/// Name reported for the built-in profile used when none is configured.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// Cache directory used when `cache.directory` is not set.
const DEFAULT_CACHE_DIR: &str = ".hoard/cache";

/// A cache profile selected from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    /// The profile name.
    pub name: String,
    /// Build configuration name.
    pub configuration: String,
    /// Target platform.
    pub platform: String,
    /// Shape of the cached artifact.
    pub output: OutputFormat,
}

impl ResolvedProfile {
    fn builtin() -> Self {
        Self {
            name: DEFAULT_PROFILE_NAME.to_string(),
            configuration: "Debug".to_string(),
            platform: "host".to_string(),
            output: OutputFormat::default(),
        }
    }
}

/// Resolves the cache profile to use.
///
/// An explicit `name` must exist. Without one, `cache.default_profile` is used;
/// failing that, the single configured profile; failing that, the built-in
/// `Debug`/`host` profile when no profiles are configured at all.
pub fn resolve_profile(
    config: &HoardConfig,
    name: Option<&str>,
) -> Result<ResolvedProfile, ConfigError> {
    let selected = match name.or(config.cache.default_profile.as_deref()) {
        Some(name) => Some(name),
        None if config.profiles.len() == 1 => config.profiles.keys().next().map(String::as_str),
        None if config.profiles.is_empty() => return Ok(ResolvedProfile::builtin()),
        None => {
            return Err(ConfigError::MissingField(
                "cache.default_profile".to_string(),
            ))
        }
    };

    let Some(name) = selected else {
        return Ok(ResolvedProfile::builtin());
    };
    let profile = config
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

    Ok(ResolvedProfile {
        name: name.to_string(),
        configuration: profile.configuration.clone(),
        platform: profile.platform.clone(),
        output: profile.output,
    })
}

/// Resolves the local cache directory against the project directory.
pub fn resolve_cache_dir(config: &HoardConfig, project_dir: &Path) -> PathBuf {
    let dir = config
        .cache
        .directory
        .as_deref()
        .unwrap_or(DEFAULT_CACHE_DIR);
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
