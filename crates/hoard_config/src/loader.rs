//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::HoardConfig;
use std::path::Path;

/// Name of the configuration file inside a project directory.
pub const CONFIG_FILE: &str = "hoard.toml";

/// Loads and validates a `hoard.toml` configuration from a project directory.
///
/// Reads `<project_dir>/hoard.toml`, parses it, and validates its values.
pub fn load_config(project_dir: &Path) -> Result<HoardConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `hoard.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<HoardConfig, ConfigError> {
    let config: HoardConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-references between sections.
fn validate_config(config: &HoardConfig) -> Result<(), ConfigError> {
    if config.cache.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "cache.max_concurrency must be greater than zero".to_string(),
        ));
    }

    for (name, profile) in &config.profiles {
        if profile.configuration.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "profiles.{name}.configuration"
            )));
        }
        if profile.platform.is_empty() {
            return Err(ConfigError::MissingField(format!("profiles.{name}.platform")));
        }
    }

    if let Some(default) = &config.cache.default_profile {
        if !config.profiles.contains_key(default) {
            return Err(ConfigError::UnknownProfile(default.clone()));
        }
    }

    if let Some(remote) = &config.cache.remote {
        if remote.url.is_empty() {
            return Err(ConfigError::MissingField("cache.remote.url".to_string()));
        }
        url::Url::parse(&remote.url).map_err(|e| {
            ConfigError::ValidationError(format!("cache.remote.url '{}': {e}", remote.url))
        })?;
        if remote.project_id.is_empty() {
            return Err(ConfigError::MissingField(
                "cache.remote.project_id".to_string(),
            ));
        }
    }

    Ok(())
}
