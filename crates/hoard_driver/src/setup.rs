//! Builds hashers and storage tiers from `hoard.toml`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hoard_cache::{
    CacheStorage, EnvCredentials, LocalCacheStorage, RemoteCacheStorage, RemoteFailurePolicy,
    TieredCacheStorage, DOWNLOADS_DIR,
};
use hoard_config::{resolve_cache_dir, HoardConfig, OutputFormat, RemoteErrorPolicy, ResolvedProfile};
use hoard_hasher::{CacheOutputType, CacheProfile, ContentHasher, GraphContentHasher, HashingFilter};

use crate::error::DriverError;

/// Builds the tiered storage described by `config`.
///
/// The local tier lives in the resolved cache directory. A remote tier is
/// added when `[cache.remote]` is present; its bearer token is read from
/// the configured environment variable at request time.
pub fn storage_from_config(
    config: &HoardConfig,
    project_dir: &Path,
) -> Result<TieredCacheStorage, DriverError> {
    let cache_dir = resolve_cache_dir(config, project_dir);
    let local: Arc<dyn CacheStorage> = Arc::new(LocalCacheStorage::new(&cache_dir));

    let Some(remote) = &config.cache.remote else {
        tracing::debug!(cache_dir = %cache_dir.display(), "using local cache only");
        return Ok(TieredCacheStorage::new(local, None, RemoteFailurePolicy::Fail));
    };

    let credentials = Arc::new(EnvCredentials::new(remote.token_env.clone()));
    let storage = RemoteCacheStorage::new(
        &remote.url,
        remote.project_id.clone(),
        credentials,
        cache_dir.join(DOWNLOADS_DIR),
        Duration::from_secs(remote.timeout_secs),
    )?;
    let policy = match remote.on_error {
        RemoteErrorPolicy::Fail => RemoteFailurePolicy::Fail,
        RemoteErrorPolicy::Degrade => RemoteFailurePolicy::Degrade,
    };
    tracing::debug!(
        cache_dir = %cache_dir.display(),
        remote = %storage.endpoint(),
        ?policy,
        "using tiered cache"
    );
    Ok(TieredCacheStorage::new(local, Some(Arc::new(storage)), policy))
}

/// Builds the graph hasher described by `[hashing]` and `[cache]`.
pub fn hasher_from_config(config: &HoardConfig) -> GraphContentHasher {
    let filter = HashingFilter::new(
        config.hashing.exclude.iter().cloned(),
        config.hashing.exclude_extensions.iter().cloned(),
    );
    let concurrency = config.cache.max_concurrency;
    GraphContentHasher::new(Arc::new(ContentHasher::new(filter, concurrency)), concurrency)
}

/// Maps a resolved profile to the profile and output type fingerprints use.
pub fn cache_profile(profile: &ResolvedProfile) -> (CacheProfile, CacheOutputType) {
    let output = match profile.output {
        OutputFormat::Framework => CacheOutputType::Framework,
        OutputFormat::Xcframework => CacheOutputType::XcFramework,
    };
    (
        CacheProfile::new(profile.configuration.clone(), profile.platform.clone()),
        output,
    )
}
