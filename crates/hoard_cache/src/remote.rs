//! The remote HTTP tier.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hoard_common::{ContentHash, StagingDir};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::archive;
use crate::credentials::CredentialsProvider;
use crate::error::CacheError;
use crate::storage::{artifact_in, CacheStorage};

/// Path of the cache endpoint, relative to the base URL.
const CACHE_ENDPOINT: &str = "api/cache";

/// Name of the downloaded bundle inside its staging directory.
const DOWNLOAD_FILE: &str = "bundle.hoard";

/// Cache tier backed by a remote HTTP service.
///
/// Every request targets `{base}/api/cache?project_id=..&hash=..&name=..`:
/// `HEAD` checks existence, `GET` downloads an artifact bundle, `PUT` uploads
/// one. Downloads are streamed to a staging file, unpacked into a staging
/// directory, and renamed to `<download root>/<fingerprint>/<name>`; a
/// cancelled download leaves nothing behind. [`release`] removes a download
/// once the caller has copied it elsewhere.
///
/// [`release`]: CacheStorage::release
#[derive(Debug, Clone)]
pub struct RemoteCacheStorage {
    client: Client,
    endpoint: Url,
    project_id: String,
    credentials: Arc<dyn CredentialsProvider>,
    download_root: PathBuf,
}

impl RemoteCacheStorage {
    /// Creates a remote tier.
    ///
    /// `download_root` receives fetched artifacts; it is normally a directory
    /// next to the local cache.
    pub fn new(
        base: &str,
        project_id: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
        download_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, CacheError> {
        let mut base = Url::parse(base).map_err(|e| CacheError::InvalidRemote {
            reason: format!("invalid URL '{base}': {e}"),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(CACHE_ENDPOINT).map_err(|e| CacheError::InvalidRemote {
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .user_agent(concat!("hoard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            project_id: project_id.into(),
            credentials,
            download_root: download_root.into(),
        })
    }

    /// Returns the cache endpoint URL without query parameters.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Returns the directory a download of `(name, hash)` is unpacked into.
    pub fn download_dir(&self, name: &str, hash: &ContentHash) -> PathBuf {
        self.download_root.join(hash.to_hex()).join(name)
    }

    fn url(&self, name: &str, hash: &ContentHash) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("project_id", &self.project_id)
            .append_pair("hash", &hash.to_hex())
            .append_pair("name", name);
        url
    }

    fn request(&self, method: Method, name: &str, hash: &ContentHash) -> RequestBuilder {
        let request = self.client.request(method, self.url(name, hash));
        match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn download(
        &self,
        response: Response,
        hash: &ContentHash,
        dest: &Path,
    ) -> Result<(), CacheError> {
        let staging = StagingDir::new_in(&self.download_root, "download")?;
        let file_path = staging.path().join(DOWNLOAD_FILE);
        write_body(response, &file_path).await?;

        let root = self.download_root.clone();
        let dest = dest.to_path_buf();
        let label = hash.to_hex();
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let bytes = std::fs::read(&file_path).map_err(|e| CacheError::io(&file_path, e))?;
            let unpacked = StagingDir::new_in(&root, &label)?;
            archive::unpack(&bytes, unpacked.path())?;
            unpacked.persist_to(&dest)?;
            drop(staging);
            Ok(())
        })
        .await?
    }
}

async fn find_artifact(dir: PathBuf, name: &str) -> Result<Option<PathBuf>, CacheError> {
    let name = name.to_string();
    tokio::task::spawn_blocking(move || artifact_in(&dir, &name)).await?
}

async fn write_body(mut response: Response, path: &Path) -> Result<(), CacheError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| CacheError::io(path, e))?;
    }
    file.flush().await.map_err(|e| CacheError::io(path, e))
}

/// Maps a non-success status to an error.
fn status_error(status: StatusCode, name: &str, hash: &ContentHash) -> CacheError {
    match status.as_u16() {
        404 => CacheError::not_found(name, hash),
        code @ (401 | 403) => CacheError::Unauthorized { status: code },
        _ => CacheError::Network {
            reason: format!("unexpected status {status} for '{name}'"),
            retryable: true,
        },
    }
}

#[async_trait]
impl CacheStorage for RemoteCacheStorage {
    async fn exists(&self, name: &str, hash: &ContentHash) -> Result<bool, CacheError> {
        let response = self.request(Method::HEAD, name, hash).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        match status_error(status, name, hash) {
            CacheError::NotFound { .. } => Ok(false),
            err => Err(err),
        }
    }

    async fn fetch(&self, name: &str, hash: &ContentHash) -> Result<PathBuf, CacheError> {
        let dest = self.download_dir(name, hash);
        if let Some(path) = find_artifact(dest.clone(), name).await? {
            return Ok(path);
        }

        let response = self.request(Method::GET, name, hash).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, name, hash));
        }
        self.download(response, hash, &dest).await?;
        tracing::debug!(name, hash = %hash, tier = "remote", "downloaded artifact");

        find_artifact(dest, name).await?.ok_or_else(|| CacheError::InvalidArchive {
            reason: format!("bundle for '{name}' contained no artifact"),
        })
    }

    async fn store(
        &self,
        name: &str,
        hash: &ContentHash,
        paths: &[PathBuf],
    ) -> Result<(), CacheError> {
        let owned = paths.to_vec();
        let bundle = tokio::task::spawn_blocking(move || archive::pack(&owned)).await??;
        let size = bundle.len();

        let response = self
            .request(Method::PUT, name, hash)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bundle)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, name, hash));
        }
        tracing::debug!(name, hash = %hash, tier = "remote", bytes = size, "uploaded artifact");
        Ok(())
    }

    async fn release(&self, name: &str, hash: &ContentHash) -> Result<(), CacheError> {
        let dir = self.download_dir(name, hash);
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io(&dir, e)),
            }
            // The fingerprint directory goes once its last download is released.
            if let Some(parent) = dir.parent() {
                let _ = std::fs::remove_dir(parent);
            }
            Ok(())
        })
        .await?
    }
}
