//! Cover artwork download with a local file cache

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::client::DiscogsClient;
use super::error::{ClientError, FetchError};
use crate::files::sanitize;

/// Pause before each image download, for the image server's rate limit
const DOWNLOAD_DELAY: Duration = Duration::from_millis(1050);

/// Something that can download raw bytes
pub trait ArtworkSource {
    /// Downloads the resource at `uri`
    fn download(&self, uri: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>>;
}

impl ArtworkSource for DiscogsClient {
    async fn download(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        DiscogsClient::download(self, uri).await
    }
}

/// Directory of downloaded images, named after the last URI segment
#[derive(Debug, Clone)]
pub struct ArtworkStore {
    dir: PathBuf,
    delay: Duration,
}

impl ArtworkStore {
    /// Creates a store that keeps images in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delay: DOWNLOAD_DELAY,
        }
    }

    /// Overrides the pre-download pause
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Local path an image URI is stored at
    ///
    /// The name is the URI's last path segment with any query dropped.
    pub fn path_for(&self, uri: &str) -> Result<PathBuf, ClientError> {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let name = sanitize(path.rsplit('/').next().unwrap_or(path));
        if name.is_empty() || name == "." || name == ".." {
            return Err(ClientError::ArtworkName(uri.to_string()));
        }
        Ok(self.dir.join(name))
    }

    /// Returns the image bytes, downloading them on first use
    pub async fn get<S: ArtworkSource>(&self, source: &S, uri: &str) -> Result<Vec<u8>, ClientError> {
        let path = self.path_for(uri)?;
        if path.is_file() {
            debug!(path = %path.display(), "Artwork cache hit");
            return Ok(fs::read(&path)?);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let bytes = source
            .download(uri)
            .await
            .map_err(|source| ClientError::Artwork {
                uri: uri.to_string(),
                source,
            })?;

        write_image(&path, &bytes)?;
        Ok(bytes)
    }
}

fn write_image(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}
