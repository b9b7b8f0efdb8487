//! Fetching release archives over HTTP.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::installer::ARCHIVE_PREFIX;
use crate::error::AcquireError;

/// PEAR package mirror that hosts PHP CodeSniffer tarballs.
pub const DEFAULT_BASE_URL: &str = "http://download.pear.php.net/package";

const USER_AGENT: &str = concat!("codesniff/", env!("CARGO_PKG_VERSION"));

/// Builds the archive URL for `version`.
///
/// The version is interpolated verbatim; a malformed version yields a
/// malformed URL, which the fetcher rejects.
pub fn download_url(base_url: &str, version: &str) -> String {
    format!(
        "{}/{}-{}.tgz",
        base_url.trim_end_matches('/'),
        ARCHIVE_PREFIX,
        version
    )
}

/// Source of release archives.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Streams the resource at `url` into the file at `dest` and returns
    /// the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AcquireError>;
}

/// Fetcher backed by a `reqwest` client with a whole-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(AcquireError::download)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, AcquireError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AcquireError::download(format!("invalid URL '{url}': {e}")))?;

        info!("Downloading PHP CodeSniffer from {}", parsed);

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(AcquireError::download)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::download(format!("{url} returned {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(AcquireError::download)?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(AcquireError::download)? {
            file.write_all(&chunk)
                .await
                .map_err(AcquireError::download)?;
            written += chunk.len() as u64;
        }
        // Surface deferred write errors instead of losing them on drop.
        file.flush().await.map_err(AcquireError::download)?;

        debug!("Wrote {} bytes to {}", written, dest.display());
        Ok(written)
    }
}
