//! Downloads remote `.torrent` files to temporary paths.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempPath;
use tracing::debug;

use super::TorrentError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP fetcher writing responses to `odin*.torrent` temp files.
#[derive(Debug, Clone)]
pub struct RemoteFileFetcher {
    client: reqwest::Client,
    temp_dir: PathBuf,
}

impl Default for RemoteFileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFileFetcher {
    /// Fetcher using the system temp directory.
    pub fn new() -> Self {
        Self::with_temp_dir(std::env::temp_dir())
    }

    pub fn with_temp_dir(temp_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, temp_dir }
    }

    /// Downloads `url` into a fresh temp file.
    ///
    /// The returned [`TempPath`] deletes the file when dropped.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Fetch` - Invalid URL, transport failure or non-2xx status
    /// - `TorrentError::Io` - Temp file cannot be created or written
    pub async fn fetch(&self, url: &str) -> Result<TempPath, TorrentError> {
        let fetch_error = |reason: String| TorrentError::Fetch {
            url: url.to_string(),
            reason,
        };

        let parsed = url::Url::parse(url).map_err(|e| fetch_error(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(fetch_error(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("server returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let file = tempfile::Builder::new()
            .prefix("odin")
            .suffix(".torrent")
            .tempfile_in(&self.temp_dir)?;
        tokio::fs::write(file.path(), &body).await?;

        debug!(url, bytes = body.len(), path = %file.path().display(), "Fetched torrent file");
        Ok(file.into_temp_path())
    }
}
