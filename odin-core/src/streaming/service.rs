//! Torrent-backed and disk-backed stream sources.

use std::path::Path;

use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use tracing::debug;

use super::{StreamingError, serve_content};
use crate::engine::ReaderOptions;
use crate::torrent::ManagedTorrent;

/// Opens the byte source for an asset and hands it to [`serve_content`].
#[derive(Debug, Clone, Copy)]
pub struct StreamingService {
    /// Readahead is `length / readahead_divisor`
    readahead_divisor: u64,
}

impl Default for StreamingService {
    fn default() -> Self {
        Self {
            readahead_divisor: 100,
        }
    }
}

impl StreamingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readahead for a file of `length` bytes: 1% by default.
    pub fn readahead_for(&self, length: u64) -> u64 {
        length / self.readahead_divisor.max(1)
    }

    /// Streams the selected video file of a torrent.
    ///
    /// Reads block until pieces arrive and re-prioritize the pieces under
    /// the read position. `Last-Modified` is the request time because the
    /// content is still materializing.
    ///
    /// # Errors
    ///
    /// - `StreamingError::NoVideoFile` - No video file was selected
    /// - `StreamingError::Torrent` - Engine could not open a reader
    /// - `StreamingError::Io` - Seek to the requested range failed
    pub async fn stream_torrent(
        &self,
        torrent: &ManagedTorrent,
        headers: &HeaderMap,
    ) -> Result<Response, StreamingError> {
        let video = torrent
            .video_file()
            .ok_or_else(|| StreamingError::NoVideoFile {
                info_hash: torrent.info_hash(),
            })?;

        let options = ReaderOptions {
            readahead: self.readahead_for(video.length),
            responsive: true,
        };
        let reader = torrent
            .engine_handle()
            .open_reader(video.index, options)
            .await?;

        debug!(
            info_hash = %torrent.info_hash(),
            path = %video.path,
            readahead = options.readahead,
            "Streaming torrent file"
        );
        serve_content(headers, &video.path, video.length, Utc::now(), reader).await
    }

    /// Streams a file from disk. `Last-Modified` is the request time, as for
    /// torrents.
    ///
    /// # Errors
    ///
    /// - `StreamingError::FileNotFound` - Path missing, unreadable or a directory
    /// - `StreamingError::Io` - Seek to the requested range failed
    pub async fn stream_file(
        &self,
        path: &Path,
        headers: &HeaderMap,
    ) -> Result<Response, StreamingError> {
        let not_found = || StreamingError::FileNotFound {
            path: path.to_path_buf(),
        };

        let file = tokio::fs::File::open(path).await.map_err(|_| not_found())?;
        let metadata = file.metadata().await.map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        debug!(path = %path.display(), size = metadata.len(), "Streaming file from disk");
        serve_content(
            headers,
            &path.to_string_lossy(),
            metadata.len(),
            Utc::now(),
            file,
        )
        .await
    }
}
