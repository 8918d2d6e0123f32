//! `/torrents`: list managed torrents and start new downloads.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use odin_core::TorrentInfo;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::server::AppState;

/// Body of `POST /torrents`.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Magnet URI or HTTP(S) URL of a `.torrent` file
    pub url: String,
}

pub async fn list_torrents(State(state): State<AppState>) -> Json<Vec<TorrentInfo>> {
    Json(state.torrents.torrents())
}

/// Starts a download and kicks off a background subtitle lookup for the
/// selected video.
///
/// The body is parsed regardless of `Content-Type`.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Body is not `{"url": ...}` JSON
/// - `ApiError::Internal` - Fetch, parse, engine or metadata failure
pub async fn add_torrent(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TorrentInfo>, ApiError> {
    let request: DownloadRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest {
            reason: format!("Invalid JSON: {e}"),
        })?;

    let torrent = state.torrents.download(&request.url).await?;
    info!(info_hash = %torrent.info_hash, name = %torrent.name, "Torrent added");

    if let Some(video) = &torrent.video_file {
        let subtitles = state.subtitles.clone();
        let video_path = subtitles.resolve_video_path(&video.path);
        tokio::spawn(async move {
            let found = subtitles.find_subtitles(&video_path).await;
            debug!(
                video = %video_path.display(),
                count = found.len(),
                "Background subtitle lookup done"
            );
        });
    }

    Ok(Json(torrent))
}
