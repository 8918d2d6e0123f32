//! `/watch`: player markup for a torrent or a file on disk.

use std::path::Path;

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::non_empty;
use crate::errors::ApiError;
use crate::server::AppState;
use crate::templates::{file_player, torrent_player};

#[derive(Debug, Deserialize)]
pub struct WatchQuery {
    pub url: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    pub html: String,
    /// Video path, relative to the download directory for torrents
    pub path: String,
}

/// `url` downloads the torrent first and wins over `path`.
///
/// # Errors
///
/// - `ApiError::NotFound` - Neither parameter given, or the torrent has no
///   playable video file
/// - `ApiError::Internal` - Download failed
pub async fn watch(
    State(state): State<AppState>,
    Query(query): Query<WatchQuery>,
) -> Result<Json<WatchResponse>, ApiError> {
    if let Some(url) = non_empty(query.url) {
        let torrent = state.torrents.download(&url).await?;
        let video = torrent.video_file.ok_or(ApiError::NotFound)?;

        let video_path = state.subtitles.resolve_video_path(&video.path);
        let tracks = state.subtitles.subtitle_tracks(&video_path).await;

        return Ok(Json(WatchResponse {
            html: torrent_player(state.port, &torrent.info_hash, &tracks),
            path: video.path,
        }));
    }

    if let Some(path) = non_empty(query.path) {
        let tracks = state.subtitles.subtitle_tracks(Path::new(&path)).await;
        return Ok(Json(WatchResponse {
            html: file_player(state.port, &path, &tracks),
            path,
        }));
    }

    Err(ApiError::NotFound)
}
