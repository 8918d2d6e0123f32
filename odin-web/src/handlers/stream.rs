//! `/stream`: range-capable media bytes.

use std::path::Path;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use super::non_empty;
use crate::errors::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "infoHash")]
    pub info_hash: Option<String>,
    pub path: Option<String>,
}

/// Streams the selected video of a torrent (`infoHash`) or a file (`path`).
///
/// Unknown hashes, unreadable paths and torrents without a video file all
/// answer a bare 404.
///
/// # Errors
///
/// - `ApiError::NotFound` - Nothing to stream
/// - `ApiError::Internal` - Reader failed before the body started
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(info_hash) = non_empty(query.info_hash) {
        let torrent = state
            .torrents
            .torrent_from_hash(&info_hash)
            .ok_or(ApiError::NotFound)?;
        return Ok(state.streaming.stream_torrent(&torrent, &headers).await?);
    }

    if let Some(path) = non_empty(query.path) {
        return Ok(state.streaming.stream_file(Path::new(&path), &headers).await?);
    }

    Err(ApiError::NotFound)
}
