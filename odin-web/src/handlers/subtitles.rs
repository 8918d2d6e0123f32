//! `/subtitles`: serve subtitles as WebVTT and accept uploads.

use std::path::Path;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use odin_subtitles::srt_to_webvtt;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::server::AppState;

/// Multipart field carrying the uploaded subtitle.
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct SubtitlePathQuery {
    #[serde(default)]
    pub path: String,
}

/// Reads the SRT file at `path` and returns it as WebVTT.
///
/// # Errors
///
/// - `ApiError::SubtitleUnavailable` - File missing or unreadable
pub async fn get_subtitles(
    Query(query): Query<SubtitlePathQuery>,
) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&query.path)
        .await
        .map_err(|e| ApiError::SubtitleUnavailable {
            reason: format!("{}: {e}", query.path),
        })?;

    let vtt = srt_to_webvtt(&String::from_utf8_lossy(&bytes));
    Ok(([(header::CONTENT_TYPE, "text/vtt; charset=utf-8")], vtt).into_response())
}

/// Saves the uploaded `.srt` next to the video at `path`, relative to the
/// download directory.
///
/// # Errors
///
/// - `ApiError::BadRequest` - Missing `file` field, non-`.srt` upload or bad path
/// - `ApiError::Internal` - Write failed
pub async fn upload_subtitle(
    State(state): State<AppState>,
    Query(query): Query<SubtitlePathQuery>,
    mut multipart: Multipart,
) -> Result<Json<&'static str>, ApiError> {
    let bad_request = |reason: String| ApiError::BadRequest { reason };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let is_srt = field
            .file_name()
            .is_some_and(|name| Path::new(name).extension().is_some_and(|ext| ext == "srt"));
        if !is_srt {
            return Err(bad_request("Not a subtitle".to_string()));
        }

        let contents = field
            .bytes()
            .await
            .map_err(|e| bad_request(e.to_string()))?;
        state.subtitles.save_subtitle(&query.path, &contents).await?;
        return Ok(Json("OK"));
    }

    Err(bad_request(format!("Missing '{UPLOAD_FIELD}' field")))
}
