//! Error mapping for the HTTP API.

use std::net::SocketAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use odin_core::{StreamingError, TorrentError};
use odin_subtitles::SubtitleError;
use serde_json::json;
use tracing::{error, warn};

/// Errors returned by request handlers.
///
/// Input problems become 4xx text, engine failures 500 text and missing
/// media a bare 404.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{reason}")]
    BadRequest { reason: String },

    #[error("Not found")]
    NotFound,

    #[error("{reason}")]
    Internal { reason: String },

    /// Subtitle file could not be read, reported as JSON.
    #[error("{reason}")]
    SubtitleUnavailable { reason: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { reason } => {
                warn!(%reason, "Rejected request");
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            ApiError::Internal { reason } => {
                error!(%reason, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, reason).into_response()
            }
            ApiError::SubtitleUnavailable { reason } => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": reason }))).into_response()
            }
        }
    }
}

impl From<TorrentError> for ApiError {
    fn from(err: TorrentError) -> Self {
        ApiError::Internal {
            reason: err.to_string(),
        }
    }
}

impl From<StreamingError> for ApiError {
    fn from(err: StreamingError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound
        } else {
            ApiError::Internal {
                reason: err.to_string(),
            }
        }
    }
}

impl From<SubtitleError> for ApiError {
    fn from(err: SubtitleError) -> Self {
        match err {
            SubtitleError::InvalidPath { .. } | SubtitleError::InvalidName { .. } => {
                ApiError::BadRequest {
                    reason: err.to_string(),
                }
            }
            other => ApiError::Internal {
                reason: format!("Error: {other}"),
            },
        }
    }
}

/// Errors that stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to start torrent engine: {0}")]
    Engine(#[from] TorrentError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server stopped unexpectedly: {0}")]
    Serve(#[source] std::io::Error),
}
