//! Progressive media streaming over HTTP ranges.
//!
//! Torrent-backed and disk-backed assets share the same range semantics
//! through [`serve_content`]; only the byte source differs.

pub mod content;
pub mod range;
pub mod service;

use std::path::PathBuf;

pub use content::serve_content;
pub use range::{ByteRange, RangeSpec};
pub use service::StreamingService;

use crate::torrent::{InfoHash, TorrentError};

/// Errors raised while preparing a streaming response.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("Torrent {info_hash} has no playable video file")]
    NoVideoFile { info_hash: InfoHash },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build response: {reason}")]
    Response { reason: String },
}

impl StreamingError {
    /// Whether the requested asset does not exist or cannot be resolved.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StreamingError::NoVideoFile { .. }
                | StreamingError::FileNotFound { .. }
                | StreamingError::Torrent(TorrentError::FileNotFound { .. })
        )
    }
}
