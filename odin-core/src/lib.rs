//! Odin Core - torrent lifecycle and progressive streaming
//!
//! Turns magnet links and `.torrent` URLs into playable, progressively
//! downloading media assets and serves them, or plain files from disk, to
//! HTTP range-request clients.

pub mod config;
pub mod engine;
pub mod streaming;
pub mod torrent;
pub mod tracing_setup;

pub use config::{ConfigError, OdinConfig};
pub use engine::{EngineTorrent, RqbitEngine, TorrentEngine};
pub use streaming::{StreamingError, StreamingService};
pub use torrent::{InfoHash, TorrentError, TorrentInfo, TorrentManager, VideoFile};

/// Core errors that can bubble up from any Odin subsystem.
#[derive(Debug, thiserror::Error)]
pub enum OdinError {
    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OdinError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            OdinError::Torrent(e) => match e {
                TorrentError::Metadata { reason } => format!("Invalid torrent file: {reason}"),
                TorrentError::Fetch { url, .. } => format!("Could not download {url}"),
                TorrentError::EngineAdd { reason } => format!("Torrent rejected: {reason}"),
                TorrentError::MetadataTimeout { .. } => {
                    "No peers delivered the torrent metadata in time".to_string()
                }
                TorrentError::Cancelled => "Download cancelled".to_string(),
                _ => "Download error occurred".to_string(),
            },
            OdinError::Streaming(e) if e.is_not_found() => "Media not found".to_string(),
            OdinError::Streaming(_) => "Streaming error occurred".to_string(),
            OdinError::Config(e) => format!("Configuration error: {e}"),
            OdinError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            OdinError::Config(_)
                | OdinError::Torrent(
                    TorrentError::Metadata { .. }
                        | TorrentError::InvalidInfoHash { .. }
                        | TorrentError::InvalidMagnet { .. }
                        | TorrentError::EngineAdd { .. }
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, OdinError>;
