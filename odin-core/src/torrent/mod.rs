//! Torrent identity, metadata parsing and lifecycle management.

pub mod fetcher;
pub mod manager;
pub mod parsing;
pub mod resolver;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use fetcher::RemoteFileFetcher;
pub use manager::{ManagedTorrent, TorrentManager};
pub use parsing::{BencodeTorrentParser, MagnetLink, TorrentMetadata};
pub use resolver::SelectionPolicy;
use data_encoding::BASE32;
use serde::{Serialize, Serializer};

/// SHA-1 hash identifying a torrent's info dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40 character hex string, case-insensitively.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - Wrong length or non-hex characters
    pub fn from_hex(value: &str) -> Result<Self, TorrentError> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(value.trim(), &mut bytes).map_err(|e| {
            TorrentError::InvalidInfoHash {
                value: value.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self(bytes))
    }

    /// Parses the 32 character RFC 4648 base32 form some magnet links use.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidInfoHash` - Wrong length or characters outside the alphabet
    pub fn from_base32(value: &str) -> Result<Self, TorrentError> {
        let invalid = |reason: &str| TorrentError::InvalidInfoHash {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if value.len() != 32 {
            return Err(invalid("base32 info hash must be 32 characters"));
        }

        let decoded = BASE32
            .decode(value.to_ascii_uppercase().as_bytes())
            .map_err(|e| invalid(&e.to_string()))?;
        let bytes: [u8; 20] = decoded
            .try_into()
            .map_err(|_| invalid("base32 info hash must decode to 20 bytes"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The file of a torrent chosen for playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFile {
    /// Index of the file inside the torrent
    pub index: usize,
    /// Path relative to the download directory, `/` separated
    pub path: String,
    pub length: u64,
    /// Byte offset of the file within the concatenated torrent payload
    pub offset: u64,
}

/// Snapshot of a managed torrent, recomputed on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentInfo {
    pub name: String,
    pub completed: u64,
    pub total: u64,
    pub info_hash: InfoHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_file: Option<VideoFile>,
}

/// Errors that can occur while resolving, adding or reading torrents.
#[derive(Debug, thiserror::Error)]
pub enum TorrentError {
    #[error("Failed to parse torrent metadata: {reason}")]
    Metadata { reason: String },

    #[error("Invalid info hash '{value}': {reason}")]
    InvalidInfoHash { value: String, reason: String },

    #[error("Invalid magnet link: {reason}")]
    InvalidMagnet { reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Engine rejected torrent: {reason}")]
    EngineAdd { reason: String },

    #[error("Engine error: {reason}")]
    Engine { reason: String },

    #[error("Timed out after {waited:?} waiting for metadata of {info_hash}")]
    MetadataTimeout {
        info_hash: String,
        waited: Duration,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("File {index} not found in torrent {info_hash}")]
    FileNotFound { info_hash: InfoHash, index: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
