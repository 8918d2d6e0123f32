//! Torrent engine abstraction.
//!
//! The engine owns the BitTorrent wire protocol: peers, DHT, piece
//! verification and on-disk layout. Odin only needs a narrow slice of it, so
//! the rest of the crate talks to these traits and never to a concrete
//! engine. Production uses [`RqbitEngine`]; tests drive the in-memory
//! [`SimulatedEngine`].

pub mod rqbit;
#[cfg(any(test, feature = "test-utils"))]
pub mod simulated;

use std::sync::Arc;

use async_trait::async_trait;
pub use rqbit::RqbitEngine;
#[cfg(any(test, feature = "test-utils"))]
pub use simulated::{SimulatedEngine, SimulatedTorrent};
use tokio::io::{AsyncRead, AsyncSeek};

use crate::torrent::{InfoHash, TorrentError};

/// A file inside a torrent as reported by the engine once metadata is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFile {
    pub index: usize,
    /// Path relative to the engine's output directory, `/` separated
    pub path: String,
    pub length: u64,
    /// Byte offset within the concatenated torrent payload
    pub offset: u64,
}

/// Tuning for a reader opened over a torrent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Bytes to buffer ahead of the read position
    pub readahead: u64,
    /// Reads re-prioritize the pieces under the read position
    pub responsive: bool,
}

/// Seekable byte source over one torrent file.
///
/// Reads block until the requested pieces are downloaded.
pub trait MediaReader: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T> MediaReader for T where T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized {}

/// Session-level engine operations.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Adds a torrent by magnet URI. Adding an already managed torrent
    /// returns a handle to the existing one.
    ///
    /// # Errors
    ///
    /// - `TorrentError::EngineAdd` - Magnet rejected by the engine
    async fn add_magnet(&self, magnet: &str) -> Result<Arc<dyn EngineTorrent>, TorrentError>;

    /// Stops the session and closes every torrent.
    async fn shutdown(&self);
}

/// Per-torrent engine operations.
#[async_trait]
pub trait EngineTorrent: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    /// Display name, `None` until metadata arrives for bare magnets.
    fn name(&self) -> Option<String>;

    /// Resolves once the engine holds the torrent's info dictionary.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Engine` - Torrent failed before metadata was available
    async fn wait_for_metadata(&self) -> Result<(), TorrentError>;

    /// Files in torrent order, empty before metadata.
    fn files(&self) -> Vec<EngineFile>;

    /// Marks every file for download.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Engine` - Engine refused the file selection
    async fn download_all(&self) -> Result<(), TorrentError>;

    /// Raises priority of the start of `file_index` to "now".
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileNotFound` - Index out of range
    /// - `TorrentError::Engine` - Engine refused the request
    async fn prioritize_file(&self, file_index: usize) -> Result<(), TorrentError>;

    fn bytes_completed(&self) -> u64;

    /// Total payload length, 0 before metadata.
    fn total_length(&self) -> u64;

    /// Opens a seekable reader over one file.
    ///
    /// # Errors
    ///
    /// - `TorrentError::FileNotFound` - Index out of range
    /// - `TorrentError::Engine` - Engine could not create the stream
    async fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn MediaReader>, TorrentError>;
}
