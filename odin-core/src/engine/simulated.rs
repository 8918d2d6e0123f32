//! In-memory engine for tests.
//!
//! Torrents are scripted up front by info hash. Unknown magnets are accepted
//! but never receive metadata, which is how timeout and cancellation paths
//! get exercised.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{EngineFile, EngineTorrent, MediaReader, ReaderOptions, TorrentEngine};
use crate::torrent::{InfoHash, MagnetLink, TorrentError};

/// Scripted torrent served by [`SimulatedEngine`].
pub struct SimulatedTorrent {
    info_hash: InfoHash,
    name: String,
    files: Vec<(String, Vec<u8>)>,
    completed: AtomicU64,
    metadata: watch::Sender<bool>,
    downloading_all: AtomicBool,
    prioritized: Mutex<Option<usize>>,
    reader_options: Mutex<Vec<ReaderOptions>>,
}

impl SimulatedTorrent {
    /// Creates a torrent whose metadata is available immediately.
    pub fn new(info_hash: InfoHash, name: impl Into<String>) -> Self {
        let (metadata, _) = watch::channel(true);
        Self {
            info_hash,
            name: name.into(),
            files: Vec::new(),
            completed: AtomicU64::new(0),
            metadata,
            downloading_all: AtomicBool::new(false),
            prioritized: Mutex::new(None),
            reader_options: Mutex::new(Vec::new()),
        }
    }

    /// Appends a file with the given content.
    pub fn with_file(mut self, path: impl Into<String>, content: Vec<u8>) -> Self {
        self.files.push((path.into(), content));
        self
    }

    /// Sets the completed byte count reported before any clamping.
    pub fn with_completed(self, bytes: u64) -> Self {
        self.completed.store(bytes, Ordering::SeqCst);
        self
    }

    /// Holds metadata back until [`SimulatedTorrent::release_metadata`].
    pub fn with_pending_metadata(self) -> Self {
        self.metadata.send_replace(false);
        self
    }

    pub fn release_metadata(&self) {
        self.metadata.send_replace(true);
    }

    fn has_metadata(&self) -> bool {
        *self.metadata.borrow()
    }

    pub fn is_downloading_all(&self) -> bool {
        self.downloading_all.load(Ordering::SeqCst)
    }

    pub fn prioritized_file(&self) -> Option<usize> {
        *self.prioritized.lock()
    }

    /// Options of every reader opened so far.
    pub fn reader_options(&self) -> Vec<ReaderOptions> {
        self.reader_options.lock().clone()
    }

    fn content(&self, file_index: usize) -> Result<&[u8], TorrentError> {
        self.files
            .get(file_index)
            .map(|(_, content)| content.as_slice())
            .ok_or_else(|| TorrentError::FileNotFound {
                info_hash: self.info_hash,
                index: file_index,
            })
    }
}

#[async_trait]
impl EngineTorrent for SimulatedTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn name(&self) -> Option<String> {
        self.has_metadata().then(|| self.name.clone())
    }

    async fn wait_for_metadata(&self) -> Result<(), TorrentError> {
        let mut receiver = self.metadata.subscribe();
        receiver
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| TorrentError::Engine {
                reason: "simulated torrent dropped".to_string(),
            })
    }

    fn files(&self) -> Vec<EngineFile> {
        if !self.has_metadata() {
            return Vec::new();
        }
        let mut offset = 0;
        self.files
            .iter()
            .enumerate()
            .map(|(index, (path, content))| {
                let file = EngineFile {
                    index,
                    path: path.clone(),
                    length: content.len() as u64,
                    offset,
                };
                offset += file.length;
                file
            })
            .collect()
    }

    async fn download_all(&self) -> Result<(), TorrentError> {
        self.downloading_all.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn prioritize_file(&self, file_index: usize) -> Result<(), TorrentError> {
        self.content(file_index)?;
        *self.prioritized.lock() = Some(file_index);
        Ok(())
    }

    fn bytes_completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn total_length(&self) -> u64 {
        if !self.has_metadata() {
            return 0;
        }
        self.files
            .iter()
            .map(|(_, content)| content.len() as u64)
            .sum()
    }

    async fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn MediaReader>, TorrentError> {
        let content = self.content(file_index)?.to_vec();
        self.reader_options.lock().push(options);
        Ok(Box::new(Cursor::new(content)))
    }
}

/// Engine that serves [`SimulatedTorrent`]s registered ahead of time.
#[derive(Default)]
pub struct SimulatedEngine {
    torrents: Mutex<HashMap<InfoHash, Arc<SimulatedTorrent>>>,
    added: Mutex<Vec<String>>,
    shut_down: AtomicBool,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a torrent, returning the shared handle for later inspection.
    pub fn register(&self, torrent: SimulatedTorrent) -> Arc<SimulatedTorrent> {
        let torrent = Arc::new(torrent);
        self.torrents
            .lock()
            .insert(torrent.info_hash, Arc::clone(&torrent));
        torrent
    }

    pub fn torrent(&self, info_hash: &InfoHash) -> Option<Arc<SimulatedTorrent>> {
        self.torrents.lock().get(info_hash).cloned()
    }

    /// Magnet URIs passed to `add_magnet`, in call order.
    pub fn added_magnets(&self) -> Vec<String> {
        self.added.lock().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TorrentEngine for SimulatedEngine {
    async fn add_magnet(&self, magnet: &str) -> Result<Arc<dyn EngineTorrent>, TorrentError> {
        let link = MagnetLink::parse(magnet).map_err(|e| TorrentError::EngineAdd {
            reason: e.to_string(),
        })?;
        self.added.lock().push(magnet.to_string());

        let torrent = self
            .torrents
            .lock()
            .entry(link.info_hash)
            .or_insert_with(|| {
                let name = link.display_name.clone().unwrap_or_default();
                Arc::new(SimulatedTorrent::new(link.info_hash, name).with_pending_metadata())
            })
            .clone();
        Ok(torrent)
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
