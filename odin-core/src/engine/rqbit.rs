//! librqbit-backed engine used in production.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions,
};
use parking_lot::Mutex;
use tokio::io::BufReader;
use tracing::{debug, info};

use super::{EngineFile, EngineTorrent, MediaReader, ReaderOptions, TorrentEngine};
use crate::torrent::{InfoHash, TorrentError};

/// Bounds for the read buffer placed in front of librqbit file streams.
const MIN_READAHEAD: u64 = 64 * 1024;
const MAX_READAHEAD: u64 = 32 * 1024 * 1024;

/// One librqbit session writing torrent data below the download directory.
pub struct RqbitEngine {
    session: Arc<Session>,
}

impl RqbitEngine {
    /// Starts a session with DHT enabled and no port forwarding.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Io` - Download directory cannot be created
    /// - `TorrentError::Engine` - Session failed to start
    pub async fn new(download_dir: PathBuf) -> Result<Self, TorrentError> {
        tokio::fs::create_dir_all(&download_dir).await?;

        let options = SessionOptions {
            disable_dht: false,
            disable_dht_persistence: true,
            enable_upnp_port_forwarding: false,
            ..Default::default()
        };

        let session = Session::new_with_opts(download_dir.clone(), options)
            .await
            .map_err(|e| TorrentError::Engine {
                reason: format!("failed to start session: {e}"),
            })?;

        info!(download_dir = %download_dir.display(), "Torrent session started");
        Ok(Self { session })
    }
}

#[async_trait]
impl TorrentEngine for RqbitEngine {
    async fn add_magnet(&self, magnet: &str) -> Result<Arc<dyn EngineTorrent>, TorrentError> {
        let options = AddTorrentOptions {
            overwrite: true,
            ..Default::default()
        };

        let response = self
            .session
            .add_torrent(AddTorrent::from_url(magnet), Some(options))
            .await
            .map_err(|e| TorrentError::EngineAdd {
                reason: e.to_string(),
            })?;

        let handle = match response {
            AddTorrentResponse::Added(_, handle) => handle,
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                debug!("Torrent already managed by session");
                handle
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(TorrentError::EngineAdd {
                    reason: "session returned a list-only response".to_string(),
                });
            }
        };

        Ok(Arc::new(RqbitTorrent {
            session: self.session.clone(),
            handle,
            primed: PrimedStream::default(),
        }))
    }

    async fn shutdown(&self) {
        self.session.stop().await;
        info!("Torrent session stopped");
    }
}

/// Handle to one torrent inside the librqbit session.
struct RqbitTorrent {
    session: Arc<Session>,
    handle: Arc<ManagedTorrent>,
    primed: PrimedStream,
}

/// Stream parked at the start of the prioritized file until a player
/// opens its own reader.
#[derive(Default)]
struct PrimedStream(Mutex<Option<Box<dyn MediaReader>>>);

impl PrimedStream {
    fn park(&self, stream: Box<dyn MediaReader>) {
        *self.0.lock() = Some(stream);
    }

    /// Drops the parked stream. Returns whether one was parked.
    fn release(&self) -> bool {
        self.0.lock().take().is_some()
    }
}

impl RqbitTorrent {
    fn file_count(&self) -> usize {
        self.handle
            .with_metadata(|meta| meta.file_infos.len())
            .unwrap_or(0)
    }

    fn check_index(&self, file_index: usize) -> Result<(), TorrentError> {
        if file_index < self.file_count() {
            Ok(())
        } else {
            Err(TorrentError::FileNotFound {
                info_hash: self.info_hash(),
                index: file_index,
            })
        }
    }
}

#[async_trait]
impl EngineTorrent for RqbitTorrent {
    fn info_hash(&self) -> InfoHash {
        InfoHash::new(self.handle.info_hash().0)
    }

    fn name(&self) -> Option<String> {
        self.handle.name()
    }

    async fn wait_for_metadata(&self) -> Result<(), TorrentError> {
        self.handle
            .wait_until_initialized()
            .await
            .map_err(|e| TorrentError::Engine {
                reason: e.to_string(),
            })
    }

    /// Paths are relative to the download directory. Multi-file torrents are
    /// stored under a folder named after the torrent.
    fn files(&self) -> Vec<EngineFile> {
        let folder = self.handle.name();
        self.handle
            .with_metadata(|meta| {
                let multi_file = meta.file_infos.len() > 1;
                meta.file_infos
                    .iter()
                    .enumerate()
                    .map(|(index, file)| {
                        let relative = file
                            .relative_filename
                            .to_string_lossy()
                            .replace('\\', "/");
                        let path = match &folder {
                            Some(folder) if multi_file => format!("{folder}/{relative}"),
                            _ => relative,
                        };
                        EngineFile {
                            index,
                            path,
                            length: file.len,
                            offset: file.offset_in_torrent,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn download_all(&self) -> Result<(), TorrentError> {
        let all: HashSet<usize> = (0..self.file_count()).collect();
        self.session
            .update_only_files(&self.handle, &all)
            .await
            .map_err(|e| TorrentError::Engine {
                reason: e.to_string(),
            })
    }

    async fn prioritize_file(&self, file_index: usize) -> Result<(), TorrentError> {
        self.check_index(file_index)?;
        // librqbit prioritizes pieces ahead of every live stream position
        let stream = self
            .handle
            .clone()
            .stream(file_index)
            .map_err(|e| TorrentError::Engine {
                reason: e.to_string(),
            })?;
        self.primed.park(Box::new(Box::pin(stream)));
        Ok(())
    }

    fn bytes_completed(&self) -> u64 {
        self.handle.stats().progress_bytes
    }

    fn total_length(&self) -> u64 {
        self.handle.stats().total_bytes
    }

    async fn open_reader(
        &self,
        file_index: usize,
        options: ReaderOptions,
    ) -> Result<Box<dyn MediaReader>, TorrentError> {
        self.check_index(file_index)?;
        let stream = self
            .handle
            .clone()
            .stream(file_index)
            .map_err(|e| TorrentError::Engine {
                reason: e.to_string(),
            })?;

        // The player's reader now drives piece priority from its own position
        if self.primed.release() {
            debug!(file_index, "Released primed stream");
        }

        // Streams are always responsive in librqbit, readahead maps to buffering
        let capacity = options.readahead.clamp(MIN_READAHEAD, MAX_READAHEAD) as usize;
        debug!(
            file_index,
            readahead = capacity,
            responsive = options.responsive,
            "Opened torrent file reader"
        );
        Ok(Box::new(BufReader::with_capacity(capacity, Box::pin(stream))))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_primed_stream_released_once() {
        let primed = PrimedStream::default();
        assert!(!primed.release());

        primed.park(Box::new(Cursor::new(vec![0u8; 16])));
        assert!(primed.release());
        assert!(!primed.release());
    }

    #[test]
    fn test_primed_stream_replaced_on_repark() {
        let primed = PrimedStream::default();
        primed.park(Box::new(Cursor::new(vec![1u8; 4])));
        primed.park(Box::new(Cursor::new(vec![2u8; 4])));

        assert!(primed.release());
        assert!(!primed.release());
    }
}
