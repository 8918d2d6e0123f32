//! Torrent lifecycle: reference resolution, engine add, metadata wait and
//! video selection.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    BencodeTorrentParser, InfoHash, RemoteFileFetcher, SelectionPolicy, TorrentError, TorrentInfo,
    VideoFile,
};
use crate::config::OdinConfig;
use crate::engine::{EngineTorrent, TorrentEngine};

/// Torrent tracked by the manager together with its video selection.
pub struct ManagedTorrent {
    handle: Arc<dyn EngineTorrent>,
    video_file: OnceLock<Option<VideoFile>>,
    sequence: u64,
}

impl ManagedTorrent {
    fn new(handle: Arc<dyn EngineTorrent>, sequence: u64) -> Self {
        Self {
            handle,
            video_file: OnceLock::new(),
            sequence,
        }
    }

    pub fn info_hash(&self) -> InfoHash {
        self.handle.info_hash()
    }

    /// Selected video file, `None` before selection or when nothing matched.
    pub fn video_file(&self) -> Option<&VideoFile> {
        self.video_file.get().and_then(Option::as_ref)
    }

    /// Engine handle for opening readers.
    pub fn engine_handle(&self) -> &Arc<dyn EngineTorrent> {
        &self.handle
    }

    /// Fresh snapshot. `completed` never exceeds a known `total`.
    pub fn info(&self, include_video: bool) -> TorrentInfo {
        let total = self.handle.total_length();
        let mut completed = self.handle.bytes_completed();
        if total > 0 {
            completed = completed.min(total);
        }

        TorrentInfo {
            name: self.handle.name().unwrap_or_default(),
            completed,
            total,
            info_hash: self.info_hash(),
            video_file: if include_video {
                self.video_file().cloned()
            } else {
                None
            },
        }
    }
}

impl std::fmt::Debug for ManagedTorrent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedTorrent")
            .field("info_hash", &self.info_hash())
            .field("video_file", &self.video_file())
            .finish()
    }
}

/// Owns the engine session and the set of torrents added through it.
pub struct TorrentManager {
    engine: Arc<dyn TorrentEngine>,
    fetcher: RemoteFileFetcher,
    parser: BencodeTorrentParser,
    policy: SelectionPolicy,
    metadata_timeout: Option<Duration>,
    torrents: RwLock<HashMap<InfoHash, Arc<ManagedTorrent>>>,
    next_sequence: AtomicU64,
}

impl TorrentManager {
    /// Manager with the default policy and a 10 minute metadata bound.
    pub fn new(engine: Arc<dyn TorrentEngine>) -> Self {
        Self {
            engine,
            fetcher: RemoteFileFetcher::new(),
            parser: BencodeTorrentParser::new(),
            policy: SelectionPolicy::default(),
            metadata_timeout: OdinConfig::default().metadata_timeout(),
            torrents: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Manager configured from `config`.
    pub fn from_config(engine: Arc<dyn TorrentEngine>, config: &OdinConfig) -> Self {
        Self::new(engine)
            .with_policy(config.selection_policy.into())
            .with_metadata_timeout(config.metadata_timeout())
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `None` waits for metadata indefinitely.
    pub fn with_metadata_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn with_fetcher(mut self, fetcher: RemoteFileFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Starts downloading a magnet link or a `.torrent` URL.
    ///
    /// # Errors
    ///
    /// See [`TorrentManager::download_with_cancel`].
    pub async fn download(&self, reference: &str) -> Result<TorrentInfo, TorrentError> {
        self.download_with_cancel(reference, CancellationToken::new())
            .await
    }

    /// Starts downloading and returns once the video file is selected and
    /// prioritized.
    ///
    /// References starting with `magnet` go straight to the engine. Anything
    /// else is fetched over HTTP as a `.torrent` file and converted to a
    /// magnet. The entry is listed from the moment the engine accepts it.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Fetch` - `.torrent` URL could not be downloaded
    /// - `TorrentError::Metadata` - Downloaded file is not a valid torrent
    /// - `TorrentError::EngineAdd` - Engine rejected the magnet
    /// - `TorrentError::MetadataTimeout` - Metadata did not arrive in time
    /// - `TorrentError::Cancelled` - `cancel` fired first
    pub async fn download_with_cancel(
        &self,
        reference: &str,
        cancel: CancellationToken,
    ) -> Result<TorrentInfo, TorrentError> {
        info!(reference, "Starting torrent download");
        let deadline = self
            .metadata_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout).map(|at| (at, timeout)));

        let magnet = self.resolve_magnet(reference).await?;
        let label = display_label(&magnet);

        let handle = bounded(&label, deadline, &cancel, self.engine.add_magnet(&magnet)).await?;
        let entry = self.register(handle);
        let info_hash = entry.info_hash();
        debug!(%info_hash, "Torrent registered, waiting for metadata");

        bounded(
            &info_hash.to_string(),
            deadline,
            &cancel,
            entry.handle.wait_for_metadata(),
        )
        .await?;
        info!(%info_hash, "Metadata received");

        entry.handle.download_all().await?;

        let selection = entry.video_file.get_or_init(|| {
            let files = entry.handle.files();
            self.policy.select(&files).map(|file| VideoFile {
                index: file.index,
                path: file.path.clone(),
                length: file.length,
                offset: file.offset,
            })
        });

        match selection {
            Some(video) => {
                entry.handle.prioritize_file(video.index).await?;
                info!(%info_hash, path = %video.path, length = video.length, "Video file selected");
            }
            None => warn!(%info_hash, policy = ?self.policy, "No video file matched"),
        }

        Ok(entry.info(true))
    }

    /// Snapshot of every managed torrent in the order they were added.
    pub fn torrents(&self) -> Vec<TorrentInfo> {
        let mut entries: Vec<Arc<ManagedTorrent>> =
            self.torrents.read().values().cloned().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries.iter().map(|entry| entry.info(false)).collect()
    }

    /// Looks up a torrent by hex info hash. Malformed hashes are not found.
    pub fn torrent_from_hash(&self, hash: &str) -> Option<Arc<ManagedTorrent>> {
        let info_hash = InfoHash::from_hex(hash).ok()?;
        self.torrents.read().get(&info_hash).cloned()
    }

    /// Stops the engine session.
    pub async fn shutdown(&self) {
        info!(torrents = self.torrents.read().len(), "Shutting down torrent manager");
        self.engine.shutdown().await;
    }

    async fn resolve_magnet(&self, reference: &str) -> Result<String, TorrentError> {
        if reference.starts_with("magnet") {
            return Ok(reference.to_string());
        }

        let torrent_path = self.fetcher.fetch(reference).await?;
        let metadata = self.parser.parse_torrent_file(&torrent_path).await?;
        debug!(
            info_hash = %metadata.info_hash,
            name = %metadata.name,
            files = metadata.files.len(),
            "Parsed remote torrent file"
        );
        Ok(metadata.magnet_uri())
    }

    fn register(&self, handle: Arc<dyn EngineTorrent>) -> Arc<ManagedTorrent> {
        let info_hash = handle.info_hash();
        let mut torrents = self.torrents.write();
        torrents
            .entry(info_hash)
            .or_insert_with(|| {
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                Arc::new(ManagedTorrent::new(handle, sequence))
            })
            .clone()
    }
}

/// Races `operation` against the shared metadata deadline and `cancel`.
async fn bounded<T>(
    label: &str,
    deadline: Option<(Instant, Duration)>,
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T, TorrentError>>,
) -> Result<T, TorrentError> {
    let timed = async {
        match deadline {
            Some((at, budget)) => tokio::time::timeout_at(at, operation)
                .await
                .map_err(|_| TorrentError::MetadataTimeout {
                    info_hash: label.to_string(),
                    waited: budget,
                })?,
            None => operation.await,
        }
    };

    tokio::select! {
        result = timed => result,
        () = cancel.cancelled() => {
            warn!(torrent = label, "Torrent download cancelled");
            Err(TorrentError::Cancelled)
        }
    }
}

fn display_label(magnet: &str) -> String {
    super::MagnetLink::parse(magnet)
        .map(|link| link.info_hash.to_string())
        .unwrap_or_else(|_| magnet.chars().take(60).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SimulatedEngine, SimulatedTorrent};

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn magnet(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{hash}&dn=sample")
    }

    fn fixture() -> (Arc<SimulatedEngine>, TorrentManager) {
        let engine = Arc::new(SimulatedEngine::new());
        let manager = TorrentManager::new(engine.clone());
        (engine, manager)
    }

    #[tokio::test]
    async fn test_magnet_download_selects_video() {
        let (engine, manager) = fixture();
        let torrent = engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "sample")
                .with_file("sample/readme.txt", vec![0; 10])
                .with_file("sample/movie.mp4", vec![0; 100]),
        );

        let info = manager.download(&magnet(HASH)).await.unwrap();

        assert_eq!(info.info_hash.to_string(), HASH);
        assert_eq!(info.name, "sample");
        assert_eq!(info.total, 110);
        let video = info.video_file.unwrap();
        assert_eq!(video.index, 1);
        assert_eq!(video.path, "sample/movie.mp4");
        assert_eq!(video.offset, 10);
        assert!(torrent.is_downloading_all());
        assert_eq!(torrent.prioritized_file(), Some(1));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_waits_without_deadline() {
        let engine = Arc::new(SimulatedEngine::new());
        engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "sample")
                .with_file("sample/movie.mp4", vec![0; 100]),
        );
        let config = OdinConfig {
            metadata_timeout_secs: u64::MAX,
            ..OdinConfig::default()
        };
        let manager = TorrentManager::from_config(engine.clone(), &config);

        let info = manager.download(&magnet(HASH)).await.unwrap();

        assert_eq!(info.video_file.unwrap().path, "sample/movie.mp4");
    }

    #[tokio::test]
    async fn test_uppercase_magnet_hash_matches() {
        let (engine, manager) = fixture();
        engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "sample")
                .with_file("movie.mp4", vec![1; 8]),
        );

        let info = manager
            .download(&magnet(&HASH.to_uppercase()))
            .await
            .unwrap();
        assert_eq!(info.info_hash.to_string(), HASH);
        assert!(manager.torrent_from_hash(&HASH.to_uppercase()).is_some());
    }

    #[tokio::test]
    async fn test_no_video_match_is_not_an_error() {
        let (engine, manager) = fixture();
        let torrent = engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "docs")
                .with_file("docs/a.pdf", vec![0; 4]),
        );

        let info = manager.download(&magnet(HASH)).await.unwrap();
        assert!(info.video_file.is_none());
        assert_eq!(torrent.prioritized_file(), None);
        assert!(manager.torrent_from_hash(HASH).unwrap().video_file().is_none());
    }

    #[tokio::test]
    async fn test_malformed_magnet_is_engine_add_error() {
        let (_, manager) = fixture();
        let result = manager.download("magnet:?dn=no-hash").await;
        assert!(matches!(result, Err(TorrentError::EngineAdd { .. })));
        assert!(manager.torrents().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_unknown_hash() {
        let (engine, manager) = fixture();
        assert!(manager.torrent_from_hash(HASH).is_none());
        assert!(manager.torrent_from_hash("").is_none());
        assert!(manager.torrent_from_hash("not-hex").is_none());

        engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "a")
                .with_file("a.mp4", vec![0; 4]),
        );
        manager.download(&magnet(HASH)).await.unwrap();
        assert!(manager.torrent_from_hash(HASH).is_some());
        assert!(
            manager
                .torrent_from_hash("ffffffffffffffffffffffffffffffffffffffff")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_listing_clamps_completed() {
        let (engine, manager) = fixture();
        engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "a")
                .with_file("a.mp4", vec![0; 50])
                .with_completed(80),
        );
        manager.download(&magnet(HASH)).await.unwrap();

        let listing = manager.torrents();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].total, 50);
        assert_eq!(listing[0].completed, 50);
        assert!(listing[0].video_file.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_timeout_keeps_entry_listed() {
        let (_, manager) = fixture();
        let manager = manager.with_metadata_timeout(Some(Duration::from_secs(5)));

        let result = manager.download(&magnet(HASH)).await;
        assert!(matches!(result, Err(TorrentError::MetadataTimeout { .. })));

        let listing = manager.torrents();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].total, 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_metadata_wait() {
        let (_, manager) = fixture();
        let manager = Arc::new(manager.with_metadata_timeout(None));
        let cancel = CancellationToken::new();

        let task = {
            let manager = Arc::clone(&manager);
            let cancel = cancel.clone();
            tokio::spawn(async move { manager.download_with_cancel(&magnet(HASH), cancel).await })
        };

        // Entry is visible while metadata is pending
        while manager.torrents().is_empty() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(TorrentError::Cancelled)));
    }

    #[tokio::test]
    async fn test_late_metadata_completes_download() {
        let (engine, manager) = fixture();
        let torrent = engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "late")
                .with_file("late.mp4", vec![0; 16])
                .with_pending_metadata(),
        );

        let release = tokio::spawn(async move {
            tokio::task::yield_now().await;
            torrent.release_metadata();
        });
        let info = manager.download(&magnet(HASH)).await.unwrap();
        release.await.unwrap();

        assert_eq!(info.total, 16);
        assert_eq!(info.video_file.unwrap().path, "late.mp4");
    }

    #[tokio::test]
    async fn test_shutdown_stops_engine() {
        let (engine, manager) = fixture();
        manager.shutdown().await;
        assert!(engine.is_shut_down());
    }
}
