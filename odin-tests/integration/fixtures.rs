//! Shared builders for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use odin_core::engine::{SimulatedEngine, SimulatedTorrent};
use odin_core::{InfoHash, TorrentManager};
use odin_subtitles::{MockSubtitleProvider, SubtitleProvider, SubtitleService};
use odin_web::{AppState, router};
use sha1::{Digest, Sha1};
use tempfile::TempDir;
use tower::ServiceExt;

pub const HASH: &str = "0123456789abcdef0123456789abcdef01234567";
pub const PORT: u16 = 8000;

pub fn magnet(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{hash}&dn=sample")
}

/// Deterministic payload so byte ranges can be checked by value.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Router wired to a simulated engine and a mock subtitle provider.
pub struct TestApp {
    pub engine: Arc<SimulatedEngine>,
    pub manager: Arc<TorrentManager>,
    pub provider: Arc<MockSubtitleProvider>,
    pub download_dir: TempDir,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_provider(MockSubtitleProvider::new())
    }

    pub fn with_provider(provider: MockSubtitleProvider) -> Self {
        let engine = Arc::new(SimulatedEngine::new());
        let manager = Arc::new(TorrentManager::new(engine.clone()));
        let provider = Arc::new(provider);
        let download_dir = TempDir::new().unwrap();

        let subtitles = SubtitleService::new(
            Some(provider.clone() as Arc<dyn SubtitleProvider>),
            vec!["en".to_string(), "es".to_string()],
            download_dir.path().to_path_buf(),
        );
        let state = AppState::new(manager.clone(), subtitles, PORT);

        Self {
            engine,
            manager,
            provider,
            download_dir,
            router: router(state),
        }
    }

    /// Registers the standard sample torrent with one video file.
    pub fn register_sample(&self, video_len: usize) -> Arc<SimulatedTorrent> {
        self.engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(HASH).unwrap(), "sample")
                .with_file("sample/notes.txt", vec![b'n'; 16])
                .with_file("sample/movie.mp4", payload(video_len)),
        )
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Single-file `.torrent` plus the raw bytes of its info dictionary.
pub struct TorrentFixture {
    pub bytes: Vec<u8>,
    pub info: Vec<u8>,
}

impl TorrentFixture {
    pub fn single_file(name: &str, length: u64) -> Self {
        let mut info = Vec::new();
        info.extend_from_slice(format!("d6:lengthi{length}e").as_bytes());
        info.extend_from_slice(format!("4:name{}:{name}", name.len()).as_bytes());
        info.extend_from_slice(b"12:piece lengthi16384e");
        info.extend_from_slice(b"6:pieces20:");
        info.extend_from_slice(&[0xaa; 20]);
        info.push(b'e');

        let announce = "http://tracker.example/announce";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(format!("d8:announce{}:{announce}", announce.len()).as_bytes());
        bytes.extend_from_slice(b"4:info");
        bytes.extend_from_slice(&info);
        bytes.push(b'e');

        Self { bytes, info }
    }

    /// SHA-1 of the bencoded info dictionary.
    pub fn info_hash(&self) -> InfoHash {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&Sha1::digest(&self.info));
        InfoHash::new(hash)
    }
}
