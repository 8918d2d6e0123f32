//! Router construction and server lifecycle.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use odin_core::{OdinConfig, RqbitEngine, StreamingService, TorrentManager};
use odin_subtitles::SubtitleService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::errors::ServerError;
use crate::handlers::{add_torrent, get_subtitles, list_torrents, stream, upload_subtitle, watch};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub torrents: Arc<TorrentManager>,
    pub subtitles: SubtitleService,
    pub streaming: StreamingService,
    /// Port advertised in player markup
    pub port: u16,
}

impl AppState {
    pub fn new(torrents: Arc<TorrentManager>, subtitles: SubtitleService, port: u16) -> Self {
        Self {
            torrents,
            subtitles,
            streaming: StreamingService::new(),
            port,
        }
    }
}

/// Builds the API router with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/torrents", get(list_torrents).post(add_torrent))
        .route("/watch", get(watch))
        .route("/stream", get(stream))
        .route("/subtitles", get(get_subtitles).post(upload_subtitle))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the torrent engine and serves the API until Ctrl+C.
///
/// The engine session is stopped after the listener shuts down.
///
/// # Errors
///
/// - `ServerError::Engine` - Torrent session could not be created
/// - `ServerError::Bind` - Port already in use or not permitted
/// - `ServerError::Serve` - Listener failed while serving
pub async fn run_server(config: OdinConfig) -> Result<(), ServerError> {
    let engine = Arc::new(RqbitEngine::new(config.download_dir.clone()).await?);
    let torrents = Arc::new(TorrentManager::from_config(engine, &config));
    let state = AppState::new(
        torrents.clone(),
        SubtitleService::from_config(&config),
        config.port,
    );

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(
        %addr,
        download_dir = %config.download_dir.display(),
        subtitle_provider = ?config.subtitle_provider,
        "Odin media server running"
    );

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    torrents.shutdown().await;
    served.map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
