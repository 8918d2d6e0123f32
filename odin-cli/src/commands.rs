//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use odin_core::OdinConfig;
use odin_core::torrent::{BencodeTorrentParser, RemoteFileFetcher, TorrentMetadata};
use odin_subtitles::SubtitleService;
use tracing::info;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory torrent data is written to
        #[arg(short, long)]
        download_dir: Option<PathBuf>,
    },
    /// Find or fetch subtitles for a video file
    Subtitles {
        /// Path to the video file
        path: PathBuf,
    },
    /// Print the magnet link for a `.torrent` file or URL
    Magnet {
        /// Local path or HTTP(S) URL of a `.torrent` file
        source: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands, config: OdinConfig) -> anyhow::Result<()> {
    match command {
        Commands::Server { port, download_dir } => {
            start_server(apply_server_flags(config, port, download_dir)).await
        }
        Commands::Subtitles { path } => find_subtitles(&config, &path).await,
        Commands::Magnet { source } => print_magnet(&source).await.map_err(|e| {
            if e.is_user_error() {
                anyhow::anyhow!(e.user_message())
            } else {
                anyhow::Error::from(e)
            }
        }),
    }
}

/// Command-line flags win over file and environment settings.
fn apply_server_flags(
    mut config: OdinConfig,
    port: Option<u16>,
    download_dir: Option<PathBuf>,
) -> OdinConfig {
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = download_dir {
        config.download_dir = dir;
    }
    config
}

async fn start_server(config: OdinConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.download_dir).with_context(|| {
        format!(
            "Cannot create download directory {}",
            config.download_dir.display()
        )
    })?;
    odin_web::run_server(config).await?;
    Ok(())
}

async fn find_subtitles(config: &OdinConfig, path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        anyhow::bail!("{} is not a file", path.display());
    }

    let subtitles = SubtitleService::from_config(config).find_subtitles(path).await;
    if subtitles.is_empty() {
        println!("No subtitles found for {}", path.display());
    }
    for subtitle in subtitles {
        println!("{}", subtitle.display());
    }
    Ok(())
}

async fn print_magnet(source: &str) -> odin_core::Result<()> {
    let parser = BencodeTorrentParser::new();
    let metadata = if source.starts_with("http://") || source.starts_with("https://") {
        let temp = RemoteFileFetcher::new().fetch(source).await?;
        parser.parse_torrent_file(&temp).await?
    } else {
        parser.parse_torrent_file(Path::new(source)).await?
    };

    print_metadata(&metadata);
    Ok(())
}

fn print_metadata(metadata: &TorrentMetadata) {
    info!(info_hash = %metadata.info_hash, name = %metadata.name, "Parsed torrent");
    println!("{}", metadata.magnet_uri());
    println!("  Name:   {}", metadata.name);
    println!("  Hash:   {}", metadata.info_hash);
    println!("  Size:   {} bytes in {} file(s)", metadata.total_length, metadata.files.len());
    println!(
        "  Pieces: {} x {} bytes",
        metadata.piece_count, metadata.piece_length
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = OdinConfig::default();
        let config = apply_server_flags(config, Some(9001), Some(PathBuf::from("/data")));

        assert_eq!(config.port, 9001);
        assert_eq!(config.download_dir, PathBuf::from("/data"));
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let config = apply_server_flags(OdinConfig::default(), None, None);
        assert_eq!(config, OdinConfig::default());
    }
}
