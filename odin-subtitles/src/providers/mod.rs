//! Remote subtitle providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use odin_core::config::{OdinConfig, SubtitleBackend};

use crate::errors::SubtitleError;
use crate::naming::ProviderTag;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod opensubtitles;
pub mod subdb;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockSubtitleProvider;
pub use opensubtitles::OpenSubtitlesProvider;
pub use subdb::SubDbProvider;

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleQuery {
    /// Video file name, used for name-based search
    pub file_name: String,
    /// Absolute video path, used for hash-based search
    pub video_path: PathBuf,
    /// Requested language codes
    pub languages: Vec<String>,
}

/// One subtitle offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleMatch {
    /// Provider-specific identifier of the subtitle
    pub id: String,
    /// Whatever the provider needs to download it again
    pub download_ref: String,
    pub language_code: String,
    /// Human readable language, groups results and names files
    pub language_name: String,
    pub release: Option<String>,
}

/// Trait for remote subtitle providers.
///
/// Implementations are selected through configuration. Failures are reported
/// to the pipeline, which logs them and degrades to fewer results.
#[async_trait]
pub trait SubtitleProvider: Send + Sync + std::fmt::Debug {
    /// Tag written into downloaded file names.
    fn tag(&self) -> ProviderTag;

    /// Establishes a session if the provider needs one.
    ///
    /// # Errors
    /// - `SubtitleError::LoginFailed` - Credentials rejected or login request failed
    async fn authenticate(&self) -> Result<(), SubtitleError>;

    /// Searches subtitles for a video.
    ///
    /// # Errors
    /// - `SubtitleError::SearchFailed` - Request failed or response unreadable
    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleMatch>, SubtitleError>;

    /// Downloads one subtitle to `destination`.
    ///
    /// # Errors
    /// - `SubtitleError::DownloadFailed` - Request failed
    /// - `SubtitleError::Io` - File could not be written
    async fn download(
        &self,
        subtitle: &SubtitleMatch,
        destination: &Path,
    ) -> Result<(), SubtitleError>;
}

/// Provider selected by `subtitle_provider`, `None` when disabled.
pub fn provider_from_config(config: &OdinConfig) -> Option<Arc<dyn SubtitleProvider>> {
    match config.subtitle_provider {
        SubtitleBackend::Osdb => Some(Arc::new(OpenSubtitlesProvider::from_config(config))),
        SubtitleBackend::Subdb => Some(Arc::new(SubDbProvider::from_config(config))),
        SubtitleBackend::None => None,
    }
}

/// Writes downloaded subtitle bytes to `destination`.
pub(crate) async fn write_subtitle(destination: &Path, bytes: &[u8]) -> Result<(), SubtitleError> {
    tokio::fs::write(destination, bytes)
        .await
        .map_err(|source| SubtitleError::Io {
            path: destination.to_path_buf(),
            source,
        })
}
