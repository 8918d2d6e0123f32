//! Subtitle pipeline: local discovery first, remote providers as fallback.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use odin_core::config::OdinConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::SubtitleError;
use crate::naming::{ProviderTag, SubtitleName, language_token};
use crate::providers::{SubtitleMatch, SubtitleProvider, SubtitleQuery, provider_from_config};

/// Highest index downloaded per language. Indices run `0..=MAX_SUBS_PER_LANG`,
/// so each language yields up to six files.
pub const MAX_SUBS_PER_LANG: usize = 5;

/// Language token given to uploaded subtitles.
const USER_LANGUAGE: &str = "User";

/// Playable subtitle next to a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub name: SubtitleName,
    /// `srclang` value, `<lang>-<provider>-<index>`
    pub label: String,
}

/// Finds, fetches and stores subtitles for media files.
///
/// Cheap to clone; the provider is shared.
#[derive(Debug, Clone)]
pub struct SubtitleService {
    provider: Option<Arc<dyn SubtitleProvider>>,
    languages: Vec<String>,
    download_dir: PathBuf,
    remote_timeout: Option<Duration>,
}

impl SubtitleService {
    /// Creates a service without a remote time limit.
    pub fn new(
        provider: Option<Arc<dyn SubtitleProvider>>,
        languages: Vec<String>,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            provider,
            languages,
            download_dir,
            remote_timeout: None,
        }
    }

    /// Bounds the remote phase of a lookup. `None` waits indefinitely.
    pub fn with_remote_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn from_config(config: &OdinConfig) -> Self {
        Self::new(
            provider_from_config(config),
            config.subtitle_languages().to_vec(),
            config.download_dir.clone(),
        )
        .with_remote_timeout(config.remote_timeout())
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Location on disk of a file stored relative to the download directory.
    pub fn resolve_video_path(&self, relative: &str) -> PathBuf {
        self.download_dir.join(relative)
    }

    /// Subtitle files for `video`, as absolute paths.
    ///
    /// Any `.srt` already in the video's directory wins and no provider is
    /// contacted. Otherwise the configured provider is asked and whatever it
    /// manages to write is returned. Provider failures only shrink the result.
    pub async fn find_subtitles(&self, video: &Path) -> Vec<PathBuf> {
        self.find_subtitles_with_cancel(video, CancellationToken::new())
            .await
    }

    /// Like [`find_subtitles`](Self::find_subtitles), stopping the remote
    /// phase when `cancel` fires. Paths written before that are kept.
    pub async fn find_subtitles_with_cancel(
        &self,
        video: &Path,
        cancel: CancellationToken,
    ) -> Vec<PathBuf> {
        let video = match std::path::absolute(video) {
            Ok(path) => path,
            Err(e) => {
                warn!(video = %video.display(), error = %e, "Cannot resolve video path");
                return Vec::new();
            }
        };

        let local = local_subtitles(&video).await;
        if !local.is_empty() {
            debug!(video = %video.display(), count = local.len(), "Using local subtitles");
            return local;
        }

        let Some(provider) = &self.provider else {
            debug!("No subtitle provider configured");
            return Vec::new();
        };

        let mut written = Vec::new();
        {
            let remote = self.fetch_remote(provider.as_ref(), &video, &mut written);
            let deadline = async {
                match self.remote_timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = remote => {}
                () = cancel.cancelled() => {
                    warn!(video = %video.display(), "Subtitle lookup cancelled");
                }
                () = deadline => {
                    warn!(video = %video.display(), "Subtitle lookup timed out");
                }
            }
        }

        info!(video = %video.display(), count = written.len(), "Subtitle lookup finished");
        written
    }

    async fn fetch_remote(
        &self,
        provider: &dyn SubtitleProvider,
        video: &Path,
        written: &mut Vec<PathBuf>,
    ) {
        let file_name = video.file_name().and_then(|n| n.to_str());
        let (Some(dir), Some(file_name)) = (video.parent(), file_name) else {
            warn!(video = %video.display(), "Video path has no usable file name");
            return;
        };

        if let Err(e) = provider.authenticate().await {
            warn!(provider = %provider.tag(), error = %e, "Subtitle provider login failed");
            return;
        }

        let query = SubtitleQuery {
            file_name: file_name.to_string(),
            video_path: video.to_path_buf(),
            languages: self.languages.clone(),
        };
        let results = match provider.search(&query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(provider = %provider.tag(), error = %e, "Subtitle search failed");
                return;
            }
        };

        for (token, group) in group_by_language(results) {
            for (index, subtitle) in group.iter().take(MAX_SUBS_PER_LANG + 1).enumerate() {
                let name = SubtitleName::new(file_name, provider.tag(), token.as_str(), index as u32);
                let name = match name {
                    Ok(name) => name,
                    Err(e) => {
                        warn!(error = %e, "Skipping subtitle with unusable name");
                        continue;
                    }
                };
                let destination = dir.join(name.encode());

                match provider.download(subtitle, &destination).await {
                    Ok(()) => {
                        debug!(path = %destination.display(), "Subtitle downloaded");
                        written.push(destination);
                    }
                    Err(e) => {
                        warn!(
                            id = %subtitle.id,
                            language = %subtitle.language_name,
                            error = %e,
                            "Subtitle download failed"
                        );
                    }
                }
            }
        }
    }

    /// Subtitles for `video` whose file names decode as [`SubtitleName`].
    /// Anything else in the directory is ignored.
    pub async fn subtitle_tracks(&self, video: &Path) -> Vec<SubtitleTrack> {
        self.find_subtitles(video)
            .await
            .into_iter()
            .filter_map(|path| {
                let name = SubtitleName::from_path(&path)?;
                let label = name.track_label();
                Some(SubtitleTrack { path, name, label })
            })
            .collect()
    }

    /// Stores an uploaded subtitle as `<download_dir>/<relative>.user.User.0.srt`.
    ///
    /// # Errors
    ///
    /// - `SubtitleError::InvalidPath` - Empty or absolute path, or one that
    ///   leaves the download directory
    /// - `SubtitleError::Io` - Write failed
    pub async fn save_subtitle(
        &self,
        relative: &str,
        contents: &[u8],
    ) -> Result<PathBuf, SubtitleError> {
        let invalid = |reason: &str| SubtitleError::InvalidPath {
            path: relative.to_string(),
            reason: reason.to_string(),
        };

        let path = Path::new(relative);
        if relative.is_empty() {
            return Err(invalid("path is empty"));
        }
        if path.is_absolute() {
            return Err(invalid("path must be relative to the download directory"));
        }
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid("path must not contain '..' or '.' components"));
        }

        let target = self.download_dir.join(path);
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid("path has no file name"))?;
        let name = SubtitleName::new(file_name, ProviderTag::User, USER_LANGUAGE, 0)
            .map_err(|e| invalid(&e.to_string()))?;
        let destination = target.with_file_name(name.encode());

        tokio::fs::write(&destination, contents)
            .await
            .map_err(|source| SubtitleError::Io {
                path: destination.clone(),
                source,
            })?;

        info!(path = %destination.display(), bytes = contents.len(), "Saved uploaded subtitle");
        Ok(destination)
    }
}

/// `.srt` files in the directory of `video`, sorted.
async fn local_subtitles(video: &Path) -> Vec<PathBuf> {
    let Some(dir) = video.parent() else {
        return Vec::new();
    };

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot scan for local subtitles");
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_srt = path.extension().is_some_and(|ext| ext == "srt");
                let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
                if is_srt && is_file {
                    found.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Local subtitle scan interrupted");
                break;
            }
        }
    }

    found.sort();
    found
}

/// Groups results by the language token used in file names, keeping
/// first-occurrence order of both languages and results. Names that reduce to
/// the same token share one index sequence.
fn group_by_language(results: Vec<SubtitleMatch>) -> Vec<(String, Vec<SubtitleMatch>)> {
    let mut groups: Vec<(String, Vec<SubtitleMatch>)> = Vec::new();
    for result in results {
        let token = language_token(&result.language_name);
        match groups.iter_mut().find(|(existing, _)| *existing == token) {
            Some((_, group)) => group.push(result),
            None => groups.push((token, vec![result])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;
    use crate::providers::MockSubtitleProvider;

    fn video_in(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("movie.mp4");
        std::fs::write(&path, b"video").unwrap();
        path
    }

    fn service(provider: Arc<MockSubtitleProvider>, dir: &TempDir) -> SubtitleService {
        SubtitleService::new(
            Some(provider as Arc<dyn SubtitleProvider>),
            vec!["en".to_string(), "es".to_string()],
            dir.path().to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_local_subtitles_skip_remote() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        std::fs::write(dir.path().join("b.srt"), "x").unwrap();
        std::fs::write(dir.path().join("a.srt"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let provider = Arc::new(MockSubtitleProvider::new().with_language("English", 2));
        let found = service(provider.clone(), &dir).find_subtitles(&video).await;

        assert_eq!(found, vec![dir.path().join("a.srt"), dir.path().join("b.srt")]);
        assert_eq!(provider.login_calls(), 0);
        assert_eq!(provider.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_caps_each_language() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let provider = Arc::new(
            MockSubtitleProvider::new()
                .with_language("English", 3)
                .with_language("Spanish", 7),
        );

        let found = service(provider.clone(), &dir).find_subtitles(&video).await;

        let mut per_language: HashMap<String, Vec<u32>> = HashMap::new();
        for path in &found {
            let name = SubtitleName::from_path(path).unwrap();
            assert_eq!(name.base, "movie.mp4");
            assert_eq!(name.provider, ProviderTag::Osdb);
            per_language.entry(name.language).or_default().push(name.index);
            assert!(path.exists());
        }
        assert_eq!(per_language["English"], vec![0, 1, 2]);
        assert_eq!(per_language["Spanish"], vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(found.len(), 9);
    }

    #[tokio::test]
    async fn test_languages_sharing_a_token_share_indices() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let provider = Arc::new(
            MockSubtitleProvider::new()
                .with_language("", 2)
                .with_language("日本語", 3),
        );

        let found = service(provider.clone(), &dir).find_subtitles(&video).await;

        let names: Vec<SubtitleName> = found
            .iter()
            .map(|p| SubtitleName::from_path(p).unwrap())
            .collect();
        assert!(names.iter().all(|n| n.language == "Unknown"));
        assert_eq!(
            names.iter().map(|n| n.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
        assert_eq!(provider.downloaded().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_download_keeps_group_position() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let provider = Arc::new(
            MockSubtitleProvider::new()
                .with_language("English", 3)
                .failing_download("English-1"),
        );

        let found = service(provider, &dir).find_subtitles(&video).await;
        let indices: Vec<u32> = found
            .iter()
            .map(|p| SubtitleName::from_path(p).unwrap().index)
            .collect();

        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_provider_failures_yield_empty() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);

        let login = Arc::new(
            MockSubtitleProvider::new()
                .with_language("English", 1)
                .failing_login(),
        );
        assert!(service(login.clone(), &dir).find_subtitles(&video).await.is_empty());
        assert_eq!(login.search_calls(), 0);

        let search = Arc::new(MockSubtitleProvider::new().failing_search());
        assert!(service(search, &dir).find_subtitles(&video).await.is_empty());
    }

    #[tokio::test]
    async fn test_no_provider() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let service = SubtitleService::new(None, vec![], dir.path().to_path_buf());

        assert!(service.find_subtitles(&video).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial_results() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let provider = Arc::new(
            MockSubtitleProvider::new()
                .with_language("English", 6)
                .with_download_delay(Duration::from_secs(10)),
        );

        let found = service(provider, &dir)
            .with_remote_timeout(Some(Duration::from_secs(25)))
            .find_subtitles(&video)
            .await;

        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        let provider = Arc::new(MockSubtitleProvider::new().with_language("English", 3));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let found = service(provider, &dir)
            .find_subtitles_with_cancel(&video, cancel)
            .await;

        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_tracks_drop_nonconforming_names() {
        let dir = TempDir::new().unwrap();
        let video = video_in(&dir);
        std::fs::write(dir.path().join("movie.mp4.osdb.English.0.srt"), "x").unwrap();
        std::fs::write(dir.path().join("movie.mp4.user.User.0.srt"), "x").unwrap();
        std::fs::write(dir.path().join("random.srt"), "x").unwrap();

        let provider = Arc::new(MockSubtitleProvider::new());
        let tracks = service(provider, &dir).subtitle_tracks(&video).await;
        let labels: Vec<_> = tracks.iter().map(|t| t.label.as_str()).collect();

        assert_eq!(labels, vec!["English-osdb-0", "User-user-0"]);
    }

    #[tokio::test]
    async fn test_save_subtitle() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Show")).unwrap();
        let service = SubtitleService::new(None, vec![], dir.path().to_path_buf());

        let saved = service
            .save_subtitle("Show/episode.mkv", b"1\n")
            .await
            .unwrap();

        assert_eq!(saved, dir.path().join("Show/episode.mkv.user.User.0.srt"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"1\n");
    }

    #[tokio::test]
    async fn test_save_subtitle_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let service = SubtitleService::new(None, vec![], dir.path().join("downloads"));

        for path in ["", "/etc/passwd", "../movie.mp4", "a/../../b.mp4", "./movie.mp4"] {
            let result = service.save_subtitle(path, b"x").await;
            assert!(
                matches!(result, Err(SubtitleError::InvalidPath { .. })),
                "{path}"
            );
        }
    }

    #[tokio::test]
    async fn test_save_subtitle_write_failure() {
        let dir = TempDir::new().unwrap();
        let service = SubtitleService::new(None, vec![], dir.path().join("missing"));

        let result = service.save_subtitle("movie.mp4", b"x").await;
        assert!(matches!(result, Err(SubtitleError::Io { .. })));
    }
}
