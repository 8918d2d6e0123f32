//! Scriptable provider for tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{SubtitleMatch, SubtitleProvider, SubtitleQuery, write_subtitle};
use crate::errors::SubtitleError;
use crate::naming::ProviderTag;

/// Subtitle body written by every successful mock download.
pub const MOCK_SUBTITLE: &str = "1\n00:00:01,000 --> 00:00:02,000\nMock subtitle\n";

/// In-memory provider returning scripted search results.
#[derive(Debug)]
pub struct MockSubtitleProvider {
    tag: ProviderTag,
    results: Vec<SubtitleMatch>,
    fail_login: bool,
    fail_search: bool,
    failing_downloads: Vec<String>,
    download_delay: Option<Duration>,
    login_calls: AtomicUsize,
    search_calls: AtomicUsize,
    downloads: Mutex<Vec<String>>,
}

impl Default for MockSubtitleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSubtitleProvider {
    pub fn new() -> Self {
        Self {
            tag: ProviderTag::Osdb,
            results: Vec::new(),
            fail_login: false,
            fail_search: false,
            failing_downloads: Vec::new(),
            download_delay: None,
            login_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tag(mut self, tag: ProviderTag) -> Self {
        self.tag = tag;
        self
    }

    /// Appends `count` results in `language`, ids `<language>-<n>`.
    pub fn with_language(mut self, language: &str, count: usize) -> Self {
        for n in 0..count {
            self.results.push(SubtitleMatch {
                id: format!("{language}-{n}"),
                download_ref: format!("{language}-{n}"),
                language_code: language.to_ascii_lowercase(),
                language_name: language.to_string(),
                release: None,
            });
        }
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_download(mut self, id: &str) -> Self {
        self.failing_downloads.push(id.to_string());
        self
    }

    /// Sleeps before every download.
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Ids downloaded successfully, in order.
    pub fn downloaded(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }
}

#[async_trait]
impl SubtitleProvider for MockSubtitleProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn authenticate(&self) -> Result<(), SubtitleError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_login {
            return Err(SubtitleError::LoginFailed {
                provider: self.tag.to_string(),
                reason: "mock login failure".to_string(),
            });
        }
        Ok(())
    }

    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleMatch>, SubtitleError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search {
            return Err(SubtitleError::SearchFailed {
                query: query.file_name.clone(),
                reason: "mock search failure".to_string(),
            });
        }
        Ok(self.results.clone())
    }

    async fn download(
        &self,
        subtitle: &SubtitleMatch,
        destination: &Path,
    ) -> Result<(), SubtitleError> {
        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_downloads.contains(&subtitle.id) {
            return Err(SubtitleError::DownloadFailed {
                id: subtitle.id.clone(),
                reason: "mock download failure".to_string(),
            });
        }
        write_subtitle(destination, MOCK_SUBTITLE.as_bytes()).await?;
        self.downloads.lock().push(subtitle.id.clone());
        Ok(())
    }
}
