//! SubDB hash-based provider.
//!
//! SubDB identifies a video by the MD5 of its first and last 64 KiB and
//! returns plain text bodies instead of JSON.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use md5::{Digest, Md5};
use odin_core::config::OdinConfig;
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::{SubtitleMatch, SubtitleProvider, SubtitleQuery, write_subtitle};
use crate::errors::SubtitleError;
use crate::naming::ProviderTag;

/// Bytes hashed from each end of the video.
pub const HASH_CHUNK_SIZE: u64 = 64 * 1024;

const USER_AGENT: &str = concat!(
    "SubDB/1.0 (odin/",
    env!("CARGO_PKG_VERSION"),
    "; https://github.com/odin)"
);

#[derive(Debug)]
pub struct SubDbProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SubDbProvider {
    pub fn with_config(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &OdinConfig) -> Self {
        Self::with_config(config.subdb_base_url.clone())
    }

    fn request(&self, params: &[(&str, &str)]) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/", self.base_url))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(params)
    }
}

/// SubDB hash of a video file: MD5 over the first and last 64 KiB, hex
/// encoded. Files shorter than a chunk contribute their whole content twice.
///
/// # Errors
///
/// - `SubtitleError::Io` - File could not be opened or read
pub async fn subdb_hash(path: &Path) -> Result<String, SubtitleError> {
    let io_error = |source| SubtitleError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_error)?;
    let size = file.metadata().await.map_err(io_error)?.len();
    let chunk = size.min(HASH_CHUNK_SIZE);
    let mut buffer = vec![0u8; chunk as usize];

    let mut hasher = Md5::new();
    file.read_exact(&mut buffer).await.map_err(io_error)?;
    hasher.update(&buffer);

    file.seek(SeekFrom::Start(size - chunk))
        .await
        .map_err(io_error)?;
    file.read_exact(&mut buffer).await.map_err(io_error)?;
    hasher.update(&buffer);

    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl SubtitleProvider for SubDbProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Subdb
    }

    async fn authenticate(&self) -> Result<(), SubtitleError> {
        Ok(())
    }

    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleMatch>, SubtitleError> {
        let search_failed = |reason: String| SubtitleError::SearchFailed {
            query: query.video_path.display().to_string(),
            reason,
        };

        let hash = subdb_hash(&query.video_path)
            .await
            .map_err(|e| search_failed(e.to_string()))?;

        let response = self
            .request(&[("action", "search"), ("hash", hash.as_str())])
            .send()
            .await
            .map_err(|e| search_failed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(%hash, "SubDB has no subtitles for this hash");
                return Ok(Vec::new());
            }
            status if !status.is_success() => {
                return Err(search_failed(format!("server returned {status}")));
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| search_failed(e.to_string()))?;

        let wanted: Vec<String> = query
            .languages
            .iter()
            .map(|l| l.to_ascii_lowercase())
            .collect();

        let matches = body
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .filter(|code| wanted.is_empty() || wanted.contains(&code.to_ascii_lowercase()))
            .map(|code| SubtitleMatch {
                id: hash.clone(),
                download_ref: code.to_string(),
                language_code: code.to_string(),
                language_name: code.to_string(),
                release: None,
            })
            .collect();

        Ok(matches)
    }

    async fn download(
        &self,
        subtitle: &SubtitleMatch,
        destination: &Path,
    ) -> Result<(), SubtitleError> {
        let download_failed = |reason: String| SubtitleError::DownloadFailed {
            id: format!("{}:{}", subtitle.id, subtitle.download_ref),
            reason,
        };

        let bytes = self
            .request(&[
                ("action", "download"),
                ("hash", subtitle.id.as_str()),
                ("language", subtitle.download_ref.as_str()),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| download_failed(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        write_subtitle(destination, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn video(dir: &Path, len: usize) -> std::path::PathBuf {
        let path = dir.join("movie.mkv");
        let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn expected_hash(content: &[u8]) -> String {
        let chunk = content.len().min(HASH_CHUNK_SIZE as usize);
        let mut hasher = Md5::new();
        hasher.update(&content[..chunk]);
        hasher.update(&content[content.len() - chunk..]);
        hex::encode(hasher.finalize())
    }

    #[tokio::test]
    async fn test_hash_uses_both_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 200_000);
        let content = std::fs::read(&path).unwrap();

        assert_eq!(subdb_hash(&path).await.unwrap(), expected_hash(&content));
    }

    #[tokio::test]
    async fn test_hash_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 1000);
        let content = std::fs::read(&path).unwrap();

        assert_eq!(subdb_hash(&path).await.unwrap(), expected_hash(&content));
    }

    #[tokio::test]
    async fn test_search_filters_languages() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 5000);
        let hash = subdb_hash(&path).await.unwrap();

        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "search".into()),
                Matcher::UrlEncoded("hash".into(), hash.clone()),
            ]))
            .match_header("user-agent", Matcher::Regex("^SubDB/1.0".to_string()))
            .with_status(200)
            .with_body("en,fr,es")
            .create_async()
            .await;

        let provider = SubDbProvider::with_config(server.url());
        let query = SubtitleQuery {
            file_name: "movie.mkv".to_string(),
            video_path: path,
            languages: vec!["en".to_string(), "es".to_string()],
        };
        let matches = provider.search(&query).await.unwrap();

        search.assert_async().await;
        let languages: Vec<_> = matches.iter().map(|m| m.language_name.as_str()).collect();
        assert_eq!(languages, vec!["en", "es"]);
        assert!(matches.iter().all(|m| m.id == hash));
    }

    #[tokio::test]
    async fn test_search_not_found_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = video(dir.path(), 5000);

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let provider = SubDbProvider::with_config(server.url());
        let query = SubtitleQuery {
            file_name: "movie.mkv".to_string(),
            video_path: path,
            languages: vec!["en".to_string()],
        };
        assert!(provider.search(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "download".into()),
                Matcher::UrlEncoded("hash".into(), "abc".into()),
                Matcher::UrlEncoded("language".into(), "en".into()),
            ]))
            .with_status(200)
            .with_body("1\n00:00:01,000 --> 00:00:02,000\nHello\n")
            .create_async()
            .await;

        let provider = SubDbProvider::with_config(server.url());
        let subtitle = SubtitleMatch {
            id: "abc".to_string(),
            download_ref: "en".to_string(),
            language_code: "en".to_string(),
            language_name: "en".to_string(),
            release: None,
        };
        let destination = dir.path().join("movie.mkv.subdb.en.0.srt");
        provider.download(&subtitle, &destination).await.unwrap();

        assert!(
            std::fs::read_to_string(destination)
                .unwrap()
                .contains("Hello")
        );
    }
}
