//! OpenSubtitles REST provider.

use std::path::Path;

use async_trait::async_trait;
use odin_core::config::OdinConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{SubtitleMatch, SubtitleProvider, SubtitleQuery, write_subtitle};
use crate::errors::SubtitleError;
use crate::languages::language_name;
use crate::naming::ProviderTag;

const USER_AGENT: &str = concat!("odin v", env!("CARGO_PKG_VERSION"));

/// Client for the OpenSubtitles `api/v1` REST API.
///
/// Searches by video file name. Logging in is optional for search but the
/// download quota of anonymous clients is tiny.
#[derive(Debug)]
pub struct OpenSubtitlesProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: String,
    attributes: SearchAttributes,
}

#[derive(Deserialize)]
struct SearchAttributes {
    language: Option<String>,
    release: Option<String>,
    #[serde(default)]
    files: Vec<SearchFile>,
}

#[derive(Deserialize)]
struct SearchFile {
    file_id: u64,
}

#[derive(Serialize)]
struct DownloadRequest {
    file_id: u64,
}

#[derive(Deserialize)]
struct DownloadResponse {
    link: String,
}

impl OpenSubtitlesProvider {
    /// Provider against the given API root, e.g. `https://api.opensubtitles.com/api/v1`.
    pub fn with_config(
        base_url: String,
        api_key: String,
        username: String,
        password: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            username,
            password,
            token: RwLock::new(None),
        }
    }

    pub fn from_config(config: &OdinConfig) -> Self {
        Self::with_config(
            config.os_base_url.clone(),
            config.os_api_key.clone(),
            config.os_username.clone(),
            config.os_password.clone(),
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("Api-Key", &self.api_key);
        if let Some(token) = self.token.read().as_deref() {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[async_trait]
impl SubtitleProvider for OpenSubtitlesProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Osdb
    }

    async fn authenticate(&self) -> Result<(), SubtitleError> {
        if self.username.is_empty() {
            debug!("No OpenSubtitles credentials, continuing anonymously");
            return Ok(());
        }

        let login_failed = |reason: String| SubtitleError::LoginFailed {
            provider: ProviderTag::Osdb.to_string(),
            reason,
        };

        let response = self
            .request(reqwest::Method::POST, "/login")
            .json(&LoginRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| login_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(login_failed(format!("server returned {status}")));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| login_failed(e.to_string()))?;
        *self.token.write() = Some(login.token);

        info!(user = %self.username, "Logged in to OpenSubtitles");
        Ok(())
    }

    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleMatch>, SubtitleError> {
        let search_failed = |reason: String| SubtitleError::SearchFailed {
            query: query.file_name.clone(),
            reason,
        };

        let languages = query.languages.join(",");
        let response = self
            .request(reqwest::Method::GET, "/subtitles")
            .query(&[
                ("query", query.file_name.as_str()),
                ("languages", languages.as_str()),
            ])
            .send()
            .await
            .map_err(|e| search_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(search_failed(format!("server returned {status}")));
        }

        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| search_failed(e.to_string()))?;

        let matches: Vec<SubtitleMatch> = results
            .data
            .into_iter()
            .filter_map(|entry| {
                let file = entry.attributes.files.first()?;
                let code = entry.attributes.language.unwrap_or_default();
                Some(SubtitleMatch {
                    id: entry.id,
                    download_ref: file.file_id.to_string(),
                    language_name: language_name(&code),
                    language_code: code,
                    release: entry.attributes.release,
                })
            })
            .collect();

        debug!(query = %query.file_name, results = matches.len(), "OpenSubtitles search finished");
        Ok(matches)
    }

    async fn download(
        &self,
        subtitle: &SubtitleMatch,
        destination: &Path,
    ) -> Result<(), SubtitleError> {
        let download_failed = |reason: String| SubtitleError::DownloadFailed {
            id: subtitle.id.clone(),
            reason,
        };

        let file_id: u64 = subtitle
            .download_ref
            .parse()
            .map_err(|_| download_failed(format!("bad file id '{}'", subtitle.download_ref)))?;

        let response = self
            .request(reqwest::Method::POST, "/download")
            .json(&DownloadRequest { file_id })
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(download_failed(format!("server returned {status}")));
        }
        let link: DownloadResponse = response
            .json()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        let file = self
            .client
            .get(&link.link)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| download_failed(e.to_string()))?;
        let bytes = file
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

    fn provider(server: &mockito::Server, username: &str) -> OpenSubtitlesProvider {
        OpenSubtitlesProvider::with_config(
            server.url(),
            "test-key".to_string(),
            username.to_string(),
            "secret".to_string(),
        )
    }

    fn query() -> SubtitleQuery {
        SubtitleQuery {
            file_name: "movie.mp4".to_string(),
            video_path: "/media/movie.mp4".into(),
            languages: vec!["en".to_string(), "es".to_string()],
        }
    }

    #[tokio::test]
    async fn test_login_stores_token_for_downloads() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .match_header("api-key", "test-key")
            .match_body(Matcher::Json(
                serde_json::json!({"username": "alice", "password": "secret"}),
            ))
            .with_status(200)
            .with_body(r#"{"token": "tok123", "status": 200}"#)
            .create_async()
            .await;
        let download = server
            .mock("POST", "/download")
            .match_header("authorization", "Bearer tok123")
            .with_status(200)
            .with_body(format!(r#"{{"link": "{}/files/abc.srt"}}"#, server.url()))
            .create_async()
            .await;
        let file = server
            .mock("GET", "/files/abc.srt")
            .with_status(200)
            .with_body("1\n00:00:01,000 --> 00:00:02,000\nHi\n")
            .create_async()
            .await;

        let provider = provider(&server, "alice");
        provider.authenticate().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("movie.mp4.osdb.English.0.srt");
        let subtitle = SubtitleMatch {
            id: "1".to_string(),
            download_ref: "42".to_string(),
            language_code: "en".to_string(),
            language_name: "English".to_string(),
            release: None,
        };
        provider.download(&subtitle, &destination).await.unwrap();

        login.assert_async().await;
        download.assert_async().await;
        file.assert_async().await;
        assert!(
            std::fs::read_to_string(&destination)
                .unwrap()
                .contains("Hi")
        );
    }

    #[tokio::test]
    async fn test_rejected_login() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(401)
            .create_async()
            .await;

        let result = provider(&server, "alice").authenticate().await;
        assert!(matches!(result, Err(SubtitleError::LoginFailed { .. })));
    }

    #[tokio::test]
    async fn test_anonymous_login_skips_request() {
        let server = mockito::Server::new_async().await;
        provider(&server, "").authenticate().await.unwrap();
    }

    #[tokio::test]
    async fn test_search_maps_results() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/subtitles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "movie.mp4".into()),
                Matcher::UrlEncoded("languages".into(), "en,es".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"data": [
                    {"id": "10", "attributes": {"language": "en", "release": "Movie.2020", "files": [{"file_id": 100}]}},
                    {"id": "11", "attributes": {"language": "es", "files": [{"file_id": 101}]}},
                    {"id": "12", "attributes": {"language": "en", "files": []}}
                ]}"#,
            )
            .create_async()
            .await;

        let matches = provider(&server, "").search(&query()).await.unwrap();

        search.assert_async().await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].language_name, "English");
        assert_eq!(matches[0].download_ref, "100");
        assert_eq!(matches[0].release.as_deref(), Some("Movie.2020"));
        assert_eq!(matches[1].language_name, "Spanish");
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/subtitles".to_string()))
            .with_status(503)
            .create_async()
            .await;

        let result = provider(&server, "").search(&query()).await;
        assert!(matches!(result, Err(SubtitleError::SearchFailed { .. })));
    }
}
