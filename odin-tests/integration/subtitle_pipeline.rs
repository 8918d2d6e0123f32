//! Subtitle discovery end to end: local scan, remote fallback, track markup.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use odin_subtitles::{
    MAX_SUBS_PER_LANG, MockSubtitleProvider, SubtitleName, SubtitleProvider, SubtitleService,
};
use tempfile::TempDir;

use crate::fixtures::{TestApp, body_json};

fn video(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("Movie.2020.mp4");
    std::fs::write(&path, b"not really a video").unwrap();
    path
}

#[tokio::test]
async fn test_local_srt_short_circuits_provider() {
    let dir = TempDir::new().unwrap();
    let video = video(&dir);
    std::fs::write(dir.path().join("Movie.2020.en.srt"), "1\n").unwrap();

    let provider = Arc::new(MockSubtitleProvider::new().with_language("English", 4));
    let service = SubtitleService::new(
        Some(provider.clone() as Arc<dyn SubtitleProvider>),
        vec!["en".to_string()],
        dir.path().to_path_buf(),
    );

    let found = service.find_subtitles(&video).await;

    assert_eq!(found, vec![dir.path().join("Movie.2020.en.srt")]);
    assert_eq!(provider.login_calls(), 0);
    assert_eq!(provider.search_calls(), 0);
    assert!(provider.downloaded().is_empty());
}

#[tokio::test]
async fn test_remote_fallback_writes_capped_groups() {
    let dir = TempDir::new().unwrap();
    let video = video(&dir);
    let provider = Arc::new(
        MockSubtitleProvider::new()
            .with_language("English", 3)
            .with_language("Spanish", 7),
    );
    let service = SubtitleService::new(
        Some(provider.clone() as Arc<dyn SubtitleProvider>),
        vec!["en".to_string(), "es".to_string()],
        dir.path().to_path_buf(),
    );

    let found = service.find_subtitles(&video).await;

    let mut indices: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for path in &found {
        assert!(path.is_absolute());
        assert!(path.exists());
        let name = SubtitleName::from_path(path).unwrap();
        assert_eq!(name.base, "Movie.2020.mp4");
        indices.entry(name.language).or_default().push(name.index);
    }
    assert_eq!(indices["English"], vec![0, 1, 2]);
    assert_eq!(
        indices["Spanish"],
        (0..=MAX_SUBS_PER_LANG as u32).collect::<Vec<_>>()
    );
    assert_eq!(provider.downloaded().len(), 9);

    // Second lookup finds the files written by the first one
    let again = service.find_subtitles(&video).await;
    assert_eq!(again.len(), 9);
    assert_eq!(provider.search_calls(), 1);
}

#[tokio::test]
async fn test_watch_path_lists_only_conforming_tracks() {
    let app = TestApp::new();
    let dir = app.download_dir.path();
    let video = dir.join("movie.mp4");
    std::fs::write(&video, b"video").unwrap();
    std::fs::write(dir.join("movie.mp4.osdb.English.0.srt"), "1\n").unwrap();
    std::fs::write(dir.join("movie.mp4.subdb.en.1.srt"), "1\n").unwrap();
    std::fs::write(dir.join("movie.en.srt"), "1\n").unwrap();
    std::fs::write(dir.join("movie.mp4.osdb.English.x.srt"), "1\n").unwrap();

    let video_param = video.to_string_lossy().replace('/', "%2F");
    let response = app.get(&format!("/watch?path={video_param}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let html = json["html"].as_str().unwrap();
    assert_eq!(json["path"], video.to_str().unwrap());
    assert_eq!(html.matches("<track ").count(), 2);
    assert!(html.contains(r#"srclang="English-osdb-0""#));
    assert!(html.contains(r#"srclang="en-subdb-1""#));
    assert!(!html.contains("movie.en.srt"));
    assert_eq!(app.provider.search_calls(), 0);
}
