//! Range requests through `/stream` for disk and torrent assets.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use crate::fixtures::{HASH, TestApp, body_bytes, magnet, payload};

fn ranged(uri: &str, range: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::RANGE, range)
        .body(Body::empty())
        .unwrap()
}

fn write_video(app: &TestApp, len: usize) -> String {
    let path = app.download_dir.path().join("clip.mp4");
    std::fs::write(&path, payload(len)).unwrap();
    urlencoded(&path.to_string_lossy())
}

fn urlencoded(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            other => format!("%{other:02X}"),
        })
        .collect()
}

#[tokio::test]
async fn test_disk_file_partial_range() {
    let app = TestApp::new();
    let path = write_video(&app, 1000);

    let response = app
        .send(ranged(&format!("/stream?path={path}"), "bytes=100-199"))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");

    let body = body_bytes(response).await;
    assert_eq!(body, payload(1000)[100..200].to_vec());
}

#[tokio::test]
async fn test_disk_file_without_range() {
    let app = TestApp::new();
    let path = write_video(&app, 300);

    let response = app.get(&format!("/stream?path={path}")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_bytes(response).await.len(), 300);
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let app = TestApp::new();
    let path = write_video(&app, 1000);

    let response = app
        .send(ranged(&format!("/stream?path={path}"), "bytes=5000-"))
        .await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
}

#[tokio::test]
async fn test_torrent_suffix_range_reads_selected_file() {
    let app = TestApp::new();
    let torrent = app.register_sample(2000);
    app.manager.download(&magnet(HASH)).await.unwrap();

    let response = app
        .send(ranged(&format!("/stream?infoHash={HASH}"), "bytes=-500"))
        .await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 1500-1999/2000");
    assert_eq!(body_bytes(response).await, payload(2000)[1500..].to_vec());

    let options = torrent.reader_options();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].readahead, 20);
    assert!(options[0].responsive);
}

#[tokio::test]
async fn test_torrent_stream_uppercase_hash() {
    let app = TestApp::new();
    app.register_sample(64);
    app.manager.download(&magnet(HASH)).await.unwrap();

    let response = app
        .get(&format!("/stream?infoHash={}", HASH.to_uppercase()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, payload(64));
}

#[tokio::test]
async fn test_missing_assets_are_404() {
    let app = TestApp::new();
    let missing = urlencoded(&app.download_dir.path().join("nope.mp4").to_string_lossy());
    let directory = urlencoded(&app.download_dir.path().to_string_lossy());

    for uri in [
        format!("/stream?infoHash={HASH}"),
        "/stream?infoHash=zzz".to_string(),
        format!("/stream?path={missing}"),
        format!("/stream?path={directory}"),
        "/stream".to_string(),
    ] {
        let response = app.get(&uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}
