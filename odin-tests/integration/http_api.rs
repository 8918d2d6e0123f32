//! HTTP surface: torrents, watch and subtitle endpoints.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};

use crate::fixtures::{HASH, PORT, TestApp, body_bytes, body_json, magnet};

const BOUNDARY: &str = "odin-test-boundary";

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(path: &str, file_name: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::post(format!("/subtitles?path={path}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_list_starts_empty() {
    let app = TestApp::new();
    let response = app.get("/torrents").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_add_torrent_then_list() {
    let app = TestApp::new();
    app.register_sample(128);

    let body = serde_json::json!({ "url": magnet(HASH) }).to_string();
    let response = app.send(post_json("/torrents", &body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let added = body_json(response).await;
    assert_eq!(added["info_hash"], HASH);
    assert_eq!(added["name"], "sample");
    assert_eq!(added["total"], 144);
    assert_eq!(added["video_file"]["path"], "sample/movie.mp4");
    assert_eq!(added["video_file"]["index"], 1);

    let listed = body_json(app.get("/torrents").await).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["info_hash"], HASH);
    assert!(listed[0].get("video_file").is_none());
}

#[tokio::test]
async fn test_add_torrent_accepts_any_content_type() {
    let app = TestApp::new();
    app.register_sample(16);

    let request = Request::post("/torrents")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(r#"{{"url":"{}"}}"#, magnet(HASH))))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_add_torrent_malformed_json() {
    let app = TestApp::new();
    let response = app.send(post_json("/torrents", "{not json")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.engine.added_magnets().is_empty());
}

#[tokio::test]
async fn test_add_torrent_engine_rejection() {
    let app = TestApp::new();
    let response = app
        .send(post_json("/torrents", r#"{"url":"magnet:?xt=urn:btih:nothex"}"#))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_watch_torrent_returns_player() {
    let app = TestApp::new();
    app.register_sample(64);

    let response = app
        .get(&format!("/watch?url={}", magnet(HASH).replace('&', "%26")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["path"], "sample/movie.mp4");
    let html = json["html"].as_str().unwrap();
    assert!(html.contains(&format!(
        r#"src="http://localhost:{PORT}/stream?infoHash={HASH}""#
    )));
    assert!(html.contains(r#"type="video/webm""#));
}

#[tokio::test]
async fn test_watch_without_parameters() {
    let app = TestApp::new();

    assert_eq!(app.get("/watch").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.get("/watch?url=&path=").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_get_subtitles_converts_to_vtt() {
    let app = TestApp::new();
    let path = app.download_dir.path().join("movie.mp4.user.User.0.srt");
    std::fs::write(&path, "1\r\n00:00:01,500 --> 00:00:03,000\r\nHello\r\n").unwrap();

    let uri = format!(
        "/subtitles?path={}",
        path.to_string_lossy().replace('/', "%2F")
    );
    let response = app.get(&uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/vtt")
    );
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, "WEBVTT\n\n1\n00:00:01.500 --> 00:00:03.000\nHello\n");
}

#[tokio::test]
async fn test_get_missing_subtitle_is_json_error() {
    let app = TestApp::new();
    let response = app.get("/subtitles?path=%2Fno%2Fsuch%2Ffile.srt").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_upload_srt_saves_user_subtitle() {
    let app = TestApp::new();
    let response = app
        .send(upload("movie.mp4", "mine.srt", "1\n00:00:01,000 --> 00:00:02,000\nHi\n"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!("OK"));

    let saved = app.download_dir.path().join("movie.mp4.user.User.0.srt");
    assert!(std::fs::read_to_string(saved).unwrap().contains("Hi"));
}

#[tokio::test]
async fn test_upload_non_srt_rejected_without_write() {
    let app = TestApp::new();
    let response = app.send(upload("movie.mp4", "notes.txt", "hello")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body_bytes(response).await).unwrap(),
        "Not a subtitle"
    );
    let entries = std::fs::read_dir(app.download_dir.path()).unwrap().count();
    assert_eq!(entries, 0);
}

#[tokio::test]
async fn test_upload_escaping_path_rejected() {
    let app = TestApp::new();
    let response = app
        .send(upload("..%2Fescape.mp4", "mine.srt", "1\n"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_write_failure_is_500() {
    let app = TestApp::new();
    let response = app
        .send(upload("missing-dir%2Fmovie.mp4", "mine.srt", "1\n"))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
