//! Torrent manager flows across fetcher, parser, resolver and engine.

use std::time::Duration;

use odin_core::InfoHash;
use odin_core::engine::SimulatedTorrent;
use odin_core::torrent::MagnetLink;

use crate::fixtures::{HASH, TestApp, TorrentFixture, magnet, payload};

#[tokio::test]
async fn test_torrent_url_resolves_to_info_dict_hash() {
    let fixture = TorrentFixture::single_file("clip.mp4", 4096);
    let expected = fixture.info_hash();

    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/files/clip.torrent")
        .with_status(200)
        .with_header("content-type", "application/x-bittorrent")
        .with_body(fixture.bytes.clone())
        .create_async()
        .await;

    let app = TestApp::new();
    let torrent = app.engine.register(
        SimulatedTorrent::new(expected, "clip.mp4").with_file("clip.mp4", payload(4096)),
    );

    let url = format!("{}/files/clip.torrent", server.url());
    let info = app.manager.download(&url).await.unwrap();

    assert_eq!(info.info_hash, expected);
    assert_eq!(info.video_file.unwrap().path, "clip.mp4");
    assert!(torrent.is_downloading_all());

    let added = app.engine.added_magnets();
    assert_eq!(added.len(), 1);
    let link = MagnetLink::parse(&added[0]).unwrap();
    assert_eq!(link.info_hash, expected);
    assert_eq!(link.display_name.as_deref(), Some("clip.mp4"));
    assert_eq!(link.trackers, vec!["http://tracker.example/announce"]);
}

#[tokio::test]
async fn test_torrent_url_with_garbage_body_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/bad.torrent")
        .with_status(200)
        .with_body("<html>not a torrent</html>")
        .create_async()
        .await;

    let app = TestApp::new();
    let result = app
        .manager
        .download(&format!("{}/bad.torrent", server.url()))
        .await;

    assert!(result.is_err());
    assert!(app.engine.added_magnets().is_empty());
    assert!(app.manager.torrents().is_empty());
}

#[tokio::test]
async fn test_magnet_hash_case_insensitive() {
    let app = TestApp::new();
    app.register_sample(256);

    let info = app
        .manager
        .download(&magnet(&HASH.to_uppercase()))
        .await
        .unwrap();

    assert_eq!(info.info_hash, InfoHash::from_hex(HASH).unwrap());
    assert_eq!(info.info_hash.to_string(), HASH);
}

#[tokio::test]
async fn test_repeated_download_reuses_entry() {
    let app = TestApp::new();
    app.register_sample(256);

    app.manager.download(&magnet(HASH)).await.unwrap();
    app.manager.download(&magnet(HASH)).await.unwrap();

    assert_eq!(app.manager.torrents().len(), 1);
}

#[tokio::test]
async fn test_listings_never_report_more_than_total() {
    let app = TestApp::new();
    let hashes = [
        "1111111111111111111111111111111111111111",
        "2222222222222222222222222222222222222222",
        "3333333333333333333333333333333333333333",
    ];
    for (i, hash) in hashes.iter().enumerate() {
        app.engine.register(
            SimulatedTorrent::new(InfoHash::from_hex(hash).unwrap(), format!("t{i}"))
                .with_file("movie.mp4", payload(100))
                // Engines can over-report while pieces are being verified
                .with_completed(50 + 50 * i as u64),
        );
        app.manager.download(&magnet(hash)).await.unwrap();
    }

    let listed = app.manager.torrents();
    assert_eq!(listed.len(), 3);
    for info in &listed {
        assert!(info.total > 0);
        assert!(info.completed <= info.total, "{info:?}");
        assert!(info.video_file.is_none());
    }
    let names: Vec<_> = listed.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["t0", "t1", "t2"]);
}

#[tokio::test(start_paused = true)]
async fn test_pending_metadata_listed_with_zero_total() {
    let app = TestApp::new();
    let manager = std::sync::Arc::new(
        odin_core::TorrentManager::new(app.engine.clone())
            .with_metadata_timeout(Some(Duration::from_secs(30))),
    );

    let download = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.download(&magnet(HASH)).await })
    };
    tokio::task::yield_now().await;

    let listed = manager.torrents();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].total, 0);
    assert_eq!(listed[0].completed, 0);

    let result = download.await.unwrap();
    assert!(matches!(
        result,
        Err(odin_core::TorrentError::MetadataTimeout { .. })
    ));
}

#[tokio::test]
async fn test_unknown_hash_lookup() {
    let app = TestApp::new();
    assert!(app.manager.torrent_from_hash(HASH).is_none());
    assert!(app.manager.torrent_from_hash("").is_none());

    app.register_sample(64);
    app.manager.download(&magnet(HASH)).await.unwrap();

    assert!(app.manager.torrent_from_hash(HASH).is_some());
    assert!(
        app.manager
            .torrent_from_hash("ffffffffffffffffffffffffffffffffffffffff")
            .is_none()
    );
    assert!(app.manager.torrent_from_hash("not-a-hash").is_none());
}
