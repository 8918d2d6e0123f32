//! Player markup returned by `/watch`.
//!
//! Every URL points back at this server on `localhost`, so the markup only
//! works for a browser on the same machine.

use odin_core::InfoHash;
use odin_subtitles::SubtitleTrack;

const VIDEO_PLAYER_TEMPLATE: &str = include_str!("../templates/video_player.html");

/// Player streaming a managed torrent.
pub fn torrent_player(port: u16, info_hash: &InfoHash, tracks: &[SubtitleTrack]) -> String {
    let source = format!("http://localhost:{port}/stream?infoHash={info_hash}");
    render_player(&source, &subtitle_tags(port, tracks))
}

/// Player streaming a file from disk.
pub fn file_player(port: u16, path: &str, tracks: &[SubtitleTrack]) -> String {
    let source = format!(
        "http://localhost:{port}/stream?path={}",
        urlencoding::encode(path)
    );
    render_player(&source, &subtitle_tags(port, tracks))
}

/// One `<track>` element per subtitle, labelled `<lang>-<provider>-<index>`.
pub fn subtitle_tags(port: u16, tracks: &[SubtitleTrack]) -> String {
    tracks
        .iter()
        .map(|track| {
            let path = track.path.to_string_lossy();
            format!(
                r#"<track src="http://localhost:{port}/subtitles?path={}" kind="subtitles" srclang="{}" />"#,
                urlencoding::encode(&path),
                track.label
            )
        })
        .collect()
}

fn render_player(source: &str, tracks: &str) -> String {
    VIDEO_PLAYER_TEMPLATE
        .trim_end()
        .replace("{{ source }}", source)
        .replace("{{ tracks }}", tracks)
}
