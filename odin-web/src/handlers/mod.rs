//! HTTP request handlers organized by resource

pub mod stream;
pub mod subtitles;
pub mod torrents;
pub mod watch;

pub use stream::{StreamQuery, stream};
pub use subtitles::{SubtitlePathQuery, get_subtitles, upload_subtitle};
pub use torrents::{DownloadRequest, add_torrent, list_torrents};
pub use watch::{WatchQuery, WatchResponse, watch};

/// Treats empty query values like absent ones.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
