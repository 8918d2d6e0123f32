//! Video file selection within a torrent's file list.

use crate::config::VideoSelection;
use crate::engine::EngineFile;

/// Extensions treated as playable video by [`SelectionPolicy::LargestVideo`].
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "webm", "mov", "avi", "wmv", "flv", "mpg", "mpeg", "ts", "ogv",
];

/// Rule deciding which file of a torrent is streamed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Last file in torrent order whose path ends with the given suffix.
    LastWithExtension(String),
    /// Largest file with a known video extension, lowest index on ties.
    #[default]
    LargestVideo,
}

impl From<VideoSelection> for SelectionPolicy {
    fn from(selection: VideoSelection) -> Self {
        match selection {
            VideoSelection::Largest => Self::LargestVideo,
            VideoSelection::LastMp4 => Self::LastWithExtension("mp4".to_string()),
        }
    }
}

impl SelectionPolicy {
    /// Picks the file to stream, `None` when nothing qualifies.
    pub fn select<'a>(&self, files: &'a [EngineFile]) -> Option<&'a EngineFile> {
        match self {
            Self::LastWithExtension(suffix) => {
                files.iter().rev().find(|file| file.path.ends_with(suffix.as_str()))
            }
            Self::LargestVideo => files
                .iter()
                .filter(|file| has_video_extension(&file.path))
                // max_by_key keeps the last maximum, so compare in reverse
                .rev()
                .max_by_key(|file| file.length),
        }
    }
}

fn has_video_extension(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(index: usize, path: &str, length: u64) -> EngineFile {
        EngineFile {
            index,
            path: path.to_string(),
            length,
            offset: 0,
        }
    }

    #[test]
    fn test_last_mp4_picks_last_match() {
        let files = vec![
            file(0, "a.mp4", 500),
            file(1, "notes.txt", 10),
            file(2, "b.mp4", 100),
            file(3, "c.srt", 1),
        ];
        let policy = SelectionPolicy::from(VideoSelection::LastMp4);
        assert_eq!(policy.select(&files).map(|f| f.index), Some(2));
    }

    #[test]
    fn test_last_mp4_without_match() {
        let files = vec![file(0, "movie.mkv", 500), file(1, "readme.txt", 10)];
        let policy = SelectionPolicy::LastWithExtension("mp4".to_string());
        assert!(policy.select(&files).is_none());
        assert!(policy.select(&[]).is_none());
    }

    #[test]
    fn test_largest_video_ignores_non_video() {
        let files = vec![
            file(0, "sample.mp4", 100),
            file(1, "big.iso", 10_000),
            file(2, "Feature.MKV", 900),
        ];
        let selected = SelectionPolicy::LargestVideo.select(&files).unwrap();
        assert_eq!(selected.index, 2);
    }

    #[test]
    fn test_largest_video_ties_pick_lowest_index() {
        let files = vec![
            file(0, "extra.txt", 700),
            file(1, "part1.mp4", 700),
            file(2, "part2.mp4", 700),
        ];
        let selected = SelectionPolicy::default().select(&files).unwrap();
        assert_eq!(selected.index, 1);
    }
}
