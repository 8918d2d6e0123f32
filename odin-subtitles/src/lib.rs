//! Subtitle discovery, naming and conversion for Odin.
//!
//! Subtitles live next to the video they belong to. Their file names encode
//! the provider, language and index, see [`SubtitleName`]. The
//! [`SubtitleService`] finds local files first and falls back to the
//! configured remote [`SubtitleProvider`].

pub mod convert;
pub mod errors;
pub mod languages;
pub mod naming;
pub mod providers;
pub mod service;

pub use convert::srt_to_webvtt;
pub use errors::SubtitleError;
pub use languages::language_name;
pub use naming::{ProviderTag, SubtitleName, language_token};
#[cfg(any(test, feature = "test-utils"))]
pub use providers::MockSubtitleProvider;
pub use providers::{
    OpenSubtitlesProvider, SubDbProvider, SubtitleMatch, SubtitleProvider, SubtitleQuery,
    provider_from_config,
};
pub use service::{MAX_SUBS_PER_LANG, SubtitleService, SubtitleTrack};

/// Result type for subtitle operations.
pub type Result<T> = std::result::Result<T, SubtitleError>;
