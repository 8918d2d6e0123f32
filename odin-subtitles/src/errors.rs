//! Error types for subtitle discovery and storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while finding, fetching or saving subtitles.
#[derive(Debug, Error)]
pub enum SubtitleError {
    /// Provider rejected the credentials or the login request failed.
    #[error("Login to {provider} failed: {reason}")]
    LoginFailed {
        /// Provider tag
        provider: String,
        /// The reason for the failure
        reason: String,
    },

    /// Search request failed for the given file name.
    #[error("Search failed for '{query}': {reason}")]
    SearchFailed {
        /// The file name searched for
        query: String,
        /// The reason for the failure
        reason: String,
    },

    /// Subtitle file could not be downloaded or written.
    #[error("Download of subtitle {id} failed: {reason}")]
    DownloadFailed {
        /// Provider-specific subtitle identifier
        id: String,
        /// The reason for the failure
        reason: String,
    },

    /// Relative path escapes the download directory or is otherwise unusable.
    #[error("Invalid subtitle path '{path}': {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// File name fields cannot be encoded as a subtitle name.
    #[error("Invalid subtitle name: {reason}")]
    InvalidName {
        /// Which field was rejected
        reason: String,
    },

    /// Filesystem error while reading or writing subtitles.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
