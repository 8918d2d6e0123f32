//! Subtitle file names that carry their own metadata.
//!
//! Fetched and uploaded subtitles live next to their video as
//! `<base>.<provider>.<lang>.<index>.srt`, where `<base>` is the video's file
//! name. The file name is the only record of where a subtitle came from.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SubtitleError;

static SUBTITLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+)\.(?P<provider>osdb|subdb|user)\.(?P<lang>[A-Za-z]+)\.(?P<index>0|[1-9][0-9]*)\.srt$")
        .unwrap_or_else(|e| unreachable!("subtitle name pattern is valid: {e}"))
});

/// Origin of a subtitle file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderTag {
    /// OpenSubtitles
    Osdb,
    /// SubDB
    Subdb,
    /// Uploaded through the API
    User,
}

impl ProviderTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::Osdb => "osdb",
            ProviderTag::Subdb => "subdb",
            ProviderTag::User => "user",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag {
    type Err = SubtitleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "osdb" => Ok(ProviderTag::Osdb),
            "subdb" => Ok(ProviderTag::Subdb),
            "user" => Ok(ProviderTag::User),
            other => Err(SubtitleError::InvalidName {
                reason: format!("unknown provider '{other}'"),
            }),
        }
    }
}

/// Decoded `<base>.<provider>.<lang>.<index>.srt` file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubtitleName {
    pub base: String,
    pub provider: ProviderTag,
    pub language: String,
    pub index: u32,
}

impl SubtitleName {
    /// Validated constructor.
    ///
    /// # Errors
    ///
    /// - `SubtitleError::InvalidName` - Empty base, base containing a path
    ///   separator, or a language that is not purely ASCII letters
    pub fn new(
        base: impl Into<String>,
        provider: ProviderTag,
        language: impl Into<String>,
        index: u32,
    ) -> Result<Self, SubtitleError> {
        let base = base.into();
        let language = language.into();

        if base.is_empty() || base.contains(['/', '\\']) {
            return Err(SubtitleError::InvalidName {
                reason: format!("base '{base}' must be a plain file name"),
            });
        }
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SubtitleError::InvalidName {
                reason: format!("language '{language}' must be ASCII letters"),
            });
        }

        Ok(Self {
            base,
            provider,
            language,
            index,
        })
    }

    /// File name form of this record.
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}.{}.srt",
            self.base, self.provider, self.language, self.index
        )
    }

    /// Parses a bare file name. Anything that does not match the whole
    /// pattern, including indices that overflow, yields `None`.
    pub fn decode(file_name: &str) -> Option<Self> {
        let captures = SUBTITLE_NAME.captures(file_name)?;
        Some(Self {
            base: captures["base"].to_string(),
            provider: captures["provider"].parse().ok()?,
            language: captures["lang"].to_string(),
            index: captures["index"].parse().ok()?,
        })
    }

    /// Decodes the file name component of `path`.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()?.to_str().and_then(Self::decode)
    }

    /// Track label used as `srclang`: `<lang>-<provider>-<index>`.
    pub fn track_label(&self) -> String {
        format!("{}-{}-{}", self.language, self.provider, self.index)
    }
}

impl fmt::Display for SubtitleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Reduces a provider language name to the `[A-Za-z]+` token used in file
/// names, e.g. `Portuguese (BR)` becomes `PortugueseBR`.
pub fn language_token(language: &str) -> String {
    let token: String = language
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect();
    if token.is_empty() {
        "Unknown".to_string()
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_encode_matches_layout() {
        let name = SubtitleName::new("movie.mp4", ProviderTag::Osdb, "English", 2).unwrap();
        assert_eq!(name.encode(), "movie.mp4.osdb.English.2.srt");
        assert_eq!(name.track_label(), "English-osdb-2");
    }

    #[test]
    fn test_decode_user_upload() {
        let name = SubtitleName::decode("Some.Show.S01E01.mkv.user.User.0.srt").unwrap();
        assert_eq!(name.base, "Some.Show.S01E01.mkv");
        assert_eq!(name.provider, ProviderTag::User);
        assert_eq!(name.language, "User");
        assert_eq!(name.index, 0);
    }

    #[test]
    fn test_decode_rejects_partial_matches() {
        for candidate in [
            "movie.srt",
            "movie.en.srt",
            "movie.osdb.English.srt",
            "movie.osdb.English.1.srt.bak",
            "movie.other.English.1.srt",
            "movie.osdb.Eng1ish.1.srt",
            "movie.osdb.English.-1.srt",
            "movie.osdb.English.007.srt",
            "movie.osdb.English.00.srt",
            ".osdb.English.1.srt",
            "movie.osdb.English.99999999999999999999.srt",
        ] {
            assert!(SubtitleName::decode(candidate).is_none(), "{candidate}");
        }
    }

    #[test]
    fn test_from_path_uses_file_name_only() {
        let path = Path::new("/media/osdb.dir/movie.mp4.subdb.en.0.srt");
        let name = SubtitleName::from_path(path).unwrap();
        assert_eq!(name.base, "movie.mp4");
        assert_eq!(name.provider, ProviderTag::Subdb);
    }

    #[test]
    fn test_constructor_validation() {
        assert!(SubtitleName::new("", ProviderTag::User, "User", 0).is_err());
        assert!(SubtitleName::new("dir/movie", ProviderTag::User, "User", 0).is_err());
        assert!(SubtitleName::new("movie", ProviderTag::User, "Portuguese (BR)", 0).is_err());
        assert!(SubtitleName::new("movie", ProviderTag::User, "", 0).is_err());
    }

    #[test]
    fn test_language_token() {
        assert_eq!(language_token("Portuguese (BR)"), "PortugueseBR");
        assert_eq!(language_token("English"), "English");
        assert_eq!(language_token("中文"), "Unknown");
    }

    fn provider() -> impl Strategy<Value = ProviderTag> {
        prop_oneof![
            Just(ProviderTag::Osdb),
            Just(ProviderTag::Subdb),
            Just(ProviderTag::User),
        ]
    }

    proptest! {
        #[test]
        fn encode_decode_round_trip(
            base in "[A-Za-z0-9 ._()-]{1,40}",
            provider in provider(),
            language in "[A-Za-z]{1,12}",
            index in any::<u32>(),
        ) {
            let name = SubtitleName::new(base, provider, language, index).unwrap();
            prop_assert_eq!(SubtitleName::decode(&name.encode()), Some(name));
        }

        #[test]
        fn arbitrary_srt_names_decode_exactly_or_not_at_all(text in ".*\\.srt") {
            let reencoded = SubtitleName::decode(&text).map(|name| name.encode());
            prop_assert!(reencoded.is_none() || reencoded.as_deref() == Some(text.as_str()));
        }

        #[test]
        fn near_miss_names_decode_exactly_or_not_at_all(
            text in "[a-z.]{0,8}\\.(osdb|subdb|user|sub)\\.[A-Za-z0-9]{0,3}\\.[0-9]{1,3}\\.srt",
        ) {
            let reencoded = SubtitleName::decode(&text).map(|name| name.encode());
            prop_assert!(reencoded.is_none() || reencoded.as_deref() == Some(text.as_str()));
        }
    }
}
