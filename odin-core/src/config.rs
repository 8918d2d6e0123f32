//! Centralized configuration for Odin.
//!
//! Values are layered from lowest to highest precedence: built-in defaults,
//! the TOML config file, `ODIN_*` environment variables and finally CLI
//! flags (applied by the binary). The resulting config is read once at
//! startup and never mutated afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Remote subtitle backend used when no local subtitles exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleBackend {
    /// OpenSubtitles REST API
    #[default]
    Osdb,
    /// Hash-based SubDB API
    Subdb,
    /// Local scan only
    None,
}

impl std::str::FromStr for SubtitleBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "osdb" | "opensubtitles" => Ok(Self::Osdb),
            "subdb" => Ok(Self::Subdb),
            "none" | "off" => Ok(Self::None),
            other => Err(ConfigError::InvalidValue {
                key: "subtitle_provider".to_string(),
                reason: format!("unknown provider '{other}'"),
            }),
        }
    }
}

/// Which file of a multi-file torrent gets streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoSelection {
    /// Largest file with a known video extension
    #[default]
    Largest,
    /// Last file whose path ends in `mp4`, in torrent order
    LastMp4,
}

impl std::str::FromStr for VideoSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "largest" => Ok(Self::Largest),
            "last-mp4" | "last_mp4" => Ok(Self::LastMp4),
            other => Err(ConfigError::InvalidValue {
                key: "selection_policy".to_string(),
                reason: format!("unknown policy '{other}'"),
            }),
        }
    }
}

/// Central configuration for all Odin components.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OdinConfig {
    /// HTTP listen port, also embedded in generated player markup
    #[serde(deserialize_with = "port_from_str_or_int")]
    pub port: u16,
    /// Root directory for torrent data and uploaded subtitles
    pub download_dir: PathBuf,
    /// OpenSubtitles account
    pub os_username: String,
    pub os_password: String,
    /// OpenSubtitles REST API key
    pub os_api_key: String,
    /// Languages requested from OpenSubtitles
    pub os_langs: Vec<String>,
    /// Languages requested from SubDB
    pub subdb_langs: Vec<String>,
    pub subtitle_provider: SubtitleBackend,
    pub selection_policy: VideoSelection,
    /// Seconds to wait for torrent metadata, 0 or an unrepresentable deadline waits forever
    pub metadata_timeout_secs: u64,
    /// Seconds allowed for the remote subtitle sweep, 0 waits forever
    pub remote_timeout_secs: u64,
    pub logs_dir: PathBuf,
    /// Provider endpoints, overridable for staging servers and tests
    pub os_base_url: String,
    pub subdb_base_url: String,
}

impl Default for OdinConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            download_dir: PathBuf::from("downloads"),
            os_username: String::new(),
            os_password: String::new(),
            os_api_key: String::new(),
            os_langs: vec!["en".to_string(), "es".to_string()],
            subdb_langs: vec!["en".to_string(), "es".to_string()],
            subtitle_provider: SubtitleBackend::default(),
            selection_policy: VideoSelection::default(),
            metadata_timeout_secs: 600,
            remote_timeout_secs: 300,
            logs_dir: PathBuf::from("logs"),
            os_base_url: "https://api.opensubtitles.com/api/v1".to_string(),
            subdb_base_url: "http://api.thesubdb.com".to_string(),
        }
    }
}

impl OdinConfig {
    /// Loads defaults, then the config file, then `ODIN_*` environment overrides.
    ///
    /// With `path = None` the file is `./config.toml` and may be absent. An
    /// explicit path must exist.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` - Explicit file missing or unreadable
    /// - `ConfigError::Parse` - File is not valid TOML for this schema
    /// - `ConfigError::InvalidValue` - An environment override cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parses a TOML config file on top of the defaults.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` - File unreadable
    /// - `ConfigError::Parse` - Invalid TOML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `ODIN_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidValue` - Override present but malformed
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup("ODIN_PORT") {
            self.port = parse_port(&port)?;
        }
        if let Some(dir) = lookup("ODIN_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(username) = lookup("ODIN_OS_USERNAME") {
            self.os_username = username;
        }
        if let Some(password) = lookup("ODIN_OS_PASSWORD") {
            self.os_password = password;
        }
        if let Some(key) = lookup("ODIN_OS_API_KEY") {
            self.os_api_key = key;
        }
        if let Some(langs) = lookup("ODIN_OS_LANGS") {
            self.os_langs = split_list(&langs);
        }
        if let Some(langs) = lookup("ODIN_SUBDB_LANGS") {
            self.subdb_langs = split_list(&langs);
        }
        if let Some(provider) = lookup("ODIN_SUBTITLE_PROVIDER") {
            self.subtitle_provider = provider.parse()?;
        }
        if let Some(policy) = lookup("ODIN_SELECTION_POLICY") {
            self.selection_policy = policy.parse()?;
        }
        if let Some(secs) = lookup("ODIN_METADATA_TIMEOUT") {
            self.metadata_timeout_secs = parse_secs("ODIN_METADATA_TIMEOUT", &secs)?;
        }
        if let Some(secs) = lookup("ODIN_REMOTE_TIMEOUT") {
            self.remote_timeout_secs = parse_secs("ODIN_REMOTE_TIMEOUT", &secs)?;
        }
        Ok(())
    }

    /// Metadata wait bound, `None` when disabled.
    pub fn metadata_timeout(&self) -> Option<Duration> {
        bound(self.metadata_timeout_secs)
    }

    /// Remote subtitle sweep bound, `None` when disabled.
    pub fn remote_timeout(&self) -> Option<Duration> {
        bound(self.remote_timeout_secs)
    }

    /// Languages for the configured subtitle backend.
    pub fn subtitle_languages(&self) -> &[String] {
        match self.subtitle_provider {
            SubtitleBackend::Subdb => &self.subdb_langs,
            SubtitleBackend::Osdb | SubtitleBackend::None => &self.os_langs,
        }
    }
}

fn bound(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_port(value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "port".to_string(),
            reason: format!("'{value}': {e}"),
        })
}

fn parse_secs(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{value}': {e}"),
        })
}

/// Accepts `port = 8080` as well as `port = "8080"`.
fn port_from_str_or_int<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => parse_port(&text).map_err(serde::de::Error::custom),
    }
}
