//! `.torrent` metadata and magnet link parsing.
//!
//! Metadata extraction uses bencode-rs; the info hash is the SHA-1 of the raw
//! `info` value bytes as they appear in the file, located by walking the
//! top-level dictionary rather than searching for a byte pattern.

use std::ops::Range;
use std::path::Path;

use sha1::{Digest, Sha1};

use super::{InfoHash, TorrentError};

type BencodeDict<'a> = std::collections::HashMap<&'a [u8], bencode_rs::Value<'a>>;
type ParseResult<T> = Result<T, TorrentError>;

/// Metadata extracted from a `.torrent` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentMetadata {
    pub info_hash: InfoHash,
    pub name: String,
    pub piece_length: u32,
    pub piece_count: usize,
    pub total_length: u64,
    pub files: Vec<TorrentFile>,
    /// Tracker URLs, `announce` first, then `announce-list` tiers, deduplicated
    pub announce_urls: Vec<String>,
}

impl TorrentMetadata {
    /// Magnet URI carrying the info hash, display name and trackers.
    pub fn magnet_uri(&self) -> String {
        MagnetLink {
            info_hash: self.info_hash,
            display_name: Some(self.name.clone()),
            trackers: self.announce_urls.clone(),
        }
        .to_uri()
    }
}

/// Individual file within a torrent.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    pub path: Vec<String>,
    pub length: u64,
}

/// Parsed magnet URI.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl MagnetLink {
    /// Parses `magnet:?xt=urn:btih:<hash>&dn=...&tr=...`.
    ///
    /// Accepts hex (40 chars) and base32 (32 chars) hashes.
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidMagnet` - Not a magnet URI or no `btih` topic
    /// - `TorrentError::InvalidInfoHash` - Hash has an unsupported encoding
    pub fn parse(uri: &str) -> ParseResult<Self> {
        let magnet = magnet_url::Magnet::new(uri).map_err(|e| TorrentError::InvalidMagnet {
            reason: e.to_string(),
        })?;

        let hash = match (magnet.hash_type(), magnet.hash()) {
            (Some(kind), Some(hash)) if kind.eq_ignore_ascii_case("btih") => hash,
            _ => {
                return Err(TorrentError::InvalidMagnet {
                    reason: "missing xt=urn:btih topic".to_string(),
                });
            }
        };
        let info_hash = match hash.len() {
            32 => InfoHash::from_base32(hash)?,
            _ => InfoHash::from_hex(hash)?,
        };

        Ok(Self {
            info_hash,
            display_name: magnet.display_name().map(|name| percent_decoded(name)),
            trackers: magnet.trackers().iter().map(|t| percent_decoded(t)).collect(),
        })
    }

    /// Renders the link back into a magnet URI with percent-encoded values.
    pub fn to_uri(&self) -> String {
        let mut uri = format!("magnet:?xt=urn:btih:{}", self.info_hash);
        if let Some(name) = &self.display_name {
            uri.push_str("&dn=");
            uri.push_str(&urlencoding::encode(name));
        }
        for tracker in &self.trackers {
            uri.push_str("&tr=");
            uri.push_str(&urlencoding::encode(tracker));
        }
        uri
    }
}

fn percent_decoded(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Parser for `.torrent` files backed by bencode-rs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BencodeTorrentParser;

impl BencodeTorrentParser {
    /// Creates new bencode parser instance.
    pub fn new() -> Self {
        Self
    }

    /// Reads and parses a `.torrent` file from disk.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Metadata` - File unreadable or not a valid torrent
    pub async fn parse_torrent_file(&self, path: &Path) -> ParseResult<TorrentMetadata> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| TorrentError::Metadata {
                reason: format!("cannot read {}: {e}", path.display()),
            })?;
        self.parse_torrent_data(&data)
    }

    /// Parses raw `.torrent` bytes.
    ///
    /// # Errors
    ///
    /// - `TorrentError::Metadata` - Malformed bencode or missing required fields
    pub fn parse_torrent_data(&self, data: &[u8]) -> ParseResult<TorrentMetadata> {
        let parsed = bencode_rs::Value::parse(data).map_err(|e| TorrentError::Metadata {
            reason: format!("Bencode parsing failed: {e:?}"),
        })?;

        let Some(bencode_rs::Value::Dictionary(root)) = parsed.first() else {
            return Err(metadata_error("Root element must be dictionary"));
        };

        let info_span = info_dict_span(data)?;
        let info_hash = hash_info(&data[info_span]);

        let Some(bencode_rs::Value::Dictionary(info)) = root.get(b"info".as_slice()) else {
            return Err(metadata_error("Info field must be dictionary"));
        };

        let name = extract_string(info, b"name")?;
        let piece_length = u32::try_from(extract_integer(info, b"piece length")?)
            .map_err(|_| metadata_error("Invalid piece length"))?;

        let pieces = extract_bytes(info, b"pieces")?;
        if pieces.len() % 20 != 0 {
            return Err(metadata_error("Invalid pieces length"));
        }

        let files = match (info.get(b"length".as_slice()), info.get(b"files".as_slice())) {
            (Some(bencode_rs::Value::Integer(length)), _) => vec![TorrentFile {
                path: vec![name.clone()],
                length: non_negative(*length)?,
            }],
            (_, Some(bencode_rs::Value::List(entries))) => extract_files(entries)?,
            _ => return Err(metadata_error("Missing 'files' or 'length' field")),
        };
        let total_length = files.iter().map(|file| file.length).sum();

        Ok(TorrentMetadata {
            info_hash,
            name,
            piece_length,
            piece_count: pieces.len() / 20,
            total_length,
            files,
            announce_urls: extract_announce_urls(root),
        })
    }
}

fn metadata_error(reason: &str) -> TorrentError {
    TorrentError::Metadata {
        reason: reason.to_string(),
    }
}

fn hash_info(info_bytes: &[u8]) -> InfoHash {
    let digest = Sha1::digest(info_bytes);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&digest);
    InfoHash::new(hash)
}

/// Byte range of the `info` value inside the top-level dictionary.
fn info_dict_span(data: &[u8]) -> ParseResult<Range<usize>> {
    if data.first() != Some(&b'd') {
        return Err(metadata_error("Expected dictionary start"));
    }

    let mut pos = 1;
    while pos < data.len() && data[pos] != b'e' {
        let key_end = value_end(data, pos)?;
        let key = string_payload(data, pos..key_end)?;
        let value_start = key_end;
        let value_stop = value_end(data, value_start)?;
        if key == b"info" {
            if data[value_start] != b'd' {
                return Err(metadata_error("Info field must be dictionary"));
            }
            return Ok(value_start..value_stop);
        }
        pos = value_stop;
    }

    Err(metadata_error("Missing 'info' field"))
}

/// Position just past the bencode value starting at `start`.
fn value_end(data: &[u8], start: usize) -> ParseResult<usize> {
    let mut pos = start;
    let mut depth = 0usize;

    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| metadata_error("Truncated bencode value"))?;
        match byte {
            b'd' | b'l' => {
                depth += 1;
                pos += 1;
                continue;
            }
            b'e' if depth > 0 => {
                depth -= 1;
                pos += 1;
            }
            b'i' => {
                let end = data[pos..]
                    .iter()
                    .position(|&b| b == b'e')
                    .ok_or_else(|| metadata_error("Unterminated integer"))?;
                pos += end + 1;
            }
            b'0'..=b'9' => {
                let colon = data[pos..]
                    .iter()
                    .position(|&b| b == b':')
                    .ok_or_else(|| metadata_error("Invalid string format"))?;
                let length: usize = std::str::from_utf8(&data[pos..pos + colon])
                    .ok()
                    .and_then(|digits| digits.parse().ok())
                    .ok_or_else(|| metadata_error("Invalid string length"))?;
                pos += colon + 1 + length;
                if pos > data.len() {
                    return Err(metadata_error("Truncated string"));
                }
            }
            _ => return Err(metadata_error("Invalid bencode character")),
        }

        if depth == 0 {
            return Ok(pos);
        }
    }
}

fn string_payload(data: &[u8], span: Range<usize>) -> ParseResult<&[u8]> {
    let raw = &data[span];
    let colon = raw
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| metadata_error("Dictionary key must be a string"))?;
    Ok(&raw[colon + 1..])
}

fn non_negative(value: i64) -> ParseResult<u64> {
    u64::try_from(value).map_err(|_| metadata_error("Negative file length"))
}

fn extract_bytes<'a>(dict: &'a BencodeDict<'_>, key: &[u8]) -> ParseResult<&'a [u8]> {
    match dict.get(key) {
        Some(bencode_rs::Value::Bytes(bytes)) => Ok(bytes),
        _ => Err(TorrentError::Metadata {
            reason: format!(
                "Missing or invalid field: {:?}",
                String::from_utf8_lossy(key)
            ),
        }),
    }
}

fn extract_string(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<String> {
    let bytes = extract_bytes(dict, key)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| TorrentError::Metadata {
        reason: format!("Invalid UTF-8 in field: {:?}", String::from_utf8_lossy(key)),
    })
}

fn extract_integer(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<i64> {
    match dict.get(key) {
        Some(bencode_rs::Value::Integer(value)) => Ok(*value),
        _ => Err(TorrentError::Metadata {
            reason: format!(
                "Missing or invalid integer field: {:?}",
                String::from_utf8_lossy(key)
            ),
        }),
    }
}

fn extract_files(entries: &[bencode_rs::Value<'_>]) -> ParseResult<Vec<TorrentFile>> {
    entries
        .iter()
        .map(|entry| {
            let bencode_rs::Value::Dictionary(file) = entry else {
                return Err(metadata_error("Invalid file entry type"));
            };
            let length = non_negative(extract_integer(file, b"length")?)?;
            let Some(bencode_rs::Value::List(components)) = file.get(b"path".as_slice()) else {
                return Err(metadata_error("Missing or invalid path in file"));
            };
            let path = components
                .iter()
                .map(|component| match component {
                    bencode_rs::Value::Bytes(bytes) => String::from_utf8(bytes.to_vec())
                        .map_err(|_| metadata_error("Invalid UTF-8 in file path")),
                    _ => Err(metadata_error("Invalid path component type")),
                })
                .collect::<ParseResult<Vec<_>>>()?;
            if path.is_empty() {
                return Err(metadata_error("Empty file path"));
            }
            Ok(TorrentFile { path, length })
        })
        .collect()
}

fn extract_announce_urls(root: &BencodeDict<'_>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |bytes: &[u8]| {
        if let Ok(url) = std::str::from_utf8(bytes) {
            if !url.is_empty() && !urls.iter().any(|known| known == url) {
                urls.push(url.to_string());
            }
        }
    };

    if let Some(bencode_rs::Value::Bytes(announce)) = root.get(b"announce".as_slice()) {
        push(announce);
    }
    if let Some(bencode_rs::Value::List(tiers)) = root.get(b"announce-list".as_slice()) {
        for tier in tiers {
            if let bencode_rs::Value::List(tier_urls) = tier {
                for url in tier_urls {
                    if let bencode_rs::Value::Bytes(bytes) = url {
                        push(bytes);
                    }
                }
            }
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_FILE: &[u8] = b"d8:announce23:http://tracker/announce4:infod6:lengthi1000e4:name9:movie.mp412:piece lengthi32768e6:pieces20:12345678901234567890ee";

    fn expected_hash(data: &[u8], info: &[u8]) -> InfoHash {
        let start = data
            .windows(info.len())
            .position(|window| window == info)
            .unwrap();
        hash_info(&data[start..start + info.len()])
    }

    #[test]
    fn test_parse_single_file_torrent() {
        let metadata = BencodeTorrentParser::new()
            .parse_torrent_data(SINGLE_FILE)
            .unwrap();

        assert_eq!(metadata.name, "movie.mp4");
        assert_eq!(metadata.total_length, 1000);
        assert_eq!(metadata.piece_length, 32768);
        assert_eq!(metadata.piece_count, 1);
        assert_eq!(metadata.files.len(), 1);
        assert_eq!(metadata.files[0].path, vec!["movie.mp4"]);
        assert_eq!(metadata.announce_urls, vec!["http://tracker/announce"]);

        let info = b"d6:lengthi1000e4:name9:movie.mp412:piece lengthi32768e6:pieces20:12345678901234567890e";
        assert_eq!(metadata.info_hash, expected_hash(SINGLE_FILE, info));
    }

    #[test]
    fn test_info_hash_ignores_info_lookalike_in_earlier_keys() {
        // The comment value contains "4:info" before the real info key
        let data = b"d7:comment6:4:info4:infod6:lengthi5e4:name1:a12:piece lengthi16e6:pieces20:abcdefghijklmnopqrstee";
        let metadata = BencodeTorrentParser::new().parse_torrent_data(data).unwrap();

        let info = b"d6:lengthi5e4:name1:a12:piece lengthi16e6:pieces20:abcdefghijklmnopqrste";
        assert_eq!(metadata.info_hash, hash_info(info));
        assert!(metadata.announce_urls.is_empty());
    }

    #[test]
    fn test_parse_multi_file_torrent() {
        let data = b"d4:infod5:filesld6:lengthi100e4:pathl6:extras10:sample.txteed6:lengthi900e4:pathl9:movie.mkveee4:name4:pack12:piece lengthi16384e6:pieces20:12345678901234567890ee";
        let metadata = BencodeTorrentParser::new().parse_torrent_data(data).unwrap();

        assert_eq!(metadata.files.len(), 2);
        assert_eq!(metadata.files[0].path, vec!["extras", "sample.txt"]);
        assert_eq!(metadata.files[1].length, 900);
        assert_eq!(metadata.total_length, 1000);
    }

    #[test]
    fn test_invalid_data_is_metadata_error() {
        let parser = BencodeTorrentParser::new();
        for data in [
            b"not bencode".as_slice(),
            b"li1ee".as_slice(),
            b"d4:name4:teste".as_slice(),
            b"d4:infod4:name1:aee".as_slice(),
        ] {
            assert!(
                matches!(
                    parser.parse_torrent_data(data),
                    Err(TorrentError::Metadata { .. })
                ),
                "expected metadata error for {:?}",
                String::from_utf8_lossy(data)
            );
        }
    }

    #[test]
    fn test_derived_magnet_round_trips() {
        let metadata = BencodeTorrentParser::new()
            .parse_torrent_data(SINGLE_FILE)
            .unwrap();
        let uri = metadata.magnet_uri();

        assert!(uri.starts_with(&format!("magnet:?xt=urn:btih:{}", metadata.info_hash)));
        assert!(uri.contains("&tr=http%3A%2F%2Ftracker%2Fannounce"));

        let link = MagnetLink::parse(&uri).unwrap();
        assert_eq!(link.info_hash, metadata.info_hash);
        assert_eq!(link.display_name.as_deref(), Some("movie.mp4"));
        assert_eq!(link.trackers, metadata.announce_urls);
    }

    #[test]
    fn test_parse_magnet_link() {
        let link = MagnetLink::parse(
            "magnet:?xt=urn:btih:0123456789ABCDEF0123456789ABCDEF01234567&dn=Big%20Buck%20Bunny&tr=udp%3A%2F%2Ftracker.example%3A80",
        )
        .unwrap();

        assert_eq!(
            link.info_hash.to_string(),
            "0123456789abcdef0123456789abcdef01234567"
        );
        assert_eq!(link.display_name.as_deref(), Some("Big Buck Bunny"));
        assert_eq!(link.trackers, vec!["udp://tracker.example:80"]);
    }

    #[test]
    fn test_parse_base32_magnet_link() {
        let link = MagnetLink::parse(&format!("magnet:?xt=urn:btih:{}", "A".repeat(32))).unwrap();

        assert_eq!(link.info_hash, InfoHash::new([0; 20]));
        assert!(link.display_name.is_none());
        assert!(link.trackers.is_empty());
    }

    #[test]
    fn test_invalid_magnet_links() {
        assert!(MagnetLink::parse("http://example.com/file.torrent").is_err());
        assert!(MagnetLink::parse("magnet:?dn=nohash").is_err());
        assert!(MagnetLink::parse("magnet:?xt=urn:btih:1234").is_err());
    }
}
