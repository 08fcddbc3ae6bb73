use thiserror::Error;
use tracing::warn;

use crate::metadata::bencode::{BencodeValue, Dictionary};
use crate::metadata::info_hash::InfoHash;
use crate::metadata::text::Text;

/// Read-only view of the well-known fields of a decoded torrent.
#[derive(Debug, Clone)]
pub struct TorrentFile {
    announce: Option<Text>,
    announce_list: Vec<Vec<Text>>,
    creation_date: Option<i64>,
    comment: Option<Text>,
    created_by: Option<Text>,
    encoding: Option<Text>,

    pub info: Option<InfoSection>,
    pub hash: Option<InfoHash>,
}

#[derive(Debug, Clone)]
pub struct InfoSection {
    pub name: Text,
    pub piece_length: Option<u64>,
    /// Length in bytes of the concatenated piece hashes.
    pub pieces_len: usize,
    pub private: bool,
    pub mode: FileModeInfo,
}

#[derive(Debug, Clone)]
pub enum FileModeInfo {
    Single {length: u64},
    Multiple {files: Vec<MultiFileInfo>},
}

#[derive(Debug, Clone)]
pub struct MultiFileInfo {
    pub length: u64,
    pub path: Vec<Text>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TorrentError {
    #[error("torrent is {0}, not a dictionary")]
    NotADictionary(&'static str),
    #[error("missing required key `{0}`")]
    MissingRequiredKey(&'static str),
    #[error("`{key}` should be {expected} but is {found}")]
    WrongType {key: &'static str, expected: &'static str, found: &'static str},
    #[error("`{0}` is negative ({1})")]
    NegativeInteger(&'static str, i64),
    #[error("`{0}` is an empty list")]
    KeyMapsToAnEmptyList(&'static str),
}

type Result<T> = std::result::Result<T, TorrentError>;

const ANNOUNCE: &[u8] = b"announce";
const ANNOUNCE_LIST: &[u8] = b"announce-list";
const CREATION_DATE: &[u8] = b"creation date";
const COMMENT: &[u8] = b"comment";
const CREATED_BY: &[u8] = b"created by";
const ENCODING: &[u8] = b"encoding";
const INFO: &[u8] = b"info";
const PIECE_LENGTH: &[u8] = b"piece length";
const PIECES: &[u8] = b"pieces";
const PRIVATE: &[u8] = b"private";
const NAME: &[u8] = b"name";
const NAME_UTF8: &[u8] = b"name.utf-8";
const LENGTH: &[u8] = b"length";
const FILES: &[u8] = b"files";
const PATH: &[u8] = b"path";
const PATH_UTF8: &[u8] = b"path.utf-8";

const PIECE_HASH_LEN: usize = 20;

impl TorrentFile {
    /// Extracts the well-known fields from a decoded document.
    ///
    /// A missing `info` dictionary is tolerated: the result simply has no
    /// info section and no hash.
    pub fn project(document: &BencodeValue, hash: Option<InfoHash>) -> Result<Self> {
        let items = document.as_dict().ok_or(TorrentError::NotADictionary(document.type_name()))?;
        let info = match items.get(INFO) {
            Some(BencodeValue::Dictionary(info_items)) => Some(InfoSection::extract(info_items, hash.as_ref())?),
            Some(other) => return Err(wrong_type("info", "a dictionary", other)),
            None => {
                warn!("torrent has no info dictionary, info hash unavailable");
                None
            }
        };
        let file = TorrentFile {
            announce: extract_text(items.get(ANNOUNCE), "announce")?,
            announce_list: extract_announce_list(items.get(ANNOUNCE_LIST))?,
            creation_date: extract_int(items.get(CREATION_DATE), "creation date")?,
            comment: extract_text(items.get(COMMENT), "comment")?,
            created_by: extract_text(items.get(CREATED_BY), "created by")?,
            encoding: extract_text(items.get(ENCODING), "encoding")?,
            hash: if info.is_some() { hash } else { None },
            info,
        };
        let fallbacks = file.encoding_fallbacks();
        if fallbacks > 0 {
            warn!(fallbacks, "some text is not valid UTF-8 and was decoded lossily");
        }
        Ok(file)
    }

    pub fn announce(&self) -> Option<&str> {
        self.announce.as_ref().map(Text::as_str)
    }

    pub fn announce_list(&self) -> &[Vec<Text>] {
        &self.announce_list
    }

    /// Seconds since the Unix epoch.
    pub fn creation_date(&self) -> Option<i64> {
        self.creation_date
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_ref().map(Text::as_str)
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_ref().map(Text::as_str)
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_ref().map(Text::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.info.as_ref().map(|info| info.name.as_str())
    }

    pub fn is_multi_file(&self) -> bool {
        matches!(self.info, Some(InfoSection {mode: FileModeInfo::Multiple {..}, ..}))
    }

    /// `(path, length)` for every file; a single-file torrent yields its name and length.
    pub fn files(&self) -> Vec<(String, u64)> {
        match &self.info {
            Some(InfoSection {mode: FileModeInfo::Single {length}, name, ..}) => {
                vec![(name.to_string(), *length)]
            },
            Some(InfoSection {mode: FileModeInfo::Multiple {files}, ..}) => {
                files.iter().map(|file| (file.joined_path(), file.length)).collect()
            },
            None => Vec::new(),
        }
    }

    pub fn total_length(&self) -> Option<u64> {
        self.info.as_ref().map(InfoSection::total_length)
    }

    /// Every tracker URL, `announce` first, without repeats.
    pub fn trackers(&self) -> Vec<&str> {
        let mut trackers: Vec<&str> = Vec::new();
        let tiers = self.announce_list.iter().flatten();
        for url in self.announce.iter().chain(tiers) {
            if !trackers.contains(&url.as_str()) {
                trackers.push(url.as_str());
            }
        }
        trackers
    }

    /// Number of displayed strings that had to be decoded lossily.
    pub fn encoding_fallbacks(&self) -> usize {
        let top_level = [&self.announce, &self.comment, &self.created_by, &self.encoding]
            .into_iter()
            .flatten()
            .chain(self.announce_list.iter().flatten());
        let info: Box<dyn Iterator<Item = &Text> + '_> = match &self.info {
            Some(info) => match &info.mode {
                FileModeInfo::Single {..} => Box::new(std::iter::once(&info.name)),
                FileModeInfo::Multiple {files} => {
                    Box::new(std::iter::once(&info.name).chain(files.iter().flat_map(|file| file.path.iter())))
                },
            },
            None => Box::new(std::iter::empty()),
        };
        top_level.chain(info).filter(|text| text.is_lossy()).count()
    }
}

impl InfoSection {
    fn extract(info_items: &Dictionary, hash: Option<&InfoHash>) -> Result<Self> {
        let name = match utf8_variant(extract_text(info_items.get(NAME_UTF8), "name.utf-8")) {
            Some(name) => Some(name),
            None => extract_text(info_items.get(NAME), "name")?,
        };
        let name = name.unwrap_or_else(|| Self::synthesize_name(hash));
        let piece_length = extract_uint(info_items.get(PIECE_LENGTH), "piece length", false)?;
        let pieces_len = match info_items.get(PIECES) {
            Some(BencodeValue::ByteString(bytes)) => bytes.len(),
            Some(other) => return Err(wrong_type("pieces", "a byte string", other)),
            None => 0,
        };
        let private = extract_int(info_items.get(PRIVATE), "private")? == Some(1);

        let mode = match info_items.get(FILES) {
            Some(BencodeValue::List(elements)) => {
                let mut files = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        BencodeValue::Dictionary(items) => files.push(MultiFileInfo::extract(items)?),
                        other => return Err(wrong_type("files", "a list of dictionaries", other)),
                    }
                }
                FileModeInfo::Multiple {files}
            },
            Some(other) => return Err(wrong_type("files", "a list", other)),
            None => {
                let length = extract_uint(info_items.get(LENGTH), "length", true)?.unwrap_or_default();
                FileModeInfo::Single {length}
            },
        };
        Ok(InfoSection {name, piece_length, pieces_len, private, mode})
    }

    fn synthesize_name(hash: Option<&InfoHash>) -> Text {
        match hash {
            Some(hash) => Text::from(format!("unnamed-{}", &hash.to_hex()[..8])),
            None => Text::from("unnamed"),
        }
    }

    pub fn num_pieces(&self) -> usize {
        self.pieces_len / PIECE_HASH_LEN
    }

    pub fn total_length(&self) -> u64 {
        match &self.mode {
            FileModeInfo::Single {length} => *length,
            FileModeInfo::Multiple {files} => files.iter().fold(0u64, |total, file| total.saturating_add(file.length)),
        }
    }
}

impl MultiFileInfo {
    fn extract(items: &Dictionary) -> Result<Self> {
        let length = extract_uint(items.get(LENGTH), "length", true)?.unwrap_or_default();
        let path = match utf8_variant(extract_list_of_text(items.get(PATH_UTF8), "path.utf-8")) {
            Some(path) if !path.is_empty() => path,
            _ => extract_list_of_text(items.get(PATH), "path")?.ok_or(TorrentError::MissingRequiredKey("path"))?,
        };
        if path.is_empty() {
            return Err(TorrentError::KeyMapsToAnEmptyList("path"));
        }
        Ok(MultiFileInfo {length, path})
    }

    pub fn joined_path(&self) -> String {
        self.path.iter().map(Text::as_str).collect::<Vec<_>>().join("/")
    }
}

/// A malformed `*.utf-8` variant counts as absent so the plain key is used instead.
fn utf8_variant<T>(extracted: Result<Option<T>>) -> Option<T> {
    extracted.unwrap_or_else(|e| {
        warn!(error = %e, "ignoring malformed UTF-8 variant");
        None
    })
}

fn wrong_type(key: &'static str, expected: &'static str, found: &BencodeValue) -> TorrentError {
    TorrentError::WrongType {key, expected, found: found.type_name()}
}

fn extract_text(value: Option<&BencodeValue>, name: &'static str) -> Result<Option<Text>> {
    match value {
        Some(BencodeValue::ByteString(bytes)) => Ok(Some(Text::from_bytes(bytes))),
        Some(other) => Err(wrong_type(name, "a byte string", other)),
        None => Ok(None),
    }
}

fn extract_int(value: Option<&BencodeValue>, name: &'static str) -> Result<Option<i64>> {
    match value {
        Some(BencodeValue::Integer(num)) => Ok(Some(*num)),
        Some(other) => Err(wrong_type(name, "an integer", other)),
        None => Ok(None),
    }
}

fn extract_uint(value: Option<&BencodeValue>, name: &'static str, mandatory: bool) -> Result<Option<u64>> {
    match extract_int(value, name)? {
        Some(num) if num < 0 => Err(TorrentError::NegativeInteger(name, num)),
        Some(num) => Ok(Some(num.unsigned_abs())),
        None => if mandatory { Err(TorrentError::MissingRequiredKey(name)) } else { Ok(None) },
    }
}

fn extract_list_of_text(value: Option<&BencodeValue>, name: &'static str) -> Result<Option<Vec<Text>>> {
    match value {
        Some(BencodeValue::List(elements)) => {
            let mut list = Vec::with_capacity(elements.len());
            for element in elements {
                match element {
                    BencodeValue::ByteString(bytes) => list.push(Text::from_bytes(bytes)),
                    other => return Err(wrong_type(name, "a list of byte strings", other)),
                }
            }
            Ok(Some(list))
        },
        Some(other) => Err(wrong_type(name, "a list", other)),
        None => Ok(None),
    }
}

/// Tiers are lists of URLs; a bare URL in place of a tier is read as a one-URL tier.
fn extract_announce_list(value: Option<&BencodeValue>) -> Result<Vec<Vec<Text>>> {
    let mut tiers = Vec::new();
    match value {
        Some(BencodeValue::List(elements)) => {
            for element in elements {
                let tier = match element {
                    BencodeValue::List(_) => extract_list_of_text(Some(element), "announce-list")?.unwrap_or_default(),
                    BencodeValue::ByteString(bytes) => vec![Text::from_bytes(bytes)],
                    other => return Err(wrong_type("announce-list", "a list of tiers", other)),
                };
                tiers.push(tier);
            }
        },
        Some(other) => return Err(wrong_type("announce-list", "a list", other)),
        None => (),
    }
    Ok(tiers)
}
