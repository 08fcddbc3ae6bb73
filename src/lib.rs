use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

pub mod metadata;
pub mod report;
pub mod util;

pub use metadata::bencode::{BencodeValue, DecodeError, DecodeOptions, Decoded, Dictionary, decode, decode_with};
pub use metadata::file::{FileModeInfo, TorrentError, TorrentFile};
pub use metadata::info_hash::{InfoHash, compute_info_hash};
pub use report::{OutputFormat, Report};
pub use util::io::DEFAULT_MAX_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectOptions {
    pub decode: DecodeOptions,
    /// Largest input file accepted, in bytes.
    pub max_size: u64,
}

/// Why a single input file could not be reported on.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("unable to read file: {0}")]
    Read(#[from] util::io::ReadError),
    #[error("invalid bencode: {0}")]
    Decode(#[from] DecodeError),
    #[error("invalid torrent: {0}")]
    Torrent(#[from] TorrentError),
    #[error("unable to render report: {0}")]
    Render(#[from] serde_json::Error),
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self { decode: DecodeOptions::default(), max_size: DEFAULT_MAX_SIZE }
    }
}

/// Decodes a torrent held in memory, hashes its info dictionary and projects its metadata.
pub fn inspect_bytes(bytes: &[u8], options: &DecodeOptions) -> Result<(BencodeValue, TorrentFile), InspectError> {
    let decoded = decode_with(bytes, options)?;
    let hash = decoded.info_hash(bytes);
    debug!(info_span = ?decoded.info_span, "decoded torrent");
    let torrent = TorrentFile::project(&decoded.value, hash)?;
    Ok((decoded.value, torrent))
}

pub fn inspect_path<P: AsRef<Path>>(path: P, options: &InspectOptions) -> Result<Report, InspectError> {
    let path = path.as_ref();
    let contents = util::io::read_bounded(path, options.max_size)?;
    let (document, torrent) = inspect_bytes(&contents, &options.decode)?;
    info!(path = %path.display(), hash = ?torrent.hash, "inspected torrent");
    Ok(Report { path: path.to_path_buf(), document, torrent })
}
