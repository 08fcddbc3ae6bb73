use std::fmt;
use std::ops::Range;

use sha1::{Digest, Sha1};

use crate::util::to_hex;

/// SHA-1 digest identifying a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

/// Hashes the `info` dictionary bytes found at `span` in the original buffer.
///
/// The bytes are hashed verbatim. Re-encoding the decoded dictionary could
/// reorder keys or normalise malformed input and produce a different digest
/// from every other client. Returns `None` if `span` does not lie within
/// `buffer`.
pub fn compute_info_hash(buffer: &[u8], span: Range<usize>) -> Option<InfoHash> {
    buffer.get(span).map(InfoHash::from_info_bytes)
}

impl InfoHash {
    pub fn from_info_bytes(info: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(info);
        InfoHash(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// 40 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(bytes: [u8; 20]) -> Self {
        InfoHash(bytes)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}
