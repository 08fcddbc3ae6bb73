use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

/// Default ceiling on the size of a single input file.
pub const DEFAULT_MAX_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("file is larger than the {limit} byte limit")]
    TooLarge { limit: u64 },
}

/// Reads a whole file, refusing anything longer than `limit` bytes.
pub fn read_bounded<P: AsRef<Path>>(path: P, limit: u64) -> Result<Vec<u8>, ReadError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size > limit {
        return Err(ReadError::TooLarge { limit });
    }
    let mut contents: Vec<u8> = Vec::with_capacity(size as usize);
    // the file may grow between the size check and the read
    file.take(limit.saturating_add(1)).read_to_end(&mut contents)?;
    if contents.len() as u64 > limit {
        return Err(ReadError::TooLarge { limit });
    }
    Ok(contents)
}
