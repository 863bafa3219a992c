//! Video fingerprint used to match a file against the subtitle catalogue.
//!
//! The value is the file length plus the wrapping sum of the little-endian
//! 64-bit words in the first and the last 64 KiB of the file. Only complete
//! words count; a trailing partial word is ignored.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use subkeeper_common::Result;

/// Size of each sampled block.
const CHUNK_SIZE: u64 = 64 * 1024;

/// A 64-bit fingerprint, rendered as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Fingerprint the file at `path`.
///
/// # Errors
///
/// Returns [`subkeeper_common::Error::Io`] if the file cannot be opened or
/// read. Callers treat that as "no fingerprint" and carry on.
pub fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    Ok(fingerprint_reader(&mut file, len)?)
}

/// Fingerprint any seekable reader of known length.
pub fn fingerprint_reader<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Fingerprint> {
    let mut hash = len;

    reader.seek(SeekFrom::Start(0))?;
    hash = hash.wrapping_add(sum_chunk(reader)?);

    reader.seek(SeekFrom::Start(len.saturating_sub(CHUNK_SIZE)))?;
    hash = hash.wrapping_add(sum_chunk(reader)?);

    Ok(Fingerprint(hash))
}

/// Read up to one chunk and sum its complete words.
fn sum_chunk<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = Vec::with_capacity(CHUNK_SIZE as usize);
    reader.take(CHUNK_SIZE).read_to_end(&mut buf)?;

    Ok(buf
        .chunks_exact(8)
        .map(|word| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(word);
            u64::from_le_bytes(bytes)
        })
        .fold(0u64, u64::wrapping_add))
}
