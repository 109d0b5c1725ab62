//! Crash-safe file materialisation.

use platwrap_config::write_atomic;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes compared at the end of a file by [`probably_matches`].
const TAIL_BYTES: usize = 32 * 1024;

/// Heuristically check whether `path` already holds `data`.
///
/// Compares the size, then at most the last 32 KiB. A missing file does
/// not match.
pub fn probably_matches(path: &Path, data: &[u8]) -> io::Result<bool> {
    let mut file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() != data.len() as u64 {
        return Ok(false);
    }
    let offset = data.len().saturating_sub(TAIL_BYTES);
    file.seek(SeekFrom::Start(offset as u64))?;
    let mut tail = Vec::with_capacity(data.len() - offset);
    file.read_to_end(&mut tail)?;
    Ok(tail == data[offset..])
}

/// Write `data` to `path` unless it probably matches already.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, data: &[u8], mode: u32) -> io::Result<bool> {
    if probably_matches(path, data)? {
        return Ok(false);
    }
    write_atomic(path, data, mode)?;
    Ok(true)
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
