//! Source file reading
//!
//! Provides consistent handling for:
//! - Oversized files (size checked before any read)
//! - Binary files (null byte in the leading bytes)
//! - Non-UTF-8 files
//!
//! None of these are errors: they come back as a [`SkipReason`]. Only I/O
//! failures (missing file, permission denied) are returned as `Err`.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::core::model::{FileContent, SkipReason};

/// How many leading bytes are inspected for a null byte
pub const BINARY_PEEK_SIZE: usize = 8 * 1024;

/// Read a file as UTF-8 text, refusing files over `max_file_size` bytes
pub fn read_source_file(path: &Path, max_file_size: u64) -> io::Result<FileContent> {
    let mut file = fs::File::open(path)?;
    let file_size = file.metadata()?.len();

    if file_size > max_file_size {
        tracing::debug!(
            "{}: {} bytes exceeds limit {}",
            path.display(),
            file_size,
            max_file_size
        );
        return Ok(FileContent::Skipped(SkipReason::TooLarge));
    }

    let mut bytes = Vec::with_capacity(file_size as usize);
    let peeked = (&mut file)
        .take(BINARY_PEEK_SIZE as u64)
        .read_to_end(&mut bytes)?;

    if is_binary(&bytes[..peeked]) {
        return Ok(FileContent::Skipped(SkipReason::Binary));
    }

    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(content) => Ok(FileContent::Text(content)),
        Err(_) => Ok(FileContent::Skipped(SkipReason::InvalidUtf8)),
    }
}

/// Null byte anywhere in the sample marks the content as binary
pub fn is_binary(sample: &[u8]) -> bool {
    sample.contains(&0)
}
