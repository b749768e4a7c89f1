//! File content hashing with BLAKE3.
//!
//! Hashes are recorded in quarantine metadata so a restored file can be
//! checked against the content that was originally flagged. Realtime
//! detections skip hashing (the writer may still be flushing), so the
//! hash on a `ScanRecord` is optional.

use crate::core::error::QuarantineError;

use std::io::Read;
use std::path::Path;

/// Chunk size for streamed hashing.
const HASH_CHUNK: usize = 64 * 1024;

/// Computes file content hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHasher;

impl FileHasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self
    }

    /// Computes the BLAKE3 hash of an in-memory buffer.
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    /// Computes the BLAKE3 hash of a file, streaming its contents.
    pub fn hash_file(&self, path: &Path) -> Result<String, QuarantineError> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                QuarantineError::not_found(path.display().to_string())
            } else {
                QuarantineError::Io(e)
            }
        })?;

        let mut reader = std::io::BufReader::new(file);
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; HASH_CHUNK];

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(hasher.finalize().to_hex().to_string())
    }
}
