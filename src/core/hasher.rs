//! BLAKE3 content hashing.
//!
//! Detections are logged with the BLAKE3 digest of the offending file so
//! audit trails can be correlated across hosts.

use crate::core::error::ScanError;
use crate::core::input::FileInput;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Hex-encoded BLAKE3 digest of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHash(String);

impl FileHash {
    /// Wraps an already hex-encoded digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes BLAKE3 digests of files and buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHasher;

impl FileHasher {
    /// Creates a hasher.
    pub fn new() -> Self {
        Self
    }

    /// Hashes an in-memory buffer.
    pub fn hash_bytes(&self, data: &[u8]) -> FileHash {
        FileHash(blake3::hash(data).to_hex().to_string())
    }

    /// Hashes a file, streaming it in 64 KiB chunks.
    pub fn hash_file(&self, path: &Path) -> Result<FileHash, ScanError> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ScanError::Io(e)
            }
        })?;

        let mut reader = std::io::BufReader::new(file);
        self.hash_reader(&mut reader)
    }

    /// Hashes everything `reader` yields.
    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> Result<FileHash, ScanError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(FileHash(hasher.finalize().to_hex().to_string()))
    }

    /// Hashes a `FileInput`.
    pub fn hash_input(&self, input: &FileInput) -> Result<FileHash, ScanError> {
        match input {
            FileInput::Path(path) => self.hash_file(path),
            FileInput::Bytes { data, .. } => Ok(self.hash_bytes(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let hasher = FileHasher::new();
        let a = hasher.hash_bytes(b"test data for hashing");
        let b = hasher.hash_bytes(b"test data for hashing");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert_ne!(a, hasher.hash_bytes(b"other data"));
    }

    #[test]
    fn test_hash_file_matches_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sample");
        std::fs::write(&path, b"streamed content").unwrap();

        let hasher = FileHasher::new();
        assert_eq!(
            hasher.hash_file(&path).unwrap(),
            hasher.hash_bytes(b"streamed content")
        );
    }

    #[test]
    fn test_hash_missing_file() {
        let err = FileHasher::new()
            .hash_file(Path::new("/nonexistent/sandscan/file"))
            .unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound { .. }));
    }

    #[test]
    fn test_from_hex_lowercases() {
        assert_eq!(FileHash::from_hex("ABCD").as_str(), "abcd");
    }
}
