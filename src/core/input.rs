//! Input handed to a scanning engine.
//!
//! Files on disk are passed by path so the engine can open them itself;
//! in-memory content (tests, small payloads) is passed as bytes.

use std::path::{Path, PathBuf};

/// Input for a single engine submission.
///
/// # Examples
///
/// ```rust
/// use sandscan::core::FileInput;
///
/// let input = FileInput::from_path("/srv/upload/report.zip");
/// assert_eq!(input.filename(), Some("report.zip"));
///
/// let input = FileInput::from_bytes(vec![0x4D, 0x5A]).with_filename("stub.exe");
/// assert_eq!(input.size_hint(), Some(2));
/// ```
#[derive(Clone)]
pub enum FileInput {
    /// A file path on disk.
    Path(PathBuf),

    /// In-memory bytes with optional filename.
    Bytes {
        /// The file data.
        data: Vec<u8>,
        /// Optional original filename.
        filename: Option<String>,
    },
}

impl std::fmt::Debug for FileInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Bytes { data, filename } => f
                .debug_struct("Bytes")
                .field("data_len", &data.len())
                .field("filename", filename)
                .finish(),
        }
    }
}

impl FileInput {
    /// Creates a `FileInput` from a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a `FileInput` from bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            filename: None,
        }
    }

    /// Sets the filename for bytes inputs.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        if let Self::Bytes { filename: f, .. } = &mut self {
            *f = Some(filename.into());
        }
        self
    }

    /// Returns the filename, if known.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Path(path) => path.file_name().and_then(|n| n.to_str()),
            Self::Bytes { filename, .. } => filename.as_deref(),
        }
    }

    /// Returns the size in bytes when known without a stat call.
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Self::Path(_) => None,
            Self::Bytes { data, .. } => Some(data.len() as u64),
        }
    }

    /// Returns the path, if this is a path-based input.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Bytes { .. } => None,
        }
    }

    /// Reads the full content into memory.
    pub fn read_all(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Path(path) => std::fs::read(path),
            Self::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

impl From<PathBuf> for FileInput {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for FileInput {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_input_from_path() {
        let input = FileInput::from_path("/scan/evil.zip");
        assert_eq!(input.filename(), Some("evil.zip"));
        assert_eq!(input.as_path(), Some(Path::new("/scan/evil.zip")));
        assert_eq!(input.size_hint(), None);
    }

    #[test]
    fn test_file_input_bytes_read_all() {
        let input = FileInput::from_bytes(b"payload".to_vec()).with_filename("p.bin");
        assert_eq!(input.filename(), Some("p.bin"));
        assert_eq!(input.read_all().unwrap(), b"payload");
    }

    #[test]
    fn test_file_input_path_read_all() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let input: FileInput = path.clone().into();
        assert_eq!(input.read_all().unwrap(), b"hello");

        std::fs::remove_file(&path).unwrap();
        assert!(input.read_all().is_err());
    }
}
