//! Disk quotas for extraction scratch directories.

use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

/// Upper bounds on what one extraction may write.
///
/// A limit of zero or `None` means unlimited. A limit is exceeded only when
/// the observed value is strictly greater.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuota {
    /// Maximum number of files in the scratch tree.
    pub max_files: Option<u64>,
    /// Maximum total size of the scratch tree, in bytes.
    pub max_bytes: Option<u64>,
}

impl ResourceQuota {
    /// Creates a quota, treating zero as unlimited.
    pub fn new(max_files: u64, max_bytes: u64) -> Self {
        Self {
            max_files: (max_files > 0).then_some(max_files),
            max_bytes: (max_bytes > 0).then_some(max_bytes),
        }
    }

    /// A quota with no limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Sets the file-count limit; zero removes it.
    pub fn with_max_files(mut self, max_files: u64) -> Self {
        self.max_files = (max_files > 0).then_some(max_files);
        self
    }

    /// Sets the byte limit; zero removes it.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = (max_bytes > 0).then_some(max_bytes);
        self
    }

    fn files_limit(&self) -> Option<u64> {
        self.max_files.filter(|&n| n > 0)
    }

    fn bytes_limit(&self) -> Option<u64> {
        self.max_bytes.filter(|&n| n > 0)
    }

    /// Returns `true` if neither limit is set.
    pub fn is_unlimited(&self) -> bool {
        self.files_limit().is_none() && self.bytes_limit().is_none()
    }

    /// Returns `true` if `usage` is over either limit.
    pub fn exceeded_by(&self, usage: &DirUsage) -> bool {
        self.files_limit().is_some_and(|max| usage.files > max)
            || self.bytes_limit().is_some_and(|max| usage.bytes > max)
    }
}

/// Aggregate size of a directory subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirUsage {
    /// Number of non-directory entries.
    pub files: u64,
    /// Sum of their sizes in bytes.
    pub bytes: u64,
}

impl DirUsage {
    /// Measures `dir` without following symlinks.
    ///
    /// Entries that vanish or cannot be read while the extractor is still
    /// writing are skipped.
    pub fn measure(dir: &Path) -> Self {
        WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| !entry.file_type().is_dir())
            .fold(Self::default(), |mut usage, entry| {
                usage.files += 1;
                if let Ok(metadata) = entry.metadata() {
                    usage.bytes += metadata.len();
                }
                usage
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_means_unlimited() {
        let quota = ResourceQuota::new(0, 0);
        assert!(quota.is_unlimited());
        assert!(!quota.exceeded_by(&DirUsage {
            files: u64::MAX,
            bytes: u64::MAX
        }));

        let explicit_zero = ResourceQuota {
            max_files: Some(0),
            max_bytes: None,
        };
        assert!(explicit_zero.is_unlimited());
    }

    #[test]
    fn test_exceeded_is_strict() {
        let quota = ResourceQuota::new(2, 100);
        assert!(!quota.exceeded_by(&DirUsage { files: 2, bytes: 100 }));
        assert!(quota.exceeded_by(&DirUsage { files: 3, bytes: 0 }));
        assert!(quota.exceeded_by(&DirUsage { files: 0, bytes: 101 }));
    }

    #[test]
    fn test_measure() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("b"), b"123").unwrap();

        let usage = DirUsage::measure(dir.path());
        assert_eq!(usage, DirUsage { files: 2, bytes: 8 });
    }

    #[test]
    fn test_measure_missing_dir() {
        let usage = DirUsage::measure(Path::new("/nonexistent/sandscan/scratch"));
        assert_eq!(usage, DirUsage::default());
    }
}
