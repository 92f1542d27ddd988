//! Core types used throughout the sandscan library.
//!
//! This module defines verdicts, per-file exit signals, scan targets, and
//! the statistics threaded through a scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Signature name reported for an archive whose extracted content matched.
pub const CONTAINER_SIGNATURE: &str = "Infected.Archive";

/// The content verdict for a file or an aggregated subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanVerdict {
    /// No signature matched.
    Clean,

    /// A signature matched.
    Infected {
        /// Name of the matching signature.
        signature: String,
    },

    /// The engine could not reach a verdict.
    Error {
        /// Engine-reported reason.
        reason: String,
    },
}

impl ScanVerdict {
    /// Creates an `Infected` verdict.
    pub fn infected(signature: impl Into<String>) -> Self {
        Self::Infected {
            signature: signature.into(),
        }
    }

    /// Creates an `Error` verdict.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the verdict is clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if a signature matched.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    /// Returns `true` if the engine failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns the signature name if infected.
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Infected { signature } => Some(signature),
            _ => None,
        }
    }

    /// Folds another verdict into this one.
    ///
    /// `Infected` dominates `Error`, which dominates `Clean`. The first
    /// detection's signature is kept.
    pub fn merge(self, other: ScanVerdict) -> ScanVerdict {
        match (self, other) {
            (infected @ Self::Infected { .. }, _) => infected,
            (_, infected @ Self::Infected { .. }) => infected,
            (error @ Self::Error { .. }, _) => error,
            (_, error @ Self::Error { .. }) => error,
            (Self::Clean, Self::Clean) => Self::Clean,
        }
    }
}

/// Why a file was not submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Matched an exclude pattern.
    Excluded,
    /// Include patterns are configured and none matched.
    NotIncluded,
    /// The file lives on the `/proc` pseudo-filesystem.
    ProcFilesystem,
    /// The file is empty.
    Empty,
    /// The file is not a regular file.
    NotRegular,
    /// The archive exceeds the configured size limit.
    TooLarge,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Excluded => "Excluded",
            Self::NotIncluded => "Excluded (not included)",
            Self::ProcFilesystem => "Excluded (/proc)",
            Self::Empty => "Empty file",
            Self::NotRegular => "Not a regular file",
            Self::TooLarge => "Archive too big",
        };
        f.write_str(text)
    }
}

/// Per-file result of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExitSignal {
    /// Scanned, nothing found.
    Clean,
    /// Scanned, a signature matched.
    Infected {
        /// The reported signature.
        signature: String,
    },
    /// Not scanned.
    Skipped {
        /// Why the file was skipped.
        reason: SkipReason,
    },
    /// The caller or the extraction identity cannot read the file.
    AccessError,
    /// The file could not be opened or read.
    IoError,
    /// The engine failed on this file.
    EngineError {
        /// Engine-reported reason.
        reason: String,
    },
}

impl ExitSignal {
    /// Creates a `Skipped` signal.
    pub fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    /// Returns `true` if a signature matched.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    /// Converts the signal into the content verdict used for aggregation.
    pub fn verdict(&self) -> ScanVerdict {
        match self {
            Self::Clean | Self::Skipped { .. } => ScanVerdict::Clean,
            Self::Infected { signature } => ScanVerdict::infected(signature.clone()),
            Self::AccessError => ScanVerdict::error("access denied"),
            Self::IoError => ScanVerdict::error("I/O error"),
            Self::EngineError { reason } => ScanVerdict::error(reason.clone()),
        }
    }
}

impl From<ScanVerdict> for ExitSignal {
    fn from(verdict: ScanVerdict) -> Self {
        match verdict {
            ScanVerdict::Clean => Self::Clean,
            ScanVerdict::Infected { signature } => Self::Infected { signature },
            ScanVerdict::Error { reason } => Self::EngineError { reason },
        }
    }
}

/// Coarse file type of a scan target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link (only seen when metadata is not followed).
    Symlink,
    /// Device, FIFO, or socket.
    Special,
}

/// A file about to be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// File type.
    pub kind: TargetKind,
    /// Size in bytes.
    pub size: u64,
    /// Device id.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
    /// Archive nesting depth; 0 for files not extracted from an archive.
    pub depth: u32,
}

impl ScanTarget {
    /// Builds a target from already-fetched metadata.
    pub fn from_metadata(path: impl Into<PathBuf>, metadata: &Metadata, depth: u32) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_file() {
            TargetKind::Regular
        } else if file_type.is_dir() {
            TargetKind::Directory
        } else if file_type.is_symlink() {
            TargetKind::Symlink
        } else {
            TargetKind::Special
        };

        Self {
            path: path.into(),
            kind,
            size: metadata.len(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            depth,
        }
    }

    /// Stats `path` (following symlinks) and builds a target.
    pub fn stat(path: impl AsRef<Path>, depth: u32) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata, depth))
    }

    /// Returns `true` for regular files.
    pub fn is_regular(&self) -> bool {
        self.kind == TargetKind::Regular
    }

    /// Returns the file name as a lossy string, for logging and suffix checks.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Counters accumulated over a scan.
///
/// Passed by `&mut` through the call chain. Workers scanning in parallel
/// keep one each and [`merge`](Self::merge) them at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Files submitted for scanning.
    pub files_scanned: u64,
    /// Detections reported by the engine.
    pub infected: u64,
    /// Infected files removed.
    pub removed: u64,
    /// Infected files that could not be removed.
    pub not_removed: u64,
    /// Infected files moved to quarantine.
    pub moved: u64,
    /// Infected files that could not be moved.
    pub not_moved: u64,
    /// Archives unpacked by an external program.
    pub archives_extracted: u64,
    /// Archives that fell back to a raw container scan.
    pub unpack_fallbacks: u64,
    /// Files skipped before submission.
    pub skipped: u64,
    /// Files that could not be read.
    pub errors: u64,
}

impl ScanStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds another set of counters into this one.
    pub fn merge(&mut self, other: &ScanStats) {
        self.files_scanned += other.files_scanned;
        self.infected += other.infected;
        self.removed += other.removed;
        self.not_removed += other.not_removed;
        self.moved += other.moved;
        self.not_moved += other.not_moved;
        self.archives_extracted += other.archives_extracted;
        self.unpack_fallbacks += other.unpack_fallbacks;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_merge() {
        let clean = ScanVerdict::Clean;
        let error = ScanVerdict::error("truncated");
        let infected = ScanVerdict::infected("Eicar-Test-Signature");

        assert!(clean.clone().merge(ScanVerdict::Clean).is_clean());
        assert!(clean.clone().merge(error.clone()).is_error());
        assert!(error.clone().merge(infected.clone()).is_infected());
        assert_eq!(
            infected
                .merge(ScanVerdict::infected("Other"))
                .signature(),
            Some("Eicar-Test-Signature")
        );
    }

    #[test]
    fn test_exit_signal_verdict() {
        assert!(ExitSignal::skipped(SkipReason::Empty).verdict().is_clean());
        assert!(ExitSignal::IoError.verdict().is_error());
        let signal: ExitSignal = ScanVerdict::infected("Test.Sig").into();
        assert!(signal.is_infected());
    }

    #[test]
    fn test_scan_target_stat() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        std::fs::write(&path, b"abc").unwrap();

        let target = ScanTarget::stat(&path, 2).unwrap();
        assert!(target.is_regular());
        assert_eq!(target.size, 3);
        assert_eq!(target.depth, 2);
        assert_eq!(target.file_name(), "sample.bin");

        let dir_target = ScanTarget::stat(dir.path(), 0).unwrap();
        assert_eq!(dir_target.kind, TargetKind::Directory);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = ScanStats {
            files_scanned: 3,
            infected: 1,
            ..ScanStats::default()
        };
        let b = ScanStats {
            files_scanned: 2,
            not_moved: 1,
            ..ScanStats::default()
        };
        a.merge(&b);
        assert_eq!(a.files_scanned, 5);
        assert_eq!(a.infected, 1);
        assert_eq!(a.not_moved, 1);
    }
}
