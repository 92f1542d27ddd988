//! Error types for the sandscan library.
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - [`ScanError`] stays inside a single engine submission.
//! - [`QuarantineError`] stays inside a single disposition attempt and is
//!   counted, never escalated.
//! - [`FatalError`] is the only error that crosses the per-file boundary.
//!   It carries the process exit status the binary terminates with.

use crate::core::exit::ExitStatus;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while submitting input to a scanning engine.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// Failed to connect to the engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The input exceeds what the engine accepts.
    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// File not found at the specified path.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// An I/O error occurred while reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if the input itself could not be read.
    ///
    /// The orchestrator reports these as [`ExitSignal::IoError`] rather than
    /// as an engine failure.
    ///
    /// [`ExitSignal::IoError`]: crate::core::ExitSignal::IoError
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::FileNotFound { .. })
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnavailable { engine, .. } | Self::ConnectionFailed { engine, .. } => {
                Some(engine)
            }
            _ => None,
        }
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error type for quarantine operations.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// The quarantine directory is not writable and searchable by the caller.
    #[error("cannot write to quarantine directory '{}': {source}", dir.display())]
    Denied {
        /// The quarantine directory.
        dir: PathBuf,
        /// The underlying access error.
        #[source]
        source: std::io::Error,
    },

    /// The source file cannot be inspected.
    #[error("cannot stat '{}': {source}", path.display())]
    SourceUnavailable {
        /// The file that was to be quarantined.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Every numbered destination name is already taken.
    #[error("no free quarantine name for '{}' after {attempts} attempts", base.display())]
    NamesExhausted {
        /// The un-suffixed destination path.
        base: PathBuf,
        /// How many suffixed names were tried.
        attempts: u32,
    },

    /// Rename failed and the copy fallback failed too. The source is untouched.
    #[error("cannot move '{}' to '{}': {source}", from.display(), to.display())]
    CopyFailed {
        /// The source file.
        from: PathBuf,
        /// The intended destination.
        to: PathBuf,
        /// The copy error.
        #[source]
        source: std::io::Error,
    },

    /// The source path has no file name component.
    #[error("'{}' has no file name", path.display())]
    NoFileName {
        /// The offending path.
        path: PathBuf,
    },
}

/// Errors that terminate the whole scan.
///
/// Each variant maps to a reserved [`ExitStatus`]. Continuing past one of
/// these would run untrusted extraction programs with the wrong privileges
/// or leave the host in an inconsistent state.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The unprivileged account cannot be resolved.
    #[error("can't get information about user '{user}'")]
    IdentityLookup {
        /// The configured account name.
        user: String,
    },

    /// A child process could not be created.
    #[error("can't fork while running '{program}': {source}")]
    Fork {
        /// The program (or probe) being started.
        program: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The temp root is not writable by the extraction identity.
    #[error("can't write to the temporary directory '{}'", path.display())]
    TempDirNotWritable {
        /// The temp root.
        path: PathBuf,
    },

    /// A scratch directory or spool file could not be created.
    #[error("can't create a temporary directory in '{}': {source}", root.display())]
    TempDirCreate {
        /// The temp root.
        root: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The working directory is needed to absolutize a path and is unavailable.
    #[error("can't get absolute pathname of current working directory: {source}")]
    WorkingDirectory {
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Copying a file into a scratch area failed.
    #[error("I/O error while staging '{}': {source}", path.display())]
    Staging {
        /// The file being staged.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The scanning engine could not be initialized.
    #[error("engine initialization failed: {message}")]
    EngineInit {
        /// Description of the failure.
        message: String,
    },
}

impl FatalError {
    /// Returns the process exit status reserved for this error.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::IdentityLookup { .. } => ExitStatus::IdentityLookup,
            Self::Fork { .. } => ExitStatus::CannotFork,
            Self::TempDirNotWritable { .. } => ExitStatus::TempDirNotWritable,
            Self::TempDirCreate { .. } => ExitStatus::TempDirCreate,
            Self::WorkingDirectory { .. } => ExitStatus::WorkingDirectory,
            Self::Staging { .. } => ExitStatus::IoError,
            Self::Configuration { .. } => ExitStatus::InvalidConfiguration,
            Self::EngineInit { .. } => ExitStatus::EngineInit,
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for engine submissions.
pub type ScanResult<T> = Result<T, ScanError>;

/// A specialized `Result` type for quarantine operations.
pub type QuarantineResult<T> = Result<T, QuarantineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_is_io() {
        let io_err = ScanError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test error",
        ));
        assert!(io_err.is_io());

        let missing = ScanError::FileNotFound {
            path: "/nope".into(),
        };
        assert!(missing.is_io());

        let unavailable = ScanError::engine_unavailable("clamd", "socket closed");
        assert!(!unavailable.is_io());
    }

    #[test]
    fn test_scan_error_engine() {
        let err = ScanError::engine_unavailable("clamd", "service not running");
        assert_eq!(err.engine(), Some("clamd"));
        assert_eq!(ScanError::internal("boom").engine(), None);
    }

    #[test]
    fn test_fatal_error_exit_status() {
        let err = FatalError::IdentityLookup {
            user: "clamav".into(),
        };
        assert_eq!(err.exit_status().code(), 60);

        let err = FatalError::TempDirNotWritable {
            path: PathBuf::from("/tmp"),
        };
        assert_eq!(err.exit_status().code(), 64);

        let err = FatalError::TempDirCreate {
            root: PathBuf::from("/tmp"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "full"),
        };
        assert_eq!(err.exit_status().code(), 63);

        let err = FatalError::Fork {
            program: "unzip".into(),
            source: std::io::Error::from_raw_os_error(libc::EAGAIN),
        };
        assert_eq!(err.exit_status().code(), 61);
    }

    #[test]
    fn test_quarantine_error_display() {
        let err = QuarantineError::NamesExhausted {
            base: PathBuf::from("/q/evil.zip"),
            attempts: 1000,
        };
        assert!(err.to_string().contains("/q/evil.zip"));
        assert!(err.to_string().contains("1000"));
    }
}
