//! Process exit statuses.
//!
//! These values are a contract with whatever invokes the scanner, so they
//! never change meaning once assigned.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit status surfaced to the calling process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Nothing found, no fatal error.
    Clean,
    /// At least one detection.
    VirusFound,
    /// The configuration could not be used.
    InvalidConfiguration,
    /// The engine or its database failed to initialize.
    EngineInit,
    /// A command-line path is neither a regular file nor a directory.
    UnsupportedFileType,
    /// A command-line file could not be opened for scanning.
    CannotOpen,
    /// A command-line path could not be accessed.
    CannotAccess,
    /// The working directory could not be determined.
    WorkingDirectory,
    /// A file could not be copied into a scratch area.
    IoError,
    /// The unprivileged identity could not be resolved.
    IdentityLookup,
    /// A probe or unpacker process could not be forked.
    CannotFork,
    /// A temporary directory could not be created.
    TempDirCreate,
    /// The temporary root is not writable.
    TempDirNotWritable,
}

impl ExitStatus {
    /// Returns the numeric process exit code.
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::VirusFound => 1,
            Self::InvalidConfiguration => 40,
            Self::EngineInit => 50,
            Self::UnsupportedFileType => 52,
            Self::CannotOpen => 54,
            Self::CannotAccess => 56,
            Self::WorkingDirectory => 57,
            Self::IoError => 58,
            Self::IdentityLookup => 60,
            Self::CannotFork => 61,
            Self::TempDirCreate => 63,
            Self::TempDirNotWritable => 64,
        }
    }

    /// Returns `true` for statuses that indicate an error rather than a
    /// scan result.
    pub fn is_error(self) -> bool {
        self.code() >= 40
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Clean => "clean",
            Self::VirusFound => "virus found",
            Self::InvalidConfiguration => "invalid configuration",
            Self::EngineInit => "engine initialization failure",
            Self::UnsupportedFileType => "unsupported file type",
            Self::CannotOpen => "cannot open file",
            Self::CannotAccess => "cannot access file",
            Self::WorkingDirectory => "cannot determine working directory",
            Self::IoError => "I/O error",
            Self::IdentityLookup => "cannot resolve unprivileged user",
            Self::CannotFork => "cannot fork",
            Self::TempDirCreate => "cannot create temporary directory",
            Self::TempDirNotWritable => "cannot write temporary directory",
        };
        write!(f, "{} ({})", text, self.code())
    }
}
