//! Core types and traits for the sandscan library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Verdicts, exit signals, scan targets, statistics
//! - [`traits`] - The `Engine`, `TreeWalker` and `PathFilter` seams
//! - [`error`] - Structured error types
//! - [`exit`] - Process exit statuses
//! - [`flags`] - Engine scan flags and limits
//! - [`input`] - Engine input abstraction
//! - [`hasher`] - BLAKE3 file hashing

pub mod error;
pub mod exit;
pub mod flags;
pub mod hasher;
pub mod input;
pub mod traits;
pub mod types;

pub use error::{FatalError, QuarantineError, QuarantineResult, ScanError, ScanResult};
pub use exit::ExitStatus;
pub use flags::{EngineLimits, ScanFlags};
pub use hasher::{FileHash, FileHasher};
pub use input::FileInput;
pub use traits::{
    ArcEngine, BoxedFilter, BoxedWalker, Engine, FilterDecision, PathFilter, TreeWalker, VisitFn,
};
pub use types::{
    ExitSignal, ScanStats, ScanTarget, ScanVerdict, SkipReason, TargetKind, CONTAINER_SIGNATURE,
};
