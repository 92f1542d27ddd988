//! # Sandscan
//!
//! Sandboxed archive unpacking, recursive rescanning, and collision-safe
//! quarantine for command-line malware scanning.
//!
//! ## Overview
//!
//! Sandscan sits between a directory walk and a signature engine. For
//! every file it:
//!
//! - Applies include/exclude rules and skips empty or special files
//! - Hands archives to an external extractor running in a private scratch
//!   directory, as an unprivileged account when started by root, under a
//!   file-count and byte quota
//! - Feeds whatever was extracted back through the same pipeline, one
//!   nesting level deeper
//! - Removes or quarantines detected files without ever overwriting an
//!   earlier quarantined file
//! - Emits structured audit events for detections, extractions, and
//!   dispositions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sandscan::backends::MockEngine;
//! use sandscan::dispatch::ArchiveFormat;
//! use sandscan::prelude::*;
//!
//! fn main() -> Result<(), FatalError> {
//!     let engine = MockEngine::new().with_signature("Test.Sig", b"EVIL");
//!     let options = ScanOptions::new()
//!         .with_unpacker(ArchiveFormat::Zip, None)
//!         .with_quarantine_dir("/var/lib/sandscan/quarantine");
//!
//!     let orchestrator = ScanOrchestrator::builder()
//!         .with_engine(engine)
//!         .with_options(options)
//!         .build()?;
//!
//!     let summary = orchestrator.run(&["/srv/uploads"])?;
//!     println!("{}", summary);
//!     std::process::exit(summary.exit_code);
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the `cli` feature
//! - `cli` - The `sandscan` binary (clap, TOML configuration, log output)
//! - `clamav` - ClamAV daemon engine
//!
//! ## Architecture
//!
//! - **Core**: Verdicts, exit statuses, flags, errors, and the engine,
//!   walker, and filter traits
//! - **Access**: Permission checks as the unprivileged identity
//! - **Sandbox**: Scratch directories, quotas, and the extractor process
//! - **Dispatch**: Archive format detection and extractor invocation
//! - **Rescan**: Directory walking, path filters, and recursive rescans
//! - **Quarantine**: Moving detections aside
//! - **Manager**: Options and the per-file orchestrator
//! - **Audit**: Structured event logging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod access;
pub mod audit;
pub mod backends;
pub mod core;
pub mod dispatch;
pub mod manager;
pub mod quarantine;
pub mod rescan;
pub mod sandbox;

// Re-export commonly used types at the crate root
pub use crate::core::{
    Engine, ExitSignal, ExitStatus, FatalError, FileInput, ScanError, ScanStats, ScanTarget,
    ScanVerdict,
};

pub use crate::manager::{ScanOptions, ScanOrchestrator, ScanSummary};
pub use crate::quarantine::{QuarantineMover, QuarantineOutcome};

/// Prelude module for convenient imports.
///
/// ```rust
/// use sandscan::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        Engine, EngineLimits, ExitSignal, ExitStatus, FatalError, FileInput, ScanError,
        ScanFlags, ScanStats, ScanTarget, ScanVerdict,
    };
    pub use crate::manager::{ScanOptions, ScanOrchestrator, ScanSummary};
    pub use crate::quarantine::{QuarantineMover, QuarantineOutcome};
}
