//! Scan orchestration.
//!
//! The [`ScanOrchestrator`] ties the pipeline together: it filters each
//! file, hands archives to the sandboxed unpacker, rescans what comes out,
//! and applies the configured action to detections.

pub mod options;
mod orchestrator;

pub use options::ScanOptions;
pub use orchestrator::{ScanOrchestrator, ScanOrchestratorBuilder, ScanSummary};
