//! Audit event types and emission functions.

use crate::core::{FileHash, ScanStats};
use crate::dispatch::ArchiveFormat;
use crate::quarantine::QuarantineOutcome;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Tracing target every audit event is emitted under.
pub const AUDIT_TARGET: &str = "sandscan::audit";

/// Audit record for a detection.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionAuditEvent {
    /// Event type.
    pub event_type: &'static str,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
    /// Scan run the detection belongs to.
    pub scan_id: Uuid,
    /// The file the action applies to.
    pub path: String,
    /// The reported signature.
    pub signature: String,
    /// BLAKE3 digest of the file, when it could be read.
    pub file_hash_blake3: Option<String>,
    /// Archive nesting depth of the file.
    pub depth: u32,
    /// Engine that reported it.
    pub engine: String,
}

impl DetectionAuditEvent {
    /// Creates a detection record stamped with the current time.
    pub fn new(
        scan_id: Uuid,
        path: &Path,
        signature: &str,
        hash: Option<&FileHash>,
        depth: u32,
        engine: &str,
    ) -> Self {
        Self {
            event_type: "detection",
            timestamp: Utc::now(),
            scan_id,
            path: path.display().to_string(),
            signature: signature.to_string(),
            file_hash_blake3: hash.map(|h| h.to_string()),
            depth,
            engine: engine.to_string(),
        }
    }

    /// Emits the record.
    pub fn emit(&self) {
        tracing::info!(
            target: AUDIT_TARGET,
            event_type = self.event_type,
            timestamp = %self.timestamp,
            scan_id = %self.scan_id,
            path = %self.path,
            signature = %self.signature,
            file_hash_blake3 = ?self.file_hash_blake3,
            depth = self.depth,
            engine = %self.engine,
            "Detection"
        );
    }
}

/// Emits an audit event for an extraction attempt.
pub fn emit_unpack(scan_id: Uuid, archive: &Path, format: ArchiveFormat, outcome: &str, detail: Option<&str>) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "unpack",
        scan_id = %scan_id,
        path = %archive.display(),
        format = %format,
        outcome = %outcome,
        detail = ?detail,
        "Archive extraction finished"
    );
}

/// Emits an audit event for a quarantine attempt.
pub fn emit_quarantine(scan_id: Uuid, source: &Path, result: Result<&QuarantineOutcome, &str>) {
    let (outcome, destination, error) = match result {
        Ok(QuarantineOutcome::Moved { destination, .. }) => ("moved", Some(destination.as_path()), None),
        Ok(QuarantineOutcome::AlreadyPresent { destination }) => {
            ("already_present", Some(destination.as_path()), None)
        }
        Ok(QuarantineOutcome::SourceRetained { destination, error }) => {
            ("source_retained", Some(destination.as_path()), Some(error.as_str()))
        }
        Err(error) => ("failed", None, Some(error)),
    };

    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "quarantine",
        scan_id = %scan_id,
        source = %source.display(),
        outcome = outcome,
        destination = ?destination.map(|d| d.display().to_string()),
        error = ?error,
        "Quarantine operation performed"
    );
}

/// Emits an audit event for a removal attempt.
pub fn emit_removal(scan_id: Uuid, path: &Path, error: Option<&str>) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "removal",
        scan_id = %scan_id,
        path = %path.display(),
        removed = error.is_none(),
        error = ?error,
        "Removal performed"
    );
}

/// Emits an audit event summarizing a finished run.
pub fn emit_scan_summary(
    scan_id: Uuid,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    stats: &ScanStats,
    exit_code: i32,
) {
    let duration_ms = (completed_at - started_at).num_milliseconds().max(0);
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = "scan_summary",
        scan_id = %scan_id,
        started_at = %started_at,
        completed_at = %completed_at,
        duration_ms,
        files_scanned = stats.files_scanned,
        infected = stats.infected,
        removed = stats.removed,
        not_removed = stats.not_removed,
        moved = stats.moved,
        not_moved = stats.not_moved,
        archives_extracted = stats.archives_extracted,
        unpack_fallbacks = stats.unpack_fallbacks,
        skipped = stats.skipped,
        errors = stats.errors,
        exit_code,
        "Scan finished"
    );
}
