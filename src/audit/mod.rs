//! Structured audit logging.
//!
//! Audit events are ordinary `tracing` events under the
//! [`AUDIT_TARGET`] target, so any subscriber (JSON file, syslog bridge)
//! can route them separately from diagnostic logs.

mod events;

pub use events::{
    emit_quarantine, emit_removal, emit_scan_summary, emit_unpack, DetectionAuditEvent,
    AUDIT_TARGET,
};
