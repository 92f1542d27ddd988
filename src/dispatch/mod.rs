//! Archive format detection and extractor selection.
//!
//! - [`format`] - Supported formats and their extractor table
//! - [`dispatcher`] - `ExtractionDispatcher`, suffix matching and plans

pub mod dispatcher;
pub mod format;

pub use dispatcher::{ExtractionDispatcher, ExtractionPlan, UnpackerConfig};
pub use format::{format_table, ArchiveFormat, FormatSpec, PasswordPolicy};
