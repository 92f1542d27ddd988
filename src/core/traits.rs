//! Seams to the external collaborators of the scan pipeline.
//!
//! The orchestrator depends on three capabilities it does not implement
//! itself: a signature [`Engine`], a [`TreeWalker`] that enumerates
//! directories, and a [`PathFilter`] for include/exclude rules. Each has a
//! default implementation elsewhere in the crate.

use crate::core::error::{FatalError, ScanError};
use crate::core::flags::{EngineLimits, ScanFlags};
use crate::core::input::FileInput;
use crate::core::types::{ExitSignal, ScanTarget, ScanVerdict};

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// A signature-matching engine.
///
/// # Implementation Notes
///
/// - `Err` means the input itself could not be read. The orchestrator
///   reports it as an I/O error for that file.
/// - `Ok(ScanVerdict::Error { .. })` is a failure inside the engine
///   (corrupt data, limit exceeded, lost connection mid-scan).
/// - Implementations must never panic.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use sandscan::core::{Engine, EngineLimits, FileInput, ScanError, ScanFlags, ScanVerdict};
///
/// #[derive(Debug)]
/// struct AlwaysClean;
///
/// impl Engine for AlwaysClean {
///     fn name(&self) -> &str {
///         "always-clean"
///     }
///
///     fn submit(
///         &self,
///         _input: &FileInput,
///         _limits: &EngineLimits,
///         _flags: ScanFlags,
///     ) -> Result<ScanVerdict, ScanError> {
///         Ok(ScanVerdict::Clean)
///     }
/// }
/// ```
pub trait Engine: Send + Sync + Debug {
    /// Returns a stable identifier such as "clamd" or "mock".
    fn name(&self) -> &str;

    /// Scans `input` with the given limits and options.
    fn submit(
        &self,
        input: &FileInput,
        limits: &EngineLimits,
        flags: ScanFlags,
    ) -> Result<ScanVerdict, ScanError>;
}

/// Callback invoked for every file a [`TreeWalker`] visits.
pub type VisitFn<'a> = dyn FnMut(ScanTarget) -> Result<ExitSignal, FatalError> + 'a;

/// Enumerates a directory tree and feeds each file to a visitor.
pub trait TreeWalker: Send + Sync + Debug {
    /// Walks `root`, calling `visit` for every file found.
    ///
    /// `depth` is the archive nesting depth of `root` itself and is copied
    /// into every [`ScanTarget`]. A walker must refuse to descend once
    /// `depth` exceeds its configured recursion limit. The returned verdict
    /// aggregates every visited file: any infection makes it infected.
    fn walk(
        &self,
        root: &Path,
        depth: u32,
        visit: &mut VisitFn<'_>,
    ) -> Result<ScanVerdict, FatalError>;
}

/// Result of applying include/exclude rules to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// The path should be scanned.
    Scan,
    /// An exclude rule matched.
    Excluded,
    /// Include rules exist and none matched.
    NotIncluded,
}

/// Decides whether a path is in scope.
pub trait PathFilter: Send + Sync + Debug {
    /// Applies the rules to `path`.
    fn admit(&self, path: &Path) -> FilterDecision;
}

/// A type alias for a shared engine.
pub type ArcEngine = Arc<dyn Engine>;

/// A type alias for a boxed tree walker.
pub type BoxedWalker = Box<dyn TreeWalker>;

/// A type alias for a boxed path filter.
pub type BoxedFilter = Box<dyn PathFilter>;

impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn submit(
        &self,
        input: &FileInput,
        limits: &EngineLimits,
        flags: ScanFlags,
    ) -> Result<ScanVerdict, ScanError> {
        (**self).submit(input, limits, flags)
    }
}
