//! The per-file scan state machine.

use crate::access::{AccessDecision, AccessGate, AccessMode, UnprivilegedIdentity};
use crate::audit::{self, DetectionAuditEvent};
use crate::core::{
    ArcEngine, BoxedFilter, BoxedWalker, Engine, ExitSignal, ExitStatus, FatalError, FileHasher,
    FileInput, FilterDecision, ScanFlags, ScanStats, ScanTarget, ScanVerdict, SkipReason,
    CONTAINER_SIGNATURE,
};
use crate::dispatch::{ExtractionDispatcher, ExtractionPlan};
use crate::manager::options::ScanOptions;
use crate::quarantine::{QuarantineMover, QuarantineOutcome};
use crate::rescan::{RecursiveRescanner, RegexPathFilter, WalkdirTreeWalker};
use crate::sandbox::{
    temp_root, IoRedirect, ResourceMonitor, SandboxedUnpacker, ScratchDir, UnpackOutcome,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Builder for a [`ScanOrchestrator`].
#[derive(Default)]
pub struct ScanOrchestratorBuilder {
    engine: Option<ArcEngine>,
    walker: Option<BoxedWalker>,
    filter: Option<BoxedFilter>,
    options: ScanOptions,
}

impl ScanOrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine.
    pub fn with_engine<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Sets an engine that is shared with the caller.
    pub fn with_arc_engine(mut self, engine: ArcEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the default `walkdir` tree walker.
    pub fn with_walker(mut self, walker: BoxedWalker) -> Self {
        self.walker = Some(walker);
        self
    }

    /// Replaces the filter compiled from the include and exclude patterns.
    pub fn with_filter(mut self, filter: BoxedFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the options.
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the orchestrator.
    ///
    /// Resolves the unprivileged account when running as root, so a
    /// missing account stops the run before any file is touched.
    pub fn build(self) -> Result<ScanOrchestrator, FatalError> {
        let engine = self.engine.ok_or_else(|| FatalError::EngineInit {
            message: "no engine configured".to_string(),
        })?;
        self.options.validate()?;

        let gate = AccessGate::new();
        let identity = match &self.options.unprivileged_user {
            Some(user) if gate.is_privileged() => Some(
                UnprivilegedIdentity::lookup(user)
                    .ok_or_else(|| FatalError::IdentityLookup { user: user.clone() })?,
            ),
            Some(user) => {
                tracing::debug!(user = %user, "not running as root, extractors keep the current identity");
                None
            }
            None => None,
        };

        let filter = match self.filter {
            Some(filter) => filter,
            None => Box::new(
                RegexPathFilter::new(&self.options.include, &self.options.exclude).map_err(
                    |e| FatalError::configuration(format!("invalid path pattern: {}", e)),
                )?,
            ),
        };
        let walker = self
            .walker
            .unwrap_or_else(|| Box::new(WalkdirTreeWalker::new(self.options.max_recursion)));

        let monitor = ResourceMonitor::new(self.options.quota)
            .with_poll_interval(self.options.poll_interval);
        let io = if self.options.quiet_unpackers {
            IoRedirect::Discard
        } else {
            IoRedirect::Inherit
        };

        let orchestrator = ScanOrchestrator {
            id: Uuid::new_v4(),
            engine,
            walker,
            filter,
            gate,
            identity,
            dispatcher: ExtractionDispatcher::new(self.options.unpackers.clone()),
            unpacker: SandboxedUnpacker::new(monitor).with_io(io),
            mover: QuarantineMover::new(),
            proc_dev: proc_device(),
            temp_root: temp_root(self.options.temp_root.as_deref()),
            options: self.options,
        };

        tracing::info!(
            scan_id = %orchestrator.id,
            engine = orchestrator.engine.name(),
            privileged = orchestrator.gate.is_privileged(),
            identity = ?orchestrator.identity.as_ref().map(ToString::to_string),
            temp_root = %orchestrator.temp_root.display(),
            "Scan orchestrator ready"
        );
        Ok(orchestrator)
    }
}

impl fmt::Debug for ScanOrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanOrchestratorBuilder")
            .field("has_engine", &self.engine.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Device id of `/proc`, when it is a pseudo-filesystem.
fn proc_device() -> Option<u64> {
    let metadata = fs::metadata("/proc").ok()?;
    (metadata.len() == 0).then(|| metadata.dev())
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Run identifier, shared with every audit event of the run.
    pub id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Accumulated counters.
    pub stats: ScanStats,
    /// Status the process should exit with.
    pub exit_status: ExitStatus,
    /// Numeric form of `exit_status`.
    pub exit_code: i32,
}

impl ScanSummary {
    /// Returns the wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "----------- SCAN SUMMARY -----------")?;
        writeln!(f, "Scanned files: {}", stats.files_scanned)?;
        writeln!(f, "Infected files: {}", stats.infected)?;
        if stats.removed > 0 || stats.not_removed > 0 {
            writeln!(f, "Removed: {}", stats.removed)?;
            writeln!(f, "Not removed: {}", stats.not_removed)?;
        }
        if stats.moved > 0 || stats.not_moved > 0 {
            writeln!(f, "Moved: {}", stats.moved)?;
            writeln!(f, "Not moved: {}", stats.not_moved)?;
        }
        writeln!(f, "Archives extracted: {}", stats.archives_extracted)?;
        writeln!(f, "Unpack fallbacks: {}", stats.unpack_fallbacks)?;
        writeln!(f, "Skipped: {}", stats.skipped)?;
        writeln!(f, "Errors: {}", stats.errors)?;
        let millis = self.duration().num_milliseconds().max(0);
        write!(f, "Time: {}.{:03} sec", millis / 1000, millis % 1000)
    }
}

/// Drives every file through filtering, extraction, rescanning, and
/// disposition.
///
/// Single-threaded: one file at a time, depth first through archives.
/// Callers wanting parallelism build one orchestrator per worker and merge
/// the resulting [`ScanStats`].
#[derive(Debug)]
pub struct ScanOrchestrator {
    id: Uuid,
    engine: ArcEngine,
    walker: BoxedWalker,
    filter: BoxedFilter,
    gate: AccessGate,
    identity: Option<UnprivilegedIdentity>,
    dispatcher: ExtractionDispatcher,
    unpacker: SandboxedUnpacker,
    mover: QuarantineMover,
    proc_dev: Option<u64>,
    temp_root: PathBuf,
    options: ScanOptions,
}

impl ScanOrchestrator {
    /// Creates a new builder.
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new()
    }

    /// Returns the run identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the options.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Returns the resolved temp root.
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Returns the identity extractors run as, if any.
    pub fn identity(&self) -> Option<&UnprivilegedIdentity> {
        self.identity.as_ref()
    }

    /// Scans the given command-line paths.
    ///
    /// No paths means the current directory. `-` reads standard input.
    /// Per-path problems are logged and reflected in the exit status;
    /// only a [`FatalError`] stops the run.
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> Result<ScanSummary, FatalError> {
        let started_at = Utc::now();
        let mut stats = ScanStats::new();
        let mut last_error = None;

        if paths.is_empty() {
            let cwd = std::env::current_dir()
                .map_err(|source| FatalError::WorkingDirectory { source })?;
            last_error = self.scan_path(&cwd, &mut stats)?;
        }

        for path in paths {
            let path = path.as_ref();
            if path == Path::new("-") {
                self.scan_stdin(&mut io::stdin().lock(), &mut stats)?;
                continue;
            }
            let path = absolute(path)?;
            if let Some(status) = self.scan_path(&path, &mut stats)? {
                last_error = Some(status);
            }
        }

        let exit_status = if stats.infected > 0 {
            ExitStatus::VirusFound
        } else {
            last_error.unwrap_or(ExitStatus::Clean)
        };
        let completed_at = Utc::now();
        audit::emit_scan_summary(self.id, started_at, completed_at, &stats, exit_status.code());

        Ok(ScanSummary {
            id: self.id,
            started_at,
            completed_at,
            stats,
            exit_status,
            exit_code: exit_status.code(),
        })
    }

    /// Scans one command-line path, returning the error status it earned.
    fn scan_path(
        &self,
        path: &Path,
        stats: &mut ScanStats,
    ) -> Result<Option<ExitStatus>, FatalError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "can't access file");
                return Ok(Some(ExitStatus::CannotAccess));
            }
        };

        if metadata.is_file() {
            let target = ScanTarget::from_metadata(path, &metadata, 0);
            return Ok(match self.scan_target(target, stats)? {
                ExitSignal::IoError | ExitSignal::AccessError => Some(ExitStatus::CannotOpen),
                _ => None,
            });
        }

        if metadata.is_dir() {
            self.walker
                .walk(path, 0, &mut |target: ScanTarget| self.scan_target(target, stats))?;
            return Ok(None);
        }

        tracing::error!(path = %path.display(), "not supported file type");
        Ok(Some(ExitStatus::UnsupportedFileType))
    }

    /// Spools `reader` into the temp root and scans it as one file.
    ///
    /// Detections are counted but no action is taken; there is no file to
    /// act on.
    pub fn scan_stdin<R: Read>(
        &self,
        reader: &mut R,
        stats: &mut ScanStats,
    ) -> Result<ExitSignal, FatalError> {
        self.require_writable_temp(None)?;

        let mut spool = tempfile::Builder::new()
            .prefix("sandscan.stdin.")
            .tempfile_in(&self.temp_root)
            .map_err(|source| FatalError::TempDirCreate {
                root: self.temp_root.clone(),
                source,
            })?;
        io::copy(reader, &mut spool).map_err(|source| FatalError::Staging {
            path: spool.path().to_path_buf(),
            source,
        })?;

        stats.files_scanned += 1;
        let label = Path::new("stdin");
        let input = FileInput::from_path(spool.path());
        let signal = match self.engine.submit(&input, &self.options.engine_limits, self.options.flags) {
            Ok(ScanVerdict::Infected { signature }) => {
                stats.infected += 1;
                tracing::info!(path = "stdin", signature = %signature, "FOUND");
                let hash = FileHasher::new().hash_file(spool.path()).ok();
                DetectionAuditEvent::new(self.id, label, &signature, hash.as_ref(), 0, self.engine.name())
                    .emit();
                ExitSignal::Infected { signature }
            }
            Ok(verdict) => ExitSignal::from(verdict),
            Err(e) if e.is_io() => {
                tracing::warn!(error = %e, "can't read spooled stdin");
                ExitSignal::IoError
            }
            Err(e) => ExitSignal::EngineError {
                reason: e.to_string(),
            },
        };

        self.record(label, &signal, stats);
        Ok(signal)
    }

    /// Scans one file, recursing into it when it is an archive.
    ///
    /// Per-file problems come back as an [`ExitSignal`] and are counted in
    /// `stats`. Only conditions that make continuing unsafe are returned
    /// as errors.
    pub fn scan_target(
        &self,
        target: ScanTarget,
        stats: &mut ScanStats,
    ) -> Result<ExitSignal, FatalError> {
        let signal = self.dispatch(&target, stats)?;
        self.record(&target.path, &signal, stats);
        Ok(signal)
    }

    fn record(&self, path: &Path, signal: &ExitSignal, stats: &mut ScanStats) {
        match signal {
            ExitSignal::Clean => tracing::info!(path = %path.display(), "OK"),
            ExitSignal::Infected { .. } => {}
            ExitSignal::Skipped { reason } => {
                stats.skipped += 1;
                tracing::debug!(path = %path.display(), reason = %reason, "skipped");
            }
            ExitSignal::AccessError => {
                stats.errors += 1;
                tracing::warn!(path = %path.display(), "access denied");
            }
            ExitSignal::IoError => {
                stats.errors += 1;
                tracing::warn!(path = %path.display(), "can't read file");
            }
            ExitSignal::EngineError { reason } => {
                stats.errors += 1;
                tracing::warn!(path = %path.display(), reason = %reason, "ERROR");
            }
        }
    }

    fn dispatch(&self, target: &ScanTarget, stats: &mut ScanStats) -> Result<ExitSignal, FatalError> {
        let path = &target.path;

        if self.proc_dev.is_some_and(|dev| dev == target.dev) {
            return Ok(ExitSignal::skipped(SkipReason::ProcFilesystem));
        }

        // Patterns describe the caller's tree, not scratch paths.
        if target.depth == 0 {
            match self.filter.admit(path) {
                FilterDecision::Scan => {}
                FilterDecision::Excluded => return Ok(ExitSignal::skipped(SkipReason::Excluded)),
                FilterDecision::NotIncluded => {
                    return Ok(ExitSignal::skipped(SkipReason::NotIncluded))
                }
            }
        }

        if !target.is_regular() {
            return Ok(ExitSignal::skipped(SkipReason::NotRegular));
        }
        if target.size == 0 {
            return Ok(ExitSignal::skipped(SkipReason::Empty));
        }

        if !self.gate.is_privileged() && !self.gate.check(path, None, AccessMode::READ).is_granted() {
            return Ok(ExitSignal::AccessError);
        }

        stats.files_scanned += 1;
        let mut flags = self.options.flags;

        if flags.contains(ScanFlags::ARCHIVE) && has_native_archive_suffix(path) {
            match self.submit(path, flags) {
                Ok(ScanVerdict::Infected { signature }) => {
                    return Ok(self.detected(target, &signature, stats))
                }
                Ok(ScanVerdict::Clean) => return Ok(ExitSignal::Clean),
                Err(e) if e.is_io() => {
                    tracing::warn!(path = %path.display(), error = %e, "can't read archive");
                    return Ok(ExitSignal::IoError);
                }
                Ok(ScanVerdict::Error { reason }) => {
                    tracing::debug!(path = %path.display(), reason = %reason, "engine could not unpack archive");
                    flags = flags.without(ScanFlags::ARCHIVE);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "engine could not unpack archive");
                    flags = flags.without(ScanFlags::ARCHIVE);
                }
            }
        }

        if let Some(plan) = self.dispatcher.plan(path) {
            return match self.gate.check(path, self.identity.as_ref(), AccessMode::READ) {
                AccessDecision::Granted => self.scan_compressed(target, &plan, flags, stats),
                AccessDecision::Denied if !self.gate.is_privileged() => {
                    tracing::warn!(path = %path.display(), "access denied to archive");
                    Ok(ExitSignal::AccessError)
                }
                AccessDecision::Denied => {
                    let max = self.options.engine_limits.max_file_size;
                    if max > 0 && target.size > max {
                        tracing::info!(path = %path.display(), size = target.size, max, "archive too big");
                        Ok(ExitSignal::skipped(SkipReason::TooLarge))
                    } else {
                        self.scan_denied(target, flags, stats)
                    }
                }
                AccessDecision::IdentityLookupFailed => Err(self.identity_error()),
                AccessDecision::ProbeFailed { errno } => Err(probe_error(errno)),
            };
        }

        Ok(self.submit_raw(target, flags, stats))
    }

    fn submit(&self, path: &Path, flags: ScanFlags) -> crate::core::ScanResult<ScanVerdict> {
        self.engine
            .submit(&FileInput::from_path(path), &self.options.engine_limits, flags)
    }

    /// Hands the file itself to the engine.
    fn submit_raw(&self, target: &ScanTarget, flags: ScanFlags, stats: &mut ScanStats) -> ExitSignal {
        match self.submit(&target.path, flags) {
            Ok(ScanVerdict::Infected { signature }) => self.detected(target, &signature, stats),
            Ok(verdict) => ExitSignal::from(verdict),
            Err(e) if e.is_io() => {
                tracing::debug!(path = %target.path.display(), error = %e, "engine can't read file");
                ExitSignal::IoError
            }
            Err(e) => ExitSignal::EngineError {
                reason: e.to_string(),
            },
        }
    }

    /// Extracts an archive the identity can read and rescans its content.
    fn scan_compressed(
        &self,
        target: &ScanTarget,
        plan: &ExtractionPlan,
        flags: ScanFlags,
        stats: &mut ScanStats,
    ) -> Result<ExitSignal, FatalError> {
        self.require_writable_temp(self.identity.as_ref())?;
        let scratch = self.create_scratch()?;

        let program = plan.program.to_string_lossy().into_owned();
        tracing::debug!(
            path = %target.path.display(),
            format = %plan.format,
            program = %program,
            scratch = %scratch.path().display(),
            "unpacking archive"
        );

        let outcome = self
            .unpacker
            .unpack(&plan.program, &plan.args, scratch.path(), self.identity.as_ref());
        let detail = match &outcome {
            UnpackOutcome::Success { exit_code } => Some(format!("exit code {}", exit_code)),
            UnpackOutcome::ForkFailed { error } => Some(error.to_string()),
            UnpackOutcome::ExecFailed { reason } => Some(reason.clone()),
            UnpackOutcome::KilledByQuota { usage } => {
                Some(format!("{} files, {} bytes", usage.files, usage.bytes))
            }
            UnpackOutcome::KilledByExternalSignal { signal } => Some(format!("signal {}", signal)),
        };
        audit::emit_unpack(self.id, &target.path, plan.format, outcome.label(), detail.as_deref());

        match outcome {
            UnpackOutcome::Success { exit_code } => {
                if exit_code != 0 {
                    tracing::debug!(path = %target.path.display(), exit_code, "extractor reported errors");
                }
                stats.archives_extracted += 1;

                let rescanner = RecursiveRescanner::new(self.walker.as_ref());
                let verdict = rescanner.rescan(scratch, target.depth, &mut |inner: ScanTarget| {
                    self.scan_target(inner, stats)
                })?;

                if verdict.is_infected() {
                    return Ok(self.detected(target, CONTAINER_SIGNATURE, stats));
                }
                Ok(self.submit_raw(target, flags.without(ScanFlags::ARCHIVE), stats))
            }
            UnpackOutcome::ForkFailed { error } => Err(FatalError::Fork {
                program,
                source: error,
            }),
            failed => {
                tracing::warn!(
                    path = %target.path.display(),
                    program = %program,
                    outcome = failed.label(),
                    detail = ?detail,
                    "extraction failed, scanning archive as a single file"
                );
                stats.unpack_fallbacks += 1;
                drop(scratch);
                Ok(self.submit_raw(target, flags.without(ScanFlags::ARCHIVE), stats))
            }
        }
    }

    /// Copies an archive the identity cannot read into a scratch directory
    /// it owns and scans the copy. A detection is applied to the original.
    fn scan_denied(
        &self,
        target: &ScanTarget,
        flags: ScanFlags,
        stats: &mut ScanStats,
    ) -> Result<ExitSignal, FatalError> {
        self.require_writable_temp(self.identity.as_ref())?;
        let scratch = self.create_scratch()?;

        let name = target
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "archive".into());
        let staged = scratch.path().join(name);
        let staging_error = |source| FatalError::Staging {
            path: target.path.clone(),
            source,
        };
        fs::copy(&target.path, &staged).map_err(staging_error)?;
        if let Err(e) = scratch.fix_permissions() {
            tracing::debug!(path = %scratch.path().display(), error = %e, "permission fix-up incomplete");
        }
        if let Some(identity) = &self.identity {
            std::os::unix::fs::chown(&staged, Some(identity.uid), Some(identity.gid))
                .map_err(staging_error)?;
        }
        tracing::debug!(
            path = %target.path.display(),
            staged = %staged.display(),
            flags = ?flags,
            "scanning staged copy of unreadable archive"
        );

        let rescanner = RecursiveRescanner::new(self.walker.as_ref());
        let verdict = rescanner.rescan(scratch, target.depth, &mut |inner: ScanTarget| {
            self.scan_target(inner, stats)
        })?;

        if verdict.is_infected() {
            tracing::info!(path = %target.path.display(), "Real infected archive");
            return Ok(self.detected(target, CONTAINER_SIGNATURE, stats));
        }
        Ok(ExitSignal::Clean)
    }

    fn create_scratch(&self) -> Result<ScratchDir, FatalError> {
        ScratchDir::create(&self.temp_root, self.identity.as_ref())
            .map(|scratch| scratch.with_retain(self.options.leave_temps))
            .map_err(|source| FatalError::TempDirCreate {
                root: self.temp_root.clone(),
                source,
            })
    }

    fn require_writable_temp(&self, subject: Option<&UnprivilegedIdentity>) -> Result<(), FatalError> {
        match self.gate.check(&self.temp_root, subject, AccessMode::WRITE) {
            AccessDecision::Granted => Ok(()),
            AccessDecision::Denied => Err(FatalError::TempDirNotWritable {
                path: self.temp_root.clone(),
            }),
            AccessDecision::IdentityLookupFailed => Err(self.identity_error()),
            AccessDecision::ProbeFailed { errno } => Err(probe_error(errno)),
        }
    }

    fn identity_error(&self) -> FatalError {
        FatalError::IdentityLookup {
            user: self.options.unprivileged_user.clone().unwrap_or_default(),
        }
    }

    /// Reports a detection. Files inside scratch directories are only
    /// logged; the action is taken on the outermost file.
    fn detected(&self, target: &ScanTarget, signature: &str, stats: &mut ScanStats) -> ExitSignal {
        tracing::info!(
            path = %target.path.display(),
            signature = %signature,
            depth = target.depth,
            "FOUND"
        );

        let hash = FileHasher::new().hash_file(&target.path).ok();
        DetectionAuditEvent::new(
            self.id,
            &target.path,
            signature,
            hash.as_ref(),
            target.depth,
            self.engine.name(),
        )
        .emit();

        if target.depth == 0 {
            stats.infected += 1;
            self.apply_action(&target.path, stats);
        }

        ExitSignal::Infected {
            signature: signature.to_string(),
        }
    }

    fn apply_action(&self, path: &Path, stats: &mut ScanStats) {
        if self.options.remove {
            match fs::remove_file(path) {
                Ok(()) => {
                    stats.removed += 1;
                    tracing::info!(path = %path.display(), "Removed");
                    audit::emit_removal(self.id, path, None);
                }
                Err(e) => {
                    stats.not_removed += 1;
                    tracing::warn!(path = %path.display(), error = %e, "can't remove");
                    audit::emit_removal(self.id, path, Some(&e.to_string()));
                }
            }
            return;
        }

        let Some(dir) = &self.options.quarantine_dir else {
            return;
        };
        match self.mover.quarantine(path, dir) {
            Ok(outcome) => {
                match &outcome {
                    QuarantineOutcome::Moved { destination, .. } => {
                        stats.moved += 1;
                        tracing::info!(path = %path.display(), destination = %destination.display(), "moved");
                    }
                    QuarantineOutcome::AlreadyPresent { destination } => {
                        stats.not_moved += 1;
                        tracing::warn!(path = %path.display(), destination = %destination.display(), "already in quarantine");
                    }
                    QuarantineOutcome::SourceRetained { destination, error } => {
                        stats.not_removed += 1;
                        tracing::warn!(
                            path = %path.display(),
                            destination = %destination.display(),
                            error = %error,
                            "copied to quarantine but can't unlink"
                        );
                    }
                }
                audit::emit_quarantine(self.id, path, Ok(&outcome));
            }
            Err(e) => {
                stats.not_moved += 1;
                tracing::warn!(path = %path.display(), error = %e, "can't move");
                audit::emit_quarantine(self.id, path, Err(&e.to_string()));
            }
        }
    }
}

/// Formats the engine unpacks natively when `ARCHIVE` is set.
fn has_native_archive_suffix(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".zip") || name.ends_with(".rar")
}

fn probe_error(errno: i32) -> FatalError {
    FatalError::Fork {
        program: "access probe".to_string(),
        source: io::Error::from_raw_os_error(errno),
    }
}

/// Makes `path` absolute and drops trailing separators.
fn absolute(path: &Path) -> Result<PathBuf, FatalError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| FatalError::WorkingDirectory { source })?
            .join(path)
    };
    Ok(joined.components().collect())
}
