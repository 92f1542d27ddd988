//! Running external extraction programs in a privilege-dropped child.
//!
//! The child drops supplementary groups, gid and uid (in that order) when
//! the scanner is privileged and an identity is configured, then changes
//! into the scratch directory and execs the extractor. Failures in those
//! setup steps are reported to the parent through a close-on-exec socket
//! carrying one [`ChildSetupStage`] byte. A completed setup writes a marker
//! byte instead, so an `execve` failure (which may be `EAGAIN` under
//! `RLIMIT_NPROC` after the uid switch) is never mistaken for a fork
//! failure.
//!
//! Each child leads its own process group so the monitor can kill helper
//! processes together with the extractor.

use super::monitor::{ChildExit, ResourceMonitor};
use super::quota::DirUsage;
use crate::access::{is_privileged, UnprivilegedIdentity};

use std::ffi::{CString, OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use thiserror::Error;

/// Setup step in the child that failed before exec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChildSetupStage {
    /// Dropping supplementary groups.
    SetGroups = 1,
    /// Switching the group id.
    SetGid = 2,
    /// Switching the user id.
    SetUid = 3,
    /// Entering the scratch directory.
    Chdir = 4,
}

/// Written to the report socket once every setup step has succeeded.
const SETUP_COMPLETE: u8 = 0xff;

impl ChildSetupStage {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::SetGroups),
            2 => Some(Self::SetGid),
            3 => Some(Self::SetUid),
            4 => Some(Self::Chdir),
            _ => None,
        }
    }
}

impl fmt::Display for ChildSetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetGroups => "setgroups",
            Self::SetGid => "setgid",
            Self::SetUid => "setuid",
            Self::Chdir => "chdir",
        };
        f.write_str(name)
    }
}

/// Where the child's stdout and stderr go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoRedirect {
    /// Share the scanner's stdout and stderr.
    #[default]
    Inherit,
    /// Send both to the null device.
    Discard,
}

/// Everything needed to start a sandboxed child.
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    /// Program to exec; names containing `/` are paths, others go
    /// through `PATH`.
    pub program: &'a OsStr,
    /// Arguments, without the program name.
    pub args: &'a [OsString],
    /// Working directory of the child.
    pub cwd: &'a Path,
    /// Account to drop to when the scanner is privileged.
    pub identity: Option<&'a UnprivilegedIdentity>,
    /// Output handling.
    pub io: IoRedirect,
}

/// Errors from [`spawn_sandboxed`].
#[derive(Debug, Error)]
pub enum SpawnError {
    /// A pre-exec setup step failed in the child.
    #[error("child setup failed at {stage} before running '{program}': {source}")]
    Setup {
        /// The program that was to be run.
        program: String,
        /// The failing step.
        stage: ChildSetupStage,
        /// The OS error from that step.
        #[source]
        source: io::Error,
    },

    /// Setup completed but `execve` failed (missing program, not
    /// executable, process limit of the dropped identity).
    #[error("cannot execute '{program}': {source}")]
    Exec {
        /// The program that was to be run.
        program: String,
        /// The OS error from `execve`.
        #[source]
        source: io::Error,
    },

    /// The process could not be created.
    #[error("cannot run '{program}': {source}")]
    Spawn {
        /// The program that was to be run.
        program: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },
}

impl SpawnError {
    /// Returns `true` when the kernel refused to create the process.
    pub fn is_fork_failure(&self) -> bool {
        match self {
            Self::Spawn { source, .. } => is_fork_errno(source),
            Self::Setup { .. } | Self::Exec { .. } => false,
        }
    }
}

fn is_fork_errno(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EAGAIN) | Some(libc::ENOMEM))
}

/// Starts `request.program` in a privilege-dropped child.
///
/// stdin is always the null device so extractors cannot prompt.
pub fn spawn_sandboxed(request: &SpawnRequest<'_>) -> Result<Child, SpawnError> {
    let program = request.program.to_string_lossy().into_owned();
    let spawn_err = |source: io::Error| SpawnError::Spawn {
        program: program.clone(),
        source,
    };

    let cwd = CString::new(request.cwd.as_os_str().as_bytes())
        .map_err(|e| spawn_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
    let drop_to = request
        .identity
        .filter(|_| is_privileged())
        .map(|identity| (identity.uid, identity.gid));

    // UnixStream sockets are created with SOCK_CLOEXEC, so a successful
    // exec closes the child's end and the parent reads nothing.
    let (mut report_rx, report_tx) = UnixStream::pair().map_err(&spawn_err)?;
    let report_fd = report_tx.as_raw_fd();

    let mut command = Command::new(request.program);
    command
        .args(request.args)
        .stdin(Stdio::null())
        .process_group(0);
    if request.io == IoRedirect::Discard {
        command.stdout(Stdio::null()).stderr(Stdio::null());
    }

    // SAFETY: the closure runs between fork and exec. It only calls
    // async-signal-safe functions on values captured by move and does
    // not allocate.
    #[allow(unsafe_code)]
    unsafe {
        command.pre_exec(move || {
            if let Some((uid, gid)) = drop_to {
                if libc::setgroups(1, &gid) != 0 {
                    return report_stage(report_fd, ChildSetupStage::SetGroups);
                }
                if libc::setgid(gid) != 0 {
                    return report_stage(report_fd, ChildSetupStage::SetGid);
                }
                if libc::setuid(uid) != 0 {
                    return report_stage(report_fd, ChildSetupStage::SetUid);
                }
            }
            if libc::chdir(cwd.as_ptr()) != 0 {
                return report_stage(report_fd, ChildSetupStage::Chdir);
            }
            write_report(report_fd, SETUP_COMPLETE);
            Ok(())
        });
    }

    let spawned = command.spawn();
    drop(report_tx);

    match spawned {
        Ok(child) => Ok(child),
        Err(source) => Err(match read_report(&mut report_rx) {
            Some(SETUP_COMPLETE) => SpawnError::Exec {
                program: program.clone(),
                source,
            },
            Some(byte) => match ChildSetupStage::from_byte(byte) {
                Some(stage) => SpawnError::Setup {
                    program: program.clone(),
                    stage,
                    source,
                },
                None => spawn_err(source),
            },
            None => spawn_err(source),
        }),
    }
}

fn report_stage(fd: libc::c_int, stage: ChildSetupStage) -> io::Result<()> {
    let err = io::Error::last_os_error();
    write_report(fd, stage as u8);
    Err(err)
}

fn write_report(fd: libc::c_int, byte: u8) {
    // SAFETY: `byte` is a live one-byte buffer; `fd` is the child's copy
    // of the report socket.
    #[allow(unsafe_code)]
    unsafe {
        libc::write(fd, (&byte as *const u8).cast(), 1);
    }
}

fn read_report(rx: &mut UnixStream) -> Option<u8> {
    rx.set_nonblocking(true).ok()?;
    let mut byte = [0u8; 1];
    match rx.read(&mut byte) {
        Ok(1) => Some(byte[0]),
        _ => None,
    }
}

/// Result of one extraction attempt.
#[derive(Debug)]
pub enum UnpackOutcome {
    /// The extractor ran to completion.
    Success {
        /// Its exit code; extractors often exit non-zero after partial
        /// success.
        exit_code: i32,
    },
    /// The kernel refused to create the child.
    ForkFailed {
        /// The OS error.
        error: io::Error,
    },
    /// The child could not become the extractor.
    ExecFailed {
        /// Description of the failure.
        reason: String,
    },
    /// The monitor killed the extractor for exceeding the quota.
    KilledByQuota {
        /// Scratch usage that triggered the kill.
        usage: DirUsage,
    },
    /// The extractor died from a signal the monitor did not send.
    KilledByExternalSignal {
        /// The signal number.
        signal: i32,
    },
}

impl UnpackOutcome {
    /// Short label for logs and audit events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ForkFailed { .. } => "fork_failed",
            Self::ExecFailed { .. } => "exec_failed",
            Self::KilledByQuota { .. } => "killed_by_quota",
            Self::KilledByExternalSignal { .. } => "killed_by_signal",
        }
    }

    /// Returns `true` for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Runs extractors under a [`ResourceMonitor`].
#[derive(Debug, Clone)]
pub struct SandboxedUnpacker {
    monitor: ResourceMonitor,
    io: IoRedirect,
}

impl SandboxedUnpacker {
    /// Creates an unpacker supervised by `monitor`.
    pub fn new(monitor: ResourceMonitor) -> Self {
        Self {
            monitor,
            io: IoRedirect::Inherit,
        }
    }

    /// Sets the output handling of extractors.
    pub fn with_io(mut self, io: IoRedirect) -> Self {
        self.io = io;
        self
    }

    /// Runs `program args` inside `scratch`, as `identity` when privileged.
    pub fn unpack(
        &self,
        program: &OsStr,
        args: &[OsString],
        scratch: &Path,
        identity: Option<&UnprivilegedIdentity>,
    ) -> UnpackOutcome {
        let request = SpawnRequest {
            program,
            args,
            cwd: scratch,
            identity,
            io: self.io,
        };

        let mut child = match spawn_sandboxed(&request) {
            Ok(child) => child,
            Err(SpawnError::Spawn { source, .. }) if is_fork_errno(&source) => {
                return UnpackOutcome::ForkFailed { error: source };
            }
            Err(err) => {
                return UnpackOutcome::ExecFailed {
                    reason: err.to_string(),
                }
            }
        };

        tracing::debug!(pid = child.id(), program = %program.to_string_lossy(), "extractor started");

        match self.monitor.supervise(&mut child, scratch) {
            Ok(ChildExit::Exited(exit_code)) => UnpackOutcome::Success { exit_code },
            Ok(ChildExit::KilledByQuota(usage)) => UnpackOutcome::KilledByQuota { usage },
            Ok(ChildExit::Signaled(signal)) => UnpackOutcome::KilledByExternalSignal { signal },
            Err(e) => UnpackOutcome::ExecFailed {
                reason: format!("cannot wait for extractor: {}", e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::quota::ResourceQuota;
    use std::time::Duration;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_unpack_success_in_scratch() {
        let scratch = tempfile::TempDir::new().unwrap();
        let unpacker = SandboxedUnpacker::new(ResourceMonitor::new(ResourceQuota::unlimited()));

        let outcome = unpacker.unpack(
            OsStr::new("sh"),
            &args(&["-c", "echo data > out.txt; exit 2"]),
            scratch.path(),
            None,
        );
        assert!(matches!(outcome, UnpackOutcome::Success { exit_code: 2 }));
        assert!(scratch.path().join("out.txt").is_file());
    }

    #[test]
    fn test_stdin_is_null() {
        let scratch = tempfile::TempDir::new().unwrap();
        let unpacker = SandboxedUnpacker::new(ResourceMonitor::new(ResourceQuota::unlimited()));

        let outcome = unpacker.unpack(
            OsStr::new("sh"),
            &args(&["-c", "if read line; then exit 1; else exit 0; fi"]),
            scratch.path(),
            None,
        );
        assert!(matches!(outcome, UnpackOutcome::Success { exit_code: 0 }));
    }

    #[test]
    fn test_missing_program_is_exec_failed() {
        let scratch = tempfile::TempDir::new().unwrap();
        let unpacker = SandboxedUnpacker::new(ResourceMonitor::new(ResourceQuota::unlimited()));

        let outcome = unpacker.unpack(
            OsStr::new("sandscan-missing-unpacker"),
            &args(&["x"]),
            scratch.path(),
            None,
        );
        assert!(matches!(outcome, UnpackOutcome::ExecFailed { .. }));
    }

    #[test]
    fn test_exec_failure_is_not_fork_failure() {
        let cwd = tempfile::TempDir::new().unwrap();
        let request = SpawnRequest {
            program: OsStr::new("/nonexistent/sandscan/unpacker"),
            args: &[],
            cwd: cwd.path(),
            identity: None,
            io: IoRedirect::Discard,
        };
        match spawn_sandboxed(&request) {
            Err(err @ SpawnError::Exec { .. }) => assert!(!err.is_fork_failure()),
            other => panic!("expected exec failure, got {:?}", other.map(|_| ())),
        }

        let err = SpawnError::Exec {
            program: "unrar".into(),
            source: io::Error::from_raw_os_error(libc::EAGAIN),
        };
        assert!(!err.is_fork_failure());
        let err = SpawnError::Spawn {
            program: "unrar".into(),
            source: io::Error::from_raw_os_error(libc::EAGAIN),
        };
        assert!(err.is_fork_failure());
    }

    #[test]
    fn test_child_leads_own_process_group() {
        let cwd = tempfile::TempDir::new().unwrap();
        let request = SpawnRequest {
            program: OsStr::new("sh"),
            args: &args(&["-c", "cut -d' ' -f5 /proc/$$/stat > pgid"]),
            cwd: cwd.path(),
            identity: None,
            io: IoRedirect::Discard,
        };
        let mut child = spawn_sandboxed(&request).unwrap();
        let pid = child.id();
        assert!(child.wait().unwrap().success());
        let pgid = std::fs::read_to_string(cwd.path().join("pgid")).unwrap();
        assert_eq!(pgid.trim(), pid.to_string());
    }

    #[test]
    fn test_chdir_failure_reports_stage() {
        let request = SpawnRequest {
            program: OsStr::new("true"),
            args: &[],
            cwd: Path::new("/nonexistent/sandscan/scratch"),
            identity: None,
            io: IoRedirect::Discard,
        };
        match spawn_sandboxed(&request) {
            Err(SpawnError::Setup { stage, .. }) => assert_eq!(stage, ChildSetupStage::Chdir),
            other => panic!("expected chdir setup failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_quota_kill_outcome() {
        let scratch = tempfile::TempDir::new().unwrap();
        let monitor = ResourceMonitor::new(ResourceQuota::new(1, 0))
            .with_poll_interval(Duration::from_millis(10));
        let unpacker = SandboxedUnpacker::new(monitor).with_io(IoRedirect::Discard);

        let outcome = unpacker.unpack(
            OsStr::new("sh"),
            &args(&[
                "-c",
                "i=0; while [ $i -lt 200 ]; do echo x > f$i; i=$((i+1)); sleep 0.05; done",
            ]),
            scratch.path(),
            None,
        );
        assert!(matches!(outcome, UnpackOutcome::KilledByQuota { .. }));
    }

    #[test]
    fn test_quota_kill_reaches_helpers() {
        let scratch = tempfile::TempDir::new().unwrap();
        let monitor = ResourceMonitor::new(ResourceQuota::new(1, 0))
            .with_poll_interval(Duration::from_millis(10));
        let unpacker = SandboxedUnpacker::new(monitor).with_io(IoRedirect::Discard);

        let outcome = unpacker.unpack(
            OsStr::new("sh"),
            &args(&[
                "-c",
                "sh -c 'sleep 0.5; echo late > late' & echo a > f1; echo b > f2; wait",
            ]),
            scratch.path(),
            None,
        );
        assert!(matches!(outcome, UnpackOutcome::KilledByQuota { .. }));

        std::thread::sleep(Duration::from_millis(1000));
        assert!(!scratch.path().join("late").exists());
    }

    #[test]
    fn test_privilege_drop_as_root() {
        if !is_privileged() {
            return;
        }
        let Some(nobody) = UnprivilegedIdentity::lookup("nobody") else {
            return;
        };
        let root = tempfile::TempDir::new().unwrap();
        let scratch = crate::sandbox::ScratchDir::create(root.path(), Some(&nobody)).unwrap();
        let unpacker = SandboxedUnpacker::new(ResourceMonitor::new(ResourceQuota::unlimited()));

        let outcome = unpacker.unpack(
            OsStr::new("sh"),
            &args(&["-c", "id -u > uid"]),
            scratch.path(),
            Some(&nobody),
        );
        assert!(outcome.is_success());
        let uid = std::fs::read_to_string(scratch.path().join("uid")).unwrap();
        assert_eq!(uid.trim(), nobody.uid.to_string());
    }
}
