//! Effective permission checks on behalf of another identity.
//!
//! `access(2)` answers for the real uid of the calling process. When the
//! scanner runs as root and extraction happens as an unprivileged account,
//! the question "could that account read this file?" is answered by a
//! short-lived probe child that drops to the account first.

use super::identity::{is_privileged, UnprivilegedIdentity};

use std::ffi::CString;
use std::fmt;
use std::ops::BitOr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Bit set of access modes, using the `access(2)` bit values.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessMode(i32);

impl AccessMode {
    /// Read permission.
    pub const READ: Self = Self(libc::R_OK);
    /// Write permission.
    pub const WRITE: Self = Self(libc::W_OK);
    /// Execute or search permission.
    pub const EXECUTE: Self = Self(libc::X_OK);

    /// Raw `access(2)` mode bits.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for AccessMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        AccessMode(self.0 | rhs.0)
    }
}

impl fmt::Debug for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(Self::READ) { 'r' } else { '-' };
        let w = if self.contains(Self::WRITE) { 'w' } else { '-' };
        let x = if self.contains(Self::EXECUTE) { 'x' } else { '-' };
        write!(f, "AccessMode({}{}{})", r, w, x)
    }
}

/// Answer from [`AccessGate::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The subject has every requested permission.
    Granted,
    /// At least one requested permission is missing.
    Denied,
    /// The identity could no longer be found in the password database.
    IdentityLookupFailed,
    /// The probe process could not be forked.
    ProbeFailed {
        /// OS error number from `fork`.
        errno: i32,
    },
}

impl AccessDecision {
    /// Returns `true` for `Granted`.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Answers permission questions for the caller or for an unprivileged
/// identity.
#[derive(Debug, Clone, Copy)]
pub struct AccessGate {
    privileged: bool,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessGate {
    /// Creates a gate that detects whether the process is privileged.
    pub fn new() -> Self {
        Self {
            privileged: is_privileged(),
        }
    }

    /// Overrides privilege detection.
    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Returns `true` if the gate probes as a dropped identity.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Checks `mode` on `path` for `subject`, or for the caller when no
    /// subject is given or the caller cannot change identity.
    pub fn check(
        &self,
        path: &Path,
        subject: Option<&UnprivilegedIdentity>,
        mode: AccessMode,
    ) -> AccessDecision {
        let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
            return AccessDecision::Denied;
        };

        match subject {
            Some(identity) if self.privileged => {
                // Re-resolve so a deleted or renumbered account is caught
                // before anything runs as it.
                let Some(current) = UnprivilegedIdentity::lookup(&identity.name) else {
                    tracing::error!(user = %identity.name, "unprivileged user vanished");
                    return AccessDecision::IdentityLookupFailed;
                };
                probe_as(&cpath, &current, mode)
            }
            _ => direct(&cpath, mode),
        }
    }
}

fn direct(path: &CString, mode: AccessMode) -> AccessDecision {
    // SAFETY: `path` is a valid NUL-terminated string for the duration of
    // the call.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::access(path.as_ptr(), mode.bits()) };
    if rc == 0 {
        AccessDecision::Granted
    } else {
        AccessDecision::Denied
    }
}

const PROBE_GRANTED: i32 = 0;
const PROBE_DENIED: i32 = 1;
const PROBE_SETUP_FAILED: i32 = 2;

fn probe_as(path: &CString, identity: &UnprivilegedIdentity, mode: AccessMode) -> AccessDecision {
    let gid: libc::gid_t = identity.gid;
    let uid: libc::uid_t = identity.uid;

    // SAFETY: the child only performs async-signal-safe syscalls on data
    // prepared before the fork and leaves through `_exit`.
    #[allow(unsafe_code)]
    let pid = unsafe { libc::fork() };

    if pid < 0 {
        let err = std::io::Error::last_os_error();
        tracing::error!(error = %err, "cannot fork access probe");
        return AccessDecision::ProbeFailed {
            errno: err.raw_os_error().unwrap_or(libc::EAGAIN),
        };
    }

    if pid == 0 {
        // SAFETY: child side of fork; see above.
        #[allow(unsafe_code)]
        unsafe {
            if libc::setgroups(1, &gid) != 0 || libc::setgid(gid) != 0 || libc::setuid(uid) != 0 {
                libc::_exit(PROBE_SETUP_FAILED);
            }
            let code = if libc::access(path.as_ptr(), mode.bits()) == 0 {
                PROBE_GRANTED
            } else {
                PROBE_DENIED
            };
            libc::_exit(code);
        }
    }

    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `pid` is our own child and `status` is a live local.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == pid {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            tracing::warn!(error = %err, "waitpid on access probe failed");
            return AccessDecision::Denied;
        }
    }

    if libc::WIFEXITED(status) {
        match libc::WEXITSTATUS(status) {
            PROBE_GRANTED => return AccessDecision::Granted,
            PROBE_SETUP_FAILED => {
                tracing::warn!(user = %identity.name, "access probe could not drop privileges");
            }
            _ => {}
        }
    }
    AccessDecision::Denied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_access_mode_bits() {
        let mode = AccessMode::WRITE | AccessMode::EXECUTE;
        assert!(mode.contains(AccessMode::WRITE));
        assert!(!mode.contains(AccessMode::READ));
        assert_eq!(mode.bits(), libc::W_OK | libc::X_OK);
        assert_eq!(format!("{:?}", mode), "AccessMode(-wx)");
    }

    #[test]
    fn test_direct_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("readable");
        std::fs::write(&path, b"x").unwrap();

        let gate = AccessGate::new().with_privileged(false);
        assert_eq!(
            gate.check(&path, None, AccessMode::READ),
            AccessDecision::Granted
        );
        assert_eq!(
            gate.check(&dir.path().join("missing"), None, AccessMode::READ),
            AccessDecision::Denied
        );
    }

    #[test]
    fn test_identity_ignored_when_unprivileged() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let ghost = UnprivilegedIdentity::new("sandscan-no-such-user-4711", 65000, 65000);
        let gate = AccessGate::new().with_privileged(false);
        assert!(gate.check(&path, Some(&ghost), AccessMode::READ).is_granted());
    }

    #[test]
    fn test_vanished_identity_when_privileged() {
        if !is_privileged() {
            return;
        }
        let ghost = UnprivilegedIdentity::new("sandscan-no-such-user-4711", 65000, 65000);
        let gate = AccessGate::new();
        assert_eq!(
            gate.check(Path::new("/"), Some(&ghost), AccessMode::READ),
            AccessDecision::IdentityLookupFailed
        );
    }

    #[test]
    fn test_probe_as_nobody() {
        if !is_privileged() {
            return;
        }
        let Some(nobody) = UnprivilegedIdentity::lookup("nobody") else {
            return;
        };

        let file = tempfile::NamedTempFile::new_in("/tmp").unwrap();
        let gate = AccessGate::new();

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        assert_eq!(
            gate.check(file.path(), Some(&nobody), AccessMode::READ),
            AccessDecision::Denied
        );

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(
            gate.check(file.path(), Some(&nobody), AccessMode::READ),
            AccessDecision::Granted
        );
    }
}
