//! Unprivileged account resolution.

use serde::Serialize;
use std::ffi::CString;
use std::fmt;

/// The account external extraction programs run as when the scanner is
/// started by root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnprivilegedIdentity {
    /// Account name.
    pub name: String,
    /// User id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
}

impl UnprivilegedIdentity {
    /// Creates an identity from already-known ids.
    pub fn new(name: impl Into<String>, uid: u32, gid: u32) -> Self {
        Self {
            name: name.into(),
            uid,
            gid,
        }
    }

    /// Looks up `name` in the password database.
    ///
    /// Returns `None` if the account does not exist or the lookup fails.
    pub fn lookup(name: &str) -> Option<Self> {
        let cname = CString::new(name).ok()?;
        let mut buf_len: usize = 4096;

        loop {
            let mut buf: Vec<libc::c_char> = vec![0; buf_len];
            // SAFETY: passwd is a plain C struct; all-zero is a valid
            // initial value that getpwnam_r overwrites on success.
            #[allow(unsafe_code)]
            let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
            let mut result: *mut libc::passwd = std::ptr::null_mut();

            // SAFETY: every pointer refers to a live local buffer and
            // buf_len is the true length of `buf`. The strings written
            // into `pwd` point into `buf`, which outlives their use here.
            #[allow(unsafe_code)]
            let rc = unsafe {
                libc::getpwnam_r(
                    cname.as_ptr(),
                    &mut pwd,
                    buf.as_mut_ptr(),
                    buf.len(),
                    &mut result,
                )
            };

            if rc == libc::ERANGE && buf_len < 1 << 20 {
                buf_len *= 4;
                continue;
            }
            if rc != 0 {
                tracing::debug!(user = name, errno = rc, "password database lookup failed");
                return None;
            }
            if result.is_null() {
                return None;
            }

            return Some(Self {
                name: name.to_string(),
                uid: pwd.pw_uid,
                gid: pwd.pw_gid,
            });
        }
    }
}

impl fmt::Display for UnprivilegedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.uid, self.gid)
    }
}

/// Returns `true` when the process runs with effective uid 0.
pub fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    #[allow(unsafe_code)]
    let euid = unsafe { libc::geteuid() };
    euid == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_root() {
        let root = UnprivilegedIdentity::lookup("root").unwrap();
        assert_eq!(root.uid, 0);
        assert_eq!(root.name, "root");
    }

    #[test]
    fn test_lookup_missing_user() {
        assert!(UnprivilegedIdentity::lookup("sandscan-no-such-user-4711").is_none());
        assert!(UnprivilegedIdentity::lookup("bad\0name").is_none());
    }

    #[test]
    fn test_display() {
        let id = UnprivilegedIdentity::new("clamav", 110, 120);
        assert_eq!(id.to_string(), "clamav (110:120)");
    }
}
