//! Quota enforcement for a running extraction.

use super::quota::{DirUsage, ResourceQuota};

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, ExitStatus as ProcessStatus};
use std::time::Duration;

/// Default delay between two usage polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// The child exited with this code.
    Exited(i32),
    /// The monitor killed the child after the scratch tree grew past the
    /// quota.
    KilledByQuota(DirUsage),
    /// The child died from a signal the monitor did not send.
    Signaled(i32),
}

/// Watches a scratch directory while an extraction runs.
#[derive(Debug, Clone)]
pub struct ResourceMonitor {
    quota: ResourceQuota,
    poll_interval: Duration,
}

impl ResourceMonitor {
    /// Creates a monitor with the default poll interval.
    pub fn new(quota: ResourceQuota) -> Self {
        Self {
            quota,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns the configured quota.
    pub fn quota(&self) -> &ResourceQuota {
        &self.quota
    }

    /// Waits for `child` to finish, killing it if `dir` exceeds the quota.
    ///
    /// The kill goes to the child's process group, so helpers it started
    /// (the decompressor behind `tar -z`) stop writing too.
    ///
    /// Without a quota this is a plain blocking wait.
    pub fn supervise(&self, child: &mut Child, dir: &Path) -> io::Result<ChildExit> {
        if self.quota.is_unlimited() {
            let status = child.wait()?;
            return Ok(classify(status, None));
        }

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(classify(status, None));
            }

            let usage = DirUsage::measure(dir);
            tracing::trace!(pid = child.id(), files = usage.files, bytes = usage.bytes, "scratch usage");

            if self.quota.exceeded_by(&usage) {
                tracing::warn!(
                    pid = child.id(),
                    files = usage.files,
                    bytes = usage.bytes,
                    max_files = ?self.quota.max_files,
                    max_bytes = ?self.quota.max_bytes,
                    "extraction exceeded quota, killing"
                );
                // The child may have exited between try_wait and here; in
                // that case kill fails and the real status is reported.
                let sent = kill_group(child);
                let status = child.wait()?;
                return Ok(classify(status, sent.then_some(usage)));
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}

/// Sends SIGKILL to the child's process group, or to the child alone when
/// it does not lead one.
fn kill_group(child: &mut Child) -> bool {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return child.kill().is_ok();
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the
    // process group led by the unreaped child.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if rc == 0 {
        return true;
    }
    child.kill().is_ok()
}

fn classify(status: ProcessStatus, quota_kill: Option<DirUsage>) -> ChildExit {
    if let Some(code) = status.code() {
        return ChildExit::Exited(code);
    }
    let signal = status.signal().unwrap_or(0);
    match quota_kill {
        Some(usage) if signal == libc::SIGKILL => ChildExit::KilledByQuota(usage),
        _ => ChildExit::Signaled(signal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    fn sh(script: &str, cwd: &Path) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(cwd)
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_unlimited_waits() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut child = sh("exit 3", dir.path());
        let monitor = ResourceMonitor::new(ResourceQuota::unlimited());
        assert_eq!(monitor.supervise(&mut child, dir.path()).unwrap(), ChildExit::Exited(3));
    }

    #[test]
    fn test_quota_kill() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut child = sh(
            "i=0; while [ $i -lt 200 ]; do echo x > f$i; i=$((i+1)); sleep 0.05; done",
            dir.path(),
        );
        let monitor = ResourceMonitor::new(ResourceQuota::new(1, 0))
            .with_poll_interval(Duration::from_millis(10));

        match monitor.supervise(&mut child, dir.path()).unwrap() {
            ChildExit::KilledByQuota(usage) => assert!(usage.files > 1),
            other => panic!("expected quota kill, got {:?}", other),
        }
    }

    #[test]
    fn test_within_quota() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut child = sh("echo hi > only", dir.path());
        let monitor = ResourceMonitor::new(ResourceQuota::new(5, 0))
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(monitor.supervise(&mut child, dir.path()).unwrap(), ChildExit::Exited(0));
    }

    #[test]
    fn test_external_signal() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut child = sh("kill -TERM $$", dir.path());
        let monitor = ResourceMonitor::new(ResourceQuota::new(100, 0))
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(
            monitor.supervise(&mut child, dir.path()).unwrap(),
            ChildExit::Signaled(libc::SIGTERM)
        );
    }

    #[test]
    fn test_kill_without_own_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("echo a > f1; echo b > f2; exec sleep 5")
            .current_dir(dir.path())
            .spawn()
            .unwrap();
        let monitor = ResourceMonitor::new(ResourceQuota::new(1, 0))
            .with_poll_interval(Duration::from_millis(10));

        assert!(matches!(
            monitor.supervise(&mut child, dir.path()).unwrap(),
            ChildExit::KilledByQuota(_)
        ));
    }
}
