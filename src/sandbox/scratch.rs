//! Scratch directories for a single extraction.

use crate::access::UnprivilegedIdentity;

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = "sandscan.";

/// Resolves the root under which scratch directories are created.
///
/// An explicit setting wins, then `TMPDIR`, then `/tmp`.
pub fn temp_root(configured: Option<&Path>) -> PathBuf {
    if let Some(root) = configured {
        return root.to_path_buf();
    }
    match std::env::var_os("TMPDIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("/tmp"),
    }
}

/// A uniquely named, mode 0700 directory owned by one extraction.
///
/// The directory is removed recursively when the value is dropped, unless
/// it was marked as retained.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
    retain: bool,
}

impl ScratchDir {
    /// Creates a new scratch directory under `root`, owned by `owner` when
    /// given.
    pub fn create(root: &Path, owner: Option<&UnprivilegedIdentity>) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700))?;

        if let Some(identity) = owner {
            std::os::unix::fs::chown(dir.path(), Some(identity.uid), Some(identity.gid))?;
        }

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "created scratch directory");
        Ok(Self {
            dir: Some(dir),
            path,
            retain: false,
        })
    }

    /// Keeps the directory on disk after drop.
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gives the owner full access to every directory and read/write
    /// access to every file below the scratch root.
    pub fn fix_permissions(&self) -> io::Result<()> {
        fix_permissions(&self.path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        if self.retain {
            #[allow(deprecated)]
            let kept = dir.into_path();
            tracing::info!(path = %kept.display(), "leaving scratch directory in place");
            return;
        }

        // Extractors may restore modes that block removal.
        if let Err(e) = fix_permissions(dir.path()) {
            tracing::debug!(path = %self.path.display(), error = %e, "permission fix-up incomplete");
        }
        if let Err(e) = dir.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot remove scratch directory");
        }
    }
}

/// Sets `u+rwx` on directories and `u+rw` on regular files below `root`.
///
/// Directories are fixed before they are read so that a mode 000 directory
/// written by an extractor can still be descended. Symlinks are not
/// followed.
pub fn fix_permissions(root: &Path) -> io::Result<()> {
    let mut pending = vec![root.to_path_buf()];
    let mut first_error = None;

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                first_error.get_or_insert(e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = fs::symlink_metadata(&path) else {
                continue;
            };
            let mode = metadata.permissions().mode();
            let result = if metadata.is_dir() {
                pending.push(path.clone());
                add_mode(&path, mode, 0o700)
            } else if metadata.is_file() {
                add_mode(&path, mode, 0o600)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn add_mode(path: &Path, current: u32, bits: u32) -> io::Result<()> {
    if current & bits == bits {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode((current | bits) & 0o7777))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_removed_on_drop() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), None).unwrap();
        let path = scratch.path().to_path_buf();

        assert!(path.is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);

        fs::write(path.join("extracted"), b"data").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_retained() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), None)
            .unwrap()
            .with_retain(true);
        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(path.is_dir());
    }

    #[test]
    fn test_removal_despite_locked_subdir() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), None).unwrap();
        let path = scratch.path().to_path_buf();

        let locked = path.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("inner"), b"x").unwrap();
        fs::set_permissions(&locked.join("inner"), fs::Permissions::from_mode(0o000)).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_fix_permissions() {
        let root = tempfile::TempDir::new().unwrap();
        let sub = root.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let file = sub.join("file");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o400)).unwrap();
        fs::set_permissions(&sub, fs::Permissions::from_mode(0o500)).unwrap();

        fix_permissions(root.path()).unwrap();
        assert_eq!(fs::metadata(&sub).unwrap().permissions().mode() & 0o700, 0o700);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o600, 0o600);
    }

    #[test]
    fn test_temp_root_explicit() {
        assert_eq!(temp_root(Some(Path::new("/var/scan"))), PathBuf::from("/var/scan"));
    }

    #[test]
    fn test_scratch_chown_as_root() {
        if !crate::access::is_privileged() {
            return;
        }
        let Some(nobody) = UnprivilegedIdentity::lookup("nobody") else {
            return;
        };
        use std::os::unix::fs::MetadataExt;

        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), Some(&nobody)).unwrap();
        let metadata = fs::metadata(scratch.path()).unwrap();
        assert_eq!(metadata.uid(), nobody.uid);
    }
}
