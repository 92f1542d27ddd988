//! Collision-safe relocation of infected files.

use crate::access::{AccessGate, AccessMode};
use crate::core::error::{QuarantineError, QuarantineResult};

use serde::Serialize;
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Number of numbered fallback names tried after the plain base name.
pub const MAX_SUFFIXES: u32 = 1000;

/// How a file reached the quarantine directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMethod {
    /// Hard-linked into place, then unlinked from the source. No data is
    /// copied.
    Linked,
    /// Copy with metadata, then unlink of the source.
    Copied,
}

/// Successful results of [`QuarantineMover::quarantine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// The file now lives at `destination` and the source is gone.
    Moved {
        /// Final location.
        destination: PathBuf,
        /// How it got there.
        method: MoveMethod,
    },
    /// The same inode is already in the quarantine directory. Nothing was
    /// written.
    AlreadyPresent {
        /// Existing location.
        destination: PathBuf,
    },
    /// The file landed but the source could not be unlinked.
    SourceRetained {
        /// Location of the quarantined file.
        destination: PathBuf,
        /// Why the unlink failed.
        error: String,
    },
}

impl QuarantineOutcome {
    /// Returns the destination path.
    pub fn destination(&self) -> &Path {
        match self {
            Self::Moved { destination, .. }
            | Self::AlreadyPresent { destination }
            | Self::SourceRetained { destination, .. } => destination,
        }
    }
}

/// Moves files into a quarantine directory without overwriting anything.
///
/// Every destination is claimed with a call that fails when the name
/// exists (`link(2)`, or `open(2)` with `O_CREAT | O_EXCL`), so a file or
/// symlink appearing under a candidate name between the lookup and the
/// move is skipped, never replaced or followed.
#[derive(Debug, Clone, Default)]
pub struct QuarantineMover {
    gate: AccessGate,
}

impl QuarantineMover {
    /// Creates a mover that checks permissions as the calling process.
    pub fn new() -> Self {
        Self {
            gate: AccessGate::new(),
        }
    }

    /// Moves `source` into `dir`.
    ///
    /// The destination is `dir/<name>`, then `dir/<name>.000` through
    /// `dir/<name>.999` when taken by a different file.
    pub fn quarantine(&self, source: &Path, dir: &Path) -> QuarantineResult<QuarantineOutcome> {
        if !self
            .gate
            .check(dir, None, AccessMode::WRITE | AccessMode::EXECUTE)
            .is_granted()
        {
            return Err(QuarantineError::Denied {
                dir: dir.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }

        let metadata = fs::metadata(source).map_err(|e| QuarantineError::SourceUnavailable {
            path: source.to_path_buf(),
            source: e,
        })?;
        let name = source.file_name().ok_or_else(|| QuarantineError::NoFileName {
            path: source.to_path_buf(),
        })?;

        let base = dir.join(name);
        for candidate in candidates(&base) {
            match fs::symlink_metadata(&candidate) {
                Ok(existing) if existing.dev() == metadata.dev() && existing.ino() == metadata.ino() => {
                    tracing::info!(
                        source = %source.display(),
                        destination = %candidate.display(),
                        "file already in quarantine"
                    );
                    return Ok(QuarantineOutcome::AlreadyPresent {
                        destination: candidate,
                    });
                }
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = %candidate.display(), error = %e, "cannot inspect candidate");
                    continue;
                }
            }

            let method = match fs::hard_link(source, &candidate) {
                Ok(()) => MoveMethod::Linked,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    tracing::debug!(
                        source = %source.display(),
                        error = %e,
                        "link failed, copying instead"
                    );
                    match copy_preserving(source, &candidate, &metadata) {
                        Ok(()) => MoveMethod::Copied,
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                        Err(e) => {
                            return Err(QuarantineError::CopyFailed {
                                from: source.to_path_buf(),
                                to: candidate,
                                source: e,
                            })
                        }
                    }
                }
            };

            return Ok(match fs::remove_file(source) {
                Ok(()) => QuarantineOutcome::Moved {
                    destination: candidate,
                    method,
                },
                Err(e) => QuarantineOutcome::SourceRetained {
                    destination: candidate,
                    error: e.to_string(),
                },
            });
        }

        Err(QuarantineError::NamesExhausted {
            base,
            attempts: MAX_SUFFIXES,
        })
    }
}

/// `base`, then `base.000` through `base.999`, without lossy conversion.
fn candidates(base: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    std::iter::once(base.to_path_buf()).chain((0..MAX_SUFFIXES).map(move |n| {
        let mut name = base.as_os_str().to_owned();
        name.push(format!(".{:03}", n));
        PathBuf::from(name)
    }))
}

/// Copies `source` into a newly created `destination` and restores mode,
/// ownership and timestamps from `metadata`.
///
/// Fails with `AlreadyExists` when anything, including a dangling symlink,
/// is at `destination`. A partial copy is removed; a pre-existing file is
/// never touched.
pub(crate) fn copy_preserving(source: &Path, destination: &Path, metadata: &Metadata) -> io::Result<()> {
    let mut output = File::options()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(destination)?;

    let result = File::open(source)
        .and_then(|mut input| io::copy(&mut input, &mut output))
        .and_then(|_| restore_metadata(&output, destination, metadata));
    if result.is_err() {
        drop(output);
        let _ = fs::remove_file(destination);
    }
    result
}

fn restore_metadata(file: &File, destination: &Path, metadata: &Metadata) -> io::Result<()> {
    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);
    file.set_times(times)?;

    // The real mode goes on last because chown may clear set-id bits.
    if let Err(e) = std::os::unix::fs::fchown(file, Some(metadata.uid()), Some(metadata.gid())) {
        tracing::debug!(path = %destination.display(), error = %e, "cannot restore ownership");
    }
    file.set_permissions(fs::Permissions::from_mode(metadata.mode() & 0o7777))
}
