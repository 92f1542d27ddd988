//! Directory enumeration with `walkdir`.

use crate::core::{FatalError, ScanTarget, ScanVerdict, TreeWalker, VisitFn};

use std::path::Path;
use walkdir::WalkDir;

/// Default maximum archive nesting depth.
pub const DEFAULT_MAX_RECURSION: u32 = 8;

/// Walks directory trees in file-name order without following symlinks.
#[derive(Debug, Clone)]
pub struct WalkdirTreeWalker {
    max_recursion: u32,
}

impl Default for WalkdirTreeWalker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECURSION)
    }
}

impl WalkdirTreeWalker {
    /// Creates a walker that refuses roots nested deeper than
    /// `max_recursion` archives.
    pub fn new(max_recursion: u32) -> Self {
        Self { max_recursion }
    }

    /// Returns the recursion limit.
    pub fn max_recursion(&self) -> u32 {
        self.max_recursion
    }
}

impl TreeWalker for WalkdirTreeWalker {
    fn walk(
        &self,
        root: &Path,
        depth: u32,
        visit: &mut VisitFn<'_>,
    ) -> Result<ScanVerdict, FatalError> {
        if depth > self.max_recursion {
            tracing::warn!(
                root = %root.display(),
                depth,
                max = self.max_recursion,
                "archive recursion limit reached, not descending"
            );
            return Ok(ScanVerdict::Clean);
        }

        let mut verdict = ScanVerdict::Clean;

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "cannot read directory entry");
                    verdict = verdict.merge(ScanVerdict::error(e.to_string()));
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if file_type.is_symlink() {
                tracing::debug!(path = %entry.path().display(), "symbolic link skipped");
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "cannot stat file");
                    continue;
                }
            };

            let target = ScanTarget::from_metadata(entry.path(), &metadata, depth);
            let signal = visit(target)?;
            verdict = verdict.merge(signal.verdict());
        }

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExitSignal;
    use std::path::PathBuf;

    #[test]
    fn test_walk_sorted_and_aggregated() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a").join("evil.bin"), b"x").unwrap();
        std::os::unix::fs::symlink("/etc/passwd", dir.path().join("link")).unwrap();

        let mut seen: Vec<PathBuf> = Vec::new();
        let walker = WalkdirTreeWalker::new(4);
        let verdict = walker
            .walk(dir.path(), 2, &mut |target: ScanTarget| {
                assert_eq!(target.depth, 2);
                seen.push(target.path.clone());
                if target.file_name() == "evil.bin" {
                    Ok(ExitSignal::Infected {
                        signature: "Test.Sig".into(),
                    })
                } else {
                    Ok(ExitSignal::Clean)
                }
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![dir.path().join("a").join("evil.bin"), dir.path().join("b.txt")]
        );
        assert_eq!(verdict.signature(), Some("Test.Sig"));
    }

    #[test]
    fn test_recursion_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), b"x").unwrap();

        let mut visits = 0;
        let walker = WalkdirTreeWalker::new(1);
        let verdict = walker
            .walk(dir.path(), 2, &mut |_| {
                visits += 1;
                Ok(ExitSignal::Clean)
            })
            .unwrap();
        assert!(verdict.is_clean());
        assert_eq!(visits, 0);
    }

    #[test]
    fn test_fatal_error_stops_walk() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a"), b"x").unwrap();
        std::fs::write(dir.path().join("b"), b"x").unwrap();

        let mut visits = 0;
        let result = WalkdirTreeWalker::default().walk(dir.path(), 0, &mut |_| {
            visits += 1;
            Err(FatalError::IdentityLookup {
                user: "clamav".into(),
            })
        });
        assert!(matches!(result, Err(FatalError::IdentityLookup { .. })));
        assert_eq!(visits, 1);
    }
}
