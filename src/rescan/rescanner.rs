//! Feeding extracted content back through the scan pipeline.

use crate::core::{FatalError, ScanVerdict, TreeWalker, VisitFn};
use crate::sandbox::ScratchDir;

/// Walks a scratch directory one archive level deeper and removes it
/// afterwards.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveRescanner<'w> {
    walker: &'w dyn TreeWalker,
}

impl<'w> RecursiveRescanner<'w> {
    /// Creates a rescanner over `walker`.
    pub fn new(walker: &'w dyn TreeWalker) -> Self {
        Self { walker }
    }

    /// Rescans the content of `scratch` at `depth + 1`.
    ///
    /// `scratch` is consumed, so it is removed when this returns, whether
    /// with a verdict or a fatal error, and during unwinding.
    pub fn rescan(
        &self,
        scratch: ScratchDir,
        depth: u32,
        visit: &mut VisitFn<'_>,
    ) -> Result<ScanVerdict, FatalError> {
        if let Err(e) = scratch.fix_permissions() {
            tracing::debug!(path = %scratch.path().display(), error = %e, "permission fix-up incomplete");
        }

        tracing::debug!(path = %scratch.path().display(), depth = depth + 1, "rescanning extracted content");
        self.walker.walk(scratch.path(), depth + 1, visit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExitSignal;
    use crate::rescan::WalkdirTreeWalker;

    #[test]
    fn test_rescan_removes_scratch() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), None).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("payload"), b"x").unwrap();

        let walker = WalkdirTreeWalker::new(8);
        let rescanner = RecursiveRescanner::new(&walker);
        let mut depths = Vec::new();
        let verdict = rescanner
            .rescan(scratch, 3, &mut |target| {
                depths.push(target.depth);
                Ok(ExitSignal::Infected {
                    signature: "Inner.Sig".into(),
                })
            })
            .unwrap();

        assert!(verdict.is_infected());
        assert_eq!(depths, vec![4]);
        assert!(!path.exists());
    }

    #[test]
    fn test_rescan_removes_scratch_on_fatal() {
        let root = tempfile::TempDir::new().unwrap();
        let scratch = ScratchDir::create(root.path(), None).unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(path.join("payload"), b"x").unwrap();

        let walker = WalkdirTreeWalker::new(8);
        let result = RecursiveRescanner::new(&walker).rescan(scratch, 0, &mut |_| {
            Err(FatalError::Fork {
                program: "probe".into(),
                source: std::io::Error::from_raw_os_error(libc::EAGAIN),
            })
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
