//! Mock engine for testing.
//!
//! This module provides a configurable engine that matches literal byte
//! signatures, so pipelines can be exercised end to end without a real
//! signature database.

use crate::core::{
    Engine, EngineLimits, FileHasher, FileInput, ScanError, ScanFlags, ScanVerdict,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// One call to [`MockEngine::submit`], as recorded by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// File name of the input, if known.
    pub filename: Option<String>,
    /// Flags the caller passed.
    pub flags: ScanFlags,
}

/// A mock engine for testing purposes.
///
/// Content is matched against named byte signatures; the first signature
/// found anywhere in the input wins. Specific inputs can be forced to a
/// verdict by BLAKE3 hash.
///
/// # Examples
///
/// ```rust
/// use sandscan::backends::MockEngine;
/// use sandscan::core::{Engine, EngineLimits, FileInput, ScanFlags, ScanVerdict};
///
/// let engine = MockEngine::new().with_signature("Test.Sig", b"EVIL");
/// let input = FileInput::from_bytes(b"xxEVILxx".to_vec());
/// let verdict = engine
///     .submit(&input, &EngineLimits::default(), ScanFlags::default())
///     .unwrap();
/// assert_eq!(verdict, ScanVerdict::infected("Test.Sig"));
/// ```
#[derive(Debug)]
pub struct MockEngine {
    /// Name of this engine instance.
    name: String,
    /// Byte signatures, checked in insertion order.
    signatures: Vec<(String, Vec<u8>)>,
    /// Verdicts keyed by BLAKE3 hash.
    responses: RwLock<HashMap<String, ScanVerdict>>,
    /// Verdict when nothing matches.
    default_outcome: ScanVerdict,
    /// Counter for submissions.
    scan_count: AtomicU64,
    /// Every submission, in order.
    history: RwLock<Vec<Submission>>,
}

impl MockEngine {
    /// Creates an engine with no signatures that reports everything clean.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            signatures: Vec::new(),
            responses: RwLock::new(HashMap::new()),
            default_outcome: ScanVerdict::Clean,
            scan_count: AtomicU64::new(0),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Sets the name of this engine.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a byte signature.
    pub fn with_signature(mut self, name: impl Into<String>, pattern: impl AsRef<[u8]>) -> Self {
        self.signatures.push((name.into(), pattern.as_ref().to_vec()));
        self
    }

    /// Sets the verdict for inputs that match nothing.
    pub fn with_default_outcome(mut self, outcome: ScanVerdict) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Forces the verdict for content with the given BLAKE3 hash.
    pub fn with_response(self, hash: impl Into<String>, outcome: ScanVerdict) -> Self {
        self.add_response(hash, outcome);
        self
    }

    /// Forces the verdict for content with the given BLAKE3 hash.
    pub fn add_response(&self, hash: impl Into<String>, outcome: ScanVerdict) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash.into(), outcome);
    }

    /// Returns the number of submissions.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Returns every submission so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn match_signature(&self, data: &[u8]) -> Option<&str> {
        self.signatures
            .iter()
            .find(|(_, pattern)| {
                !pattern.is_empty() && data.windows(pattern.len()).any(|w| w == pattern.as_slice())
            })
            .map(|(name, _)| name.as_str())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(
        &self,
        input: &FileInput,
        limits: &EngineLimits,
        flags: ScanFlags,
    ) -> Result<ScanVerdict, ScanError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Submission {
                filename: input.filename().map(String::from),
                flags,
            });

        let data = input.read_all()?;
        if limits.max_file_size > 0 && data.len() as u64 > limits.max_file_size {
            tracing::debug!(engine = %self.name, size = data.len(), "input over size limit, not scanned");
            return Ok(ScanVerdict::Clean);
        }

        let hash = FileHasher::new().hash_bytes(&data);
        if let Some(outcome) = self
            .responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash.as_str())
        {
            return Ok(outcome.clone());
        }

        Ok(match self.match_signature(&data) {
            Some(signature) => ScanVerdict::infected(signature),
            None => self.default_outcome.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(engine: &MockEngine, data: &[u8]) -> ScanVerdict {
        engine
            .submit(
                &FileInput::from_bytes(data.to_vec()),
                &EngineLimits::default(),
                ScanFlags::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_mock_engine_clean() {
        let engine = MockEngine::new();
        assert!(submit(&engine, b"test data").is_clean());
        assert_eq!(engine.scan_count(), 1);
    }

    #[test]
    fn test_mock_engine_signature() {
        let engine = MockEngine::new()
            .with_signature("First.Sig", b"AAA")
            .with_signature("Second.Sig", b"BBB");
        assert_eq!(submit(&engine, b"..BBB..AAA"), ScanVerdict::infected("First.Sig"));
        assert_eq!(submit(&engine, b"..BBB.."), ScanVerdict::infected("Second.Sig"));
        assert!(submit(&engine, b"..AB..").is_clean());
    }

    #[test]
    fn test_mock_engine_hash_response() {
        let data = b"known bad file";
        let hash = FileHasher::new().hash_bytes(data);
        let engine = MockEngine::new().with_response(hash.as_str(), ScanVerdict::error("corrupt"));
        assert_eq!(submit(&engine, data), ScanVerdict::error("corrupt"));
        assert!(submit(&engine, b"unknown file").is_clean());
    }

    #[test]
    fn test_mock_engine_size_limit() {
        let engine = MockEngine::new().with_signature("Test.Sig", b"EVIL");
        let input = FileInput::from_bytes(b"....EVIL....".to_vec());
        let flags = ScanFlags::default();

        let small = EngineLimits::default().with_max_file_size(4);
        assert!(engine.submit(&input, &small, flags).unwrap().is_clean());

        let unlimited = EngineLimits::default().with_max_file_size(0);
        assert_eq!(
            engine.submit(&input, &unlimited, flags).unwrap(),
            ScanVerdict::infected("Test.Sig")
        );
    }

    #[test]
    fn test_mock_engine_records_flags() {
        let engine = MockEngine::new();
        let input = FileInput::from_bytes(b"x".to_vec()).with_filename("a.zip");
        let flags = ScanFlags::default().without(ScanFlags::ARCHIVE);
        engine.submit(&input, &EngineLimits::default(), flags).unwrap();

        let history = engine.submissions();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename.as_deref(), Some("a.zip"));
        assert!(!history[0].flags.contains(ScanFlags::ARCHIVE));
    }

    #[test]
    fn test_mock_engine_unreadable_path() {
        let engine = MockEngine::new();
        let err = engine
            .submit(
                &FileInput::from_path("/nonexistent/sandscan/input"),
                &EngineLimits::default(),
                ScanFlags::default(),
            )
            .unwrap_err();
        assert!(err.is_io());
    }
}
