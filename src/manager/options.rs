//! Scan configuration.

use crate::core::{EngineLimits, FatalError, ScanFlags};
use crate::dispatch::{ArchiveFormat, UnpackerConfig};
use crate::rescan::DEFAULT_MAX_RECURSION;
use crate::sandbox::{ResourceQuota, DEFAULT_POLL_INTERVAL};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Everything that shapes one scan run.
///
/// Deserializes from a partial document; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Engine scan flags.
    pub flags: ScanFlags,

    /// Limits handed to the engine with every submission.
    pub engine_limits: EngineLimits,

    /// Limits on what a single extraction may write.
    pub quota: ResourceQuota,

    /// How often a running extractor's output is measured.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    /// Deepest archive nesting that is extracted and walked.
    pub max_recursion: u32,

    /// External extraction settings.
    pub unpackers: UnpackerConfig,

    /// Regular expressions a path must match to be scanned.
    pub include: Vec<String>,

    /// Regular expressions that exclude a path.
    pub exclude: Vec<String>,

    /// Unlink infected files.
    pub remove: bool,

    /// Move infected files here. Ignored when `remove` is set.
    pub quarantine_dir: Option<PathBuf>,

    /// Keep scratch directories after use.
    pub leave_temps: bool,

    /// Send extractor stdout and stderr to the null device.
    pub quiet_unpackers: bool,

    /// Where scratch directories and spool files are created.
    pub temp_root: Option<PathBuf>,

    /// Account extractors run as when the scanner is privileged.
    pub unprivileged_user: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            flags: ScanFlags::default(),
            engine_limits: EngineLimits::default(),
            quota: ResourceQuota::unlimited(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_recursion: DEFAULT_MAX_RECURSION,
            unpackers: UnpackerConfig::default(),
            include: Vec::new(),
            exclude: Vec::new(),
            remove: false,
            quarantine_dir: None,
            leave_temps: false,
            quiet_unpackers: false,
            temp_root: None,
            unprivileged_user: None,
        }
    }
}

impl ScanOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine scan flags.
    pub fn with_flags(mut self, flags: ScanFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the engine limits.
    pub fn with_engine_limits(mut self, limits: EngineLimits) -> Self {
        self.engine_limits = limits;
        self
    }

    /// Sets the extraction quota.
    pub fn with_quota(mut self, quota: ResourceQuota) -> Self {
        self.quota = quota;
        self
    }

    /// Sets the quota poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the archive recursion limit.
    pub fn with_max_recursion(mut self, depth: u32) -> Self {
        self.max_recursion = depth;
        self
    }

    /// Replaces the unpacker settings.
    pub fn with_unpackers(mut self, unpackers: UnpackerConfig) -> Self {
        self.unpackers = unpackers;
        self
    }

    /// Enables external extraction of `format`, optionally with another
    /// program.
    pub fn with_unpacker(mut self, format: ArchiveFormat, program: Option<String>) -> Self {
        self.unpackers = self.unpackers.enable(format, program);
        self
    }

    /// Adds an include pattern.
    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Adds an exclude pattern.
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Enables or disables removal of infected files.
    pub fn with_remove(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    /// Sets the quarantine directory.
    pub fn with_quarantine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.quarantine_dir = Some(dir.into());
        self
    }

    /// Keeps scratch directories after use.
    pub fn with_leave_temps(mut self, leave: bool) -> Self {
        self.leave_temps = leave;
        self
    }

    /// Silences extractor output.
    pub fn with_quiet_unpackers(mut self, quiet: bool) -> Self {
        self.quiet_unpackers = quiet;
        self
    }

    /// Sets the temp root.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Sets the unprivileged account name.
    pub fn with_unprivileged_user(mut self, user: impl Into<String>) -> Self {
        self.unprivileged_user = Some(user.into());
        self
    }

    /// Rejects values no scan can run with.
    pub fn validate(&self) -> Result<(), FatalError> {
        if self.poll_interval.is_zero() && !self.quota.is_unlimited() {
            return Err(FatalError::configuration(
                "poll_interval must be positive when a quota is set",
            ));
        }
        if let Some(user) = &self.unprivileged_user {
            if user.is_empty() {
                return Err(FatalError::configuration("unprivileged_user is empty"));
            }
        }
        if let Some(dir) = &self.quarantine_dir {
            if dir.as_os_str().is_empty() {
                return Err(FatalError::configuration("quarantine_dir is empty"));
            }
        }
        Ok(())
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Writes `duration` as a millisecond count.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    /// Reads a millisecond count.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ScanOptions::default();
        assert!(options.flags.contains(ScanFlags::ARCHIVE));
        assert_eq!(options.max_recursion, DEFAULT_MAX_RECURSION);
        assert_eq!(options.poll_interval, Duration::from_millis(50));
        assert!(options.quota.is_unlimited());
        assert!(options.unpackers.enabled.is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let options = ScanOptions::new()
            .with_remove(true)
            .with_quarantine_dir("/var/quarantine")
            .with_exclude(r"\.log$")
            .with_unpacker(ArchiveFormat::Zip, Some("/usr/local/bin/unzip".into()))
            .with_max_recursion(3);

        assert!(options.remove);
        assert_eq!(options.quarantine_dir, Some(PathBuf::from("/var/quarantine")));
        assert_eq!(options.exclude, vec![r"\.log$".to_string()]);
        assert!(options.unpackers.is_enabled(ArchiveFormat::Zip));
        assert_eq!(
            options.unpackers.programs.get(&ArchiveFormat::Zip).map(String::as_str),
            Some("/usr/local/bin/unzip")
        );
        assert_eq!(options.max_recursion, 3);
    }

    #[test]
    fn test_validate_rejects_zero_poll_with_quota() {
        let options = ScanOptions::new()
            .with_quota(ResourceQuota::new(10, 0))
            .with_poll_interval(Duration::ZERO);
        let err = options.validate().unwrap_err();
        assert_eq!(err.exit_status().code(), 40);

        let options = ScanOptions::new().with_poll_interval(Duration::ZERO);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_user() {
        let options = ScanOptions::new().with_unprivileged_user("");
        assert!(matches!(
            options.validate(),
            Err(FatalError::Configuration { .. })
        ));
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_toml_partial_document() {
        let text = r#"
            remove = true
            poll_interval = 20
            exclude = ["\\.bak$"]

            [quota]
            max_files = 100

            [unpackers]
            enabled = ["zip", "tgz"]
        "#;
        let options: ScanOptions = toml::from_str(text).unwrap();
        assert!(options.remove);
        assert_eq!(options.poll_interval, Duration::from_millis(20));
        assert_eq!(options.quota.max_files, Some(100));
        assert_eq!(options.quota.max_bytes, None);
        assert!(options.unpackers.is_enabled(ArchiveFormat::TarGz));
        assert!(!options.unpackers.is_enabled(ArchiveFormat::Rar));
        assert_eq!(options.max_recursion, DEFAULT_MAX_RECURSION);
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ScanOptions::new()
            .with_unprivileged_user("clamav")
            .with_temp_root("/var/tmp")
            .with_flags(ScanFlags::default().without(ScanFlags::MAIL));
        let json = serde_json::to_string(&options).unwrap();
        let back: ScanOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
