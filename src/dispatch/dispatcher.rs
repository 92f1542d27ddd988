//! Suffix-based selection of an extraction strategy.

use super::format::{format_table, ArchiveFormat, PasswordPolicy, PATH_PLACEHOLDER};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::Path;

/// Which formats are extracted externally, and with which programs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnpackerConfig {
    /// Formats handed to an external extractor.
    pub enabled: BTreeSet<ArchiveFormat>,
    /// Program overrides per format.
    pub programs: BTreeMap<ArchiveFormat, String>,
}

impl UnpackerConfig {
    /// Enables every format with its default program.
    pub fn all() -> Self {
        Self {
            enabled: ArchiveFormat::ALL.into_iter().collect(),
            programs: BTreeMap::new(),
        }
    }

    /// Enables `format`, optionally overriding its program.
    pub fn enable(mut self, format: ArchiveFormat, program: Option<String>) -> Self {
        self.enabled.insert(format);
        if let Some(program) = program {
            self.programs.insert(format, program);
        }
        self
    }

    /// Returns `true` if `format` is enabled.
    pub fn is_enabled(&self, format: ArchiveFormat) -> bool {
        self.enabled.contains(&format)
    }
}

/// A concrete extractor invocation for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    /// Detected format.
    pub format: ArchiveFormat,
    /// Program to run.
    pub program: OsString,
    /// Arguments, with the archive path filled in.
    pub args: Vec<OsString>,
    /// Password handling baked into `args`.
    pub password_policy: PasswordPolicy,
}

/// Maps archive file names to extraction plans.
#[derive(Debug, Clone, Default)]
pub struct ExtractionDispatcher {
    config: UnpackerConfig,
}

impl ExtractionDispatcher {
    /// Creates a dispatcher for the enabled formats in `config`.
    pub fn new(config: UnpackerConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UnpackerConfig {
        &self.config
    }

    /// Detects the format of `path` by its suffix.
    ///
    /// Matching is case-insensitive and the longest matching suffix among
    /// enabled formats wins, so `.tar.gz` beats `.gz`.
    pub fn detect(&self, path: &Path) -> Option<ArchiveFormat> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();

        format_table()
            .iter()
            .filter(|spec| self.config.is_enabled(spec.format))
            .flat_map(|spec| spec.suffixes.iter().map(move |suffix| (spec.format, *suffix)))
            .filter(|(_, suffix)| name.len() > suffix.len() && name.ends_with(suffix))
            .max_by_key(|(_, suffix)| suffix.len())
            .map(|(format, _)| format)
    }

    /// Builds the extraction plan for `path`, or `None` if it should be
    /// scanned as a flat stream.
    pub fn plan(&self, path: &Path) -> Option<ExtractionPlan> {
        let format = self.detect(path)?;
        let spec = format.spec();

        let program = self
            .config
            .programs
            .get(&format)
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from(spec.program));

        let args = spec
            .args
            .iter()
            .map(|arg| {
                if *arg == PATH_PLACEHOLDER {
                    path.as_os_str().to_os_string()
                } else {
                    OsString::from(arg)
                }
            })
            .collect();

        tracing::trace!(path = %path.display(), format = %format, "extraction plan selected");

        Some(ExtractionPlan {
            format,
            program,
            args,
            password_policy: spec.password_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(plan: &ExtractionPlan) -> Vec<String> {
        plan.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_longest_suffix_wins() {
        let dispatcher = ExtractionDispatcher::new(UnpackerConfig::all());
        assert_eq!(
            dispatcher.detect(Path::new("/s/a.tar.gz")),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            dispatcher.detect(Path::new("/s/a.TAR.BZ2")),
            Some(ArchiveFormat::TarBz2)
        );
        assert_eq!(dispatcher.detect(Path::new("/s/a.gz")), Some(ArchiveFormat::Gzip));
        assert_eq!(dispatcher.detect(Path::new("/s/a.tgz")), Some(ArchiveFormat::TarGz));
    }

    #[test]
    fn test_disabled_format_falls_back_to_shorter_suffix() {
        let config = UnpackerConfig::default().enable(ArchiveFormat::Gzip, None);
        let dispatcher = ExtractionDispatcher::new(config);
        assert_eq!(
            dispatcher.detect(Path::new("/s/a.tar.gz")),
            Some(ArchiveFormat::Gzip)
        );
        assert!(dispatcher.plan(Path::new("/s/a.zip")).is_none());
    }

    #[test]
    fn test_unrecognized_suffix() {
        let dispatcher = ExtractionDispatcher::new(UnpackerConfig::all());
        assert!(dispatcher.plan(Path::new("/s/notes.txt")).is_none());
        assert!(dispatcher.plan(Path::new("/s/.zip")).is_none());
    }

    #[test]
    fn test_plan_args() {
        let dispatcher = ExtractionDispatcher::new(UnpackerConfig::all());

        let zip = dispatcher.plan(Path::new("/s/Evil.ZIP")).unwrap();
        assert_eq!(zip.program, OsString::from("unzip"));
        assert_eq!(args(&zip), ["-P", "clam", "-o", "/s/Evil.ZIP"]);
        assert_eq!(zip.password_policy, PasswordPolicy::DummyPassword);

        let rar = dispatcher.plan(Path::new("/s/locked.rar")).unwrap();
        assert_eq!(args(&rar), ["x", "-p-", "-y", "/s/locked.rar"]);

        let zoo = dispatcher.plan(Path::new("/s/old.zoo")).unwrap();
        assert_eq!(args(&zoo), ["-x", "-j", "./", "/s/old.zoo"]);
    }

    #[test]
    fn test_program_override() {
        let config = UnpackerConfig::default().enable(ArchiveFormat::Zip, Some("/opt/bin/unzip".into()));
        let plan = ExtractionDispatcher::new(config)
            .plan(Path::new("/s/a.zip"))
            .unwrap();
        assert_eq!(plan.program, OsString::from("/opt/bin/unzip"));
    }
}
