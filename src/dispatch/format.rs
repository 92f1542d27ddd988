//! Archive formats handled by external programs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an extractor is told about archive passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordPolicy {
    /// A fixed dummy password is passed so encrypted entries fail
    /// instead of prompting.
    DummyPassword,
    /// The extractor is told not to ask for a password.
    NoPassword,
    /// The format has no password support.
    NotApplicable,
}

/// An archive format with an external extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// ZIP archive.
    #[serde(rename = "zip")]
    Zip,
    /// Java archive.
    #[serde(rename = "jar")]
    Jar,
    /// RAR archive.
    #[serde(rename = "rar")]
    Rar,
    /// ARJ archive.
    #[serde(rename = "arj")]
    Arj,
    /// Zoo archive.
    #[serde(rename = "zoo")]
    Zoo,
    /// LHA/LZH archive.
    #[serde(rename = "lha")]
    Lha,
    /// Uncompressed tar.
    #[serde(rename = "tar")]
    Tar,
    /// Gzip-compressed tar.
    #[serde(rename = "tgz")]
    TarGz,
    /// Bzip2-compressed tar.
    #[serde(rename = "tbz2")]
    TarBz2,
    /// Debian package.
    #[serde(rename = "deb")]
    Deb,
    /// 7-Zip archive.
    #[serde(rename = "7z")]
    SevenZip,
    /// Single gzip stream.
    #[serde(rename = "gz")]
    Gzip,
    /// Single bzip2 stream.
    #[serde(rename = "bz2")]
    Bzip2,
}

/// Extractor invocation for one format. `{}` in `args` stands for the
/// archive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// The format.
    pub format: ArchiveFormat,
    /// Lowercase suffixes, including the leading dot.
    pub suffixes: &'static [&'static str],
    /// Default extractor program.
    pub program: &'static str,
    /// Argument template.
    pub args: &'static [&'static str],
    /// Password handling.
    pub password_policy: PasswordPolicy,
}

/// Placeholder replaced by the archive path.
pub const PATH_PLACEHOLDER: &str = "{}";

const FORMATS: &[FormatSpec] = &[
    FormatSpec {
        format: ArchiveFormat::Zip,
        suffixes: &[".zip"],
        program: "unzip",
        args: &["-P", "clam", "-o", "{}"],
        password_policy: PasswordPolicy::DummyPassword,
    },
    FormatSpec {
        format: ArchiveFormat::Jar,
        suffixes: &[".jar"],
        program: "unzip",
        args: &["-P", "clam", "-o", "{}"],
        password_policy: PasswordPolicy::DummyPassword,
    },
    FormatSpec {
        format: ArchiveFormat::Rar,
        suffixes: &[".rar"],
        program: "unrar",
        args: &["x", "-p-", "-y", "{}"],
        password_policy: PasswordPolicy::NoPassword,
    },
    FormatSpec {
        format: ArchiveFormat::Arj,
        suffixes: &[".arj"],
        program: "arj",
        args: &["x", "-y", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::Zoo,
        suffixes: &[".zoo"],
        program: "unzoo",
        args: &["-x", "-j", "./", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::Lha,
        suffixes: &[".lzh"],
        program: "lha",
        args: &["xf", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::Tar,
        suffixes: &[".tar"],
        program: "tar",
        args: &["-xpvf", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::TarGz,
        suffixes: &[".tar.gz", ".tgz"],
        program: "tar",
        args: &["-zxpvf", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::TarBz2,
        suffixes: &[".tar.bz2", ".tbz2"],
        program: "tar",
        args: &["-jxpvf", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::Deb,
        suffixes: &[".deb"],
        program: "ar",
        args: &["x", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::SevenZip,
        suffixes: &[".7z"],
        program: "7z",
        args: &["x", "-y", "-pclam", "{}"],
        password_policy: PasswordPolicy::DummyPassword,
    },
    FormatSpec {
        format: ArchiveFormat::Gzip,
        suffixes: &[".gz"],
        program: "7z",
        args: &["x", "-y", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
    FormatSpec {
        format: ArchiveFormat::Bzip2,
        suffixes: &[".bz2"],
        program: "7z",
        args: &["x", "-y", "{}"],
        password_policy: PasswordPolicy::NotApplicable,
    },
];

impl ArchiveFormat {
    /// Every format, in table order.
    pub const ALL: [ArchiveFormat; 13] = [
        Self::Zip,
        Self::Jar,
        Self::Rar,
        Self::Arj,
        Self::Zoo,
        Self::Lha,
        Self::Tar,
        Self::TarGz,
        Self::TarBz2,
        Self::Deb,
        Self::SevenZip,
        Self::Gzip,
        Self::Bzip2,
    ];

    /// Returns the extractor table entry for this format.
    pub fn spec(self) -> &'static FormatSpec {
        // The table is declared in variant order.
        &FORMATS[self as usize]
    }

    /// Configuration name of the format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Jar => "jar",
            Self::Rar => "rar",
            Self::Arj => "arj",
            Self::Zoo => "zoo",
            Self::Lha => "lha",
            Self::Tar => "tar",
            Self::TarGz => "tgz",
            Self::TarBz2 => "tbz2",
            Self::Deb => "deb",
            Self::SevenZip => "7z",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Parses a configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The full extractor table.
pub fn format_table() -> &'static [FormatSpec] {
    FORMATS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_has_a_spec() {
        for format in ArchiveFormat::ALL {
            let spec = format.spec();
            assert_eq!(spec.format, format);
            assert!(spec.args.contains(&PATH_PLACEHOLDER));
            assert!(!spec.suffixes.is_empty());
        }
        assert_eq!(format_table().len(), ArchiveFormat::ALL.len());
    }

    #[test]
    fn test_names_round_trip() {
        for format in ArchiveFormat::ALL {
            assert_eq!(ArchiveFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(ArchiveFormat::from_name("TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("cab"), None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ArchiveFormat::SevenZip).unwrap();
        assert_eq!(json, "\"7z\"");
        let parsed: ArchiveFormat = serde_json::from_str("\"tbz2\"").unwrap();
        assert_eq!(parsed, ArchiveFormat::TarBz2);
    }

    #[test]
    fn test_password_policies() {
        assert_eq!(ArchiveFormat::Zip.spec().password_policy, PasswordPolicy::DummyPassword);
        assert_eq!(ArchiveFormat::Rar.spec().password_policy, PasswordPolicy::NoPassword);
        assert_eq!(ArchiveFormat::Tar.spec().password_policy, PasswordPolicy::NotApplicable);
    }
}
