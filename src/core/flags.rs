//! Engine scan flags and limits.
//!
//! `ScanFlags` is the enumerated bit set the orchestrator derives from its
//! options and hands to the engine with every submission. `EngineLimits`
//! carries the engine-side resource limits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Bit set of engine scan options.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScanFlags(u32);

impl ScanFlags {
    /// Let the engine unpack archives internally.
    pub const ARCHIVE: Self = Self(1 << 0);
    /// Parse mail files.
    pub const MAIL: Self = Self(1 << 1);
    /// Parse OLE2 containers.
    pub const OLE2: Self = Self(1 << 2);
    /// Normalize HTML.
    pub const HTML: Self = Self(1 << 3);
    /// Parse PE executables.
    pub const PE: Self = Self(1 << 4);
    /// Enable algorithmic detection.
    pub const ALGORITHMIC: Self = Self(1 << 5);
    /// Report broken executables as detections.
    pub const BLOCK_BROKEN: Self = Self(1 << 6);
    /// Report encrypted archives as detections.
    pub const BLOCK_ENCRYPTED: Self = Self(1 << 7);
    /// Report archives exceeding limits as detections.
    pub const BLOCK_MAX: Self = Self(1 << 8);

    const NAMES: [(&'static str, Self); 9] = [
        ("archive", Self::ARCHIVE),
        ("mail", Self::MAIL),
        ("ole2", Self::OLE2),
        ("html", Self::HTML),
        ("pe", Self::PE),
        ("algorithmic", Self::ALGORITHMIC),
        ("block_broken", Self::BLOCK_BROKEN),
        ("block_encrypted", Self::BLOCK_ENCRYPTED),
        ("block_max", Self::BLOCK_MAX),
    ];

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns a copy with `other` set or cleared.
    #[must_use]
    pub const fn with(self, other: Self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }

    /// Returns a copy with `other` cleared.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        self.with(other, false)
    }

    /// Looks up a flag by its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, flag)| *flag)
    }

    /// Names of the flags that are set.
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl Default for ScanFlags {
    fn default() -> Self {
        Self::ARCHIVE | Self::MAIL | Self::OLE2 | Self::HTML | Self::PE | Self::ALGORITHMIC
    }
}

impl fmt::Debug for ScanFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScanFlags").field(&self.names()).finish()
    }
}

impl BitOr for ScanFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        ScanFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ScanFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ScanFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        ScanFlags(self.0 & rhs.0)
    }
}

impl Not for ScanFlags {
    type Output = Self;

    fn not(self) -> Self::Output {
        ScanFlags(!self.0)
    }
}

impl TryFrom<Vec<String>> for ScanFlags {
    type Error = String;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names.iter().try_fold(Self::empty(), |acc, name| {
            Self::from_name(name)
                .map(|flag| acc | flag)
                .ok_or_else(|| format!("unknown scan flag '{}'", name))
        })
    }
}

impl From<ScanFlags> for Vec<String> {
    fn from(flags: ScanFlags) -> Self {
        flags.names().into_iter().map(String::from).collect()
    }
}

/// Limits the engine applies while scanning a single submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Largest file the engine extracts or scans, in bytes. Zero means
    /// no limit.
    pub max_file_size: u64,
    /// Most files the engine extracts from one archive.
    pub max_files: u32,
    /// Deepest internal archive recursion.
    pub max_recursion: u32,
    /// Highest compression ratio accepted.
    pub max_ratio: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10 MiB
            max_files: 500,
            max_recursion: 8,
            max_ratio: 250,
        }
    }
}

impl EngineLimits {
    /// Creates limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Sets the maximum number of files.
    pub fn with_max_files(mut self, files: u32) -> Self {
        self.max_files = files;
        self
    }

    /// Sets the maximum recursion depth.
    pub fn with_max_recursion(mut self, depth: u32) -> Self {
        self.max_recursion = depth;
        self
    }
}
