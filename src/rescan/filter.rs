//! Include/exclude rules as regular expressions.

use crate::core::{FilterDecision, PathFilter};

use regex::Regex;
use std::path::Path;

/// Path filter built from include and exclude regular expressions.
///
/// Patterns are matched anywhere in the full path. Exclusion is checked
/// first; when include patterns exist, a path must match at least one.
#[derive(Debug, Clone, Default)]
pub struct RegexPathFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl RegexPathFilter {
    /// Compiles the given patterns.
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, regex::Error> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A filter that admits everything.
    pub fn allow_all() -> Self {
        Self::default()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p.as_ref())).collect()
}

impl PathFilter for RegexPathFilter {
    fn admit(&self, path: &Path) -> FilterDecision {
        let text = path.to_string_lossy();

        if self.exclude.iter().any(|re| re.is_match(&text)) {
            return FilterDecision::Excluded;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(&text)) {
            return FilterDecision::NotIncluded;
        }
        FilterDecision::Scan
    }
}
