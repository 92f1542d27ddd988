//! Directory walking and recursive rescans of extracted archives.
//!
//! - [`walker`] - `WalkdirTreeWalker`, the default `TreeWalker`
//! - [`filter`] - `RegexPathFilter`, the default `PathFilter`
//! - [`rescanner`] - `RecursiveRescanner`

pub mod filter;
pub mod rescanner;
pub mod walker;

pub use filter::RegexPathFilter;
pub use rescanner::RecursiveRescanner;
pub use walker::{WalkdirTreeWalker, DEFAULT_MAX_RECURSION};
