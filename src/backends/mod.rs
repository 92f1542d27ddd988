//! Engine implementations.
//!
//! ## Available Backends
//!
//! - [`mock`] - Byte-signature engine for tests and dry runs
//! - [`clamav`] - ClamAV daemon over its Unix socket (requires `clamav` feature)
//!
//! ## Implementing a Custom Backend
//!
//! ```rust,ignore
//! use sandscan::core::{Engine, EngineLimits, FileInput, ScanError, ScanFlags, ScanVerdict};
//!
//! #[derive(Debug)]
//! pub struct MyEngine;
//!
//! impl Engine for MyEngine {
//!     fn name(&self) -> &str {
//!         "my-engine"
//!     }
//!
//!     fn submit(
//!         &self,
//!         input: &FileInput,
//!         limits: &EngineLimits,
//!         flags: ScanFlags,
//!     ) -> Result<ScanVerdict, ScanError> {
//!         todo!()
//!     }
//! }
//! ```

pub mod mock;

#[cfg(feature = "clamav")]
pub mod clamav;

pub use mock::{MockEngine, Submission};

#[cfg(feature = "clamav")]
pub use clamav::{ClamdConfig, ClamdEngine};
