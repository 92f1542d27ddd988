//! Sandboxed extraction.
//!
//! - [`quota`] - `ResourceQuota` and `DirUsage`
//! - [`monitor`] - `ResourceMonitor`, which kills extractors over quota
//! - [`scratch`] - `ScratchDir`, the per-extraction working directory
//! - [`unpacker`] - `SandboxedUnpacker` and the privilege-dropping spawn

pub mod monitor;
pub mod quota;
pub mod scratch;
pub mod unpacker;

pub use monitor::{ChildExit, ResourceMonitor, DEFAULT_POLL_INTERVAL};
pub use quota::{DirUsage, ResourceQuota};
pub use scratch::{fix_permissions, temp_root, ScratchDir};
pub use unpacker::{
    spawn_sandboxed, ChildSetupStage, IoRedirect, SandboxedUnpacker, SpawnError, SpawnRequest,
    UnpackOutcome,
};
