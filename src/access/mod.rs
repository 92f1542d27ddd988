//! Permission checks under an unprivileged identity.
//!
//! - [`identity`] - Resolving the account extraction programs run as
//! - [`gate`] - `AccessGate`, the probe-based permission check

pub mod gate;
pub mod identity;

pub use gate::{AccessDecision, AccessGate, AccessMode};
pub use identity::{is_privileged, UnprivilegedIdentity};
