//! Quarantine of infected files.
//!
//! Files are moved into a flat directory under their original base name,
//! with numbered suffixes on collision. Nothing already in the directory
//! is ever overwritten.

mod mover;

pub use mover::{MoveMethod, QuarantineMover, QuarantineOutcome, MAX_SUFFIXES};
