#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Core library for keeping a vendored git submodule in sync with upstream
//! while carrying a queue of local patches on top of it.
//!
//! A refresh resolves the nearest `.subpatch.toml`, registers and fetches the
//! submodule, forces it back to the commit the superproject records, and then
//! reapplies the patch queue either as staged changes or as one commit per
//! patch. The CLI binary in `crates/subpatch` builds on top of this library.

/// Ordered application of the patch queue.
mod apply;
/// Marker-file discovery and parsing.
mod config;
/// Error taxonomy shared by every step.
mod error;
/// Helper routines for interacting with Git repositories.
mod git;
/// Patch artifacts and their ordering.
mod patch;
/// End-to-end refresh pipeline.
mod refresh;
/// Submodule registration, transfer and reset.
mod submodule;

pub use apply::{AppliedPatch, ApplyMode, ApplyReport, apply, apply_queue};
pub use config::{CONFIG_FILE_NAME, Config};
pub use error::{Result, SubpatchError};
pub use patch::{Patch, PatchHeader, PatchQueue};
pub use refresh::{RefreshOptions, RefreshReport, refresh, refresh_with_config};
pub use submodule::{
    BearerToken, InitAction, InitOptions, InitReport, ResetReport, init, reset,
};
