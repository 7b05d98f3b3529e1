use std::path::Path;

use log::info;

use crate::{
    apply::{self, ApplyMode, ApplyReport},
    config::Config,
    error::Result,
    submodule::{self, InitOptions, InitReport, ResetReport},
};

/// Options for a full refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// How patches are exposed once applied.
    pub mode: ApplyMode,
    /// Stop after the reset and leave the baseline untouched.
    pub skip_patch: bool,
    /// Registration and transfer options.
    pub init: InitOptions,
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Configuration that drove the refresh.
    pub config: Config,
    /// Result of the init step.
    pub init: InitReport,
    /// Result of the reset step.
    pub reset: ResetReport,
    /// Result of patching, or `None` when patching was skipped.
    pub patches: Option<ApplyReport>,
}

/// Discover the configuration from `start_dir` and refresh the submodule.
pub fn refresh(start_dir: &Path, options: &RefreshOptions) -> Result<RefreshReport> {
    let config = Config::find_ancestor(start_dir)?;
    refresh_with_config(config, options)
}

/// Init, reset and (unless skipped) patch the submodule described by `config`.
///
/// The first failing step ends the refresh and its error is returned as is.
/// Concurrent refreshes of the same worktree are not coordinated.
pub fn refresh_with_config(config: Config, options: &RefreshOptions) -> Result<RefreshReport> {
    let init = submodule::init(&config, &options.init)?;
    let reset = submodule::reset(&config, true)?;

    let patches = if options.skip_patch {
        info!("skipping patches");
        None
    } else {
        Some(apply::apply(&config, options.mode)?)
    };

    Ok(RefreshReport {
        config,
        init,
        reset,
        patches,
    })
}
