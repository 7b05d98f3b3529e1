use anyhow::{Context, Result};
use libsubpatch::{ApplyMode, ApplyReport, InitAction, RefreshReport};
use std::result::Result as StdResult;
use subpatch_term::{Output, OutputError};

/// Length of abbreviated commit ids in user-facing output.
const SHORT_HASH: usize = 12;

/// Emit an output result, attaching context on failure.
pub fn emit(result: StdResult<(), OutputError>) -> Result<()> {
    result.context("Output operation failed")
}

/// Abbreviate a commit id for display.
pub fn short(commit: &str) -> &str {
    commit.get(..SHORT_HASH).unwrap_or(commit)
}

/// Spinner label for the transfer step.
pub fn transfer_label(shallow: bool) -> &'static str {
    if shallow {
        "refreshing submodule (shallow)"
    } else {
        "refreshing submodule"
    }
}

/// Spinner line for a refresh that completed.
pub fn done_label(submodule: &str) -> String {
    format!("{submodule} refreshed")
}

/// Spinner line for a refresh that stopped with an error.
pub const FAILED_LABEL: &str = "refresh failed";

/// Render the outcome of a successful refresh.
pub fn render_report(output: &dyn Output, report: &RefreshReport) -> Result<()> {
    let submodule = report.config.submodule_git_path();
    let section = output.section(&format!("submodule {submodule}"));

    let action = match report.init.action {
        InitAction::Cloned => "cloned from",
        InitAction::Fetched => "fetched from",
    };
    emit(section.message(&format!("{action} {}", report.init.origin)))?;
    emit(section.message(&format!(
        "reset to {}",
        short(&report.reset.baseline)
    )))?;

    match &report.patches {
        None => emit(section.success("patches skipped, baseline is clean")),
        Some(patches) => render_patches(section.as_ref(), patches),
    }
}

/// Render the applied patch list.
fn render_patches(output: &dyn Output, report: &ApplyReport) -> Result<()> {
    if report.applied.is_empty() {
        return emit(output.success("no patches to apply"));
    }

    for patch in &report.applied {
        let line = match &patch.commit {
            Some(commit) => format!("{:>3} {} {}", patch.sequence, short(commit), patch.title),
            None => format!("{:>3} {}", patch.sequence, patch.title),
        };
        emit(output.message(&line))?;
    }

    let count = report.applied.len();
    let noun = if count == 1 { "patch" } else { "patches" };
    let summary = match report.mode {
        ApplyMode::Index => format!("{count} {noun} staged"),
        ApplyMode::Commits => format!("{count} {noun} committed"),
    };
    emit(output.success(&summary))
}
