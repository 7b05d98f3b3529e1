use std::{fmt, io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

use crate::apply::ApplyMode;

/// Custom Result type for subpatch operations.
pub type Result<T> = StdResult<T, SubpatchError>;

/// Errors produced by the refresh pipeline.
///
/// Every variant is terminal for the current invocation. Nothing is retried
/// internally and no partial state is rolled back.
#[derive(Error, Debug)]
pub enum SubpatchError {
    /// No ancestor of the starting directory contains the marker file.
    #[error("No {marker} found in {start} or any parent directory")]
    ConfigNotFound {
        /// Directory the search started from.
        start: PathBuf,
        /// Name of the marker file that was searched for.
        marker: &'static str,
    },

    /// The marker file exists but cannot be used.
    #[error("Invalid configuration {path}: {message}")]
    ConfigInvalid {
        /// Path of the offending marker file.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The submodule could not be registered against its origin.
    #[error("Cannot register submodule '{submodule}': {message}")]
    RegistrationError {
        /// Path of the submodule relative to the repository root.
        submodule: String,
        /// Human-readable error description.
        message: String,
    },

    /// Cloning or fetching from the origin failed.
    #[error("Fetch from {origin} failed: {message}")]
    FetchError {
        /// Origin URL the fetch was directed at.
        origin: String,
        /// Human-readable error description.
        message: String,
    },

    /// The worktree could not be brought back to its baseline commit.
    #[error("Cannot reset {path}: {message}")]
    ResetError {
        /// Absolute path of the submodule worktree.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The configured patch directory does not exist.
    #[error("Patch directory {path} does not exist")]
    PatchDirMissing {
        /// Absolute path of the expected patch directory.
        path: PathBuf,
    },

    /// A patch artifact is present but unusable.
    #[error("Patch {sequence} ({name}) is invalid: {message}")]
    PatchInvalid {
        /// 1-based position of the patch in the queue.
        sequence: usize,
        /// File name of the patch.
        name: String,
        /// Human-readable error description.
        message: String,
    },

    /// A patch did not apply against the tree left by its predecessors.
    #[error(
        "Patch {sequence} ({patch}) failed to apply in {mode} mode: {reason}{}",
        LeftoverCommits(*commits_left)
    )]
    PatchApplyError {
        /// 1-based position of the failing patch.
        sequence: usize,
        /// File name of the failing patch.
        patch: String,
        /// Output reported by git.
        reason: String,
        /// Mode the queue was being applied in.
        mode: ApplyMode,
        /// Commits created for earlier patches that remain in the worktree history.
        commits_left: usize,
    },

    /// An underlying I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl SubpatchError {
    /// Return the recommended process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } => 2,
            Self::RegistrationError { .. } => 3,
            Self::FetchError { .. } => 4,
            Self::ResetError { .. } => 5,
            Self::PatchDirMissing { .. } | Self::PatchInvalid { .. } => 6,
            Self::PatchApplyError { .. } => 7,
            Self::IoError(_) => 1,
        }
    }

    /// Number of commits a failed Commits-mode run left on top of the baseline.
    ///
    /// Returns `None` for every other failure, including Index-mode failures.
    pub fn leftover_commits(&self) -> Option<usize> {
        match self {
            Self::PatchApplyError { commits_left, .. } if *commits_left > 0 => Some(*commits_left),
            _ => None,
        }
    }
}

/// Display suffix describing commits stranded by a failed Commits-mode run.
struct LeftoverCommits(usize);

impl fmt::Display for LeftoverCommits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            0 => Ok(()),
            1 => write!(
                f,
                "\n1 commit from an earlier patch remains on top of the baseline; rerun the refresh to discard it"
            ),
            n => write!(
                f,
                "\n{n} commits from earlier patches remain on top of the baseline; rerun the refresh to discard them"
            ),
        }
    }
}
