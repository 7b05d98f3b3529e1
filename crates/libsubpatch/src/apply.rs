use std::{fmt, path::Path};

use log::{info, warn};

use crate::{
    config::Config,
    error::{Result, SubpatchError},
    git::{self, CommitIdentity},
    patch::{Patch, PatchHeader, PatchQueue},
};

/// Committer used when neither git config nor the patch names anyone.
const FALLBACK_IDENTITY: (&str, &str) = ("subpatch", "subpatch@localhost");

/// How the patch queue is exposed once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// All patches staged cumulatively; no commits are created.
    #[default]
    Index,
    /// One commit per patch, in queue order, on top of the baseline.
    Commits,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::Commits => f.write_str("commits"),
        }
    }
}

/// What happens after a single patch has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Leave the result in the index.
    StageOnly,
    /// Commit the staged result before moving on.
    StageAndCommit,
}

impl From<ApplyMode> for Step {
    fn from(mode: ApplyMode) -> Self {
        match mode {
            ApplyMode::Index => Self::StageOnly,
            ApplyMode::Commits => Self::StageAndCommit,
        }
    }
}

/// Record of one successfully applied patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    /// 1-based position in the queue.
    pub sequence: usize,
    /// File name of the patch.
    pub name: String,
    /// Commit title derived from the patch.
    pub title: String,
    /// Commit created for the patch in Commits mode.
    pub commit: Option<String>,
}

/// Outcome of [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Mode the queue was applied in.
    pub mode: ApplyMode,
    /// Patches in the order they were applied.
    pub applied: Vec<AppliedPatch>,
}

/// Apply the patch queue named by `config` to the submodule worktree.
///
/// The worktree must already sit on its baseline; see [`crate::reset`].
pub fn apply(config: &Config, mode: ApplyMode) -> Result<ApplyReport> {
    let queue = PatchQueue::load(config)?;
    apply_queue(config, &queue, mode)
}

/// Apply `queue` in order, stopping at the first patch that does not apply.
///
/// In Index mode a failure leaves the earlier patches staged. In Commits mode
/// the commits created for earlier patches stay in the worktree history and
/// are counted in the returned error.
pub fn apply_queue(config: &Config, queue: &PatchQueue, mode: ApplyMode) -> Result<ApplyReport> {
    let path = config.submodule_path();
    let step = Step::from(mode);
    let committer = committer_fallback(&path);

    let mut applied: Vec<AppliedPatch> = Vec::with_capacity(queue.len());
    for patch in queue.iter() {
        info!("applying patch {} ({})", patch.sequence, patch.path.display());
        let commit = apply_one(&path, patch, step, committer).map_err(|reason| {
            let commits_left = applied.iter().filter(|a| a.commit.is_some()).count();
            if commits_left > 0 {
                warn!(
                    "{commits_left} commits from earlier patches remain in {}",
                    path.display()
                );
            }
            SubpatchError::PatchApplyError {
                sequence: patch.sequence,
                patch: patch.name.clone(),
                reason,
                mode,
                commits_left,
            }
        })?;

        applied.push(AppliedPatch {
            sequence: patch.sequence,
            name: patch.name.clone(),
            title: patch.title(),
            commit,
        });
    }

    Ok(ApplyReport { mode, applied })
}

/// Whether commits made in `path` need an identity supplied on the command line.
fn committer_fallback(path: &Path) -> bool {
    !matches!(git::config_get(path, None, "user.email"), Ok(Some(_)))
}

/// Committer for `header` when git has no identity configured: the patch
/// author, or [`FALLBACK_IDENTITY`] for plain diffs.
fn committer_identity(header: &PatchHeader, fallback: bool) -> Option<(&str, &str)> {
    if !fallback {
        return None;
    }
    Some(header.author_identity().unwrap_or(FALLBACK_IDENTITY))
}

/// Apply a single patch and, for [`Step::StageAndCommit`], commit it.
///
/// Returns the new commit, if any, or the reason the patch was rejected.
fn apply_one(
    path: &Path,
    patch: &Patch,
    step: Step,
    committer_fallback: bool,
) -> std::result::Result<Option<String>, String> {
    git::apply_to_index(path, &patch.payload).map_err(|failure| failure.message)?;

    match step {
        Step::StageOnly => Ok(None),
        Step::StageAndCommit => {
            let identity = CommitIdentity {
                author: patch.header.author.as_deref(),
                date: patch.header.date.as_deref(),
                committer: committer_identity(&patch.header, committer_fallback),
            };
            git::commit(path, &patch.commit_message(), identity)
                .map_err(|failure| format!("commit failed: {}", failure.message))?;
            let head = git::head_commit(path).map_err(|failure| failure.message)?;
            Ok(Some(head))
        }
    }
}
