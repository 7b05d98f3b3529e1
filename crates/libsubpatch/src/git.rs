use std::{
    env, fmt,
    io::{self, Write},
    path::Path,
    process::{Command, Output, Stdio},
};

use log::debug;

use crate::submodule::BearerToken;

/// A git invocation that could not be started or exited unsuccessfully.
///
/// Components classify this into a [`crate::SubpatchError`] variant; it never
/// crosses the public API on its own.
#[derive(Debug, Clone)]
pub struct GitFailure {
    /// The command line that failed, without credentials.
    pub command: String,
    /// Trimmed stderr, or the spawn error.
    pub message: String,
}

impl fmt::Display for GitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.command, self.message)
    }
}

impl std::error::Error for GitFailure {}

/// Render `args` as a loggable command line.
fn describe(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

/// Environment entries that append `http.extraHeader = header` after the
/// `inherited` count of `GIT_CONFIG_*` pairs already present.
fn extra_header_env(inherited: Option<&str>, header: String) -> [(String, String); 3] {
    let index = inherited
        .and_then(|count| count.trim().parse::<usize>().ok())
        .unwrap_or(0);
    [
        ("GIT_CONFIG_COUNT".to_string(), (index + 1).to_string()),
        (format!("GIT_CONFIG_KEY_{index}"), "http.extraHeader".to_string()),
        (format!("GIT_CONFIG_VALUE_{index}"), header),
    ]
}

/// Build a git command for `repo_path`, attaching `token` as an HTTP header.
///
/// The header travels through `GIT_CONFIG_*` environment variables rather than
/// `-c`, so it is absent from the argument list and from anything derived from it.
fn git_command(repo_path: &Path, args: &[&str], token: Option<&BearerToken>) -> Command {
    let mut command = Command::new("git");
    command.current_dir(repo_path).args(args);
    if let Some(token) = token {
        let inherited = env::var("GIT_CONFIG_COUNT").ok();
        command.envs(extra_header_env(inherited.as_deref(), token.header_value()));
    }
    command
}

/// Execute a prepared command, mapping spawn errors and non-zero exits to [`GitFailure`].
fn execute(mut command: Command, description: String) -> Result<Output, GitFailure> {
    debug!("running {description}");
    let output = command.output().map_err(|e| GitFailure {
        command: description.clone(),
        message: format!("failed to execute git: {e}"),
    })?;
    check_status(output, description)
}

/// Execute a prepared command with `input` written to its stdin.
fn execute_with_input(
    mut command: Command,
    description: String,
    input: &[u8],
) -> Result<Output, GitFailure> {
    debug!("running {description}");
    let spawn_failure = |e: io::Error| GitFailure {
        command: description.clone(),
        message: format!("failed to execute git: {e}"),
    };
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_failure)?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).map_err(spawn_failure)?;
    }
    let output = child.wait_with_output().map_err(spawn_failure)?;
    check_status(output, description)
}

/// Turn a non-zero exit into a [`GitFailure`] carrying stderr.
fn check_status(output: Output, description: String) -> Result<Output, GitFailure> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr
        };
        return Err(GitFailure {
            command: description,
            message,
        });
    }

    Ok(output)
}

/// Run a git command with the given arguments in the specified directory.
pub fn run_git(repo_path: &Path, args: &[&str]) -> Result<Output, GitFailure> {
    execute(git_command(repo_path, args, None), describe(args))
}

/// Run a git command that talks to a remote, authenticating with `token` when present.
pub fn run_git_remote(
    repo_path: &Path,
    args: &[&str],
    token: Option<&BearerToken>,
) -> Result<Output, GitFailure> {
    execute(git_command(repo_path, args, token), describe(args))
}

/// Run a git command and return its trimmed stdout.
fn git_stdout(repo_path: &Path, args: &[&str]) -> Result<String, GitFailure> {
    let output = run_git(repo_path, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Read a single config value, returning `None` when the key is unset.
///
/// When `file` is given the lookup is restricted to that file (e.g. `.gitmodules`).
pub fn config_get(repo_path: &Path, file: Option<&Path>, key: &str) -> Result<Option<String>, GitFailure> {
    let mut command = Command::new("git");
    command.current_dir(repo_path).arg("config");
    if let Some(file) = file {
        command.arg("--file").arg(file);
    }
    command.args(["--get", key]);
    let description = match file {
        Some(file) => format!("git config --file {} --get {key}", file.display()),
        None => format!("git config --get {key}"),
    };

    debug!("running {description}");
    let output = command.output().map_err(|e| GitFailure {
        command: description.clone(),
        message: format!("failed to execute git: {e}"),
    })?;

    // Exit status 1 means the key is not set.
    match output.status.code() {
        Some(0) => Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        )),
        Some(1) => Ok(None),
        _ => Err(GitFailure {
            command: description,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Set a config value in the repository's local config.
pub fn config_set(repo_path: &Path, key: &str, value: &str) -> Result<(), GitFailure> {
    run_git(repo_path, &["config", key, value])?;
    Ok(())
}

/// Find the name of the `.gitmodules` entry whose `path` equals `submodule_path`.
pub fn submodule_name(repo_path: &Path, submodule_path: &str) -> Result<Option<String>, GitFailure> {
    let gitmodules = repo_path.join(".gitmodules");
    if !gitmodules.is_file() {
        return Ok(None);
    }

    let mut command = Command::new("git");
    command
        .current_dir(repo_path)
        .args(["config", "--file", ".gitmodules", "--get-regexp"])
        .arg(r"^submodule\..*\.path$");
    let description = "git config --file .gitmodules --get-regexp path".to_string();
    debug!("running {description}");
    let output = command.output().map_err(|e| GitFailure {
        command: description.clone(),
        message: format!("failed to execute git: {e}"),
    })?;
    match output.status.code() {
        Some(0) => {}
        Some(1) => return Ok(None),
        _ => {
            return Err(GitFailure {
                command: description,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    Ok(parse_submodule_paths(&listing)
        .into_iter()
        .find(|(_, path)| path == submodule_path)
        .map(|(name, _)| name))
}

/// Parse `submodule.<name>.path <path>` lines into `(name, path)` pairs.
fn parse_submodule_paths(listing: &str) -> Vec<(String, String)> {
    listing
        .lines()
        .filter_map(|line| {
            let (key, path) = line.split_once(' ')?;
            let name = key.strip_prefix("submodule.")?.strip_suffix(".path")?;
            Some((name.to_string(), path.trim().to_string()))
        })
        .collect()
}

/// Whether `path` holds a git worktree of its own.
pub fn is_repository(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Whether the repository at `repo_path` is a shallow clone.
pub fn is_shallow(repo_path: &Path) -> Result<bool, GitFailure> {
    Ok(git_stdout(repo_path, &["rev-parse", "--is-shallow-repository"])? == "true")
}

/// Return the commit recorded for the gitlink at `submodule_path` in the index.
///
/// Returns `None` when there is no entry or the entry is not a gitlink.
pub fn gitlink_commit(repo_path: &Path, submodule_path: &str) -> Result<Option<String>, GitFailure> {
    let listing = git_stdout(repo_path, &["ls-files", "--stage", "--", submodule_path])?;
    Ok(parse_gitlink(&listing, submodule_path))
}

/// Extract the commit from `git ls-files --stage` output for a gitlink entry.
fn parse_gitlink(listing: &str, submodule_path: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let (meta, path) = line.split_once('\t')?;
        if path != submodule_path {
            return None;
        }
        let mut fields = meta.split_whitespace();
        let mode = fields.next()?;
        let sha = fields.next()?;
        (mode == "160000").then(|| sha.to_string())
    })
}

/// Whether `commit` exists as a commit object in the repository.
pub fn has_commit(repo_path: &Path, commit: &str) -> bool {
    let object = format!("{commit}^{{commit}}");
    run_git(repo_path, &["cat-file", "-e", &object]).is_ok()
}

/// Return the commit `HEAD` points at.
pub fn head_commit(repo_path: &Path) -> Result<String, GitFailure> {
    git_stdout(repo_path, &["rev-parse", "HEAD"])
}

/// Check whether the repository has staged, unstaged or untracked changes.
pub fn has_uncommitted_changes(repo_path: &Path) -> Result<bool, GitFailure> {
    let status = git_stdout(repo_path, &["status", "--porcelain"])?;
    Ok(!status.is_empty())
}

/// Detach `HEAD` at `commit`, discarding local modifications to tracked files.
pub fn checkout_detached(repo_path: &Path, commit: &str) -> Result<(), GitFailure> {
    run_git(repo_path, &["checkout", "--quiet", "--force", "--detach", commit])?;
    Ok(())
}

/// Reset the index and working tree to `commit`.
pub fn reset_hard(repo_path: &Path, commit: &str) -> Result<(), GitFailure> {
    run_git(repo_path, &["reset", "--quiet", "--hard", commit])?;
    Ok(())
}

/// Remove untracked files. With `force`, ignored files and nested
/// repositories go too.
pub fn clean(repo_path: &Path, force: bool) -> Result<(), GitFailure> {
    let flags = if force { "-ffdx" } else { "-fd" };
    run_git(repo_path, &["clean", "--quiet", flags])?;
    Ok(())
}

/// Apply the diff in `payload` to both the working tree and the index.
pub fn apply_to_index(repo_path: &Path, payload: &[u8]) -> Result<(), GitFailure> {
    let args = ["apply", "--index", "--whitespace=nowarn", "-"];
    let command = git_command(repo_path, &args, None);
    execute_with_input(command, describe(&args), payload)?;
    Ok(())
}

/// Fetch a single commit by id from `origin`, optionally at depth 1.
pub fn fetch_commit(
    repo_path: &Path,
    commit: &str,
    shallow: bool,
    token: Option<&BearerToken>,
) -> Result<(), GitFailure> {
    let mut args = vec!["fetch", "--quiet"];
    if shallow {
        args.extend(["--depth", "1"]);
    }
    args.extend(["origin", commit]);
    run_git_remote(repo_path, &args, token)?;
    Ok(())
}

/// Identity and metadata used when committing a patch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommitIdentity<'a> {
    /// `Name <email>` used as the commit author.
    pub author: Option<&'a str>,
    /// Author date in any format git accepts.
    pub date: Option<&'a str>,
    /// `(name, email)` to use as committer when none is configured.
    pub committer: Option<(&'a str, &'a str)>,
}

/// Create a commit of the staged changes with the provided `message`.
pub fn commit(repo_path: &Path, message: &str, identity: CommitIdentity<'_>) -> Result<(), GitFailure> {
    let name_override;
    let email_override;
    let mut args: Vec<&str> = Vec::new();
    if let Some((name, email)) = identity.committer {
        name_override = format!("user.name={name}");
        email_override = format!("user.email={email}");
        args.extend(["-c", name_override.as_str(), "-c", email_override.as_str()]);
    }
    args.extend(["commit", "--quiet", "--no-verify", "-m", message]);
    if let Some(author) = identity.author {
        args.extend(["--author", author]);
    }
    if let Some(date) = identity.date {
        args.extend(["--date", date]);
    }

    run_git(repo_path, &args)?;
    Ok(())
}
