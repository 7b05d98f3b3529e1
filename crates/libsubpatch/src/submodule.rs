use std::{fmt, fs, path::Path};

use log::{debug, info, warn};

use crate::{
    config::Config,
    error::{Result, SubpatchError},
    git::{self, GitFailure},
};

/// Credential attached to clone and fetch requests as an HTTP bearer token.
///
/// The value is never rendered by `Debug` and only leaves the process through
/// the environment of the git child that performs the transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap `token`, treating an empty string as "no token".
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        (!token.is_empty()).then_some(Self(token))
    }

    /// The `http.extraHeader` value that carries the token.
    pub(crate) fn header_value(&self) -> String {
        format!("AUTHORIZATION: bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Options controlling how the submodule is registered and fetched.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Origin to use instead of the URL declared in `.gitmodules`.
    pub origin: Option<String>,
    /// Credential for the clone or fetch transport.
    pub bearer_token: Option<BearerToken>,
    /// Limit history to depth 1.
    pub shallow: bool,
}

/// What [`init`] had to do to bring the submodule up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    /// The worktree was absent and has been cloned.
    Cloned,
    /// The worktree existed and has been fetched.
    Fetched,
}

/// Outcome of [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Submodule name from `.gitmodules`.
    pub name: String,
    /// Origin URL the submodule was fetched from.
    pub origin: String,
    /// Whether a clone or a fetch took place.
    pub action: InitAction,
}

/// Outcome of [`reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetReport {
    /// Commit the worktree now sits on.
    pub baseline: String,
}

/// Register, clone or fetch the submodule named by `config`.
///
/// Calling this repeatedly with the same options converges on the same
/// registered and fetched state.
pub fn init(config: &Config, options: &InitOptions) -> Result<InitReport> {
    let root = config.root_dir();
    let submodule = config.submodule_git_path();
    let registration = |message: String| SubpatchError::RegistrationError {
        submodule: submodule.clone(),
        message,
    };
    let classify = |failure: GitFailure| registration(failure.to_string());

    let name = git::submodule_name(root, &submodule)
        .map_err(classify)?
        .ok_or_else(|| registration("no entry with this path in .gitmodules".to_string()))?;
    let url_key = format!("submodule.{name}.url");
    let declared = git::config_get(root, Some(Path::new(".gitmodules")), &url_key)
        .map_err(classify)?
        .ok_or_else(|| registration(format!("{url_key} is not set in .gitmodules")))?;

    let mut registered = git::config_get(root, None, &url_key).map_err(classify)?;
    if registered.is_none() {
        info!("registering submodule {name}");
        git::run_git(root, &["submodule", "--quiet", "init", "--", &submodule]).map_err(classify)?;
        registered = git::config_get(root, None, &url_key).map_err(classify)?;
    }

    let origin = resolve_origin(options.origin.as_deref(), &declared, registered.as_deref())
        .map_err(registration)?;
    if registered.as_deref() != Some(origin.as_str()) {
        debug!("setting {url_key} to {origin}");
        git::config_set(root, &url_key, &origin).map_err(classify)?;
    }

    let path = config.submodule_path();
    let action = if git::is_repository(&path) {
        fetch(&path, &origin, options)?;
        InitAction::Fetched
    } else {
        clone(config, &origin, options).map_err(|e| match e {
            CloneError::Occupied(message) => registration(message),
            CloneError::Failed(err) => err,
        })?;
        InitAction::Cloned
    };

    if let Some(baseline) = git::gitlink_commit(root, &submodule).map_err(classify)? {
        fetch_pinned(&path, &baseline, options);
    }

    Ok(InitReport {
        name,
        origin,
        action,
    })
}

/// Pick the origin to fetch from.
///
/// An explicit override always wins. Without one, a registered URL that
/// differs from an absolute declared URL is a conflict; relative declared URLs
/// are resolved by git, so the registered value is authoritative for them.
fn resolve_origin(
    override_origin: Option<&str>,
    declared: &str,
    registered: Option<&str>,
) -> std::result::Result<String, String> {
    if let Some(origin) = override_origin.filter(|o| !o.is_empty()) {
        return Ok(origin.to_string());
    }

    match registered {
        Some(registered) if is_relative_url(declared) => Ok(registered.to_string()),
        Some(registered) if registered != declared => Err(format!(
            "registered origin {registered} differs from declared origin {declared}; \
             pass an explicit origin to override"
        )),
        _ => Ok(declared.to_string()),
    }
}

/// Whether `url` is relative to the superproject's own remote.
fn is_relative_url(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../")
}

/// Ways cloning can fail.
enum CloneError {
    /// The target directory holds something that is not a worktree.
    Occupied(String),
    /// The transfer itself failed.
    Failed(SubpatchError),
}

/// Clone `origin` into the submodule path without checking anything out.
///
/// The checkout is left to [`reset`], so a baseline missing from a shallow
/// clone is reported there.
fn clone(config: &Config, origin: &str, options: &InitOptions) -> std::result::Result<(), CloneError> {
    let path = config.submodule_path();
    if path.exists() {
        let occupied = fs::read_dir(&path)
            .map_err(|e| CloneError::Failed(e.into()))?
            .next()
            .is_some();
        if occupied {
            return Err(CloneError::Occupied(format!(
                "{} exists and is not a git worktree",
                path.display()
            )));
        }
    }

    info!("cloning {origin} into {}", path.display());
    let submodule = config.submodule_git_path();
    let mut args = vec!["clone", "--quiet", "--no-checkout"];
    if options.shallow {
        args.extend(["--depth", "1"]);
    }
    args.extend([origin, submodule.as_str()]);

    git::run_git_remote(config.root_dir(), &args, options.bearer_token.as_ref())
        .map_err(|failure| CloneError::Failed(fetch_error(origin, &failure)))?;
    Ok(())
}

/// Point the worktree's `origin` remote at `origin` and fetch from it.
fn fetch(path: &Path, origin: &str, options: &InitOptions) -> Result<()> {
    let current = git::config_get(path, None, "remote.origin.url").map_err(|f| fetch_error(origin, &f))?;
    match current.as_deref() {
        Some(url) if url == origin => {}
        Some(_) => {
            git::run_git(path, &["remote", "set-url", "origin", origin])
                .map_err(|f| fetch_error(origin, &f))?;
        }
        None => {
            git::run_git(path, &["remote", "add", "origin", origin])
                .map_err(|f| fetch_error(origin, &f))?;
        }
    }

    let mut args = vec!["fetch", "--quiet"];
    if options.shallow {
        args.extend(["--depth", "1"]);
    } else if git::is_shallow(path).map_err(|f| fetch_error(origin, &f))? {
        args.push("--unshallow");
    }
    args.push("origin");

    info!("fetching {origin} into {}", path.display());
    git::run_git_remote(path, &args, options.bearer_token.as_ref())
        .map_err(|f| fetch_error(origin, &f))?;
    Ok(())
}

/// Fetch the pinned `baseline` by id when the branch transfer did not bring it.
///
/// A shallow transfer only carries the remote tip, and a pin may sit on no
/// branch at all. A server that refuses the request is not an error here;
/// [`reset`] reports the missing commit.
fn fetch_pinned(path: &Path, baseline: &str, options: &InitOptions) {
    if git::has_commit(path, baseline) {
        return;
    }
    info!("fetching pinned commit {baseline}");
    if let Err(failure) =
        git::fetch_commit(path, baseline, options.shallow, options.bearer_token.as_ref())
    {
        warn!("origin did not provide {baseline}: {}", failure.message);
    }
}

/// Classify a failed transfer.
fn fetch_error(origin: &str, failure: &GitFailure) -> SubpatchError {
    SubpatchError::FetchError {
        origin: origin.to_string(),
        message: failure.to_string(),
    }
}

/// Force the submodule worktree back to the commit the superproject records.
///
/// Local modifications, commits made on top of the baseline and untracked
/// files are all discarded. Without `force`, a worktree with local changes or
/// a `HEAD` away from the baseline is left alone and the call fails; ignored
/// files survive a non-forced clean.
pub fn reset(config: &Config, force: bool) -> Result<ResetReport> {
    let path = config.submodule_path();
    let reset_error = |message: String| SubpatchError::ResetError {
        path: path.clone(),
        message,
    };
    let classify = |failure: GitFailure| reset_error(failure.to_string());

    if !path.is_dir() {
        return Err(reset_error("submodule path does not exist".to_string()));
    }
    if !git::is_repository(&path) {
        return Err(reset_error("submodule path is not a git worktree".to_string()));
    }

    let submodule = config.submodule_git_path();
    let baseline = git::gitlink_commit(config.root_dir(), &submodule)
        .map_err(classify)?
        .ok_or_else(|| reset_error(format!("the superproject index has no gitlink for {submodule}")))?;

    if !git::has_commit(&path, &baseline) {
        return Err(reset_error(format!(
            "baseline commit {baseline} is not reachable; origin did not provide it"
        )));
    }

    if !force {
        if git::has_uncommitted_changes(&path).map_err(classify)? {
            return Err(reset_error(
                "worktree has local changes; a forced reset is required".to_string(),
            ));
        }
        let head = git::head_commit(&path).map_err(classify)?;
        if head != baseline {
            return Err(reset_error(format!(
                "HEAD is at {head}, not the baseline; a forced reset is required"
            )));
        }
    }

    info!("resetting {} to {baseline}", path.display());
    git::checkout_detached(&path, &baseline).map_err(classify)?;
    git::reset_hard(&path, &baseline).map_err(classify)?;
    git::clean(&path, force).map_err(classify)?;

    Ok(ResetReport { baseline })
}
