#![allow(dead_code)]

use anyhow::{Context, Result, ensure};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Path of the compiled `subpatch` binary.
pub fn subpatch_binary() -> &'static str {
    env!("CARGO_BIN_EXE_subpatch")
}

/// Run `subpatch` from `cwd` with `args`, capturing its output.
pub fn run_subpatch(cwd: &Path, args: &[&str]) -> Result<Output> {
    Command::new(subpatch_binary())
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .context("failed to run subpatch")
}

/// Run `subpatch` with `home` as the only source of user-level git config,
/// so no identity is configured unless a repository sets one.
pub fn run_subpatch_isolated(cwd: &Path, home: &Path, args: &[&str]) -> Result<Output> {
    let mut command = Command::new(subpatch_binary());
    command
        .current_dir(cwd)
        .args(args)
        .env_remove("RUST_LOG")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("GIT_CONFIG_NOSYSTEM", "1");
    for var in [
        "GIT_AUTHOR_NAME",
        "GIT_AUTHOR_EMAIL",
        "GIT_COMMITTER_NAME",
        "GIT_COMMITTER_EMAIL",
        "EMAIL",
    ] {
        command.env_remove(var);
    }
    command.output().context("failed to run subpatch")
}

/// Contents of `a.txt` at the baseline commit.
pub const BASE_A: &str = "one\ntwo\nthree\n";

/// First patch: uppercases the second line of `a.txt`.
pub const FIX_A: &str = r#"From 1111111111111111111111111111111111111111 Mon Sep 17 00:00:00 2001
From: Patch Author <patch@example.com>
Date: Mon, 1 Jan 2024 00:00:00 +0000
Subject: [PATCH 1/2] Fix a

Uppercase the second line.
---
 a.txt | 2 +-
 1 file changed, 1 insertion(+), 1 deletion(-)

diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 one
-two
+TWO
 three
"#;

/// Second patch: builds on `FIX_A` and adds `d.txt`.
pub const FIX_B: &str = r#"From 2222222222222222222222222222222222222222 Mon Sep 17 00:00:00 2001
From: Patch Author <patch@example.com>
Date: Tue, 2 Jan 2024 00:00:00 +0000
Subject: [PATCH 2/2] Fix b

---
diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 one
-TWO
+TWO!
 three
diff --git a/d.txt b/d.txt
new file mode 100644
--- /dev/null
+++ b/d.txt
@@ -0,0 +1 @@
+added
"#;

/// A patch whose context never matches the tree.
pub const CONFLICTING: &str = r#"diff --git a/a.txt b/a.txt
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 one
-missing
+replaced
 three
"#;

/// A plain diff, with no mail header, that adds `e.txt`.
pub const ADD_E: &str = r#"diff --git a/e.txt b/e.txt
new file mode 100644
--- /dev/null
+++ b/e.txt
@@ -0,0 +1 @@
+extra
"#;

/// The default two-patch queue.
pub const DEFAULT_QUEUE: &[(&str, &str)] = &[("0001-fix-a.patch", FIX_A), ("0002-fix-b.patch", FIX_B)];

/// Run a git command inside `repo_path`, ensuring it succeeds.
pub fn git(repo_path: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;

    ensure!(
        output.status.success(),
        "git command failed: git {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(output)
}

/// Run a git command and return its trimmed stdout.
pub fn git_out(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = git(repo_path, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Initialise a repository with a test identity.
fn init_repository(repo_path: &Path) -> Result<()> {
    fs::create_dir_all(repo_path)?;
    git(repo_path, &["init", "--quiet", "-b", "main"])?;
    git(repo_path, &["config", "user.email", "test@example.com"])?;
    git(repo_path, &["config", "user.name", "Test User"])?;
    Ok(())
}

/// Which upstream commit the host records for its submodule.
#[derive(Clone, Copy)]
pub enum Pin {
    /// The older commit; a depth-1 clone of the branch does not carry it.
    Baseline,
    /// The newest commit on the upstream default branch.
    Tip,
}

/// An upstream repository and a host repository that vendors it at `go`.
pub struct Fixture {
    _temp_dir: TempDir,
    /// Path of the upstream repository.
    pub upstream: PathBuf,
    /// `file://` URL of the upstream repository.
    pub origin: String,
    /// Canonical path of the host repository.
    pub host: PathBuf,
    /// Older upstream commit.
    pub baseline: String,
    /// Newest upstream commit.
    pub tip: String,
    /// Commit recorded in the host's gitlink.
    pub pinned: String,
}

impl Fixture {
    /// Host pinned to the baseline with the default patch queue.
    pub fn new() -> Result<Self> {
        Self::build(DEFAULT_QUEUE, Pin::Baseline)
    }

    /// Host with the given patches and gitlink pin.
    pub fn build(patches: &[(&str, &str)], pin: Pin) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let base = fs::canonicalize(temp_dir.path())?;

        let upstream = base.join("upstream");
        init_repository(&upstream)?;
        fs::write(upstream.join("a.txt"), BASE_A)?;
        fs::write(upstream.join("b.txt"), "bee\n")?;
        git(&upstream, &["add", "."])?;
        git(&upstream, &["commit", "--quiet", "-m", "base"])?;
        let baseline = git_out(&upstream, &["rev-parse", "HEAD"])?;
        fs::write(upstream.join("c.txt"), "later\n")?;
        git(&upstream, &["add", "."])?;
        git(&upstream, &["commit", "--quiet", "-m", "later"])?;
        let tip = git_out(&upstream, &["rev-parse", "HEAD"])?;
        git(&upstream, &["config", "uploadpack.allowReachableSHA1InWant", "true"])?;
        let origin = format!("file://{}", upstream.display());

        let pinned = match pin {
            Pin::Baseline => baseline.clone(),
            Pin::Tip => tip.clone(),
        };

        let host = base.join("host");
        init_repository(&host)?;
        fs::write(
            host.join(".gitmodules"),
            format!("[submodule \"go\"]\n\tpath = go\n\turl = {origin}\n"),
        )?;
        fs::write(
            host.join(".subpatch.toml"),
            "submodule_dir = \"go\"\npatches_dir = \"patches\"\n",
        )?;
        let patch_dir = host.join("patches");
        fs::create_dir_all(&patch_dir)?;
        for (name, contents) in patches {
            fs::write(patch_dir.join(name), contents)?;
        }
        let cacheinfo = format!("160000,{pinned},go");
        git(&host, &["update-index", "--add", "--cacheinfo", &cacheinfo])?;
        git(&host, &["add", ".gitmodules", ".subpatch.toml"])?;
        if !patches.is_empty() {
            git(&host, &["add", "patches"])?;
        }
        git(&host, &["commit", "--quiet", "-m", "vendor go"])?;

        Ok(Self {
            _temp_dir: temp_dir,
            upstream,
            origin,
            host,
            baseline,
            tip,
            pinned,
        })
    }

    /// Path of the vendored worktree.
    pub fn submodule(&self) -> PathBuf {
        self.host.join("go")
    }

    /// Read a file from the vendored worktree, `None` if absent.
    pub fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.submodule().join(name)).ok()
    }

    /// Run `git log -1 --format=<format>` inside the vendored worktree.
    pub fn last_commit(&self, format: &str) -> Result<String> {
        let format = format!("--format={format}");
        git_out(&self.submodule(), &["log", "-1", &format])
    }

    /// Number of commits between the pinned commit and `HEAD`.
    pub fn commits_on_top(&self) -> Result<usize> {
        let range = format!("{}..HEAD", self.pinned);
        Ok(git_out(&self.submodule(), &["rev-list", "--count", &range])?.parse()?)
    }

    /// Staged file names, sorted.
    pub fn staged(&self) -> Result<Vec<String>> {
        let names = git_out(&self.submodule(), &["diff", "--cached", "--name-only"])?;
        let mut names: Vec<String> = names.lines().map(str::to_string).collect();
        names.sort();
        Ok(names)
    }

    /// `git status --porcelain` for the vendored worktree.
    pub fn status(&self) -> Result<String> {
        git_out(&self.submodule(), &["status", "--porcelain"])
    }
}
