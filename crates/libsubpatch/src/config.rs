use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use log::debug;
use serde::Deserialize;

use crate::error::{Result, SubpatchError};

/// Name of the marker file that identifies a repository root.
pub const CONFIG_FILE_NAME: &str = ".subpatch.toml";

/// Patch directory used when the marker file does not name one.
const DEFAULT_PATCHES_DIR: &str = "patches";

/// On-disk shape of the marker file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// Vendored tree, relative to the root.
    submodule_dir: PathBuf,
    /// Patch queue directory, relative to the root.
    #[serde(default = "default_patches_dir")]
    patches_dir: PathBuf,
}

/// Serde default for [`ConfigFile::patches_dir`].
fn default_patches_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PATCHES_DIR)
}

/// Resolved configuration for one refresh invocation.
///
/// Values are validated on load and never change afterwards; components
/// receive the configuration explicitly instead of consulting the process
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Absolute, canonical repository root.
    root_dir: PathBuf,
    /// Vendored tree, relative to `root_dir`.
    submodule_dir: PathBuf,
    /// Patch queue directory, relative to `root_dir`.
    patches_dir: PathBuf,
}

impl Config {
    /// Search `start` and its ancestors for the nearest marker file.
    pub fn find_ancestor(start: &Path) -> Result<Self> {
        let start = fs::canonicalize(start)?;
        for dir in start.ancestors() {
            if dir.join(CONFIG_FILE_NAME).is_file() {
                debug!("found {CONFIG_FILE_NAME} in {}", dir.display());
                return Self::load(dir);
            }
        }

        Err(SubpatchError::ConfigNotFound {
            start,
            marker: CONFIG_FILE_NAME,
        })
    }

    /// Load the marker file located directly in `root_dir`.
    pub fn load(root_dir: &Path) -> Result<Self> {
        let path = root_dir.join(CONFIG_FILE_NAME);
        let contents = fs::read_to_string(&path)?;
        Self::parse(root_dir, &contents).map_err(|message| SubpatchError::ConfigInvalid {
            path,
            message,
        })
    }

    /// Parse marker file `contents` for a repository rooted at `root_dir`.
    fn parse(root_dir: &Path, contents: &str) -> std::result::Result<Self, String> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| e.to_string())?;
        check_relative("submodule_dir", &file.submodule_dir)?;
        check_relative("patches_dir", &file.patches_dir)?;

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            submodule_dir: normalize(&file.submodule_dir),
            patches_dir: normalize(&file.patches_dir),
        })
    }

    /// Absolute path of the repository root.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Path of the vendored tree relative to the root.
    pub fn submodule_dir(&self) -> &Path {
        &self.submodule_dir
    }

    /// Absolute path of the vendored tree.
    pub fn submodule_path(&self) -> PathBuf {
        self.root_dir.join(&self.submodule_dir)
    }

    /// The vendored tree as git spells paths: `/`-separated and relative.
    pub fn submodule_git_path(&self) -> String {
        git_path(&self.submodule_dir)
    }

    /// Path of the patch directory relative to the root.
    pub fn patches_dir(&self) -> &Path {
        &self.patches_dir
    }

    /// Absolute path of the patch directory.
    pub fn patches_path(&self) -> PathBuf {
        self.root_dir.join(&self.patches_dir)
    }
}

/// Reject paths that would escape the root or that git cannot address.
fn check_relative(field: &str, path: &Path) -> std::result::Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if path.to_str().is_none() {
        return Err(format!("{field} must be valid UTF-8"));
    }

    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!(
                    "{field} must stay inside the repository root: {}",
                    path.display()
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!(
                    "{field} must be relative to the repository root: {}",
                    path.display()
                ));
            }
        }
    }

    if normal == 0 {
        return Err(format!("{field} must name a directory below the root"));
    }
    Ok(())
}

/// Drop `.` components so joined paths and git paths are canonical.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

/// Join the normal components of `path` with `/`.
fn git_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
