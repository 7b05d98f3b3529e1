use clap::{ArgAction, ArgGroup, Parser};

/// Description printed below the option list in `--help`.
const AFTER_HELP: &str = "This command refreshes the submodule: initializes it, resets the \
content, and applies patches to the stage by default, or optionally as commits.";

#[derive(Parser)]
#[command(author, version, about, long_about = None, after_help = AFTER_HELP)]
#[command(group(
    ArgGroup::new("color_mode")
        .args(["color", "no_color"])
))]
/// Command-line options for subpatch.
pub struct Cli {
    /// Apply each patch as a separate commit instead of staging the changes
    #[arg(long)]
    pub commits: bool,

    /// Stop after resetting the submodule, without applying patches
    #[arg(long)]
    pub skip_patch: bool,

    /// Use this origin URL instead of the one declared in .gitmodules
    #[arg(long, value_name = "URL")]
    pub origin: Option<String>,

    /// Clone or fetch with a history depth of 1
    #[arg(long)]
    pub shallow: bool,

    /// Send this bearer token with clone and fetch requests
    #[arg(long, value_name = "TOKEN")]
    pub fetch_bearer_token: Option<String>,

    /// Start the configuration search here (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub repo_dir: Option<String>,

    /// Enable colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Suppress all output
    #[arg(long)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
