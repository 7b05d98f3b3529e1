#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Command-line interface for refreshing a patched submodule via the libsubpatch crate.

use std::{
    env,
    io::{self, IsTerminal, Write},
    path::PathBuf,
    process,
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use libsubpatch::{ApplyMode, BearerToken, InitOptions, RefreshOptions, SubpatchError};
use log::{LevelFilter, debug};
use subpatch_term::{Output, Quiet, Terminal};

/// Command-line argument definitions.
mod args;
/// Rendering helpers for refresh reports.
mod ui;

use args::Cli;

/// Map the `-v` count onto a log level.
fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Install the global logger. `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(log_level(verbose))
        .parse_default_env()
        .init();
}

/// Translate parsed arguments into refresh options.
///
/// Consumes the CLI so the raw token string does not outlive this call.
fn refresh_options(cli: Cli) -> (Option<PathBuf>, RefreshOptions) {
    let mode = if cli.commits {
        ApplyMode::Commits
    } else {
        ApplyMode::Index
    };
    let init = InitOptions {
        origin: cli.origin.filter(|origin| !origin.is_empty()),
        bearer_token: cli.fetch_bearer_token.and_then(BearerToken::new),
        shallow: cli.shallow,
    };
    let options = RefreshOptions {
        mode,
        skip_patch: cli.skip_patch,
        init,
    };
    (cli.repo_dir.map(PathBuf::from), options)
}

/// Warning shown when a failed Commits-mode run leaves commits behind.
fn leftover_warning(count: usize) -> String {
    let commits = if count == 1 {
        "1 patch commit".to_string()
    } else {
        format!("{count} patch commits")
    };
    format!("warning: the submodule is not at its baseline, {commits} left in its history")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Determine color output preference early for error handling
    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    let quiet = cli.quiet;
    let output: Arc<dyn Output> = if quiet {
        Arc::new(Quiet)
    } else {
        Arc::new(Terminal::new(color))
    };

    if let Err(e) = run(cli, &output) {
        // Reset any existing colors only if color was enabled and stdout is a TTY
        if color && io::stdout().is_terminal() {
            print!("\x1b[0m");
            if let Err(flush_err) = io::stdout().flush() {
                eprintln!("Failed to flush stdout while resetting colors: {flush_err}");
            }
        }

        let error = e.downcast_ref::<SubpatchError>();
        let exit_code = error.map_or(1, SubpatchError::exit_code);

        let message = format!("{e:#}");
        let leftover = error
            .and_then(SubpatchError::leftover_commits)
            .map(leftover_warning);
        if quiet {
            // Quiet silences progress, never the reason for a failure.
            eprintln!("{message}");
            if let Some(warning) = &leftover {
                eprintln!("{warning}");
            }
        } else {
            if let Err(display_err) = output.fail(&message) {
                eprintln!("Failed to report error via output handler: {display_err:#}");
            }
            if let Some(warning) = &leftover
                && let Err(display_err) = output.warn(warning)
            {
                eprintln!("Failed to report warning via output handler: {display_err:#}");
            }
        }
        if let Err(finish_err) = output.finish() {
            eprintln!("Failed to flush output handler: {finish_err:#}");
        }

        process::exit(exit_code);
    }
    Ok(())
}

/// Run a refresh and render its outcome.
fn run(cli: Cli, output: &Arc<dyn Output>) -> Result<()> {
    let (repo_dir, options) = refresh_options(cli);
    let start_dir = match repo_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    debug!(
        "refreshing from {} in {} mode",
        start_dir.display(),
        options.mode
    );

    let spinner = output.spinner(ui::transfer_label(options.init.shallow));
    let result = libsubpatch::refresh(&start_dir, &options);
    match &result {
        Ok(report) => spinner.finish_success(&ui::done_label(&report.config.submodule_git_path())),
        Err(_) => spinner.finish_fail(ui::FAILED_LABEL),
    }

    let report = result?;
    ui::render_report(output.as_ref(), &report)?;
    ui::emit(output.finish())
}
