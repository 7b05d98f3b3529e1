#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Terminal output primitives for subpatch frontends.
//!
//! This crate provides an [`Output`] trait that abstracts over how status
//! messages are rendered, so the core library can stay UI-agnostic.
//! Implementations include:
//!
//! - [`Terminal`]: A color-capable terminal renderer for production use
//! - [`Quiet`]: A silent implementation that suppresses output (useful for tests)

use std::{
    io::{self, Write},
    result::Result as StdResult,
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use thiserror::Error;

/// Indentation level (in spaces) used for nested output sections.
const INDENT: usize = 4;

/// Spinner tick interval.
const TICK: Duration = Duration::from_millis(100);

/// Errors produced by [`Output`] implementations.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Underlying I/O error while writing to the terminal.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for output operations.
pub type Result<T> = StdResult<T, OutputError>;

/// Handle for an in-progress activity indicator.
pub trait Spinner {
    /// Stop the spinner and replace it with a success line.
    fn finish_success(&self, msg: &str);
    /// Stop the spinner and replace it with a failure line.
    fn finish_fail(&self, msg: &str);
}

/// Abstraction over how user-facing messages are produced.
pub trait Output: Send + Sync {
    /// Print an informational message.
    fn message(&self, msg: &str) -> Result<()>;
    /// Print a success message.
    fn success(&self, msg: &str) -> Result<()>;
    /// Print a warning message.
    fn warn(&self, msg: &str) -> Result<()>;
    /// Print an error/failure message.
    fn fail(&self, msg: &str) -> Result<()>;
    /// Flush any buffered output.
    fn finish(&self) -> Result<()>;
    /// Create a nested output section that indents subsequent messages.
    fn section(&self, header: &str) -> Box<dyn Output>;
    /// Start a spinner for a long blocking step.
    fn spinner(&self, msg: &str) -> Box<dyn Spinner>;
}

/// Output implementation that suppresses all messages.
pub struct Quiet;

/// Spinner that renders nothing.
struct QuietSpinner;

impl Spinner for QuietSpinner {
    fn finish_success(&self, _msg: &str) {}

    fn finish_fail(&self, _msg: &str) {}
}

impl Output for Quiet {
    fn message(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn success(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn warn(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn fail(&self, _msg: &str) -> Result<()> {
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        Ok(())
    }

    fn section(&self, _header: &str) -> Box<dyn Output> {
        Box::new(Self)
    }

    fn spinner(&self, _msg: &str) -> Box<dyn Spinner> {
        Box::new(QuietSpinner)
    }
}

/// Color-capable terminal renderer for user messages.
pub struct Terminal {
    /// Whether ANSI colors are emitted.
    color_choice: ColorChoice,
    /// Current indentation in spaces.
    indent: usize,
}

impl Terminal {
    /// Create a new terminal output.
    ///
    /// - `color`: when `true`, always render colored output; when `false`,
    ///   disable ANSI colors.
    pub fn new(color: bool) -> Self {
        let color_choice = if color {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        };
        Self {
            color_choice,
            indent: 0,
        }
    }

    /// Write `msg` in `color`, one indented line per input line.
    fn write_colored(&self, msg: &str, color: Color) -> Result<()> {
        let mut stdout = StandardStream::stdout(self.color_choice);
        stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
        let pad = " ".repeat(self.indent);
        for line in msg.lines() {
            writeln!(stdout, "{pad}{line}")?;
        }
        stdout.reset()?;
        stdout.flush()?;
        Ok(())
    }
}

impl Output for Terminal {
    fn message(&self, msg: &str) -> Result<()> {
        self.write_colored(msg, Color::Cyan)
    }

    fn success(&self, msg: &str) -> Result<()> {
        self.write_colored(msg, Color::Green)
    }

    fn warn(&self, msg: &str) -> Result<()> {
        self.write_colored(msg, Color::Rgb(255, 165, 0)) // Orange
    }

    fn fail(&self, msg: &str) -> Result<()> {
        self.write_colored(msg, Color::Red)
    }

    fn finish(&self) -> Result<()> {
        io::stdout().flush()?;
        Ok(())
    }

    fn section(&self, header: &str) -> Box<dyn Output> {
        if let Err(err) = self.message(header) {
            eprintln!("Failed to write section header: {err}");
        }

        Box::new(Self {
            color_choice: self.color_choice,
            indent: self.indent + INDENT,
        })
    }

    fn spinner(&self, msg: &str) -> Box<dyn Spinner> {
        let bar = ProgressBar::new_spinner();
        let template = format!("{}{{spinner}} {{msg}}", " ".repeat(self.indent));
        if let Ok(style) = ProgressStyle::with_template(&template) {
            bar.set_style(style);
        }
        bar.set_message(msg.to_string());
        bar.enable_steady_tick(TICK);
        Box::new(TerminalSpinner {
            bar,
            color_choice: self.color_choice,
            indent: self.indent,
        })
    }
}

/// Spinner backed by an indicatif progress bar.
struct TerminalSpinner {
    /// Underlying progress bar.
    bar: ProgressBar,
    /// Color preference inherited from the owning terminal.
    color_choice: ColorChoice,
    /// Indentation inherited from the owning terminal.
    indent: usize,
}

impl TerminalSpinner {
    /// Clear the spinner and print a final line in `color`.
    fn finish_with(&self, msg: &str, color: Color) {
        self.bar.finish_and_clear();
        let terminal = Terminal {
            color_choice: self.color_choice,
            indent: self.indent,
        };
        if let Err(err) = terminal.write_colored(msg, color) {
            eprintln!("Failed to write spinner result: {err}");
        }
    }
}

impl Spinner for TerminalSpinner {
    fn finish_success(&self, msg: &str) {
        self.finish_with(msg, Color::Green);
    }

    fn finish_fail(&self, msg: &str) {
        self.finish_with(msg, Color::Red);
    }
}
