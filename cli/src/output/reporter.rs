//! `ProgressReporter` implementations for the Presentation layer.
//!
//! Wrap `&OutputContext` so application services can emit progress events
//! without depending on any presentation type directly.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "✓".style(self.ctx.styles.success));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "!".style(self.ctx.styles.warning));
        }
    }
}

/// Spinner-backed reporter for interactive terminals. Steps replace the
/// spinner message; successes and warnings are printed above it.
pub struct SpinnerReporter<'a> {
    ctx: &'a OutputContext,
    spinner: ProgressBar,
}

impl<'a> SpinnerReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext, message: &str) -> Self {
        Self {
            ctx,
            spinner: progress::spinner(message),
        }
    }

    /// Clears the spinner, leaving `message` behind with a checkmark.
    pub fn finish(&self, message: &str) {
        progress::finish_ok(&self.spinner, message);
    }

    /// Clears the spinner without leaving a line behind.
    pub fn abandon(&self) {
        self.spinner.finish_and_clear();
    }

    /// Hides the spinner while `f` runs, e.g. for an interactive prompt.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.spinner.suspend(f)
    }
}

impl ProgressReporter for SpinnerReporter<'_> {
    fn step(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    fn success(&self, message: &str) {
        self.spinner.println(format!(
            "  {} {message}",
            "✓".style(self.ctx.styles.success)
        ));
    }

    fn warn(&self, message: &str) {
        self.spinner.println(format!(
            "  {} {message}",
            "!".style(self.ctx.styles.warning)
        ));
    }
}

/// Reporter chosen per invocation: spinner on interactive terminals, plain
/// lines otherwise, nothing in JSON mode.
pub enum Progress<'a> {
    Spinner(SpinnerReporter<'a>),
    Terminal(TerminalReporter<'a>),
    Silent,
}

impl<'a> Progress<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext, json: bool, message: &str) -> Self {
        if json {
            Self::Silent
        } else if ctx.show_progress() {
            Self::Spinner(SpinnerReporter::new(ctx, message))
        } else {
            Self::Terminal(TerminalReporter::new(ctx))
        }
    }

    /// Runs `f` with any spinner hidden.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        match self {
            Self::Spinner(s) => s.suspend(f),
            Self::Terminal(_) | Self::Silent => f(),
        }
    }

    /// Ends the progress display; `message` is kept on success.
    pub fn finish(&self, message: Option<&str>) {
        if let Self::Spinner(s) = self {
            match message {
                Some(message) => s.finish(message),
                None => s.abandon(),
            }
        }
    }
}

impl ProgressReporter for Progress<'_> {
    fn step(&self, message: &str) {
        match self {
            Self::Spinner(s) => s.step(message),
            Self::Terminal(t) => t.step(message),
            Self::Silent => {}
        }
    }

    fn success(&self, message: &str) {
        match self {
            Self::Spinner(s) => s.success(message),
            Self::Terminal(t) => t.success(message),
            Self::Silent => {}
        }
    }

    fn warn(&self, message: &str) {
        match self {
            Self::Spinner(s) => s.warn(message),
            Self::Terminal(t) => t.warn(message),
            Self::Silent => {}
        }
    }
}
