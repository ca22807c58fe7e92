//! Output mode configuration for progress display.

use std::sync::Mutex;

use super::state::env_text_mode;

/// Output mode for progress display.
///
/// Controls how the live line is written to the terminal.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ProgressOutput {
    /// Live line rewritten in place with a carriage return.
    ///
    /// This is the default mode. Captured program output is printed above the
    /// line and the line is redrawn afterwards.
    UI,
    /// Every changed line is printed on its own row.
    ///
    /// Use this for CI systems, log files, or when stdout is not a terminal.
    Text,
}

static OUTPUT: Mutex<ProgressOutput> = Mutex::new(ProgressOutput::UI);

/// Sets the output mode for progress display.
///
/// # Examples
///
/// ```rust,no_run
/// use tickline::progress::{set_output, ProgressOutput};
///
/// if std::env::var("CI").is_ok() {
///     set_output(ProgressOutput::Text);
/// }
/// ```
pub fn set_output(output: ProgressOutput) {
    *OUTPUT.lock().unwrap() = output;
}

/// Returns the current output mode.
///
/// If `TICKLINE_TEXT_MODE=1` environment variable is set, this always returns
/// [`ProgressOutput::Text`] regardless of what was set via [`set_output`].
#[must_use]
pub fn output() -> ProgressOutput {
    if env_text_mode() {
        return ProgressOutput::Text;
    }
    *OUTPUT.lock().unwrap()
}
