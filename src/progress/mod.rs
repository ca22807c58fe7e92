//! Live single-line progress rendering.
//!
//! A [`ProgressEngine`] tracks a value against a max and keeps one terminal
//! line up to date: a label followed by fragments produced by pluggable
//! [`RenderState`]s (bar, percentage, elapsed time and estimate, spinners).
//! While the line is shown, anything the process writes to stdout or stderr
//! is printed above it instead of tearing it. On unix the process descriptors
//! are redirected; elsewhere only [`println`], [`eprintln`], the
//! [`TerminalOwner`] stream handles and the [`ProgressLogger`] are captured.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tickline::progress::ProgressEngine;
//!
//! let engine = ProgressEngine::new(200.0)?;
//! for i in 1..=200 {
//!     // ... do work ...
//!     engine.report(i as f64);
//! }
//! // the line now reads "[==============================] - 100.00% - 3s Done!"
//! # Ok::<(), tickline::Error>(())
//! ```
//!
//! # Iterators
//!
//! ```rust,no_run
//! use tickline::progress;
//!
//! for path in progress::wrap(vec!["a.txt", "b.txt"]) {
//!     progress::println(format!("processing {path}"));
//! }
//! ```
//!
//! # Render States
//!
//! The default line is `Bar - Percent - ElapsedEstimate`. States are chosen by
//! [`StateKind`] or supplied as custom [`RenderState`] implementations:
//!
//! ```rust,no_run
//! use tickline::progress::{ProgressEngine, RenderInput, RenderState, StateKind};
//!
//! struct Items;
//!
//! impl RenderState for Items {
//!     fn name(&self) -> &'static str {
//!         "items"
//!     }
//!     fn render(&self, input: &RenderInput) -> tickline::Result<String> {
//!         Ok(format!("{}/{}", input.current, input.max))
//!     }
//!     fn render_done(&self, input: &RenderInput) -> tickline::Result<String> {
//!         Ok(format!("{} items", input.max))
//!     }
//! }
//!
//! let engine = ProgressEngine::builder()
//!     .label("Syncing")
//!     .states([StateKind::Loading, StateKind::Bar])
//!     .state(Items)
//!     .build()?;
//! # Ok::<(), tickline::Error>(())
//! ```
//!
//! A state that returns an error or panics is shown as `[!]` for that frame;
//! the engine keeps running.
//!
//! # Output Modes
//!
//! - [`ProgressOutput::UI`] - Line rewritten in place (default)
//! - [`ProgressOutput::Text`] - Every changed line printed on its own row
//!
//! # Environment Variables
//!
//! - `TICKLINE_NO_PROGRESS=1` - Disable drawing entirely. Engines still track
//!   their values and phases, but nothing is written and output is not captured.
//! - `TICKLINE_TEXT_MODE=1` - Force text mode regardless of [`set_output`] calls.
//! - `TICKLINE_TRACE_LOG=<path>` - Append every drawn frame as JSON to `path`.
//!
//! Use [`is_disabled`] to check if progress is disabled at runtime.
//!
//! # Threading Model
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Caller Thread(s)                          │
//! │   engine.report(v)          progress::println(..)   log::info!   │
//! │         │                           │                    │        │
//! │         ▼                           ▼                    ▼        │
//! │  Progress (Mutex+Condvar)     capture buffers (Mutex+Condvar)    │
//! └─────────┬───────────────────────────┬────────────────────────────┘
//!           │ wake                      │ wake on completed line
//!           ▼                           ▼
//! ┌───────────────────────┐   ┌──────────────────────────────────────┐
//! │ Render thread         │   │ Drain thread (one per owner)         │
//! │ (one per engine)      │   │ Sys[out]/Sys[err] above the line,    │
//! │ compose + draw        │   │ then redraw the line                 │
//! └──────────┬────────────┘   └───────────────┬──────────────────────┘
//!            └──────────────┬─────────────────┘
//!                           ▼
//!              TerminalOwner writer lock ──▶ terminal
//! ```
//!
//! | Piece | Type | Purpose |
//! |-------|------|---------|
//! | progress | `Mutex<..>` + `Condvar` | Value, max, phase, tick; wakes the render thread |
//! | worker | `Mutex<Option<JoinHandle>>` | Render thread; serializes start/stop/done/error |
//! | capture | `Mutex<..>` + `Condvar` | Captured stdout/stderr bytes; wakes the drain thread |
//! | writer | `Mutex<..>` | The sink and the line currently shown |
//!
//! The render thread wakes on a report or every tick interval (500ms by
//! default); only the latter advances animations, on its own schedule. Callers block only when an
//! engine finishes, stops, or fails, while its render thread is joined and
//! captured output is flushed.
//!
//! ## Fatal Errors
//!
//! While an engine runs, a panic anywhere outside a render state, or a call
//! to [`fatal_error`], finishes its line with `Error!`. A panic only flags the
//! engine; the line is finished on a helper thread or on the next call into
//! the engine.
//!
//! ## Log Integration
//!
//! ```rust,no_run
//! use tickline::progress::init_log_integration;
//!
//! init_log_integration();
//! log::info!("shown above the progress line while one is running");
//! ```

mod clock;
mod diagnostics;
mod engine;
mod fatal;
mod format;
mod lock;
mod log;
mod output;
mod owner;
mod render;
mod sink;
mod state;
mod states;
mod stdio;
mod wrap;

// Re-export public API
pub use clock::{Clock, ManualClock, SystemClock};
pub use diagnostics::FrameEvent;
pub use engine::{
    DEFAULT_MAX_VALUE, DEFAULT_TICK_INTERVAL, Phase, ProgressEngine, ProgressEngineBuilder,
    ResetPolicy,
};
pub use fatal::{fatal_error, subscriber_count};
pub use format::{format_duration, percent};
pub use self::log::{
    ProgressLogger, init_log_integration, init_log_integration_with_level, try_init_log_integration,
    try_init_log_integration_with_level,
};
pub use output::{ProgressOutput, output, set_output};
pub use owner::{CapturedStream, DEFAULT_DRAIN_INTERVAL, Stream, TerminalOwner};
pub use render::{FAULT_PLACEHOLDER, SEPARATOR};
pub use sink::{ConsoleSink, MemorySink, TermSink};
pub use state::is_disabled;
pub use states::{
    Awaiting, Bar, BarChars, ElapsedEstimate, Loading, Percent, RenderInput, RenderState,
    StateKind, default_states, spinner_names,
};
pub use wrap::Wrap;

/// Wraps an iterator in a new engine with the default states drawing through
/// the global owner.
pub fn wrap<I>(iter: I) -> Wrap<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
{
    ProgressEngine::default().wrap(iter)
}

/// Like [`wrap`], with `label` in front of the states.
pub fn wrap_with_label<I>(iter: I, label: impl Into<String>) -> Wrap<I::IntoIter>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
{
    ProgressEngine::with_label(label).wrap(iter)
}

/// Prints a line through the global owner: above the progress line while one
/// is shown, straight to stdout otherwise.
pub fn println(s: impl AsRef<str>) {
    TerminalOwner::global().println(s);
}

/// Like [`println`], for stderr.
pub fn eprintln(s: impl AsRef<str>) {
    TerminalOwner::global().eprintln(s);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_uses_global_owner() {
        let wrapped = wrap(Vec::<u8>::new());
        assert!(wrapped.engine().owner().same_as(&TerminalOwner::global()));
        assert_eq!(wrapped.count(), 0);
    }

    #[test]
    fn test_wrap_with_label() {
        let wrapped = wrap_with_label(Vec::<u8>::new(), "Copying");
        assert!(wrapped.engine().owner().same_as(&TerminalOwner::global()));
        assert_eq!(wrapped.engine().label(), "Copying");
        assert_eq!(wrapped.count(), 0);
    }
}
