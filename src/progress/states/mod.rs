//! Render states: the pluggable fragments a progress line is composed of.
//!
//! Every state turns a [`RenderInput`] into a short piece of text, one for the
//! in-progress case and one for the done case. The engine joins the fragments
//! of all its states with `" - "` in the order the states were added.
//!
//! ```rust
//! use std::time::Duration;
//! use tickline::progress::{Bar, Percent, RenderInput, RenderState};
//!
//! let input = RenderInput::new(5.0, 10.0, Duration::from_secs(2), 0);
//! assert_eq!(Percent.render(&input).unwrap(), "50.00% ");
//! assert!(Bar::new(10).render(&input).unwrap().starts_with("[====="));
//! ```

mod bar;
mod elapsed;
mod percent;
mod spinner;

use std::fmt;
use std::time::Duration;

use crate::{Error, Result};

use super::format::percent;

pub use bar::{Bar, BarChars};
pub use elapsed::ElapsedEstimate;
pub use percent::Percent;
pub use spinner::{Awaiting, Loading, spinner_names};

/// Everything a state may look at when rendering. Passed by value on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderInput {
    pub current: f64,
    pub max: f64,
    /// `current / max` as a percentage, clamped to `[0, 100]`.
    pub percent: f64,
    /// Time since the engine started.
    pub elapsed: Duration,
    /// Heartbeat ticks since the engine started.
    pub tick: u64,
}

impl RenderInput {
    pub fn new(current: f64, max: f64, elapsed: Duration, tick: u64) -> Self {
        Self {
            current,
            max,
            percent: percent(current, max),
            elapsed,
            tick,
        }
    }
}

/// A strategy producing one fragment of the progress line.
///
/// Implementations must be cheap and must never block: they run on the
/// render thread once per redraw. A returned error (or a panic) is caught by
/// the engine and the fragment is replaced with a placeholder.
pub trait RenderState: Send + Sync {
    /// Tag identifying the state. An engine holds at most one state per name.
    fn name(&self) -> &'static str;

    /// Fragment shown while the engine is running.
    fn render(&self, input: &RenderInput) -> Result<String>;

    /// Fragment shown once the engine is done.
    fn render_done(&self, input: &RenderInput) -> Result<String>;
}

impl fmt::Debug for dyn RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderState({})", self.name())
    }
}

/// Identifiers of the built-in render states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StateKind {
    Bar,
    Percent,
    ElapsedEstimate,
    Loading,
    Awaiting,
}

impl StateKind {
    /// Builds the state with its default settings.
    pub fn build(self) -> Box<dyn RenderState> {
        match self {
            StateKind::Bar => Box::new(Bar::default()),
            StateKind::Percent => Box::new(Percent),
            StateKind::ElapsedEstimate => Box::new(ElapsedEstimate),
            StateKind::Loading => Box::new(Loading::default()),
            StateKind::Awaiting => Box::new(Awaiting::default()),
        }
    }

    /// Parses an identifier such as `"elapsed_estimate"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownState`] for anything that is not a built-in state.
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| Error::UnknownState(name.to_string()))
    }
}

impl From<StateKind> for Box<dyn RenderState> {
    fn from(kind: StateKind) -> Self {
        kind.build()
    }
}

/// The states an engine gets unless told otherwise: bar, percent, elapsed/estimate.
pub fn default_states() -> Vec<Box<dyn RenderState>> {
    [StateKind::Bar, StateKind::Percent, StateKind::ElapsedEstimate]
        .into_iter()
        .map(StateKind::build)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_render_input_percent() {
        let input = RenderInput::new(25.0, 50.0, Duration::ZERO, 0);
        assert_eq!(input.percent, 50.0);
        let input = RenderInput::new(80.0, 50.0, Duration::ZERO, 0);
        assert_eq!(input.percent, 100.0);
    }

    #[test]
    fn test_kind_names_match_state_names() {
        for kind in StateKind::iter() {
            assert_eq!(kind.build().name(), kind.to_string());
        }
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(StateKind::parse("bar").unwrap(), StateKind::Bar);
        assert_eq!(
            StateKind::parse("Elapsed_Estimate").unwrap(),
            StateKind::ElapsedEstimate
        );
        assert!(matches!(
            StateKind::parse("sparkline"),
            Err(Error::UnknownState(_))
        ));
    }

    #[test]
    fn test_default_states_order() {
        let names: Vec<_> = default_states().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["bar", "percent", "elapsed_estimate"]);
    }
}
