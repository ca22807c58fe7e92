//! Live single-line progress rendering for command-line programs.
//!
//! See [`progress`] for the engine and terminal ownership, [`style`] for the
//! color helpers and [`osc`] for taskbar progress in supporting terminals.

pub use error::{Error, Result};

mod error;
pub mod osc;
pub mod progress;
pub mod style;
