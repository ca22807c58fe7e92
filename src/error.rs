//! Error types for the tickline library.
//!
//! This module provides the [`Error`] enum and [`Result`] type alias used
//! throughout the library for error handling.

use thiserror::Error;

/// Error type for tickline operations.
///
/// Configuration mistakes (bad max value, duplicate state, unknown color) are
/// returned synchronously where the misuse happens. Render and terminal faults
/// are recovered internally and only surface through this type when a state
/// implementation reports one.
#[derive(Error, Debug)]
pub enum Error {
    /// An I/O error occurred (e.g., writing to terminal).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A Unix-specific error occurred (e.g., signal handling).
    #[cfg(unix)]
    #[error(transparent)]
    Nix(#[from] nix::errno::Errno),

    /// The max value of a progress engine must be finite and greater than zero.
    #[error("invalid max value {0}: must be finite and greater than zero")]
    InvalidMaxValue(f64),

    /// A render state with the same name is already part of the engine.
    #[error("render state {0:?} is already present")]
    DuplicateState(&'static str),

    /// The color name is not part of the palette in [`crate::style::Color`].
    #[error("unknown color {0:?}")]
    UnknownColor(String),

    /// The render state identifier is not one of the built-in states.
    #[error("unknown render state {0:?}")]
    UnknownState(String),

    /// A render state failed to produce its fragment.
    ///
    /// The engine replaces the fragment with a placeholder; this variant is
    /// what state implementations return to signal the fault.
    #[error("render state {state} failed: {message}")]
    Render {
        /// Name of the failing state.
        state: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// A specialized `Result` type for tickline operations.
///
/// This is defined as `std::result::Result<T, tickline::Error>` for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` for errors caused by misconfiguration by the caller.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidMaxValue(_)
                | Self::DuplicateState(_)
                | Self::UnknownColor(_)
                | Self::UnknownState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        assert!(Error::InvalidMaxValue(0.0).is_config());
        assert!(Error::DuplicateState("bar").is_config());
        assert!(Error::UnknownColor("mauve".into()).is_config());
        assert!(
            !Error::Render {
                state: "bar",
                message: "boom".into()
            }
            .is_config()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UnknownColor("mauve".into()).to_string(),
            "unknown color \"mauve\""
        );
        assert_eq!(
            Error::Render {
                state: "percent",
                message: "boom".into()
            }
            .to_string(),
            "render state percent failed: boom"
        );
    }
}
