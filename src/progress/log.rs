//! Integration with the `log` crate for logging while a progress line is shown.
//!
//! [`ProgressLogger`] writes through the global [`TerminalOwner`]'s stderr
//! handle. While an engine is running, records are captured and printed as
//! `Sys[err]` lines above the live line instead of tearing it; otherwise they
//! go straight to stderr.
//!
//! # Example
//!
//! ```rust,no_run
//! use log::{info, warn};
//! use tickline::progress::{init_log_integration, wrap};
//!
//! // Initialize the log integration (call once at startup)
//! init_log_integration();
//!
//! for item in wrap(0..100) {
//!     if item % 25 == 0 {
//!         info!("reached {item}");
//!     }
//! }
//! warn!("all done");
//! ```

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

use super::owner::TerminalOwner;
use crate::style;

/// A logger that integrates with the progress display system.
pub struct ProgressLogger {
    level: LevelFilter,
    target_filter: Option<String>,
    owner: TerminalOwner,
}

impl ProgressLogger {
    /// Creates a new progress-aware logger writing through the global owner.
    ///
    /// # Arguments
    ///
    /// * `level` - The maximum log level to display
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            target_filter: None,
            owner: TerminalOwner::global(),
        }
    }

    /// Creates a new progress-aware logger with a target filter.
    ///
    /// Only log messages whose target starts with the given prefix will be displayed.
    pub fn with_target(level: LevelFilter, target: impl Into<String>) -> Self {
        Self {
            target_filter: Some(target.into()),
            ..Self::new(level)
        }
    }

    /// Writes through `owner` instead of the global one.
    pub fn with_owner(mut self, owner: TerminalOwner) -> Self {
        self.owner = owner;
        self
    }

    /// Installs this logger as the global logger.
    ///
    /// # Errors
    ///
    /// Returns an error if a logger has already been set.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        // Set logger first to avoid modifying max level if logger installation fails
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn format_message(&self, record: &Record) -> String {
        let level_str = match record.level() {
            Level::Error => style::ered("ERROR").to_string(),
            Level::Warn => style::eyellow("WARN").to_string(),
            Level::Info => style::ecyan("INFO").to_string(),
            Level::Debug => style::edim("DEBUG").to_string(),
            Level::Trace => style::edim("TRACE").to_string(),
        };
        format!("{} {}", level_str, record.args())
    }
}

impl Log for ProgressLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > self.level {
            return false;
        }
        if let Some(ref filter) = self.target_filter {
            metadata.target().starts_with(filter)
        } else {
            true
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // single write: records from different threads stay whole
        let message = format!("{}\n", self.format_message(record));
        let _ = self.owner.stderr().write_all(message.as_bytes());
    }

    fn flush(&self) {
        let _ = self.owner.stderr().flush();
    }
}

/// Initializes the progress-aware logger with the default log level (Info).
///
/// # Panics
///
/// Panics if a logger has already been initialized.
pub fn init_log_integration() {
    ProgressLogger::new(LevelFilter::Info)
        .init()
        .expect("Failed to initialize logger - another logger may already be set");
}

/// Initializes the progress-aware logger with a custom log level.
///
/// # Panics
///
/// Panics if a logger has already been initialized.
pub fn init_log_integration_with_level(level: LevelFilter) {
    ProgressLogger::new(level)
        .init()
        .expect("Failed to initialize logger - another logger may already be set");
}

/// Tries to initialize the progress-aware logger, returning an error on failure.
///
/// # Errors
///
/// Returns an error if a logger has already been set.
pub fn try_init_log_integration() -> Result<(), SetLoggerError> {
    ProgressLogger::new(LevelFilter::Info).init()
}

/// Tries to initialize the progress-aware logger with a custom level.
///
/// # Errors
///
/// Returns an error if a logger has already been set.
pub fn try_init_log_integration_with_level(level: LevelFilter) -> Result<(), SetLoggerError> {
    ProgressLogger::new(level).init()
}
