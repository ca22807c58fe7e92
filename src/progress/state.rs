//! Process-wide switches for progress display.
//!
//! Environment variable controls and terminal resize detection. Everything
//! else that is shared between threads lives on the terminal owner or on the
//! engine it belongs to.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Environment Variable Controls
// =============================================================================

static ENV_NO_PROGRESS: OnceLock<bool> = OnceLock::new();
static ENV_TEXT_MODE: OnceLock<bool> = OnceLock::new();

/// Checks if an environment variable is set to a truthy value ("1" or "true").
fn check_env_bool(var_name: &str) -> bool {
    std::env::var(var_name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Returns true if progress display is disabled via `TICKLINE_NO_PROGRESS=1`.
fn env_no_progress() -> bool {
    *ENV_NO_PROGRESS.get_or_init(|| check_env_bool("TICKLINE_NO_PROGRESS"))
}

/// Returns true if text mode is forced via `TICKLINE_TEXT_MODE=1`.
pub(crate) fn env_text_mode() -> bool {
    *ENV_TEXT_MODE.get_or_init(|| check_env_bool("TICKLINE_TEXT_MODE"))
}

/// Returns whether progress display is currently disabled.
///
/// Progress is disabled when the `TICKLINE_NO_PROGRESS` environment variable is set
/// to `1` or `true`. Engines still track their state, but nothing is drawn and
/// captured output passes straight through.
#[must_use]
pub fn is_disabled() -> bool {
    env_no_progress()
}

// =============================================================================
// Terminal Resize Handling (Unix)
// =============================================================================

/// Flag indicating that a terminal resize (SIGWINCH) was received.
static RESIZE_SIGNALED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
static RESIZE_HANDLER: OnceLock<()> = OnceLock::new();

#[cfg(unix)]
extern "C" fn handle_sigwinch(_: nix::libc::c_int) {
    RESIZE_SIGNALED.store(true, Ordering::Relaxed);
}

/// Registers the SIGWINCH signal handler once per process.
#[cfg(unix)]
pub(crate) fn register_resize_handler() {
    RESIZE_HANDLER.get_or_init(|| {
        if let Err(err) = install_sigwinch() {
            log::debug!("tickline: resize handler not installed: {err}");
        }
    });
}

#[cfg(unix)]
fn install_sigwinch() -> crate::Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
    let action = SigAction::new(
        SigHandler::Handler(handle_sigwinch),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic.
    unsafe { sigaction(Signal::SIGWINCH, &action) }?;
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn register_resize_handler() {}

/// Checks and clears the resize signal flag.
pub(crate) fn check_resize_signaled() -> bool {
    RESIZE_SIGNALED.swap(false, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_env_bool() {
        assert!(!check_env_bool("TICKLINE_TEST_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn test_resize_signal_check() {
        RESIZE_SIGNALED.store(true, Ordering::Relaxed);
        // a drain loop in another test may consume the flag first
        let _ = check_resize_signaled();
        assert!(!check_resize_signaled());
    }
}
