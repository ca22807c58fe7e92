/// OSC (Operating System Command) escape sequences for terminal integration
///
/// Terminals such as Ghostty, VS Code, Windows Terminal and VTE-based ones show
/// a taskbar/tab progress indicator when they receive OSC 9;4 sequences. The
/// terminal owner emits them alongside the live line while an engine renders.
use std::sync::OnceLock;

/// Global OSC progress enable/disable flag
static OSC_ENABLED: OnceLock<bool> = OnceLock::new();

/// Configure OSC progress functionality.
///
/// Only the first call has an effect; later calls are ignored.
pub fn configure(enabled: bool) {
    let _ = OSC_ENABLED.set(enabled);
}

/// Check if OSC progress is enabled
pub(crate) fn is_enabled() -> bool {
    *OSC_ENABLED.get_or_init(|| true)
}

/// OSC 9;4 states for terminal progress indication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    /// No progress indicator (clears any existing progress)
    None,
    /// Normal progress bar with percentage
    Normal,
    /// Error state (typically shows as red)
    Error,
    /// Indeterminate progress (spinner/activity indicator)
    Indeterminate,
}

impl ProgressState {
    fn as_code(&self) -> u8 {
        match self {
            ProgressState::None => 0,
            ProgressState::Normal => 1,
            ProgressState::Error => 2,
            ProgressState::Indeterminate => 3,
        }
    }
}

/// Checks if the current terminal supports OSC 9;4 progress sequences
pub(crate) fn terminal_supports_osc_9_4() -> bool {
    static SUPPORTS_OSC_9_4: OnceLock<bool> = OnceLock::new();

    *SUPPORTS_OSC_9_4.get_or_init(|| {
        if let Ok(term_program) = std::env::var("TERM_PROGRAM") {
            match term_program.as_str() {
                "ghostty" | "vscode" => return true,
                // iTerm2 uses OSC 9 for notifications, not OSC 9;4
                "iTerm.app" | "WezTerm" | "Alacritty" => return false,
                _ => {}
            }
        }
        std::env::var("WT_SESSION").is_ok() || std::env::var("VTE_VERSION").is_ok()
    })
}

/// Builds the OSC 9;4 sequence for `state` at `percent` (clamped to 100).
pub(crate) fn sequence(state: ProgressState, percent: u8) -> String {
    // ESC ] 9 ; 4 ; <state> ; <progress> ST
    format!("\x1b]9;4;{};{}\x1b\\", state.as_code(), percent.min(100))
}
