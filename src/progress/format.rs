//! Formatting utilities for durations and percentages.

use std::time::Duration;

/// Formats a duration as a human-readable string.
///
/// - Under 60 seconds: "42s"
/// - Under 1 hour: "1m30s"
/// - 1 hour or more: "1h30m45s"
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Formats fractional seconds rounded to the nearest second, or `None` when the
/// value is not a usable duration.
pub fn format_seconds(secs: f64) -> Option<String> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs.round())
            .ok()
            .map(format_duration)
    } else {
        None
    }
}

/// Percentage of `current` in `max`, clamped to `[0, 100]`.
///
/// A non-positive or non-finite max yields 0.
pub fn percent(current: f64, max: f64) -> f64 {
    if !(max.is_finite() && max > 0.0) || !current.is_finite() {
        return 0.0;
    }
    (current / max * 100.0).clamp(0.0, 100.0)
}
