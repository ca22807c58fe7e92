//! Animated states driven by the engine's heartbeat tick.

use std::collections::HashMap;
use std::sync::LazyLock;

use unicode_width::UnicodeWidthStr;

use crate::Result;

use super::{RenderInput, RenderState};

/// Default spinner name.
const DEFAULT_SPINNER: &str = "mini_dot";

macro_rules! spinner {
    ($name:expr, $frames:expr) => {
        ($name, &$frames as &[&str])
    };
}

/// Named spinner animations.
#[rustfmt::skip]
static SPINNERS: LazyLock<HashMap<&'static str, &'static [&'static str]>> = LazyLock::new(|| {
    [
        spinner!("line", ["|", "/", "-", "\\"]),
        spinner!("dots", ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]),
        spinner!("mini_dot", ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        spinner!("pulse", ["█", "▓", "▒", "░"]),
        spinner!("points", ["∙∙∙", "●∙∙", "∙●∙", "∙∙●"]),
        spinner!("arc", ["◜", "◠", "◝", "◞", "◡", "◟"]),
        spinner!("ellipsis", ["   ", ".  ", ".. ", "..."]),
    ]
    .into_iter()
    .collect()
});

/// Names of the available spinners, sorted.
pub fn spinner_names() -> Vec<&'static str> {
    let mut names: Vec<_> = SPINNERS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Frame sequence padded to a common display width.
#[derive(Debug, Clone)]
struct Frames {
    frames: Vec<String>,
}

impl Frames {
    fn named(name: &str) -> Option<Self> {
        SPINNERS.get(name).map(|frames| Self::new(frames))
    }

    fn new(frames: &[&str]) -> Self {
        let width = frames.iter().map(|f| f.width()).max().unwrap_or(0);
        let frames = frames
            .iter()
            .map(|f| format!("{f}{}", " ".repeat(width - f.width())))
            .collect();
        Self { frames }
    }

    fn at(&self, tick: u64) -> &str {
        if self.frames.is_empty() {
            return "";
        }
        &self.frames[(tick % self.frames.len() as u64) as usize]
    }
}

impl Default for Frames {
    fn default() -> Self {
        Self::named(DEFAULT_SPINNER).unwrap_or_else(|| Self::new(&["|", "/", "-", "\\"]))
    }
}

/// Decorative spinner; ignores the value entirely.
#[derive(Debug, Clone, Default)]
pub struct Loading {
    frames: Frames,
}

impl Loading {
    /// Uses a named spinner; unknown names yield `None`.
    pub fn named(name: &str) -> Option<Self> {
        Frames::named(name).map(|frames| Self { frames })
    }

    /// Uses custom frames.
    pub fn frames(frames: &[&str]) -> Self {
        Self {
            frames: Frames::new(frames),
        }
    }
}

impl RenderState for Loading {
    fn name(&self) -> &'static str {
        "loading"
    }

    fn render(&self, input: &RenderInput) -> Result<String> {
        Ok(self.frames.at(input.tick).to_string())
    }

    fn render_done(&self, _input: &RenderInput) -> Result<String> {
        Ok("✔".to_string())
    }
}

/// Spinner with an "Awaiting…" label, shown until the first value is reported.
#[derive(Debug, Clone)]
pub struct Awaiting {
    frames: Frames,
    label: String,
}

impl Default for Awaiting {
    fn default() -> Self {
        Self {
            frames: Frames::default(),
            label: "Awaiting…".to_string(),
        }
    }
}

impl Awaiting {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl RenderState for Awaiting {
    fn name(&self) -> &'static str {
        "awaiting"
    }

    fn render(&self, input: &RenderInput) -> Result<String> {
        Ok(format!("{} {}", self.frames.at(input.tick), self.label))
    }

    fn render_done(&self, _input: &RenderInput) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tick(tick: u64) -> RenderInput {
        RenderInput::new(0.0, 100.0, Duration::ZERO, tick)
    }

    #[test]
    fn test_loading_cycles_frames() {
        let loading = Loading::named("line").unwrap();
        let frames: Vec<_> = (0..5).map(|t| loading.render(&tick(t)).unwrap()).collect();
        assert_eq!(frames, vec!["|", "/", "-", "\\", "|"]);
    }

    #[test]
    fn test_loading_ignores_value() {
        let loading = Loading::default();
        let a = loading.render(&RenderInput::new(1.0, 10.0, Duration::ZERO, 3)).unwrap();
        let b = loading.render(&RenderInput::new(9.0, 10.0, Duration::from_secs(9), 3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_loading_pads_frames() {
        let loading = Loading::frames(&["a", "bbb"]);
        assert_eq!(loading.render(&tick(0)).unwrap(), "a  ");
        assert_eq!(loading.render(&tick(1)).unwrap(), "bbb");
    }

    #[test]
    fn test_unknown_spinner() {
        assert!(Loading::named("nope").is_none());
        assert!(spinner_names().contains(&"mini_dot"));
    }

    #[test]
    fn test_awaiting() {
        let awaiting = Awaiting::default();
        let s = awaiting.render(&tick(0)).unwrap();
        assert!(s.ends_with("Awaiting…"), "got {s:?}");
        assert_ne!(s, awaiting.render(&tick(1)).unwrap());
        assert_eq!(awaiting.render_done(&tick(0)).unwrap(), "");

        let custom = Awaiting::default().with_label("Waiting for input");
        assert!(custom.render(&tick(2)).unwrap().ends_with("Waiting for input"));
    }

    #[test]
    fn test_loading_empty_frames() {
        assert_eq!(Loading::frames(&[]).render(&tick(4)).unwrap(), "");
    }
}
