use crate::Result;

use super::{RenderInput, RenderState};

/// Characters used to render a progress bar.
#[derive(Debug, Clone)]
pub struct BarChars {
    /// Character for filled portion (default: "=")
    pub fill: String,
    /// Character for the leading edge/head (default: ">")
    pub head: String,
    /// Character for empty portion (default: " ")
    pub empty: String,
    /// Left bracket (default: "[")
    pub left: String,
    /// Right bracket (default: "]")
    pub right: String,
}

impl Default for BarChars {
    fn default() -> Self {
        Self {
            fill: "=".to_string(),
            head: ">".to_string(),
            empty: " ".to_string(),
            left: "[".to_string(),
            right: "]".to_string(),
        }
    }
}

impl BarChars {
    /// Block-style characters.
    pub fn blocks() -> Self {
        Self {
            fill: "█".to_string(),
            head: "▓".to_string(),
            empty: "░".to_string(),
            left: "".to_string(),
            right: "".to_string(),
        }
    }

    /// Thin line characters.
    pub fn thin() -> Self {
        Self {
            fill: "━".to_string(),
            head: "╸".to_string(),
            empty: "─".to_string(),
            left: "".to_string(),
            right: "".to_string(),
        }
    }
}

/// Fixed-width progress bar.
///
/// The number of filled cells is `floor(width * percent / 100)`, followed by
/// the head character while the bar is not full.
#[derive(Debug, Clone)]
pub struct Bar {
    width: usize,
    chars: BarChars,
}

impl Default for Bar {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WIDTH)
    }
}

impl Bar {
    pub const DEFAULT_WIDTH: usize = 30;

    pub fn new(width: usize) -> Self {
        Self {
            width,
            chars: BarChars::default(),
        }
    }

    pub fn with_chars(mut self, chars: BarChars) -> Self {
        self.chars = chars;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of filled cells for `percent`, which is clamped to `[0, 100]` first.
    pub fn filled(&self, percent: f64) -> usize {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        ((self.width as f64 * percent / 100.0).floor() as usize).min(self.width)
    }
}

impl RenderState for Bar {
    fn name(&self) -> &'static str {
        "bar"
    }

    fn render(&self, input: &RenderInput) -> Result<String> {
        let filled = self.filled(input.percent);
        let body = if filled >= self.width {
            self.chars.fill.repeat(self.width)
        } else {
            format!(
                "{}{}{}",
                self.chars.fill.repeat(filled),
                self.chars.head,
                self.chars.empty.repeat(self.width - filled - 1)
            )
        };
        Ok(format!("{}{}{}", self.chars.left, body, self.chars.right))
    }

    fn render_done(&self, _input: &RenderInput) -> Result<String> {
        Ok(format!(
            "{}{}{}",
            self.chars.left,
            self.chars.fill.repeat(self.width),
            self.chars.right
        ))
    }
}
