//! Terminal styling utilities for colored and formatted output.
//!
//! This module is the formatter used by the rest of the crate. It provides:
//!
//! - A fixed, named [`Color`] palette with [`colorize`] and [`random_color`]
//! - [`strip_line_breaks`] which keeps a fragment on a single terminal line
//! - [`transliterate`] which maps the glyphs the progress line uses to ASCII
//!   for terminals that cannot display them
//! - Convenience functions prefixed by their target stream: `n*` functions
//!   (e.g., [`ngreen`]) style text for **stdout**, `e*` functions (e.g.,
//!   [`ered`]) style text for **stderr**
//!
//! The styling functions automatically detect whether the target stream supports colors
//! and will return plain text when colors are disabled.
//!
//! # Examples
//!
//! ```rust
//! use tickline::style::{colorize, strip_line_breaks};
//!
//! let s = colorize("ok", "green").unwrap();
//! assert!(s.contains("ok"));
//! assert_eq!(strip_line_breaks("a\nb"), "a b");
//! ```

use console::{StyledObject, style};
use rand::seq::SliceRandom;
use strum::IntoEnumIterator;

use crate::{Error, Result};

/// Named colors accepted by [`colorize`].
///
/// Names are matched case-insensitively in snake case (`"bright_red"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::EnumIter,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Color {
    /// Resets to the terminal's default; renders the text unstyled.
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    /// Applies this color to `val` for stdout.
    pub fn paint<D>(self, val: D) -> StyledObject<D> {
        let (color, bright) = match self {
            Color::Default => return nstyle(val),
            Color::Black => (console::Color::Black, false),
            Color::Red => (console::Color::Red, false),
            Color::Green => (console::Color::Green, false),
            Color::Yellow => (console::Color::Yellow, false),
            Color::Blue => (console::Color::Blue, false),
            Color::Magenta => (console::Color::Magenta, false),
            Color::Cyan => (console::Color::Cyan, false),
            Color::White => (console::Color::White, false),
            Color::BrightBlack => (console::Color::Black, true),
            Color::BrightRed => (console::Color::Red, true),
            Color::BrightGreen => (console::Color::Green, true),
            Color::BrightYellow => (console::Color::Yellow, true),
            Color::BrightBlue => (console::Color::Blue, true),
            Color::BrightMagenta => (console::Color::Magenta, true),
            Color::BrightCyan => (console::Color::Cyan, true),
            Color::BrightWhite => (console::Color::White, true),
        };
        let styled = nstyle(val).fg(color);
        if bright { styled.bright() } else { styled }
    }
}

/// Colors `text` with the palette entry named `color`.
///
/// # Errors
///
/// Returns [`Error::UnknownColor`] if `color` is not a [`Color`] name.
pub fn colorize(text: impl AsRef<str>, color: &str) -> Result<String> {
    let color: Color = color
        .parse()
        .map_err(|_| Error::UnknownColor(color.to_string()))?;
    Ok(color.paint(text.as_ref()).to_string())
}

/// Colors `text` with a palette entry picked uniformly at random.
///
/// [`Color::Default`] is never picked. Meant for decorative output only.
pub fn random_color(text: impl AsRef<str>) -> String {
    let palette: Vec<Color> = Color::iter().filter(|c| *c != Color::Default).collect();
    let color = palette
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(Color::Default);
    color.paint(text.as_ref()).to_string()
}

/// Collapses every run of line breaks into a single space.
pub fn strip_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out
}

/// ASCII replacements for glyphs used by the built-in render states.
const FALLBACKS: &[(char, &str)] = &[
    ('█', "#"),
    ('▓', "#"),
    ('▒', "="),
    ('░', "-"),
    ('━', "="),
    ('╸', ">"),
    ('─', "-"),
    ('…', "..."),
    ('✔', "v"),
    ('✗', "x"),
    ('⠋', "|"),
    ('⠙', "/"),
    ('⠹', "-"),
    ('⠸', "\\"),
    ('⠼', "|"),
    ('⠴', "/"),
    ('⠦', "-"),
    ('⠧', "\\"),
    ('⠇', "|"),
    ('⠏', "/"),
    ('◜', "/"),
    ('◠', "-"),
    ('◝', "\\"),
    ('◞', "/"),
    ('◡', "-"),
    ('◟', "\\"),
    ('∙', "."),
    ('●', "o"),
];

/// Maps `text` to an ASCII-only representation.
///
/// Known glyphs use the fallback table, ANSI escape sequences and other ASCII
/// pass through untouched, anything else becomes `?`.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else if let Some((_, repl)) = FALLBACKS.iter().find(|(g, _)| *g == c) {
            out.push_str(repl);
        } else {
            out.push('?');
        }
    }
    out
}

/// Creates a [`StyledObject`] configured for stderr output.
///
/// This is the base function for all `e*` styling functions. The returned object
/// respects the `NO_COLOR` environment variable and terminal capabilities.
pub fn estyle<D>(val: D) -> StyledObject<D> {
    style(val).for_stderr()
}

/// Styles the value with cyan color for stderr.
pub fn ecyan<D>(val: D) -> StyledObject<D> {
    estyle(val).cyan()
}

/// Styles the value with yellow color for stderr.
pub fn eyellow<D>(val: D) -> StyledObject<D> {
    estyle(val).yellow()
}

/// Styles the value with red color for stderr.
pub fn ered<D>(val: D) -> StyledObject<D> {
    estyle(val).red()
}

/// Styles the value with dim/faint formatting for stderr.
pub fn edim<D>(val: D) -> StyledObject<D> {
    estyle(val).dim()
}

/// Creates a [`StyledObject`] configured for stdout output.
///
/// This is the base function for all `n*` styling functions. The returned object
/// respects the `NO_COLOR` environment variable and terminal capabilities.
pub fn nstyle<D>(val: D) -> StyledObject<D> {
    style(val).for_stdout()
}

/// Styles the value with cyan color for stdout.
pub fn ncyan<D>(val: D) -> StyledObject<D> {
    nstyle(val).cyan()
}

/// Styles the value with green color for stdout.
pub fn ngreen<D>(val: D) -> StyledObject<D> {
    nstyle(val).green()
}

/// Styles the value with red color for stdout.
pub fn nred<D>(val: D) -> StyledObject<D> {
    nstyle(val).red()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_known() {
        let out = colorize("test", "red").unwrap();
        assert!(out.contains("test"));
        let out = colorize("test", "Bright_Cyan").unwrap();
        assert!(out.contains("test"));
    }

    #[test]
    fn test_colorize_default_is_plain() {
        assert_eq!(colorize("plain", "default").unwrap(), "plain");
    }

    #[test]
    fn test_colorize_unknown() {
        let err = colorize("test", "mauve").unwrap_err();
        assert!(matches!(err, Error::UnknownColor(ref c) if c == "mauve"));
        assert!(err.is_config());
    }

    #[test]
    fn test_random_color_keeps_text() {
        for _ in 0..32 {
            let out = random_color("hello");
            assert!(console::strip_ansi_codes(&out).contains("hello"));
        }
    }

    #[test]
    fn test_palette_names() {
        assert_eq!(Color::BrightRed.to_string(), "bright_red");
        assert_eq!("cyan".parse::<Color>().unwrap(), Color::Cyan);
        assert_eq!(Color::iter().count(), 17);
    }

    #[test]
    fn test_strip_line_breaks() {
        assert_eq!(strip_line_breaks("one\ntwo"), "one two");
        assert_eq!(strip_line_breaks("one\r\n\r\ntwo"), "one two");
        assert_eq!(strip_line_breaks("no breaks"), "no breaks");
        assert_eq!(strip_line_breaks("\n"), " ");
    }

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("[██░░]"), "[##--]");
        assert_eq!(transliterate("⠋ Awaiting…"), "| Awaiting...");
        assert_eq!(transliterate("日本"), "??");
        assert_eq!(transliterate("\x1b[32mok\x1b[0m"), "\x1b[32mok\x1b[0m");
    }

    #[test]
    fn test_stream_helpers_keep_text() {
        assert!(ecyan("test").to_string().contains("test"));
        assert!(eyellow("test").to_string().contains("test"));
        assert!(ered("test").to_string().contains("test"));
        assert!(edim("test").to_string().contains("test"));
        assert!(ncyan("test").to_string().contains("test"));
        assert!(ngreen("test").to_string().contains("test"));
        assert!(nred("test").to_string().contains("test"));
    }
}
