//! Text sinks the terminal owner draws into.

#[cfg(unix)]
use std::fs::File;
use std::io;
use std::sync::{Arc, Mutex};

use console::Term;

use super::owner::Stream;
#[cfg(unix)]
use super::stdio;

/// A line-oriented text sink, usually the real terminal.
pub trait TermSink: Send {
    /// Writes `s` without a trailing newline.
    fn write_str(&mut self, s: &str) -> io::Result<()>;

    /// Moves the cursor to the start of the current line and erases it.
    fn clear_line(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Visible width in columns, if known.
    fn width(&self) -> Option<usize> {
        None
    }

    /// Whether the sink is an interactive terminal.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Sink writing to a [`console::Term`].
///
/// On unix the term writes to a duplicate of the real stream's descriptor, so
/// it keeps reaching the terminal while the process streams are redirected.
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    term: Term,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            term: terminal(Stream::Stdout),
        }
    }

    pub fn stderr() -> Self {
        Self {
            term: terminal(Stream::Stderr),
        }
    }
}

#[cfg(unix)]
fn terminal(stream: Stream) -> Term {
    match stdio::terminal_fd(stream) {
        Some(fd) => Term::read_write_pair(io::stdin(), File::from(fd)),
        None => standard_term(stream),
    }
}

#[cfg(not(unix))]
fn terminal(stream: Stream) -> Term {
    standard_term(stream)
}

fn standard_term(stream: Stream) -> Term {
    match stream {
        Stream::Stdout => Term::stdout(),
        Stream::Stderr => Term::stderr(),
    }
}

impl TermSink for ConsoleSink {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.term.write_str(s)
    }

    fn clear_line(&mut self) -> io::Result<()> {
        if self.term.is_term() {
            self.term.clear_line()
        } else {
            self.term.write_str("\r")
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.term.flush()
    }

    fn width(&self) -> Option<usize> {
        self.term.size_checked().map(|(_, cols)| cols as usize)
    }

    fn is_terminal(&self) -> bool {
        self.term.is_term()
    }
}

/// In-memory sink recording everything written to it.
///
/// Clones share the same transcript, so a test can keep one handle and give
/// the other to a terminal owner. `clear_line` is recorded as `\r`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    transcript: Arc<Mutex<String>>,
    width: Option<usize>,
    ascii_only: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a fixed terminal width.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Rejects writes containing non-ASCII text, like a terminal with a narrow encoding.
    pub fn ascii_only(mut self) -> Self {
        self.ascii_only = true;
        self
    }

    /// Raw transcript with ANSI codes removed.
    pub fn contents(&self) -> String {
        console::strip_ansi_codes(&self.transcript.lock().unwrap()).to_string()
    }

    /// Every non-empty segment between `\r` and `\n`, in write order.
    ///
    /// Each live-line redraw shows up as its own segment.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .split(['\r', '\n'])
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.transcript.lock().unwrap().clear();
    }
}

impl TermSink for MemorySink {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        if self.ascii_only && !s.is_ascii() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "sink cannot encode non-ASCII text",
            ));
        }
        self.transcript.lock().unwrap().push_str(s);
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.transcript.lock().unwrap().push('\r');
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn width(&self) -> Option<usize> {
        self.width
    }
}
