//! The terminal owner: single writer of the live line and interceptor of
//! program output while progress is displayed.
//!
//! Every terminal write made by this crate goes through one [`TerminalOwner`]
//! and is serialized by its writer lock. While at least one engine is active
//! the owner swaps the process stdout and stderr for pipes and captures what
//! the program writes there, as well as everything written through
//! [`TerminalOwner::stdout`], [`TerminalOwner::stderr`], the module-level
//! [`println`](super::println)/[`eprintln`](super::eprintln) helpers and the
//! [`ProgressLogger`](super::ProgressLogger). A background drain loop prints
//! the captured text as `Sys[out]`/`Sys[err]` blocks above the live line and
//! redraws the line afterwards. The live line itself is written to the
//! original terminal descriptor.
//!
//! ```text
//!   caller threads                 drain thread              render threads
//!   ──────────────                 ────────────              ──────────────
//!   println!  ──▶ fd 1/2 pipes ──┐
//!   stdout().write ──▶ capture ◀─┴ wait(line | interval)
//!                      buffers     take complete lines
//!                                  ┌──── writer lock ────┐   draw(line)
//!                                  │ clear live line     │◀──────────────
//!                                  │ Sys[out]: ...       │
//!                                  │ redraw live line    │
//!                                  └─────────────────────┘
//! ```
//!
//! Activation is reference counted: the first [`TerminalOwner::activate`]
//! starts capturing, redirects the process streams and spawns the drain
//! thread, nested activations reuse it, and the last
//! [`TerminalOwner::deactivate`] restores the streams exactly once, drains what
//! is left, stops capturing and joins the thread. Extra deactivations are
//! ignored.
//!
//! A sink that fails or panics never takes a loop down: the write is retried
//! once in ASCII and then dropped.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, LazyLock, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::osc::{self, ProgressState};
use crate::style;

use super::lock::{LockExt, recover};
use super::output::{ProgressOutput, output};
use super::render::{contain, first_fault};
use super::sink::{ConsoleSink, TermSink};
use super::state::{check_resize_signaled, is_disabled, register_resize_handler};
use super::stdio::{self, CaptureTarget, Registration};

/// Default interval between drain passes when nothing wakes the loop.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

static GLOBAL: LazyLock<TerminalOwner> =
    LazyLock::new(|| TerminalOwner::new(ConsoleSink::stdout()));

/// Which process stream a [`CapturedStream`] stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Owner of terminal output. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct TerminalOwner {
    shared: Arc<OwnerShared>,
}

struct OwnerShared {
    writer: Mutex<Writer>,
    capture: Mutex<Capture>,
    wake: Condvar,
    lifecycle: Mutex<Lifecycle>,
    drain_interval: Mutex<Duration>,
    drain_threads: AtomicUsize,
    capture_stdio: AtomicBool,
}

struct Writer {
    sink: Box<dyn TermSink>,
    /// Live line currently on screen, empty when none.
    live: String,
    osc: Option<(ProgressState, u8)>,
}

#[derive(Default)]
struct Capture {
    capturing: bool,
    stopping: bool,
    line_ready: bool,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[derive(Default)]
struct Lifecycle {
    active: usize,
    drain: Option<JoinHandle<()>>,
    stdio: Option<Registration>,
}

impl TerminalOwner {
    /// Creates an owner drawing into `sink`.
    pub fn new(sink: impl TermSink + 'static) -> Self {
        Self {
            shared: Arc::new(OwnerShared {
                writer: Mutex::new(Writer {
                    sink: Box::new(sink),
                    live: String::new(),
                    osc: None,
                }),
                capture: Mutex::new(Capture::default()),
                wake: Condvar::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
                drain_interval: Mutex::new(DEFAULT_DRAIN_INTERVAL),
                drain_threads: AtomicUsize::new(0),
                capture_stdio: AtomicBool::new(true),
            }),
        }
    }

    /// The process-wide owner drawing to stdout, shared by every engine that
    /// is not given its own.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Returns the owner with a different drain heartbeat.
    pub fn with_drain_interval(self, interval: Duration) -> Self {
        self.set_drain_interval(interval);
        self
    }

    /// Sets the drain heartbeat. Applies from the next drain pass.
    pub fn set_drain_interval(&self, interval: Duration) {
        *self.shared.drain_interval.locked() = interval;
    }

    /// Whether activation redirects the process stdout and stderr. On by
    /// default; when off only the explicit capture handles are intercepted.
    /// Applies from the next activation.
    pub fn with_stdio_capture(self, enabled: bool) -> Self {
        self.shared.capture_stdio.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn drain_interval(&self) -> Duration {
        self.shared.drain_interval()
    }

    /// Returns `true` while at least one engine holds an activation.
    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    /// Number of outstanding activations.
    pub fn active_count(&self) -> usize {
        self.shared.lifecycle.locked().active
    }

    /// Number of live drain threads; never more than one.
    pub fn drain_thread_count(&self) -> usize {
        self.shared.drain_threads.load(Ordering::SeqCst)
    }

    /// Returns `true` if the two handles refer to the same owner.
    pub fn same_as(&self, other: &TerminalOwner) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Takes an activation, starting capture and the drain loop on the first one.
    pub fn activate(&self) {
        let mut life = self.shared.lifecycle.locked();
        life.active += 1;
        if life.active > 1 || is_disabled() {
            return;
        }
        register_resize_handler();
        {
            let mut capture = self.shared.capture.locked();
            capture.capturing = true;
            capture.stopping = false;
        }
        if self.shared.capture_stdio.load(Ordering::SeqCst) {
            let target = Arc::downgrade(&self.shared) as Weak<dyn CaptureTarget>;
            life.stdio = Some(stdio::register(target));
        }
        self.shared.drain_threads.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("tickline-drain".into())
            .spawn(move || drain_loop(shared));
        match spawned {
            Ok(handle) => life.drain = Some(handle),
            Err(err) => {
                self.shared.drain_threads.fetch_sub(1, Ordering::SeqCst);
                log::warn!("tickline: could not spawn drain thread: {err}");
            }
        }
    }

    /// Releases an activation. The last one blocks until captured output is
    /// written and the drain thread has exited.
    pub fn deactivate(&self) {
        let mut life = self.shared.lifecycle.locked();
        if life.active == 0 {
            return;
        }
        life.active -= 1;
        if life.active > 0 {
            return;
        }
        // while the drain thread still reads the pipes
        drop(life.stdio.take());
        {
            let mut capture = self.shared.capture.locked();
            capture.stopping = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = life.drain.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.shared.drain(true, false, true);
    }

    /// Writer standing in for the process stdout.
    pub fn stdout(&self) -> CapturedStream {
        CapturedStream {
            shared: Arc::clone(&self.shared),
            stream: Stream::Stdout,
        }
    }

    /// Writer standing in for the process stderr.
    pub fn stderr(&self) -> CapturedStream {
        CapturedStream {
            shared: Arc::clone(&self.shared),
            stream: Stream::Stderr,
        }
    }

    /// Prints a line to the (captured) stdout.
    pub fn println(&self, s: impl AsRef<str>) {
        let _ = self.stdout().write_all(format!("{}\n", s.as_ref()).as_bytes());
    }

    /// Prints a line to the (captured) stderr.
    pub fn eprintln(&self, s: impl AsRef<str>) {
        let _ = self.stderr().write_all(format!("{}\n", s.as_ref()).as_bytes());
    }

    /// Writes all captured output now, including unterminated lines.
    pub fn flush_captured(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        self.shared.drain(true, false, false);
    }

    /// Redraws the live line with `line`.
    pub(crate) fn draw(&self, line: &str) {
        if is_disabled() {
            return;
        }
        let mut writer = self.shared.writer.locked();
        if writer.live == line {
            return;
        }
        match output() {
            ProgressOutput::UI => {
                let shown = fit(line, width(&*writer.sink));
                clear(&mut *writer.sink);
                put(&mut *writer.sink, &shown);
            }
            ProgressOutput::Text => {
                put(&mut *writer.sink, line);
                put(&mut *writer.sink, "\n");
            }
        }
        flush(&mut *writer.sink);
        writer.live = line.to_string();
    }

    /// Ends the live line: replaces it with `line` if given and moves the
    /// cursor past it.
    pub(crate) fn finish(&self, line: Option<&str>) {
        if is_disabled() {
            return;
        }
        let mut writer = self.shared.writer.locked();
        match (line, output()) {
            (Some(line), ProgressOutput::UI) => {
                let shown = fit(line, width(&*writer.sink));
                clear(&mut *writer.sink);
                put(&mut *writer.sink, &shown);
                put(&mut *writer.sink, "\n");
            }
            (Some(line), ProgressOutput::Text) => {
                put(&mut *writer.sink, line);
                put(&mut *writer.sink, "\n");
            }
            (None, ProgressOutput::UI) if !writer.live.is_empty() => {
                put(&mut *writer.sink, "\n");
            }
            (None, _) => {}
        }
        flush(&mut *writer.sink);
        writer.live.clear();
    }

    /// Emits an OSC 9;4 taskbar progress update when the sink is a supporting terminal.
    pub(crate) fn set_osc(&self, state: ProgressState, percent: u8) {
        if is_disabled() || !osc::is_enabled() {
            return;
        }
        let mut writer = self.shared.writer.locked();
        if !is_terminal(&*writer.sink) || !osc::terminal_supports_osc_9_4() {
            return;
        }
        if writer.osc == Some((state, percent)) {
            return;
        }
        put(&mut *writer.sink, &osc::sequence(state, percent));
        flush(&mut *writer.sink);
        writer.osc = match state {
            ProgressState::None => None,
            _ => Some((state, percent)),
        };
    }

    pub(crate) fn clear_osc(&self) {
        let shown = self.shared.writer.locked().osc.is_some();
        if shown {
            self.set_osc(ProgressState::None, 0);
        }
    }
}

impl std::fmt::Debug for TerminalOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalOwner")
            .field("active", &self.active_count())
            .field("drain_threads", &self.drain_thread_count())
            .finish_non_exhaustive()
    }
}

impl OwnerShared {
    fn drain_interval(&self) -> Duration {
        *self.drain_interval.locked()
    }

    /// One drain pass. Without `force` an unterminated trailing line stays
    /// buffered. `release` stops capturing atomically with the final take.
    fn drain(&self, force: bool, resized: bool, release: bool) {
        stdio::collect();
        let mut writer = self.writer.locked();
        let (out, err) = {
            let mut capture = self.capture.locked();
            let out = take_lines(&mut capture.stdout, force);
            let err = take_lines(&mut capture.stderr, force);
            if release {
                capture.capturing = false;
            }
            (out, err)
        };
        let mut block = format_block(&out, Stream::Stdout);
        block.extend(format_block(&err, Stream::Stderr));
        if block.is_empty() && !resized {
            return;
        }
        if is_disabled() {
            return;
        }
        let writer = &mut *writer;
        let ui = output() == ProgressOutput::UI;
        if ui && !writer.live.is_empty() {
            clear(&mut *writer.sink);
        }
        for line in &block {
            put(&mut *writer.sink, line);
            put(&mut *writer.sink, "\n");
        }
        if ui && !writer.live.is_empty() {
            let shown = fit(&writer.live, width(&*writer.sink));
            put(&mut *writer.sink, &shown);
        }
        flush(&mut *writer.sink);
    }
}

impl CaptureTarget for OwnerShared {
    fn accept(&self, stream: Stream, bytes: &[u8]) -> bool {
        let mut capture = self.capture.locked();
        if !capture.capturing {
            return false;
        }
        match stream {
            Stream::Stdout => capture.stdout.extend_from_slice(bytes),
            Stream::Stderr => capture.stderr.extend_from_slice(bytes),
        }
        if bytes.contains(&b'\n') {
            capture.line_ready = true;
            drop(capture);
            self.wake.notify_all();
        }
        true
    }
}

fn drain_loop(shared: Arc<OwnerShared>) {
    loop {
        let interval = shared.drain_interval();
        let (stopping, notified) = {
            let capture = shared.capture.locked();
            let (mut capture, _) = recover(shared.wake.wait_timeout_while(
                capture,
                interval,
                |c| !c.stopping && !c.line_ready,
            ));
            let notified = capture.line_ready;
            capture.line_ready = false;
            (capture.stopping, notified)
        };
        if stopping {
            break;
        }
        let resized = check_resize_signaled();
        shared.drain(!notified, resized, false);
    }
    shared.drain_threads.fetch_sub(1, Ordering::SeqCst);
}

/// Takes everything up to the last newline, or everything when `force` is set.
fn take_lines(buf: &mut Vec<u8>, force: bool) -> Vec<u8> {
    if force {
        return std::mem::take(buf);
    }
    match buf.iter().rposition(|b| *b == b'\n') {
        Some(pos) => {
            let rest = buf.split_off(pos + 1);
            std::mem::replace(buf, rest)
        }
        None => Vec::new(),
    }
}

/// Formats captured bytes as tagged lines. Empty or separator-only input yields nothing.
fn format_block(bytes: &[u8], stream: Stream) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().all(|c| c == '\n' || c == '\r') {
        return vec![];
    }
    let tag = match stream {
        Stream::Stdout => style::ncyan("Sys[out]:").to_string(),
        Stream::Stderr => style::nred("Sys[err]:").to_string(),
    };
    text.trim_end_matches(['\n', '\r'])
        .split('\n')
        .map(|line| format!("{tag} {}", line.trim_end_matches('\r')))
        .collect()
}

/// Truncates `line` so it fits on one terminal row.
fn fit(line: &str, width: Option<usize>) -> String {
    match width {
        Some(width) if width > 1 => console::truncate_str(line, width - 1, "…").into_owned(),
        _ => line.to_string(),
    }
}

fn width(sink: &dyn TermSink) -> Option<usize> {
    contain(|| sink.width()).unwrap_or(None)
}

fn is_terminal(sink: &dyn TermSink) -> bool {
    contain(|| sink.is_terminal()).unwrap_or(false)
}

fn clear(sink: &mut dyn TermSink) {
    if let Err(err) = settle(contain(|| sink.clear_line())) {
        log::debug!("tickline: clear line failed: {err}");
    }
}

fn flush(sink: &mut dyn TermSink) {
    if let Err(err) = settle(contain(|| sink.flush())) {
        log::debug!("tickline: terminal flush failed: {err}");
    }
}

fn write_str(sink: &mut dyn TermSink, s: &str) -> io::Result<()> {
    settle(contain(|| sink.write_str(s)))
}

/// Folds a panicking sink call into an ordinary I/O error.
fn settle(result: Result<io::Result<()>, String>) -> io::Result<()> {
    result.unwrap_or_else(|panic| Err(io::Error::other(panic)))
}

/// Writes `s`, retrying once with an ASCII transliteration if the sink rejects it.
fn put(sink: &mut dyn TermSink, s: &str) {
    let Err(err) = write_str(sink, s) else {
        return;
    };
    let ascii = style::transliterate(s);
    let err = if ascii == s {
        err
    } else {
        match write_str(sink, &ascii) {
            Ok(()) => return,
            Err(err) => err,
        }
    };
    if first_fault("terminal sink") {
        log::warn!("tickline: terminal write failed: {err}");
    } else {
        log::trace!("tickline: terminal write failed: {err}");
    }
}

/// [`Write`] implementation standing in for a process stream.
///
/// While its owner is active, writes are buffered and never fail; otherwise
/// they go straight to the real stream.
pub struct CapturedStream {
    shared: Arc<OwnerShared>,
    stream: Stream,
}

impl CapturedStream {
    pub fn stream(&self) -> Stream {
        self.stream
    }
}

impl Write for CapturedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shared.accept(self.stream, buf) {
            return Ok(buf.len());
        }
        match self.stream {
            Stream::Stdout => io::stdout().write(buf),
            Stream::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.shared.capture.locked().capturing {
            return Ok(());
        }
        match self.stream {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::sink::MemorySink;

    fn owner() -> (TerminalOwner, MemorySink) {
        let sink = MemorySink::new();
        let owner = TerminalOwner::new(sink.clone()).with_drain_interval(Duration::from_millis(20));
        (owner, sink)
    }

    #[test]
    fn test_take_lines() {
        let mut buf = b"one\ntwo\nthr".to_vec();
        assert_eq!(take_lines(&mut buf, false), b"one\ntwo\n");
        assert_eq!(buf, b"thr");
        assert!(take_lines(&mut buf, false).is_empty());
        assert_eq!(take_lines(&mut buf, true), b"thr");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_format_block() {
        let block = format_block(b"hello\nworld\n", Stream::Stdout);
        let block: Vec<_> = block
            .iter()
            .map(|l| console::strip_ansi_codes(l).to_string())
            .collect();
        assert_eq!(block, vec!["Sys[out]: hello", "Sys[out]: world"]);

        let block = format_block(b"oops\r\n", Stream::Stderr);
        assert_eq!(console::strip_ansi_codes(&block[0]), "Sys[err]: oops");
    }

    #[test]
    fn test_format_block_skips_separators() {
        assert!(format_block(b"", Stream::Stdout).is_empty());
        assert!(format_block(b"\n\r\n\n", Stream::Stdout).is_empty());
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("abcdef", None), "abcdef");
        assert_eq!(fit("abcdef", Some(80)), "abcdef");
        assert_eq!(fit("abcdefghij", Some(6)), "abcd…");
    }

    #[test]
    fn test_activation_is_reference_counted() {
        let (owner, _sink) = owner();
        owner.activate();
        owner.activate();
        assert_eq!(owner.active_count(), 2);
        assert_eq!(owner.drain_thread_count(), 1);
        owner.deactivate();
        assert!(owner.is_active());
        assert_eq!(owner.drain_thread_count(), 1);
        owner.deactivate();
        assert!(!owner.is_active());
        assert_eq!(owner.drain_thread_count(), 0);
        // extra releases are ignored
        owner.deactivate();
        assert_eq!(owner.active_count(), 0);
    }

    #[test]
    fn test_captured_output_is_drained_above_live_line() {
        let (owner, sink) = owner();
        owner.activate();
        owner.draw("live 1");
        owner.println("hello");
        std::thread::sleep(Duration::from_millis(200));
        let lines = sink.lines();
        assert!(lines.contains(&"Sys[out]: hello".to_string()), "{lines:?}");
        assert_eq!(lines.last().map(String::as_str), Some("live 1"));
        owner.deactivate();
    }

    #[test]
    fn test_deactivate_flushes_remaining_output() {
        let (owner, sink) = owner();
        owner.set_drain_interval(Duration::from_secs(60));
        owner.activate();
        let _ = write!(owner.stderr(), "unterminated");
        owner.deactivate();
        assert!(sink.contents().contains("Sys[err]: unterminated"));
    }

    #[test]
    fn test_finish_without_line_terminates_live_line() {
        let (owner, sink) = owner();
        owner.draw("working");
        owner.finish(None);
        owner.finish(None);
        assert_eq!(sink.contents().matches('\n').count(), 1);
    }

    #[test]
    fn test_transliterates_on_narrow_sink() {
        let sink = MemorySink::new().ascii_only();
        let owner = TerminalOwner::new(sink.clone());
        owner.draw("[██░░] ⠋ Awaiting…");
        assert!(sink.contents().contains("[##--] | Awaiting..."));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(TerminalOwner::global().same_as(&TerminalOwner::global()));
        let (owner, _) = owner();
        assert!(!owner.same_as(&TerminalOwner::global()));
    }
}
