//! Diagnostic frame logging for debugging progress display.
//!
//! When enabled via the `TICKLINE_TRACE_LOG` environment variable, this module
//! logs each rendered frame as JSONL with the rendered text and the engine's
//! state at the time. `TICKLINE_TRACE_RAW` keeps ANSI codes in the text.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::sync::{Mutex, OnceLock};

use super::engine::Phase;

static LOG_WRITER: OnceLock<Option<Mutex<LineWriter<File>>>> = OnceLock::new();
static KEEP_ANSI: OnceLock<bool> = OnceLock::new();

fn get_log_writer() -> Option<&'static Mutex<LineWriter<File>>> {
    LOG_WRITER
        .get_or_init(|| {
            std::env::var("TICKLINE_TRACE_LOG").ok().and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .ok()
                    .map(|file| Mutex::new(LineWriter::new(file)))
            })
        })
        .as_ref()
}

fn keep_ansi() -> bool {
    *KEEP_ANSI.get_or_init(|| std::env::var("TICKLINE_TRACE_RAW").is_ok())
}

/// Frame event emitted for each drawn line.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    pub engine: usize,
    pub phase: Phase,
    pub current: f64,
    pub max: f64,
    pub tick: u64,
    pub rendered: String,
}

impl FrameEvent {
    fn strip(mut self) -> Self {
        if !keep_ansi() {
            self.rendered = console::strip_ansi_codes(&self.rendered).to_string();
        }
        self
    }
}

/// Returns `true` if frames are being traced.
pub fn is_enabled() -> bool {
    get_log_writer().is_some()
}

/// Log a frame event to the trace log file.
pub(crate) fn log_frame(event: FrameEvent) {
    let Some(log_writer) = get_log_writer() else {
        return;
    };
    if let Ok(json) = serde_json::to_string(&event.strip()) {
        if let Ok(mut writer) = log_writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}
