//! Writes made straight to the process stdout while a line is shown.
//!
//! Kept in its own binary: while an owner is active, the process descriptors
//! point at it.

#![cfg(unix)]

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use tickline::progress::{MemorySink, ProgressEngine, StateKind, TerminalOwner};

#[test]
fn test_process_stdout_shown_above_line() {
    let sink = MemorySink::new();
    let owner = TerminalOwner::new(sink.clone()).with_drain_interval(Duration::from_millis(20));
    let engine = ProgressEngine::builder()
        .owner(owner.clone())
        .states([StateKind::Percent])
        .tick_interval(Duration::from_millis(50))
        .build()
        .unwrap();
    engine.report(30.0);
    assert!(owner.is_active());

    let mut stdout = io::stdout();
    stdout.write_all(b"hello from caller\n").unwrap();
    stdout.flush().unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(
        sink.contents().contains("Sys[out]: hello from caller"),
        "{:?}",
        sink.contents()
    );

    engine.stop();
    assert!(!owner.is_active());
}

#[test]
fn test_stdio_capture_can_be_disabled() {
    let sink = MemorySink::new();
    let owner = TerminalOwner::new(sink.clone())
        .with_drain_interval(Duration::from_millis(20))
        .with_stdio_capture(false);
    owner.activate();
    owner.println("explicit");
    owner.deactivate();
    assert!(sink.contents().contains("Sys[out]: explicit"));
}
