//! Integration tests for the fatal-error channel.
//!
//! Fatal errors reach every running engine in the process, so every test in
//! this file expects the engines it starts to end in the error phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tickline::progress::{
    Clock, MemorySink, ProgressEngine, StateKind, SystemClock, TerminalOwner, fatal_error,
};

fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// System clock that panics once armed.
#[derive(Default)]
struct Tripwire {
    clock: SystemClock,
    armed: AtomicBool,
}

impl Clock for Tripwire {
    fn now(&self) -> Duration {
        if self.armed.load(Ordering::SeqCst) {
            panic!("clock went backwards");
        }
        self.clock.now()
    }
}

fn setup(max: f64) -> (ProgressEngine, MemorySink) {
    let sink = MemorySink::new();
    let engine = ProgressEngine::builder()
        .owner(TerminalOwner::new(sink.clone()))
        .max_value(max)
        .states([StateKind::Percent])
        .tick_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    (engine, sink)
}

#[test]
fn test_fatal_error_finishes_running_engines() {
    let (a, sink_a) = setup(10.0);
    let (b, sink_b) = setup(10.0);
    a.report(2.0);
    b.start();
    fatal_error("configuration vanished");
    assert!(a.phase().is_error());
    assert!(b.phase().is_error());
    assert!(sink_a.contents().contains("Error!\n"));
    assert!(sink_b.contents().contains("Error!\n"));
    assert!(!a.owner().is_active());
    assert!(!a.is_render_thread_alive());
}

#[test]
fn test_fatal_error_ignores_idle_engines() {
    let (engine, sink) = setup(10.0);
    fatal_error("nobody is listening");
    assert!(engine.phase().is_idle());
    assert!(sink.contents().is_empty());
}

#[test]
fn test_panic_on_caller_thread_finishes_line() {
    let (engine, sink) = setup(100.0);
    engine.report(40.0);
    let worker = engine.clone();
    let result = thread::spawn(move || {
        worker.report(41.0);
        panic!("worker crashed");
    })
    .join();
    assert!(result.is_err());
    assert!(eventually(|| engine.phase().is_error()));
    assert!(eventually(|| !engine.owner().is_active()));
    let contents = sink.contents();
    assert!(contents.contains("Error!"), "{contents:?}");
    assert!(!contents.contains("Done!"));

    // the engine no longer reacts to reports
    engine.report(100.0);
    assert!(engine.phase().is_error());
}

#[test]
fn test_panicking_clock_on_render_thread_finishes_line() {
    let sink = MemorySink::new();
    let clock = Arc::new(Tripwire::default());
    let engine = ProgressEngine::builder()
        .owner(TerminalOwner::new(sink.clone()))
        .clock(clock.clone())
        .states([StateKind::Percent])
        .tick_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    engine.report(10.0);
    assert!(eventually(|| engine.composed_line() == "10.00%"));

    clock.armed.store(true, Ordering::SeqCst);
    assert!(eventually(|| engine.phase().is_error()));
    assert!(eventually(|| sink.contents().contains("10.00% Error!")));
    assert!(eventually(|| !engine.owner().is_active()));
    assert!(!engine.is_render_thread_alive());

    let (tx, rx) = mpsc::channel();
    let reporter = engine.clone();
    thread::spawn(move || {
        reporter.report(20.0);
        tx.send(()).unwrap();
    });
    rx.recv_timeout(Duration::from_secs(2))
        .expect("report blocked after the render thread panicked");
    assert!(engine.phase().is_error());

    let later = thread::spawn(|| panic!("unrelated failure")).join();
    assert!(later.is_err());
}
