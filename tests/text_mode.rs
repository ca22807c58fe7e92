//! Integration tests for text output mode.
//!
//! Every frame is printed on its own row in text mode, which makes the
//! sequence of drawn lines easy to inspect.

use std::thread;
use std::time::Duration;

use tickline::progress::{
    MemorySink, ProgressEngine, ProgressOutput, StateKind, TerminalOwner, output, set_output,
};

/// Set up text mode for testing (no terminal interaction needed)
fn setup() {
    set_output(ProgressOutput::Text);
}

fn engine(sink: &MemorySink, max: f64) -> ProgressEngine {
    ProgressEngine::builder()
        .owner(TerminalOwner::new(sink.clone()))
        .max_value(max)
        .states([StateKind::Bar])
        .tick_interval(Duration::from_millis(20))
        .build()
        .unwrap()
}

#[test]
fn test_output_get_set() {
    setup();
    assert_eq!(output(), ProgressOutput::Text);
}

#[test]
fn test_bar_fill_is_monotonic_across_frames() {
    setup();
    let sink = MemorySink::new();
    let engine = engine(&sink, 17.0);
    for v in 0..=17 {
        engine.report(v as f64);
        thread::sleep(Duration::from_millis(15));
    }
    assert!(engine.phase().is_done());

    let fills: Vec<usize> = sink
        .contents()
        .lines()
        .filter(|l| l.starts_with('['))
        .map(|l| l.chars().filter(|c| *c == '=').count())
        .collect();
    assert!(fills.len() > 1, "{fills:?}");
    assert!(fills.windows(2).all(|w| w[0] <= w[1]), "{fills:?}");
    assert_eq!(fills.last(), Some(&30));
}

#[test]
fn test_lines_are_newline_terminated() {
    setup();
    let sink = MemorySink::new();
    let engine = engine(&sink, 4.0);
    engine.report(1.0);
    thread::sleep(Duration::from_millis(50));
    engine.report(4.0);
    let contents = sink.contents();
    assert!(!contents.contains('\r'), "{contents:?}");
    assert!(contents.ends_with("Done!\n"));
}

#[test]
fn test_identical_frames_are_not_repeated() {
    setup();
    let sink = MemorySink::new();
    let engine = engine(&sink, 4.0);
    engine.report(2.0);
    // several heartbeats with nothing new to show
    thread::sleep(Duration::from_millis(150));
    engine.stop();
    let frames = sink.contents();
    assert_eq!(frames.matches("[===============>").count(), 1, "{frames:?}");
}
