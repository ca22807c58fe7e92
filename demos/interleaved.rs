//! Program output printed while a progress line is shown.
//!
//! Run with: cargo run --example interleaved

use std::{thread, time::Duration};

use tickline::progress::{self, ProgressEngine, StateKind};

fn main() -> tickline::Result<()> {
    let engine = ProgressEngine::builder()
        .label("Downloading")
        .max_value(250.0)
        .states([
            StateKind::Loading,
            StateKind::Bar,
            StateKind::Percent,
            StateKind::ElapsedEstimate,
        ])
        .tick_interval(Duration::from_millis(100))
        .start()?;

    // give the awaiting spinner a moment on screen
    thread::sleep(Duration::from_secs(1));

    for chunk in 1..=250 {
        thread::sleep(Duration::from_millis(20));
        engine.report(chunk as f64);
        if chunk % 50 == 0 {
            progress::println(format!("chunk {chunk} verified"));
        }
        if chunk == 175 {
            progress::eprintln("mirror slow, switching");
        }
    }
    Ok(())
}
