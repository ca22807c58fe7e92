//! Example demonstrating log integration with progress display.
//!
//! Run with: cargo run --example log_integration

use log::{debug, error, info, warn};
use std::{thread, time::Duration};
use tickline::progress::{ProgressEngine, init_log_integration};

fn main() -> tickline::Result<()> {
    // Initialize the progress-aware logger
    // This must be called before any logging
    init_log_integration();

    info!("Starting application");

    let engine = ProgressEngine::builder()
        .label("Processing items")
        .max_value(10.0)
        .start()?;

    for i in 0..10 {
        // Simulate work
        thread::sleep(Duration::from_millis(200));

        engine.report((i + 1) as f64);

        // Records are printed above the progress line while it is shown
        match i {
            2 => debug!("Debug: processed item {}", i + 1),
            4 => info!("Info: halfway there!"),
            6 => warn!("Warning: item {} took longer than expected", i + 1),
            8 => error!("Error: simulated error at item {}", i + 1),
            _ => {}
        }
    }

    info!("Application complete");
    Ok(())
}
