//! Wraps an iterator and prints the default progress line.
//!
//! Run with: cargo run --example wrap

use std::{thread, time::Duration};

use tickline::progress;

fn main() {
    for _ in progress::wrap(0..40) {
        thread::sleep(Duration::from_millis(75));
    }
}
