use crate::Result;

use super::super::format::{format_duration, format_seconds};
use super::{RenderInput, RenderState};

/// Shown in place of an estimate that cannot be computed yet.
const UNKNOWN: &str = "?";

/// Elapsed time and a linear estimate of the time remaining: `"12s < 30s"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElapsedEstimate;

impl ElapsedEstimate {
    /// Seconds remaining, extrapolated linearly. NaN until there is progress.
    pub fn estimate(input: &RenderInput) -> f64 {
        if input.current > 0.0 {
            let elapsed = input.elapsed.as_secs_f64();
            elapsed / input.current * input.max - elapsed
        } else {
            f64::NAN
        }
    }
}

impl RenderState for ElapsedEstimate {
    fn name(&self) -> &'static str {
        "elapsed_estimate"
    }

    fn render(&self, input: &RenderInput) -> Result<String> {
        let estimate = format_seconds(Self::estimate(input)).unwrap_or_else(|| UNKNOWN.into());
        Ok(format!("{} < {}", format_duration(input.elapsed), estimate))
    }

    fn render_done(&self, input: &RenderInput) -> Result<String> {
        Ok(format_duration(input.elapsed))
    }
}
