use crate::Result;

use super::{RenderInput, RenderState};

/// Width of `"100.00%"`; shorter values are padded so the line does not jitter.
const WIDTH: usize = 7;

/// Percentage with two decimals, e.g. `"42.50% "`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Percent;

impl RenderState for Percent {
    fn name(&self) -> &'static str {
        "percent"
    }

    fn render(&self, input: &RenderInput) -> Result<String> {
        Ok(format!("{:<width$}", format!("{:.2}%", input.percent), width = WIDTH))
    }

    fn render_done(&self, _input: &RenderInput) -> Result<String> {
        Ok("100.00%".to_string())
    }
}
