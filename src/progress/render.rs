//! Composition of the progress line from render-state fragments.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

use crate::style::strip_line_breaks;

use super::lock::LockExt;

use super::states::{RenderInput, RenderState};

/// Shown in place of a fragment whose state failed.
pub const FAULT_PLACEHOLDER: &str = "[!]";

/// Joins fragments on the progress line.
pub const SEPARATOR: &str = " - ";

thread_local! {
    static IN_RENDER: Cell<bool> = const { Cell::new(false) };
}

/// Returns `true` while the current thread is inside a render-state call.
///
/// Panics raised there are render faults, not fatal errors.
pub(crate) fn in_render_scope() -> bool {
    IN_RENDER.with(Cell::get)
}

struct RenderScope {
    previous: bool,
}

impl RenderScope {
    fn enter() -> Self {
        Self {
            previous: IN_RENDER.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        IN_RENDER.with(|flag| flag.set(self.previous));
    }
}

/// Runs `f`, turning a panic into its message instead of unwinding.
///
/// Panics raised in here are contained faults, so the panic hook does not
/// treat them as fatal.
pub(crate) fn contain<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    let _scope = RenderScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

static FAULTED: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Returns `true` the first time `source` reports a fault in this process.
pub(crate) fn first_fault(source: &str) -> bool {
    let mut faulted = FAULTED.locked();
    if faulted.iter().any(|s| s == source) {
        return false;
    }
    faulted.push(source.to_string());
    true
}

fn report_fault(state: &str, what: std::fmt::Arguments<'_>) {
    if first_fault(state) {
        log::warn!("tickline: state {state} {what}");
    } else {
        log::trace!("tickline: state {state} {what}");
    }
}

/// Renders one fragment. Errors and panics yield [`FAULT_PLACEHOLDER`].
pub(crate) fn fragment(state: &dyn RenderState, input: &RenderInput, done: bool) -> String {
    let result = contain(|| {
        if done {
            state.render_done(input)
        } else {
            state.render(input)
        }
    });
    match result {
        Ok(Ok(text)) => strip_line_breaks(&text),
        Ok(Err(err)) => {
            report_fault(state.name(), format_args!("failed to render: {err}"));
            FAULT_PLACEHOLDER.to_string()
        }
        Err(message) => {
            report_fault(state.name(), format_args!("panicked while rendering: {message}"));
            FAULT_PLACEHOLDER.to_string()
        }
    }
}

/// `label` followed by the non-empty fragments joined with [`SEPARATOR`].
pub(crate) fn compose_line(label: &str, fragments: &[String]) -> String {
    let body = fragments
        .iter()
        .filter(|f| !f.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    match (label.is_empty(), body.is_empty()) {
        (true, _) => body,
        (false, true) => label.to_string(),
        (false, false) => format!("{label} {body}"),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result};
    use std::time::Duration;

    struct Fixed(&'static str);

    impl RenderState for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn render(&self, _: &RenderInput) -> Result<String> {
            Ok(self.0.to_string())
        }
        fn render_done(&self, _: &RenderInput) -> Result<String> {
            Ok("done".to_string())
        }
    }

    struct Failing;

    impl RenderState for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn render(&self, _: &RenderInput) -> Result<String> {
            Err(Error::Render {
                state: "failing",
                message: "boom".into(),
            })
        }
        fn render_done(&self, _: &RenderInput) -> Result<String> {
            panic!("boom");
        }
    }

    fn input() -> RenderInput {
        RenderInput::new(1.0, 2.0, Duration::ZERO, 0)
    }

    #[test]
    fn test_fragment() {
        assert_eq!(fragment(&Fixed("abc"), &input(), false), "abc");
        assert_eq!(fragment(&Fixed("abc"), &input(), true), "done");
    }

    #[test]
    fn test_fragment_strips_line_breaks() {
        assert_eq!(fragment(&Fixed("a\nb\r\nc"), &input(), false), "a b c");
    }

    #[test]
    fn test_fragment_faults() {
        assert_eq!(fragment(&Failing, &input(), false), FAULT_PLACEHOLDER);
        assert_eq!(fragment(&Failing, &input(), true), FAULT_PLACEHOLDER);
        assert!(!in_render_scope());
    }

    #[test]
    fn test_fault_reported_once_per_source() {
        assert!(first_fault("render-test-source"));
        assert!(!first_fault("render-test-source"));
        assert!(first_fault("render-test-other"));
    }

    #[test]
    fn test_contain() {
        assert_eq!(contain(|| 7), Ok(7));
        assert_eq!(contain(|| -> u8 { panic!("bad sink") }), Err("bad sink".to_string()));
        assert!(!in_render_scope());
    }

    #[test]
    fn test_compose_line() {
        let frags = vec!["[==]".to_string(), String::new(), "50.00% ".to_string()];
        assert_eq!(compose_line("", &frags), "[==] - 50.00% ");
        assert_eq!(compose_line("Copying", &frags), "Copying [==] - 50.00% ");
        assert_eq!(compose_line("Copying", &[]), "Copying");
        assert_eq!(compose_line("", &[]), "");
    }
}
