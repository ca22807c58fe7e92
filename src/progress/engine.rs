//! The progress engine: a value tracker with its own render thread.
//!
//! An engine moves through [`Phase`]s:
//!
//! ```text
//!   Idle ──start/report──▶ Awaiting ──report──▶ Rendering ──report ≥ max──▶ Done
//!    ▲                         │                    │
//!    └─────────stop────────────┴────────────────────┤
//!                                                   └──hook_error/fatal──▶ Error
//! ```
//!
//! While running, a dedicated thread redraws the line whenever a value is
//! reported and on every heartbeat (the tick interval), which also advances
//! animated states. Heartbeats keep their own schedule, so animations move on
//! however often values arrive. Reports never block on drawing: the latest
//! value wins. Reaching the max value, calling [`ProgressEngine::stop`], or an
//! error joins the render thread and releases the terminal owner before
//! returning.
//!
//! A fatal error raised by a panic only flags the engine; the error line is
//! written from a helper thread that holds no engine or terminal lock, or by
//! the next caller that touches the engine, whichever comes first.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::osc::ProgressState;
use crate::style;
use crate::{Error, Result};

use super::clock::{Clock, SystemClock};
use super::diagnostics::{self, FrameEvent};
use super::fatal::{self, FatalListener, Subscription};
use super::lock::{LockExt, recover};
use super::owner::TerminalOwner;
use super::render::{compose_line, fragment};
use super::states::{Awaiting, RenderInput, RenderState, StateKind, default_states};
use super::wrap::Wrap;

pub const DEFAULT_MAX_VALUE: f64 = 100.0;

/// Default heartbeat of the render thread.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Lifecycle phase of a [`ProgressEngine`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, strum::EnumIs, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Constructed or stopped; no thread, no terminal ownership.
    #[default]
    Idle,
    /// Started, but no value reported yet.
    Awaiting,
    /// At least one value reported.
    Rendering,
    /// The max value was reached.
    Done,
    /// Finished by [`ProgressEngine::hook_error`] or a fatal error.
    Error,
}

impl Phase {
    /// `Awaiting` or `Rendering`.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Awaiting | Self::Rendering)
    }
}

/// What a report lower than the previous one does.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolicy {
    /// The lower value is displayed like any other.
    #[default]
    Never,
    /// The engine restarts with a fresh clock and tick count, as if the
    /// caller began a new run with the same engine.
    OnDecrease,
}

fn validate_max(max: f64) -> Result<f64> {
    if max.is_finite() && max > 0.0 {
        Ok(max)
    } else {
        Err(Error::InvalidMaxValue(max))
    }
}

/// Builder for [`ProgressEngine`].
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tickline::progress::{ProgressEngine, StateKind};
///
/// let engine = ProgressEngine::builder()
///     .max_value(250.0)
///     .label("Uploading")
///     .states([StateKind::Loading, StateKind::Bar, StateKind::Percent])
///     .tick_interval(Duration::from_millis(100))
///     .start()?;
///
/// for i in 1..=250 {
///     engine.report(i as f64);
/// }
/// # Ok::<(), tickline::Error>(())
/// ```
#[must_use]
pub struct ProgressEngineBuilder {
    max_value: f64,
    states: Option<Vec<Box<dyn RenderState>>>,
    awaiting: Awaiting,
    tick_interval: Duration,
    label: String,
    owner: Option<TerminalOwner>,
    clock: Option<Arc<dyn Clock>>,
    reset_policy: ResetPolicy,
}

impl Default for ProgressEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressEngineBuilder {
    pub fn new() -> Self {
        Self {
            max_value: DEFAULT_MAX_VALUE,
            states: None,
            awaiting: Awaiting::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            label: String::new(),
            owner: None,
            clock: None,
            reset_policy: ResetPolicy::default(),
        }
    }

    /// Value at which the engine is done. Must be finite and positive.
    pub fn max_value(mut self, max: f64) -> Self {
        self.max_value = max;
        self
    }

    /// Replaces the state list with built-in states, in order.
    ///
    /// Without any call to this or [`state`](Self::state) the engine uses
    /// [`default_states`].
    pub fn states(mut self, kinds: impl IntoIterator<Item = StateKind>) -> Self {
        self.states = Some(kinds.into_iter().map(StateKind::build).collect());
        self
    }

    /// Appends a state.
    pub fn state(mut self, state: impl RenderState + 'static) -> Self {
        self.states
            .get_or_insert_with(Vec::new)
            .push(Box::new(state));
        self
    }

    /// State shown until the first value is reported.
    pub fn awaiting(mut self, awaiting: Awaiting) -> Self {
        self.awaiting = awaiting;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Text shown before the fragments.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Terminal owner to draw through, [`TerminalOwner::global`] by default.
    pub fn owner(mut self, owner: TerminalOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Builds an idle engine.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMaxValue`] for a bad max value and
    /// [`Error::DuplicateState`] if two states share a name.
    pub fn build(mut self) -> Result<ProgressEngine> {
        validate_max(self.max_value)?;
        let states = self.states.take().unwrap_or_else(default_states);
        let mut seen = Vec::with_capacity(states.len());
        for state in &states {
            if seen.contains(&state.name()) {
                return Err(Error::DuplicateState(state.name()));
            }
            seen.push(state.name());
        }
        Ok(self.assemble(states))
    }

    /// Builds the engine and starts it.
    pub fn start(self) -> Result<ProgressEngine> {
        let engine = self.build()?;
        engine.start();
        Ok(engine)
    }

    fn assemble(self, states: Vec<Box<dyn RenderState>>) -> ProgressEngine {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared {
            progress: Mutex::new(Progress {
                phase: Phase::Idle,
                current: 0.0,
                max: self.max_value,
                last_observed: None,
                started_at: Duration::ZERO,
                elapsed: Duration::ZERO,
                tick: 0,
                dirty: false,
                line: String::new(),
            }),
            wake: Condvar::new(),
            stopping: AtomicBool::new(false),
            error_requested: AtomicBool::new(false),
            states: Mutex::new(states),
            awaiting: self.awaiting,
            label: Mutex::new(self.label),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
        });
        ProgressEngine {
            inner: Arc::new(EngineInner {
                id,
                shared,
                owner: self.owner.unwrap_or_else(TerminalOwner::global),
                worker: Mutex::new(None),
                subscription: Mutex::new(None),
                tick_interval: self.tick_interval,
                reset_policy: self.reset_policy,
            }),
        }
    }
}

/// Tracks a numeric value against a max and renders it as a live line.
///
/// Cheap to clone; clones control the same engine. The engine is stopped when
/// the last handle is dropped.
#[derive(Clone)]
pub struct ProgressEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    id: usize,
    shared: Arc<Shared>,
    owner: TerminalOwner,
    /// Render thread handle; its lock serializes lifecycle transitions.
    worker: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<Subscription>>,
    tick_interval: Duration,
    reset_policy: ResetPolicy,
}

/// State shared with the render thread.
struct Shared {
    progress: Mutex<Progress>,
    wake: Condvar,
    stopping: AtomicBool,
    /// Set by a fatal error until the error line is written.
    error_requested: AtomicBool,
    states: Mutex<Vec<Box<dyn RenderState>>>,
    awaiting: Awaiting,
    label: Mutex<String>,
    clock: Arc<dyn Clock>,
}

struct Progress {
    phase: Phase,
    current: f64,
    max: f64,
    last_observed: Option<f64>,
    started_at: Duration,
    /// Elapsed time of the last drawn frame.
    elapsed: Duration,
    tick: u64,
    dirty: bool,
    /// Last line drawn by the render thread.
    line: String,
}

impl Progress {
    fn begin(&mut self, now: Duration) {
        self.phase = Phase::Awaiting;
        self.current = 0.0;
        self.last_observed = None;
        self.started_at = now;
        self.elapsed = Duration::ZERO;
        self.tick = 0;
        self.dirty = true;
        self.line.clear();
    }

    fn observe(&mut self, value: f64) {
        self.current = value;
        self.last_observed = Some(value);
    }

    fn input(&self, now: Duration) -> RenderInput {
        RenderInput::new(
            self.current,
            self.max,
            now.saturating_sub(self.started_at),
            self.tick,
        )
    }

    /// Input as of the last drawn frame, without reading the clock.
    fn frozen_input(&self) -> RenderInput {
        RenderInput::new(self.current, self.max, self.elapsed, self.tick)
    }
}

enum Outcome {
    Done,
    Error,
    Stopped,
}

type Worker = Option<JoinHandle<()>>;

impl Shared {
    fn compose(&self, phase: Phase, input: &RenderInput, done: bool) -> String {
        let fragments: Vec<String> = if phase.is_awaiting() && !done {
            vec![fragment(&self.awaiting, input, false)]
        } else {
            self.states
                .locked()
                .iter()
                .map(|state| fragment(state.as_ref(), input, done))
                .collect()
        };
        compose_line(&self.label.locked(), &fragments)
    }

    fn mark_dirty(&self) {
        self.progress.locked().dirty = true;
        self.wake.notify_all();
    }

    fn halted(&self) -> bool {
        self.stopping.load(Ordering::SeqCst) || self.error_requested.load(Ordering::SeqCst)
    }
}

fn trace(id: usize, phase: Phase, input: &RenderInput, line: &str) {
    if diagnostics::is_enabled() {
        diagnostics::log_frame(FrameEvent {
            engine: id,
            phase,
            current: input.current,
            max: input.max,
            tick: input.tick,
            rendered: line.to_string(),
        });
    }
}

fn render_loop(id: usize, shared: Arc<Shared>, owner: TerminalOwner, interval: Duration) {
    let mut first = true;
    let mut next_tick = Instant::now() + interval;
    loop {
        let (phase, input) = {
            let mut progress = shared.progress.locked();
            if !first {
                let timeout = next_tick.saturating_duration_since(Instant::now());
                progress = recover(shared.wake.wait_timeout_while(progress, timeout, |p| {
                    !p.dirty && !shared.halted()
                }))
                .0;
                let now = Instant::now();
                if now >= next_tick {
                    progress.tick += 1;
                    next_tick += interval;
                    if next_tick <= now {
                        next_tick = now + interval;
                    }
                }
            }
            if shared.halted() {
                break;
            }
            progress.dirty = false;
            (progress.phase, progress.input(shared.clock.now()))
        };
        first = false;
        let line = shared.compose(phase, &input, false);
        owner.draw(&line);
        let osc = if phase.is_awaiting() {
            ProgressState::Indeterminate
        } else {
            ProgressState::Normal
        };
        owner.set_osc(osc, input.percent as u8);
        trace(id, phase, &input, &line);
        let mut progress = shared.progress.locked();
        progress.line = line;
        progress.elapsed = input.elapsed;
    }
    log::trace!("tickline: render thread {id} exiting");
}

fn with_marker(line: String, marker: String) -> String {
    if line.is_empty() {
        marker
    } else {
        format!("{line} {marker}")
    }
}

impl EngineInner {
    fn lifecycle(&self) -> MutexGuard<'_, Worker> {
        self.worker.locked()
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.shared.progress.locked()
    }

    fn now(&self) -> Duration {
        self.shared.clock.now()
    }

    fn resets_on(&self, progress: &Progress, value: f64) -> bool {
        self.reset_policy == ResetPolicy::OnDecrease
            && progress.last_observed.is_some_and(|last| value < last)
    }

    /// Subscribes to fatal errors and takes an owner activation.
    fn attach(self: &Arc<Self>) {
        let listener = Arc::downgrade(self) as Weak<dyn FatalListener>;
        *self.subscription.locked() = Some(fatal::subscribe(listener));
        self.owner.activate();
    }

    fn spawn(&self, worker: &mut Worker) {
        self.shared.stopping.store(false, Ordering::SeqCst);
        self.shared.error_requested.store(false, Ordering::SeqCst);
        let id = self.id;
        let shared = Arc::clone(&self.shared);
        let owner = self.owner.clone();
        let interval = self.tick_interval;
        let spawned = thread::Builder::new()
            .name(format!("tickline-render-{id}"))
            .spawn(move || render_loop(id, shared, owner, interval));
        match spawned {
            Ok(handle) => *worker = Some(handle),
            Err(err) => log::warn!("tickline: could not spawn render thread: {err}"),
        }
    }

    /// Stops the render thread and waits for it, unless it is the current thread.
    fn halt(&self, worker: &mut Worker) {
        let Some(handle) = worker.take() else {
            return;
        };
        self.shared.stopping.store(true, Ordering::SeqCst);
        drop(self.progress());
        self.shared.wake.notify_all();
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }

    fn teardown(&self, worker: &mut Worker, outcome: Outcome) {
        self.halt(worker);
        let (phase, frozen, last) = {
            let progress = self.progress();
            (progress.phase, progress.frozen_input(), progress.line.clone())
        };
        let mut input = frozen;
        let line = match outcome {
            Outcome::Done => {
                input = self.progress().input(self.now());
                let line = self.shared.compose(Phase::Done, &input, true);
                self.progress().line = line.clone();
                self.owner.clear_osc();
                Some(with_marker(line, style::ngreen("Done!").to_string()))
            }
            Outcome::Error => {
                let line = if last.is_empty() {
                    self.shared.compose(Phase::Rendering, &input, false)
                } else {
                    last
                };
                self.owner.set_osc(ProgressState::Error, input.percent as u8);
                Some(with_marker(line, style::nred("Error!").to_string()))
            }
            Outcome::Stopped => {
                self.owner.clear_osc();
                None
            }
        };
        if let Some(line) = &line {
            trace(self.id, phase, &input, line);
        }
        self.owner.flush_captured();
        self.owner.finish(line.as_deref());
        self.owner.deactivate();
        self.subscription.locked().take();
    }

    fn stop(&self) {
        if self.shared.error_requested.load(Ordering::SeqCst) {
            self.hook_error();
            return;
        }
        let mut worker = self.lifecycle();
        {
            let mut progress = self.progress();
            if !progress.phase.is_running() {
                return;
            }
            progress.phase = Phase::Idle;
        }
        self.teardown(&mut worker, Outcome::Stopped);
    }

    fn hook_error(&self) {
        let mut worker = self.lifecycle();
        self.shared.error_requested.store(false, Ordering::SeqCst);
        {
            let mut progress = self.progress();
            if !progress.phase.is_running() {
                return;
            }
            progress.phase = Phase::Error;
        }
        self.teardown(&mut worker, Outcome::Error);
    }
}

impl FatalListener for EngineInner {
    fn on_fatal(&self) {
        self.hook_error();
    }

    fn request_fatal(self: Arc<Self>) {
        if self.shared.error_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.wake.notify_all();
        let id = self.id;
        let spawned = thread::Builder::new()
            .name(format!("tickline-fatal-{id}"))
            .spawn(move || self.hook_error());
        if let Err(err) = spawned {
            log::warn!("tickline: could not spawn error thread for engine {id}: {err}");
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Default for ProgressEngine {
    fn default() -> Self {
        ProgressEngineBuilder::new().assemble(default_states())
    }
}

impl ProgressEngine {
    pub fn builder() -> ProgressEngineBuilder {
        ProgressEngineBuilder::new()
    }

    /// Idle engine with the default states.
    pub fn new(max_value: f64) -> Result<Self> {
        Self::builder().max_value(max_value).build()
    }

    /// Idle engine with the default states and `label` in front of them.
    pub fn with_label(label: impl Into<String>) -> Self {
        ProgressEngineBuilder::new()
            .label(label)
            .assemble(default_states())
    }

    /// Unique id of this engine within the process.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn owner(&self) -> &TerminalOwner {
        &self.inner.owner
    }

    /// Starts rendering. Does nothing unless the engine is idle.
    pub fn start(&self) {
        let mut worker = self.inner.lifecycle();
        self.start_locked(&mut worker);
    }

    fn start_locked(&self, worker: &mut Worker) {
        {
            let mut progress = self.inner.progress();
            if !progress.phase.is_idle() {
                return;
            }
            progress.begin(self.inner.now());
        }
        self.inner.attach();
        self.inner.spawn(worker);
    }

    /// Stops and immediately restarts with a fresh clock and tick count.
    fn restart(&self, worker: &mut Worker) {
        self.inner.halt(worker);
        let attached = {
            let mut progress = self.inner.progress();
            let attached = progress.phase.is_running();
            progress.begin(self.inner.now());
            attached
        };
        if !attached {
            self.inner.attach();
        }
        self.inner.spawn(worker);
    }

    /// Reports the current value.
    ///
    /// Starts an idle engine. A value at or past the max finishes the line
    /// with every state's done fragment and blocks until the render thread
    /// has exited. Non-finite values are ignored.
    pub fn report(&self, value: f64) {
        if !value.is_finite() {
            log::warn!("tickline: ignoring non-finite progress value {value}");
            return;
        }
        if self.inner.shared.error_requested.load(Ordering::SeqCst) {
            self.inner.hook_error();
            return;
        }
        {
            let mut progress = self.inner.progress();
            if progress.phase.is_running()
                && value < progress.max
                && !self.inner.resets_on(&progress, value)
            {
                progress.observe(value);
                progress.phase = Phase::Rendering;
                progress.dirty = true;
                drop(progress);
                self.inner.shared.wake.notify_all();
                return;
            }
        }
        self.report_transition(value);
    }

    fn report_transition(&self, value: f64) {
        let mut worker = self.inner.lifecycle();
        let (phase, reset) = {
            let progress = self.inner.progress();
            (progress.phase, self.inner.resets_on(&progress, value))
        };
        if reset {
            log::debug!("tickline: engine {} restarting on lower value {value}", self.id());
            self.restart(&mut worker);
        } else if phase.is_idle() {
            self.start_locked(&mut worker);
        } else if !phase.is_running() {
            log::debug!("tickline: engine {} is {phase}, ignoring {value}", self.id());
            return;
        }
        let done = {
            let mut progress = self.inner.progress();
            progress.observe(value);
            if value >= progress.max {
                progress.phase = Phase::Done;
                true
            } else {
                progress.phase = Phase::Rendering;
                progress.dirty = true;
                false
            }
        };
        if done {
            self.inner.teardown(&mut worker, Outcome::Done);
        } else {
            self.inner.shared.wake.notify_all();
        }
    }

    /// Replaces the max value, then reports `value`.
    pub fn report_with_max(&self, value: f64, max: f64) -> Result<()> {
        self.set_max(max)?;
        self.report(value);
        Ok(())
    }

    /// Replaces the max value.
    pub fn set_max(&self, max: f64) -> Result<()> {
        let max = validate_max(max)?;
        self.inner.progress().max = max;
        self.inner.shared.mark_dirty();
        Ok(())
    }

    /// Finishes a running engine with an error marker. Does nothing otherwise.
    pub fn hook_error(&self) {
        self.inner.hook_error();
    }

    /// Stops rendering and gives up the terminal, leaving the line as drawn.
    ///
    /// The engine returns to [`Phase::Idle`] and can be started again. Calling
    /// this on an engine that is not running does nothing.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Restarts the engine with a fresh clock, tick count and value, from any phase.
    pub fn reset(&self) {
        let mut worker = self.inner.lifecycle();
        self.restart(&mut worker);
    }

    /// Wraps an iterator, reporting its progress as it is consumed.
    ///
    /// See [`Wrap`].
    pub fn wrap<I>(&self, iter: I) -> Wrap<I::IntoIter>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
    {
        Wrap::new(self.clone(), iter.into_iter())
    }

    /// Appends a state. A state with the same name is left in place and
    /// `false` is returned.
    pub fn add_state(&self, state: Box<dyn RenderState>) -> bool {
        {
            let mut states = self.inner.shared.states.locked();
            if states.iter().any(|s| s.name() == state.name()) {
                log::debug!("tickline: state {} is already present", state.name());
                return false;
            }
            states.push(state);
        }
        self.inner.shared.mark_dirty();
        true
    }

    /// Appends several states, skipping duplicates. Returns how many were added.
    pub fn add_states(&self, states: impl IntoIterator<Item = Box<dyn RenderState>>) -> usize {
        states
            .into_iter()
            .map(|state| self.add_state(state))
            .filter(|added| *added)
            .count()
    }

    /// Removes the state at `index`.
    pub fn remove_state(&self, index: usize) -> Option<Box<dyn RenderState>> {
        let removed = {
            let mut states = self.inner.shared.states.locked();
            (index < states.len()).then(|| states.remove(index))
        };
        if removed.is_some() {
            self.inner.shared.mark_dirty();
        }
        removed
    }

    /// Removes the state called `name`, if present.
    pub fn remove_state_named(&self, name: &str) -> bool {
        let removed = {
            let mut states = self.inner.shared.states.locked();
            let before = states.len();
            states.retain(|s| s.name() != name);
            states.len() != before
        };
        if removed {
            self.inner.shared.mark_dirty();
        }
        removed
    }

    /// Names of the states, in render order.
    pub fn state_names(&self) -> Vec<&'static str> {
        self.inner
            .shared
            .states
            .locked()
            .iter()
            .map(|s| s.name())
            .collect()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.inner.shared.label.locked() = label.into();
        self.inner.shared.mark_dirty();
    }

    pub fn label(&self) -> String {
        self.inner.shared.label.locked().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.progress().phase
    }

    pub fn current(&self) -> f64 {
        self.inner.progress().current
    }

    pub fn max(&self) -> f64 {
        self.inner.progress().max
    }

    /// Heartbeats since the current run started.
    pub fn tick_count(&self) -> u64 {
        self.inner.progress().tick
    }

    pub fn is_render_thread_alive(&self) -> bool {
        self.inner
            .lifecycle()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// The line most recently drawn by the render thread.
    pub fn composed_line(&self) -> String {
        self.inner.progress().line.clone()
    }
}

impl fmt::Debug for ProgressEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.inner.progress();
        f.debug_struct("ProgressEngine")
            .field("id", &self.inner.id)
            .field("phase", &progress.phase)
            .field("current", &progress.current)
            .field("max", &progress.max)
            .field("tick", &progress.tick)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::clock::ManualClock;
    use crate::progress::sink::MemorySink;
    use crate::progress::states::{Loading, Percent};

    fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn engine(builder: ProgressEngineBuilder) -> (ProgressEngine, MemorySink) {
        let sink = MemorySink::new();
        let owner = TerminalOwner::new(sink.clone()).with_drain_interval(Duration::from_millis(20));
        let engine = builder
            .owner(owner)
            .tick_interval(Duration::from_millis(50))
            .build()
            .unwrap();
        (engine, sink)
    }

    #[test]
    fn test_invalid_max_value() {
        for max in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = ProgressEngine::new(max).unwrap_err();
            assert!(matches!(err, Error::InvalidMaxValue(_)), "{max}: {err}");
        }
        let (engine, _) = engine(ProgressEngine::builder());
        assert!(engine.set_max(0.0).is_err());
        assert!(engine.report_with_max(1.0, -5.0).is_err());
        assert_eq!(engine.max(), DEFAULT_MAX_VALUE);
        assert!(engine.phase().is_idle());
    }

    #[test]
    fn test_duplicate_states_rejected_by_builder() {
        let err = ProgressEngine::builder()
            .states([StateKind::Bar, StateKind::Percent, StateKind::Bar])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateState("bar")));
    }

    #[test]
    fn test_state_list_editing() {
        let (engine, _) = engine(ProgressEngine::builder().states([StateKind::Bar]));
        assert!(engine.add_state(Box::new(Percent)));
        assert!(!engine.add_state(Box::new(Percent)));
        assert_eq!(engine.add_states(vec![StateKind::Percent.build(), StateKind::Loading.build()]), 1);
        assert_eq!(engine.state_names(), vec!["bar", "percent", "loading"]);
        assert!(engine.remove_state(7).is_none());
        assert_eq!(engine.remove_state(0).map(|s| s.name()), Some("bar"));
        assert!(engine.remove_state_named("loading"));
        assert!(!engine.remove_state_named("loading"));
        assert_eq!(engine.state_names(), vec!["percent"]);
    }

    #[test]
    fn test_awaiting_until_first_report() {
        let (engine, sink) = engine(ProgressEngine::builder());
        engine.start();
        assert!(engine.phase().is_awaiting());
        assert!(eventually(|| sink.contents().contains("Awaiting…")));
        engine.report(10.0);
        assert!(engine.phase().is_rendering());
        assert!(eventually(|| engine.composed_line().contains("10.00%")));
        engine.stop();
    }

    #[test]
    fn test_report_starts_idle_engine() {
        let (engine, _) = engine(ProgressEngine::builder());
        engine.report(3.0);
        assert!(engine.phase().is_rendering());
        assert!(engine.is_render_thread_alive());
        assert!(engine.owner().is_active());
        engine.stop();
        assert!(engine.phase().is_idle());
        assert!(!engine.owner().is_active());
    }

    #[test]
    fn test_done_at_max() {
        let clock = Arc::new(ManualClock::new());
        let (engine, sink) = engine(
            ProgressEngine::builder()
                .max_value(4.0)
                .label("copy")
                .clock(clock.clone()),
        );
        engine.report(1.0);
        clock.advance(Duration::from_secs(75));
        engine.report(4.0);
        assert!(engine.phase().is_done());
        assert!(!engine.is_render_thread_alive());
        assert!(!engine.owner().is_active());
        let contents = sink.contents();
        assert_eq!(contents.matches("Done!").count(), 1);
        assert!(
            contents.contains("copy [==============================] - 100.00% - 1m15s Done!\n"),
            "{contents:?}"
        );
        // later reports are ignored
        engine.report(2.0);
        assert!(engine.phase().is_done());
    }

    #[test]
    fn test_elapsed_estimate_uses_clock() {
        let clock = Arc::new(ManualClock::new());
        let (engine, _) = engine(ProgressEngine::builder().clock(clock.clone()));
        engine.start();
        clock.advance(Duration::from_secs(10));
        engine.report(25.0);
        assert!(eventually(|| engine.composed_line().ends_with("10s < 30s")));
        engine.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (engine, sink) = engine(ProgressEngine::builder());
        engine.stop();
        engine.report(50.0);
        engine.stop();
        engine.stop();
        assert!(engine.phase().is_idle());
        assert!(!sink.contents().contains("Done!"));
        assert_eq!(engine.owner().active_count(), 0);
    }

    #[test]
    fn test_hook_error() {
        let (engine, sink) = engine(ProgressEngine::builder().states([StateKind::Percent]));
        engine.hook_error();
        assert!(engine.phase().is_idle());
        engine.report(20.0);
        assert!(eventually(|| engine.composed_line().starts_with("20.00%")));
        engine.hook_error();
        assert!(engine.phase().is_error());
        assert!(sink.contents().contains("20.00%  Error!\n"), "{:?}", sink.contents());
        engine.stop();
        assert!(engine.phase().is_error());
    }

    #[test]
    fn test_ticks_advance_on_heartbeat() {
        let (engine, _) = engine(ProgressEngine::builder().state(Loading::default()));
        engine.start();
        assert!(eventually(|| engine.tick_count() >= 2));
        engine.stop();
    }

    #[test]
    fn test_lower_value_displayed_without_reset() {
        let (engine, _) = engine(ProgressEngine::builder().states([StateKind::Percent]));
        engine.report(60.0);
        engine.report(30.0);
        assert!(engine.phase().is_rendering());
        assert_eq!(engine.current(), 30.0);
        assert!(eventually(|| engine.composed_line().starts_with("30.00%")));
        engine.stop();
    }

    #[test]
    fn test_drop_stops_engine() {
        let (engine, _) = engine(ProgressEngine::builder());
        let owner = engine.owner().clone();
        engine.report(1.0);
        assert!(owner.is_active());
        drop(engine);
        assert!(!owner.is_active());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Rendering.to_string(), "rendering");
        assert!(Phase::Awaiting.is_running());
        assert!(!Phase::Done.is_running());
    }
}
