//! Process-wide fatal-error channel.
//!
//! Running engines subscribe here while they own the terminal. A fatal error,
//! either raised through [`fatal_error`] or an uncaught panic outside of a
//! render state, drives every subscriber to its error phase so the live line
//! is finished with an error marker instead of being left half drawn.
//!
//! The panic hook is installed when the first engine subscribes and chains to
//! whatever hook was in place before. It is removed again when the last
//! engine unsubscribes, unless that happens during a panic.
//!
//! The panicking thread may hold any engine or terminal lock, so the hook only
//! flags subscribers. Their error lines are written from helper threads.

use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::thread;

use super::lock::LockExt;
use super::render::in_render_scope;

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

/// Something that can be driven to its error state.
pub(crate) trait FatalListener: Send + Sync {
    /// Finishes in the error state before returning.
    fn on_fatal(&self);

    /// Flags the error and finishes it without blocking the caller.
    fn request_fatal(self: Arc<Self>);
}

struct Registry {
    subscribers: Vec<(usize, Weak<dyn FatalListener>)>,
    hook_installed: bool,
}

static REGISTRY: Mutex<Registry> = Mutex::new(Registry {
    subscribers: Vec::new(),
    hook_installed: false,
});

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Keeps a listener subscribed until dropped.
pub(crate) struct Subscription {
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = REGISTRY.locked();
        registry.subscribers.retain(|(id, _)| *id != self.id);
        if registry.subscribers.is_empty() && registry.hook_installed && !thread::panicking() {
            restore_hook();
            registry.hook_installed = false;
        }
    }
}

pub(crate) fn subscribe(listener: Weak<dyn FatalListener>) -> Subscription {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let mut registry = REGISTRY.locked();
    registry.subscribers.push((id, listener));
    if !registry.hook_installed && !thread::panicking() {
        install_hook();
        registry.hook_installed = true;
    }
    Subscription { id }
}

/// Number of engines currently listening for fatal errors.
pub fn subscriber_count() -> usize {
    REGISTRY.locked().subscribers.len()
}

/// Drives every running engine to its error state.
///
/// Each engine finishes its line with an error marker and releases the
/// terminal. Engines that are not running are unaffected.
///
/// Called from inside a render state, the engines are only flagged and finish
/// on a helper thread, since the caller is in the middle of drawing.
pub fn fatal_error(message: &str) {
    let listeners = live(&REGISTRY.locked());
    if listeners.is_empty() {
        return;
    }
    log::error!("tickline: fatal error: {message}");
    let deferred = in_render_scope();
    for listener in listeners {
        if deferred {
            listener.request_fatal();
        } else {
            listener.on_fatal();
        }
    }
}

fn live(registry: &Registry) -> Vec<Arc<dyn FatalListener>> {
    registry
        .subscribers
        .iter()
        .filter_map(|(_, listener)| listener.upgrade())
        .collect()
}

/// Registry access from the panic hook. The panicking thread may be the one
/// holding the registry, so this gives up instead of blocking.
fn try_registry() -> Option<MutexGuard<'static, Registry>> {
    for _ in 0..64 {
        match REGISTRY.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => {
                return Some(PoisonError::into_inner(poisoned));
            }
            Err(TryLockError::WouldBlock) => thread::yield_now(),
        }
    }
    None
}

fn request_all() {
    let listeners = match try_registry() {
        Some(registry) => live(&registry),
        None => return,
    };
    for listener in listeners {
        listener.request_fatal();
    }
}

static PREVIOUS_HOOK: Mutex<Option<Arc<PanicHook>>> = Mutex::new(None);

fn install_hook() {
    let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
    *PREVIOUS_HOOK.locked() = Some(Arc::clone(&previous));
    panic::set_hook(Box::new(move |info| {
        if in_render_scope() {
            // caught and logged where the state is rendered
            return;
        }
        request_all();
        previous(info);
    }));
}

fn restore_hook() {
    if let Some(previous) = PREVIOUS_HOOK.locked().take() {
        let _ = panic::take_hook();
        panic::set_hook(Box::new(move |info| previous(info)));
    }
}
