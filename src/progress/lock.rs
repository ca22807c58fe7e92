//! Mutex access that keeps working after another holder panicked.
//!
//! Engines and owners outlive panics on any of their threads, so a poisoned
//! lock is taken over as is instead of propagating the panic.

use std::sync::{LockResult, Mutex, MutexGuard, PoisonError};

pub(crate) trait LockExt<T> {
    fn locked(&self) -> MutexGuard<'_, T>;
}

impl<T> LockExt<T> for Mutex<T> {
    fn locked(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unwraps the result of a condition-variable wait, ignoring poisoning.
pub(crate) fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
