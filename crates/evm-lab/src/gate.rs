//! Non-blocking admission to the world state.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, TryLockError,
    },
};

use tracing::{trace, warn};

/// Grants exclusive access to a value without ever waiting.
///
/// At most one [`Admission`] exists at a time. A caller that finds the gate taken is turned away
/// immediately instead of queueing.
#[derive(Debug, Default)]
pub struct AdmissionGate<T> {
    inner: Mutex<T>,
    held: AtomicBool,
}

impl<T> AdmissionGate<T> {
    /// Creates an open gate guarding `value`.
    pub const fn new(value: T) -> Self {
        Self { inner: Mutex::new(value), held: AtomicBool::new(false) }
    }

    /// Admits the caller if nobody else is admitted.
    ///
    /// A panic during a previous admission does not close the gate for good: the value is handed
    /// out again.
    pub fn try_acquire(&self) -> Option<Admission<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => {
                trace!("Admitted");
                Some(self.admit(guard))
            }
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Previous operation panicked while admitted, reopening the gate");
                self.inner.clear_poison();
                Some(self.admit(poisoned.into_inner()))
            }
        }
    }

    /// Whether somebody is admitted right now. Never takes the lock, so it cannot turn away a
    /// concurrent [`Self::try_acquire`]. The answer may be stale by the time it is read.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn admit<'a>(&'a self, guard: MutexGuard<'a, T>) -> Admission<'a, T> {
        self.held.store(true, Ordering::Release);
        Admission { guard, held: &self.held }
    }

    /// Consumes the gate and returns the guarded value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive access granted by an [`AdmissionGate`]. Dropping it reopens the gate.
#[derive(Debug)]
pub struct Admission<'a, T> {
    guard: MutexGuard<'a, T>,
    held: &'a AtomicBool,
}

impl<T> Deref for Admission<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Admission<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for Admission<'_, T> {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
        trace!("Released");
    }
}
