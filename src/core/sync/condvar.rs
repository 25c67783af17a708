/*!
 * Condition Variable
 *
 * Named condition variable over `parking_lot::Condvar`, bound to the
 * [`Lock`](super::Lock) its waiters hold.
 *
 * Signal and broadcast take a [`LockGuard`] so the compiler enforces that
 * the associated lock is held when waking; a wakeup can therefore never
 * slip in between a waiter's predicate check and its sleep.
 *
 * Waking gives no ordering guarantee. Every waiter must re-check its
 * condition after `wait` returns.
 */

use super::lock::LockGuard;
use super::traits::WakeResult;
use parking_lot::Condvar;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct CondVar {
    name: &'static str,
    inner: Condvar,
    waiters: AtomicUsize,
}

impl CondVar {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Release the lock, sleep until woken, reacquire the lock
    pub fn wait<T>(&self, guard: &mut LockGuard<'_, T>) {
        crate::kassert!(
            guard.lock().do_i_hold(),
            "cv {} waited on without holding {}",
            self.name,
            guard.lock().name()
        );
        self.waiters.fetch_add(1, Ordering::Relaxed);
        guard.park(|inner| self.inner.wait(inner));
        self.waiters.fetch_sub(1, Ordering::Relaxed);
    }

    /// Wait until `condition` no longer holds
    pub fn wait_while<T>(&self, guard: &mut LockGuard<'_, T>, mut condition: impl FnMut(&T) -> bool) {
        while condition(&**guard) {
            self.wait(guard);
        }
    }

    /// Wake one waiter
    pub fn signal<T>(&self, _held: &LockGuard<'_, T>) -> WakeResult {
        if self.inner.notify_one() {
            WakeResult::Woken(1)
        } else {
            WakeResult::NoWaiters
        }
    }

    /// Wake every current waiter
    pub fn broadcast<T>(&self, _held: &LockGuard<'_, T>) -> WakeResult {
        match self.inner.notify_all() {
            0 => WakeResult::NoWaiters,
            n => WakeResult::Woken(n),
        }
    }

    /// Tasks currently asleep on this condition variable
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for CondVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CondVar")
            .field("name", &self.name)
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
