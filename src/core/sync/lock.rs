/*!
 * Kernel Lock
 *
 * Named mutual-exclusion lock over `parking_lot::Mutex` that knows which
 * task holds it. Condition variables need the holder check, and so do
 * callers asserting they run inside a critical section.
 */

use parking_lot::{Mutex, MutexGuard};
use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static TASK_ID: Cell<u64> = const { Cell::new(0) };
}

/// Stable non-zero identifier of the calling task
pub(crate) fn current_task_id() -> u64 {
    TASK_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

/// Mutual-exclusion lock protecting a value of type `T`
pub struct Lock<T> {
    name: &'static str,
    holder: AtomicU64,
    inner: Mutex<T>,
}

impl<T> Lock<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            holder: AtomicU64::new(0),
            inner: Mutex::new(value),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquire the lock, blocking until it is free
    ///
    /// Re-acquiring a lock the calling task already holds is fatal.
    pub fn acquire(&self) -> LockGuard<'_, T> {
        crate::kassert!(
            !self.do_i_hold(),
            "lock {} acquired recursively",
            self.name
        );
        let guard = self.inner.lock();
        self.holder.store(current_task_id(), Ordering::Release);
        LockGuard { lock: self, guard }
    }

    /// Whether the calling task holds this lock
    #[inline]
    pub fn do_i_hold(&self) -> bool {
        self.holder.load(Ordering::Acquire) == current_task_id()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> fmt::Debug for Lock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("name", &self.name)
            .field("held", &(self.holder.load(Ordering::Relaxed) != 0))
            .finish()
    }
}

/// Proof that the calling task holds a [`Lock`]
///
/// Dropping the guard releases the lock.
pub struct LockGuard<'a, T> {
    lock: &'a Lock<T>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> LockGuard<'a, T> {
    #[inline]
    pub fn lock(&self) -> &'a Lock<T> {
        self.lock
    }

    /// Give up ownership around a blocking wait
    pub(super) fn park<R>(&mut self, f: impl FnOnce(&mut MutexGuard<'a, T>) -> R) -> R {
        self.lock.holder.store(0, Ordering::Release);
        let result = f(&mut self.guard);
        self.lock
            .holder
            .store(current_task_id(), Ordering::Release);
        result
    }
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.holder.store(0, Ordering::Release);
    }
}
