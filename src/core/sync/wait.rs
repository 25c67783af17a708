/*!
 * Completion Wait State
 *
 * Per-entity lock + condition variable pair guarding a one-shot value.
 * The owner publishes the value exactly once with [`WaitState::complete`];
 * any number of waiters block in [`WaitState::wait`] until it is present.
 *
 * A process uses one of these for its exit status: the exiting process is
 * the only writer, parents waiting on it are the readers.
 */

use super::condvar::CondVar;
use super::lock::Lock;
use std::fmt;

pub struct WaitState<T: Copy> {
    value: Lock<Option<T>>,
    done: CondVar,
}

impl<T: Copy> WaitState<T> {
    pub fn new(lock_name: &'static str, cv_name: &'static str) -> Self {
        Self {
            value: Lock::new(lock_name, None),
            done: CondVar::new(cv_name),
        }
    }

    /// Publish the value and wake every waiter
    ///
    /// Completing twice is fatal.
    pub fn complete(&self, value: T) -> usize {
        let mut guard = self.value.acquire();
        crate::kassert!(
            guard.is_none(),
            "{} completed twice",
            self.value.name()
        );
        *guard = Some(value);
        self.done.broadcast(&guard).count()
    }

    /// Block until the value is published, then return it
    pub fn wait(&self) -> T {
        let mut guard = self.value.acquire();
        loop {
            if let Some(value) = *guard {
                return value;
            }
            self.done.wait(&mut guard);
        }
    }

    /// Current value without blocking
    pub fn peek(&self) -> Option<T> {
        *self.value.acquire()
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.peek().is_some()
    }

    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.done.waiter_count()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for WaitState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitState")
            .field("value", &self.peek())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
