/*!
 * Kernel Tasks
 *
 * Each user process runs on one OS thread. A task leaves through
 * [`exit_current`], which unwinds to the root of the thread so that no
 * frame of the exiting program runs again.
 */

use super::traits::TaskSpawner;
use crate::core::errors::{KernelError, Resource};
use crate::core::types::KernelResult;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, trace};

/// Unwind payload marking a deliberate task exit
#[derive(Debug)]
pub struct TaskExit;

/// End the calling task without returning
///
/// Only valid on a task started by [`ThreadSpawner`]; anywhere else the
/// unwind reaches the thread's own root as an ordinary panic.
pub fn exit_current() -> ! {
    panic::resume_unwind(Box::new(TaskExit))
}

/// Text of a panic payload, for logging
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Run a task body, absorbing the unwind started by [`exit_current`]
fn run_task(entry: Box<dyn FnOnce() + Send>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        if payload.is::<TaskExit>() {
            return;
        }
        error!(reason = %panic_message(payload.as_ref()), "task panicked");
        panic::resume_unwind(payload);
    }
}

/// Decrements the live count however the task ends
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Spawns tasks as named OS threads, optionally capped
#[derive(Debug, Default)]
pub struct ThreadSpawner {
    limit: Option<usize>,
    live: Arc<AtomicUsize>,
}

impl ThreadSpawner {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn claim(&self) -> KernelResult<Slot> {
        let limit = self.limit.unwrap_or(usize::MAX);
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < limit).then_some(live + 1)
            })
            .map_err(|live| {
                KernelError::resource_exhausted(Resource::Tasks, format!("{live} tasks running"))
            })?;
        Ok(Slot(Arc::clone(&self.live)))
    }
}

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, name: String, entry: Box<dyn FnOnce() + Send + 'static>) -> KernelResult<()> {
        let slot = self.claim()?;
        trace!(task = %name, "Spawning task");
        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let _slot = slot;
                run_task(entry);
            })
            .map(|_| ())
            .map_err(|e| KernelError::resource_exhausted(Resource::Tasks, e.to_string()))
    }

    fn live_tasks(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}
