/*!
 * Process Record
 *
 * Lock discipline:
 * - `family` is only taken with the process table lock held, or after it
 *   (table -> family, never the reverse)
 * - `exit` is completed under the table lock but waited on without it
 *   (table -> exit, never the reverse)
 * - `space` is a leaf
 */

use super::types::{ProcessInfo, ProcessState, WaitStatus};
use crate::core::data_structures::InlineString;
use crate::core::errors::fatal;
use crate::core::sync::WaitState;
use crate::core::types::Pid;
use crate::vm::AddressSpace;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct Family {
    parent: Weak<Process>,
    children: Vec<Arc<Process>>,
}

pub struct Process {
    pid: Pid,
    name: Mutex<InlineString>,
    space: Mutex<Option<Box<dyn AddressSpace>>>,
    family: Mutex<Family>,
    exit: WaitState<WaitStatus>,
    reaped: AtomicBool,
    tasks: AtomicUsize,
}

impl Process {
    pub(super) fn new(
        pid: Pid,
        name: &str,
        space: Option<Box<dyn AddressSpace>>,
        parent: Weak<Process>,
    ) -> Self {
        Self {
            pid,
            name: Mutex::new(name.into()),
            space: Mutex::new(space),
            family: Mutex::new(Family {
                parent,
                children: Vec::new(),
            }),
            exit: WaitState::new("proc_exit", "proc_exit_cv"),
            reaped: AtomicBool::new(false),
            tasks: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> String {
        self.name.lock().to_string()
    }

    pub(super) fn set_name(&self, name: &str) {
        *self.name.lock() = name.into();
    }

    pub fn state(&self) -> ProcessState {
        if self.reaped.load(Ordering::Acquire) {
            ProcessState::Reaped
        } else if self.exit.is_complete() {
            ProcessState::Exited
        } else {
            ProcessState::Running
        }
    }

    #[inline]
    pub fn has_exited(&self) -> bool {
        self.exit.is_complete()
    }

    pub fn exit_status(&self) -> Option<WaitStatus> {
        self.exit.peek()
    }

    /// Block until the process has exited
    pub fn wait_for_exit(&self) -> WaitStatus {
        self.exit.wait()
    }

    pub(super) fn publish_exit(&self, status: WaitStatus) -> usize {
        self.exit.complete(status)
    }

    pub(super) fn mark_reaped(&self) {
        self.reaped.store(true, Ordering::Release);
    }

    // Tasks

    /// Tasks currently running this process's code
    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.load(Ordering::Acquire)
    }

    pub(super) fn attach_task(&self) {
        self.tasks.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the number of tasks still attached
    pub(super) fn detach_task(&self) -> usize {
        match self
            .tasks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(before) => before - 1,
            Err(_) => fatal(&format!("process {} has no task to detach", self.pid)),
        }
    }

    // Address space

    /// Run `f` on the address space, `None` when the process has none
    pub fn with_space<R>(&self, f: impl FnOnce(&mut dyn AddressSpace) -> R) -> Option<R> {
        let mut space = self.space.lock();
        match space.as_mut() {
            Some(space) => Some(f(space.as_mut())),
            None => None,
        }
    }

    pub fn has_space(&self) -> bool {
        self.space.lock().is_some()
    }

    pub(super) fn replace_space(
        &self,
        space: Box<dyn AddressSpace>,
    ) -> Option<Box<dyn AddressSpace>> {
        self.space.lock().replace(space)
    }

    pub(super) fn take_space(&self) -> Option<Box<dyn AddressSpace>> {
        self.space.lock().take()
    }

    // Family, table lock held by the caller

    pub fn parent(&self) -> Option<Arc<Process>> {
        self.family.lock().parent.upgrade()
    }

    pub(super) fn clear_parent(&self) {
        self.family.lock().parent = Weak::new();
    }

    pub fn children(&self) -> Vec<Pid> {
        self.family.lock().children.iter().map(|c| c.pid).collect()
    }

    pub(super) fn child(&self, pid: Pid) -> Option<Arc<Process>> {
        self.family
            .lock()
            .children
            .iter()
            .find(|c| c.pid == pid)
            .cloned()
    }

    pub(super) fn add_child(&self, child: Arc<Process>) {
        self.family.lock().children.push(child);
    }

    /// Unlink a child, returning whether it was linked
    pub(super) fn remove_child(&self, pid: Pid) -> bool {
        let mut family = self.family.lock();
        let before = family.children.len();
        family.children.retain(|c| c.pid != pid);
        family.children.len() != before
    }

    pub(super) fn take_children(&self) -> Vec<Arc<Process>> {
        std::mem::take(&mut self.family.lock().children)
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name(),
            state: self.state(),
            parent: self.parent().map(|p| p.pid),
            children: self.children(),
            exit_code: self
                .exit_status()
                .filter(|s| s.is_exited())
                .map(WaitStatus::exit_code),
            signal: self.exit_status().and_then(WaitStatus::term_signal),
            tasks: self.task_count(),
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &*self.name.lock())
            .field("state", &self.state())
            .finish()
    }
}
