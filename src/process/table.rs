/*!
 * Process Table
 *
 * One coarse lock guards pid allocation and the pid -> process map. Pids
 * are handed out round-robin from the configured range and are reused
 * only after their record has been released.
 */

use super::record::Process;
use crate::core::errors::{KernelError, Resource};
use crate::core::sync::{Lock, LockGuard};
use crate::core::types::{KernelResult, Pid};
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::Arc;

pub(super) struct TableInner {
    procs: HashMap<Pid, Arc<Process>, RandomState>,
    next_pid: Pid,
    pid_min: Pid,
    pid_max: Pid,
    max_processes: usize,
}

impl TableInner {
    /// Next free pid, scanning forward from the last one handed out
    pub(super) fn allocate_pid(&mut self) -> KernelResult<Pid> {
        if self.procs.len() >= self.max_processes {
            return Err(KernelError::resource_exhausted(
                Resource::Pids,
                format!("{} processes live", self.procs.len()),
            ));
        }

        let span = (self.pid_max - self.pid_min) as usize + 1;
        let mut candidate = self.next_pid;
        for _ in 0..span {
            let pid = candidate;
            candidate = if pid >= self.pid_max {
                self.pid_min
            } else {
                pid + 1
            };
            if !self.procs.contains_key(&pid) {
                self.next_pid = candidate;
                return Ok(pid);
            }
        }
        Err(KernelError::resource_exhausted(
            Resource::Pids,
            format!("pid range {}..={} in use", self.pid_min, self.pid_max),
        ))
    }

    pub(super) fn insert(&mut self, process: Arc<Process>) {
        let pid = process.pid();
        let previous = self.procs.insert(pid, process);
        crate::kassert!(previous.is_none(), "pid {pid} inserted twice");
    }

    pub(super) fn remove(&mut self, pid: Pid) -> Option<Arc<Process>> {
        let removed = self.procs.remove(&pid);
        if let Some(process) = &removed {
            process.mark_reaped();
        }
        removed
    }

    pub(super) fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.get(&pid).cloned()
    }

    pub(super) fn len(&self) -> usize {
        self.procs.len()
    }

    pub(super) fn processes(&self) -> impl Iterator<Item = &Arc<Process>> {
        self.procs.values()
    }
}

pub(super) struct ProcessTable {
    inner: Lock<TableInner>,
}

impl ProcessTable {
    pub(super) fn new(pid_min: Pid, pid_max: Pid, max_processes: usize) -> Self {
        crate::kassert!(pid_min <= pid_max, "empty pid range {pid_min}..={pid_max}");
        Self {
            inner: Lock::new(
                "proc_table",
                TableInner {
                    procs: HashMap::with_hasher(RandomState::new()),
                    next_pid: pid_min,
                    pid_min,
                    pid_max,
                    max_processes,
                },
            ),
        }
    }

    #[inline]
    pub(super) fn lock(&self) -> LockGuard<'_, TableInner> {
        self.inner.acquire()
    }
}
