/*!
 * Process Manager
 *
 * Owns the process table and the parent/child relation, and drives the
 * lifecycle operations: fork, exit, wait and exec.
 *
 * Exit policy:
 * - A process that exits while its parent is alive stays in the table as
 *   a zombie until the parent reaps it with `wait`
 * - A process that exits with no live parent is released at once
 * - When a parent exits, its zombie children are released and its live
 *   children lose their parent link, so they are released at their own exit
 */

use super::args::ArgBlock;
use super::manager_builder::ProcessManagerBuilder;
use super::record::Process;
use super::table::ProcessTable;
use super::types::{EntryFrame, ProcessInfo, UserState, WaitStatus};
use super::user::{self, ChildMain};
use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::limits::{ARG_COUNT_MAX, ARG_STR_MAX, FAULT_SIGNAL, PATH_MAX};
use crate::core::types::{ExitCode, KernelResult, Pid};
use crate::vm::{AddressSpace, ExecutableLoader, TaskSpawner, VmSystem};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub struct ProcessManager {
    pub(super) table: ProcessTable,
    pub(super) vm: Arc<dyn VmSystem>,
    pub(super) loader: Arc<dyn ExecutableLoader>,
    pub(super) spawner: Arc<dyn TaskSpawner>,
    pub(super) config: KernelConfig,
    pub(super) this: Weak<ProcessManager>,
}

impl ProcessManager {
    pub fn builder() -> ProcessManagerBuilder {
        ProcessManagerBuilder::new()
    }

    fn handle(&self) -> Arc<ProcessManager> {
        match self.this.upgrade() {
            Some(manager) => manager,
            None => crate::core::errors::fatal("process manager used during teardown"),
        }
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn vm(&self) -> &Arc<dyn VmSystem> {
        &self.vm
    }

    #[inline]
    pub fn loader(&self) -> &Arc<dyn ExecutableLoader> {
        &self.loader
    }

    #[inline]
    pub fn spawner(&self) -> &Arc<dyn TaskSpawner> {
        &self.spawner
    }

    /// Start `path` as a new process with no parent
    ///
    /// The kernel's equivalent of running a program from the boot menu.
    /// Wait for it with [`Self::join`].
    pub fn spawn_program<S: AsRef<str>>(&self, path: &str, args: &[S]) -> KernelResult<Arc<Process>> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_owned()).collect();
        validate_exec_args(path, &args)?;

        let mut space = self.vm.create()?;
        let frame = build_image(self.loader.as_ref(), space.as_mut(), path, &args)?;

        let process = {
            let mut table = self.table.lock();
            let pid = table.allocate_pid()?;
            let process = Arc::new(Process::new(pid, path, Some(space), Weak::new()));
            table.insert(Arc::clone(&process));
            process
        };

        let manager = self.handle();
        let task_process = Arc::clone(&process);
        process.attach_task();
        let spawned = self.spawner.spawn(
            format!("pid-{}", process.pid()),
            Box::new(move || {
                task_process.with_space(|space| space.activate());
                user::enter_new_process(manager, task_process, frame)
            }),
        );
        if let Err(e) = spawned {
            process.detach_task();
            self.table.lock().remove(process.pid());
            if let Some(space) = process.take_space() {
                space.destroy();
            }
            return Err(e);
        }

        info!(pid = process.pid(), path, argc = args.len(), "Program started");
        Ok(process)
    }

    /// Block until a parentless process has exited
    ///
    /// The record is released on exit, so `join` only reads the status.
    pub fn join(&self, process: &Process) -> WaitStatus {
        process.wait_for_exit()
    }

    /// Create a child of `parent` running `child` on a copy of its space
    ///
    /// On any failure the partially built child is torn down and the
    /// parent is unchanged.
    pub fn fork(&self, parent: &Arc<Process>, regs: UserState, child: ChildMain) -> KernelResult<Pid> {
        let space = parent
            .with_space(|space| space.try_clone())
            .unwrap_or_else(|| Err(KernelError::invalid_argument("fork without an address space")))?;

        let process = {
            let mut table = self.table.lock();
            crate::kassert!(!parent.has_exited(), "exited process {} forked", parent.pid());
            let pid = table.allocate_pid()?;
            let process = Arc::new(Process::new(
                pid,
                &parent.name(),
                Some(space),
                Arc::downgrade(parent),
            ));
            table.insert(Arc::clone(&process));
            parent.add_child(Arc::clone(&process));
            process
        };
        let pid = process.pid();

        let manager = self.handle();
        let task_process = Arc::clone(&process);
        process.attach_task();
        let spawned = self.spawner.spawn(
            format!("pid-{pid}"),
            Box::new(move || user::enter_forked(manager, task_process, regs, child)),
        );
        if let Err(e) = spawned {
            process.detach_task();
            {
                let mut table = self.table.lock();
                parent.remove_child(pid);
                table.remove(pid);
            }
            if let Some(space) = process.take_space() {
                space.destroy();
            }
            warn!(parent = parent.pid(), pid, error = %e, "Fork failed, child torn down");
            return Err(e);
        }

        debug!(parent = parent.pid(), child = pid, "Forked");
        Ok(pid)
    }

    /// Record `code` as the exit status of `process` and tear it down
    ///
    /// Exiting twice is fatal. The caller's task must end right after.
    pub fn exit(&self, process: &Arc<Process>, code: ExitCode) {
        self.terminate(process, WaitStatus::exited(code));
    }

    /// Tear down a process whose program died by panicking
    ///
    /// Waiters see a status signaled with [`FAULT_SIGNAL`]. The caller's
    /// task must end right after.
    pub fn fault(&self, process: &Arc<Process>, reason: &str) {
        warn!(pid = process.pid(), reason, "Program faulted");
        self.terminate(process, WaitStatus::signaled(FAULT_SIGNAL));
    }

    fn terminate(&self, process: &Arc<Process>, status: WaitStatus) {
        crate::kassert!(!process.has_exited(), "process {} exited twice", process.pid());

        if let Some(space) = process.take_space() {
            space.deactivate();
            space.destroy();
        }
        let tasks = process.detach_task();
        crate::kassert!(tasks == 0, "process {} exited with {tasks} tasks attached", process.pid());

        // Publishing under the table lock makes status and release atomic
        // for anyone who looks at the table after waking
        let mut table = self.table.lock();
        let woken = process.publish_exit(status);
        for child in process.take_children() {
            if child.has_exited() {
                table.remove(child.pid());
            } else {
                child.clear_parent();
            }
        }
        let released = process.parent().is_none();
        if released {
            table.remove(process.pid());
        }
        drop(table);

        debug!(pid = process.pid(), %status, woken, released, "Process exited");
    }

    /// Wait for child `pid` of `parent` to exit and reap it
    ///
    /// Fails with `NoSuchChild` when `pid` is not an unreaped child of
    /// `parent`, including when another waiter reaped it first.
    pub fn wait(&self, parent: &Arc<Process>, pid: Pid) -> KernelResult<WaitStatus> {
        let no_such_child = || KernelError::NoSuchChild {
            parent: parent.pid(),
            pid,
        };

        let child = {
            let _table = self.table.lock();
            parent.child(pid).ok_or_else(no_such_child)?
        };

        let status = child.wait_for_exit();

        let mut table = self.table.lock();
        if !parent.remove_child(pid) {
            return Err(no_such_child());
        }
        table.remove(pid);
        drop(table);

        debug!(parent = parent.pid(), child = pid, %status, "Child reaped");
        Ok(status)
    }

    /// Replace the program of `process` with `path`
    ///
    /// The new image is built in a fresh address space. Any failure up to
    /// that point leaves the old space installed and untouched; after the
    /// switch the old space is destroyed.
    pub fn exec(&self, process: &Arc<Process>, path: &str, args: &[String]) -> KernelResult<EntryFrame> {
        validate_exec_args(path, args)?;

        let mut space = self.vm.create()?;
        let frame = build_image(self.loader.as_ref(), space.as_mut(), path, args)?;

        space.activate();
        let old = process.replace_space(space);
        if let Some(old) = old {
            old.deactivate();
            old.destroy();
        }
        process.set_name(path);

        info!(pid = process.pid(), path, argc = frame.argc, "Exec");
        Ok(frame)
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.table.lock().get(pid)
    }

    /// Records currently in the table, zombies included
    pub fn list(&self) -> Vec<ProcessInfo> {
        let table = self.table.lock();
        let mut infos: Vec<_> = table.processes().map(|p| p.info()).collect();
        drop(table);
        infos.sort_by_key(|info| info.pid);
        infos
    }

    pub fn process_count(&self) -> usize {
        self.table.lock().len()
    }
}

impl fmt::Debug for ProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessManager")
            .field("processes", &self.process_count())
            .field("pages_in_use", &self.vm.pages_in_use())
            .field("tasks", &self.spawner.live_tasks())
            .finish()
    }
}

fn validate_exec_args(path: &str, args: &[String]) -> KernelResult<()> {
    if path.is_empty() {
        return Err(KernelError::invalid_argument("empty program path"));
    }
    if path.len() > PATH_MAX {
        return Err(KernelError::NameTooLong { limit: PATH_MAX });
    }
    if args.len() > ARG_COUNT_MAX {
        return Err(KernelError::TooManyArguments {
            limit: ARG_COUNT_MAX,
        });
    }
    if let Some(index) = args.iter().position(|a| a.len() > ARG_STR_MAX) {
        return Err(KernelError::ArgumentTooLong {
            index,
            limit: ARG_STR_MAX,
        });
    }
    Ok(())
}

/// Load `path` into `space` and lay its arguments out on a new stack
fn build_image(
    loader: &dyn ExecutableLoader,
    space: &mut dyn AddressSpace,
    path: &str,
    args: &[String],
) -> KernelResult<EntryFrame> {
    let entry = loader.load(path, space)?;
    let stack_top = space.define_stack()?;
    let layout = ArgBlock::pack(args).write_to(space, stack_top)?;
    Ok(EntryFrame {
        entry,
        argc: layout.argc,
        argv: layout.argv,
        sp: layout.sp,
    })
}
