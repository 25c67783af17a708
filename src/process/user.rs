/*!
 * User Context
 *
 * What a program sees while it runs: its process, its registers and the
 * system calls. Programs are Rust closures that take a `&mut UserContext`
 * and return their exit code; all data they exchange with the kernel
 * lives in their own address space and is passed by user pointer.
 */

use super::manager::ProcessManager;
use super::record::Process;
use super::types::{EntryFrame, UserState};
use super::args::read_argv;
use crate::core::errors::{fatal, KernelError, Resource};
use crate::core::limits::{ARG_ALIGN, ARG_COUNT_MAX, HEAP_BASE, HEAP_PAGES, PAGE_SIZE, USER_PTR_SIZE};
use crate::core::types::{round_up, ExitCode, KernelResult, Pid, UserPtr};
use crate::syscalls;
use crate::vm::{exit_current, panic_message, AddressSpace, TaskExit};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Code of a loadable program
pub type ProgramMain = Arc<dyn Fn(&mut UserContext) -> ExitCode + Send + Sync>;

/// Code a forked child runs in place of returning from fork
pub type ChildMain = Box<dyn FnOnce(&mut UserContext) -> ExitCode + Send>;

pub struct UserContext {
    manager: Arc<ProcessManager>,
    process: Arc<Process>,
    regs: UserState,
}

impl UserContext {
    pub(super) fn new(manager: Arc<ProcessManager>, process: Arc<Process>, regs: UserState) -> Self {
        Self {
            manager,
            process,
            regs,
        }
    }

    #[inline]
    pub fn process(&self) -> &Arc<Process> {
        &self.process
    }

    #[inline]
    pub fn manager(&self) -> &Arc<ProcessManager> {
        &self.manager
    }

    #[inline]
    pub fn regs(&self) -> UserState {
        self.regs
    }

    #[inline]
    pub fn argc(&self) -> usize {
        self.regs.argc
    }

    #[inline]
    pub fn argv(&self) -> UserPtr {
        self.regs.argv
    }

    /// Run `f` on this process's address space
    pub(crate) fn space<R>(
        &self,
        f: impl FnOnce(&mut dyn AddressSpace) -> KernelResult<R>,
    ) -> KernelResult<R> {
        self.process
            .with_space(f)
            .unwrap_or_else(|| Err(KernelError::bad_address("process has no address space")))
    }

    /// Arguments the program was started with, read from its stack
    pub fn args(&self) -> KernelResult<Vec<String>> {
        if self.regs.argv.is_null() {
            return Ok(Vec::new());
        }
        let argv = self.regs.argv;
        self.space(|space| read_argv(space, argv, ARG_COUNT_MAX))
    }

    // User memory

    /// Reserve `len` bytes of heap, 8-byte aligned
    pub fn alloc(&mut self, len: usize) -> KernelResult<UserPtr> {
        let start = round_up(self.regs.brk, ARG_ALIGN);
        let end = start
            .checked_add(len)
            .filter(|&end| end <= HEAP_BASE + HEAP_PAGES * PAGE_SIZE)
            .ok_or_else(|| {
                KernelError::resource_exhausted(Resource::Memory, format!("heap full ({len} bytes)"))
            })?;
        self.regs.brk = end;
        Ok(UserPtr(start))
    }

    pub fn write(&mut self, dst: UserPtr, bytes: &[u8]) -> KernelResult<()> {
        self.space(|space| space.copy_out(bytes, dst))
    }

    pub fn read(&self, src: UserPtr, len: usize) -> KernelResult<Vec<u8>> {
        let mut buf = vec![0; len];
        self.space(|space| space.copy_in(src, &mut buf))?;
        Ok(buf)
    }

    pub fn read_i32(&self, src: UserPtr) -> KernelResult<i32> {
        let mut raw = [0u8; 4];
        self.space(|space| space.copy_in(src, &mut raw))?;
        Ok(i32::from_le_bytes(raw))
    }

    pub fn read_str(&self, src: UserPtr, max_len: usize) -> KernelResult<String> {
        self.space(|space| space.copy_in_str(src, max_len))
    }

    /// Copy `s` onto the heap with a terminating NUL
    pub fn push_str(&mut self, s: &str) -> KernelResult<UserPtr> {
        let ptr = self.alloc(s.len() + 1)?;
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.write(ptr, &bytes)?;
        Ok(ptr)
    }

    /// Build a NULL-terminated argv array on the heap
    pub fn push_argv<S: AsRef<str>>(&mut self, args: &[S]) -> KernelResult<UserPtr> {
        let mut array = Vec::with_capacity((args.len() + 1) * USER_PTR_SIZE);
        for arg in args {
            let ptr = self.push_str(arg.as_ref())?;
            array.extend_from_slice(&(ptr.addr() as u64).to_le_bytes());
        }
        array.extend_from_slice(&0u64.to_le_bytes());
        let base = self.alloc(array.len())?;
        self.write(base, &array)?;
        Ok(base)
    }

    // System calls

    pub fn getpid(&self) -> Pid {
        syscalls::sys_getpid(self)
    }

    /// Create a child running `child` on a copy of this address space
    ///
    /// Returns the child's pid; the child starts in `child` with the same
    /// registers this process had at the call.
    pub fn fork<F>(&mut self, child: F) -> KernelResult<Pid>
    where
        F: FnOnce(&mut UserContext) -> ExitCode + Send + 'static,
    {
        syscalls::sys_fork(self, Box::new(child))
    }

    /// Wait for child `pid`; the encoded status goes to `status` unless null
    pub fn waitpid(&mut self, pid: Pid, status: UserPtr, options: i32) -> KernelResult<Pid> {
        syscalls::sys_waitpid(self, pid, status, options)
    }

    /// Replace the running program; returns only on failure
    pub fn execv(&mut self, path: UserPtr, argv: UserPtr) -> KernelError {
        match syscalls::sys_execv(self, path, argv) {
            Ok(never) => match never {},
            Err(e) => e,
        }
    }

    pub fn exit(&mut self, code: ExitCode) -> ! {
        syscalls::sys_exit(self, code)
    }
}

impl fmt::Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserContext")
            .field("pid", &self.process.pid())
            .field("regs", &self.regs)
            .finish()
    }
}

/// Run the program at `frame.entry` on the current task until it exits
pub(crate) fn enter_new_process(
    manager: Arc<ProcessManager>,
    process: Arc<Process>,
    frame: EntryFrame,
) -> ! {
    let main = match manager.loader().resolve(frame.entry) {
        Some(main) => main,
        None => fatal(&format!("no program at entry point {}", frame.entry)),
    };
    let regs = UserState {
        argc: frame.argc,
        argv: frame.argv,
        ..UserState::default()
    };
    run_user(UserContext::new(manager, process, regs), |ctx| main(ctx))
}

/// Run a forked child's code on the current task until it exits
pub(super) fn enter_forked(
    manager: Arc<ProcessManager>,
    process: Arc<Process>,
    regs: UserState,
    child: ChildMain,
) -> ! {
    process.with_space(|space| space.activate());
    run_user(UserContext::new(manager, process, regs), child)
}

/// Run program code to completion, exiting with its result
///
/// A panic in the program kills only its process: the process is torn
/// down with a signaled status so its parent's waitpid returns. Unwinds
/// from a process that has already exited are kernel bugs and continue.
fn run_user(mut ctx: UserContext, body: impl FnOnce(&mut UserContext) -> ExitCode) -> ! {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&mut ctx)));
    match outcome {
        Ok(code) => ctx.exit(code),
        Err(payload) if payload.is::<TaskExit>() || ctx.process.has_exited() => {
            panic::resume_unwind(payload)
        }
        Err(payload) => {
            ctx.manager.fault(&ctx.process, &panic_message(payload.as_ref()));
            exit_current()
        }
    }
}
