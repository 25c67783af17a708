/*!
 * Process Syscalls
 * fork, getpid, waitpid, execv and _exit on behalf of the calling program
 */

use super::copyin::{copyin_argv, copyin_path};
use crate::core::errors::KernelError;
use crate::core::types::{ExitCode, KernelResult, Pid, UserPtr};
use crate::monitoring::SyscallSpan;
use crate::process::user::{enter_new_process, ChildMain, UserContext};
use crate::vm::exit_current;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Record the outcome of a call on its span and pass it through
fn traced<T>(span: &SyscallSpan, result: KernelResult<T>, retval: impl FnOnce(&T) -> i64) -> KernelResult<T> {
    match &result {
        Ok(value) => span.record_return(retval(value)),
        Err(e) => span.record_errno(e.errno().code()),
    }
    result
}

pub fn sys_getpid(ctx: &UserContext) -> Pid {
    ctx.process().pid()
}

pub fn sys_fork(ctx: &mut UserContext, child: ChildMain) -> KernelResult<Pid> {
    let span = SyscallSpan::new("fork", ctx.process().pid());
    let _entered = span.enter();

    let result = ctx.manager().fork(ctx.process(), ctx.regs(), child);
    traced(&span, result, |&pid| i64::from(pid))
}

pub fn sys_waitpid(ctx: &mut UserContext, pid: Pid, status: UserPtr, options: i32) -> KernelResult<Pid> {
    let span = SyscallSpan::new("waitpid", ctx.process().pid());
    let _entered = span.enter();

    let result = waitpid(ctx, pid, status, options);
    traced(&span, result, |&pid| i64::from(pid))
}

fn waitpid(ctx: &mut UserContext, pid: Pid, status: UserPtr, options: i32) -> KernelResult<Pid> {
    if options != 0 {
        return Err(KernelError::invalid_argument(format!(
            "waitpid options {options:#x}"
        )));
    }
    let exit_status = ctx.manager().wait(ctx.process(), pid)?;
    // The child is already reaped; a bad status pointer only loses the status
    if !status.is_null() {
        ctx.write(status, &exit_status.raw().to_le_bytes())?;
    }
    Ok(pid)
}

/// Replace the calling program; returns only on failure
pub fn sys_execv(ctx: &mut UserContext, path: UserPtr, argv: UserPtr) -> KernelResult<Infallible> {
    let pid = ctx.process().pid();
    let frame = {
        let span = SyscallSpan::new("execv", pid);
        let _entered = span.enter();

        let result = ctx
            .space(|space| {
                if path.is_null() || argv.is_null() {
                    return Err(KernelError::invalid_argument("null execv pointer"));
                }
                let args = copyin_argv(space, argv)?;
                let path = copyin_path(space, path)?;
                Ok((path, args))
            })
            .and_then(|(path, args)| ctx.manager().exec(ctx.process(), &path, &args));
        traced(&span, result, |_| 0)?
    };

    // The old program's frames are never returned to
    let manager = Arc::clone(ctx.manager());
    let process = Arc::clone(ctx.process());
    debug!(pid, entry = %frame.entry, "Entering new program");
    enter_new_process(manager, process, frame)
}

pub fn sys_exit(ctx: &mut UserContext, code: ExitCode) -> ! {
    {
        let span = SyscallSpan::new("_exit", ctx.process().pid());
        let _entered = span.enter();
        ctx.manager().exit(ctx.process(), code);
        span.record_return(i64::from(code));
    }
    exit_current()
}
