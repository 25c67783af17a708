/*!
 * Syscalls Module
 * System call entry points for user programs
 *
 * Every call is traced with a [`crate::monitoring::SyscallSpan`]; failures
 * carry the [`crate::core::Errno`] user space would see.
 */

mod copyin;
mod process;

pub use copyin::{copyin_argv, copyin_path};
pub use process::{sys_execv, sys_exit, sys_fork, sys_getpid, sys_waitpid};
