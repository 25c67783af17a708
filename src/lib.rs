/*!
 * Educational Kernel Library
 *
 * Two kernel subsystems over a hosted runtime:
 * - `traffic`: admission control for a four-way intersection
 * - `process`: fork/exit/wait/exec over simulated address spaces
 */

pub mod core;
pub mod monitoring;
pub mod process;
pub mod syscalls;
pub mod traffic;
pub mod vm;

// Re-exports
pub use crate::core::{Errno, KernelConfig, KernelError, KernelResult, Pid, UserPtr};
pub use monitoring::init_tracing;
pub use process::{Process, ProcessManager, ProcessManagerBuilder, UserContext, WaitStatus};
pub use traffic::{Direction, Intersection, Movement, Simulation};
pub use vm::{ProgramRegistry, SimVm, ThreadSpawner};
