/*!
 * Monitoring Module
 * Structured logging setup and syscall tracing spans
 */

mod tracer;

pub use tracer::{init_tracing, SyscallSpan};
