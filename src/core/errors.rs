/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::data_structures::InlineString;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kernel error numbers returned on the syscall path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i32)]
pub enum Errno {
    ENOMEM = 3,
    EFAULT = 6,
    ENAMETOOLONG = 7,
    EINVAL = 8,
    ENPROC = 12,
    ENOEXEC = 13,
    E2BIG = 14,
    ECHILD = 16,
    ENOENT = 19,
}

impl Errno {
    #[inline(always)]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Resource whose exhaustion made an operation fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Address-space pages or kernel memory
    Memory,
    /// Process ids / process table slots
    Pids,
    /// Kernel task slots
    Tasks,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Resource::Memory => "memory",
            Resource::Pids => "process ids",
            Resource::Tasks => "task slots",
        })
    }
}

/// Recoverable kernel errors
///
/// Fatal conditions (broken invariants) never appear here; they go
/// through [`fatal`] instead.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum KernelError {
    #[error("Out of {resource}: {detail}")]
    #[diagnostic(
        code(kernel::resource_exhausted),
        help("Partial state was torn down; the call had no effect. Reap exited children or raise the limit.")
    )]
    ResourceExhausted {
        resource: Resource,
        detail: InlineString,
    },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(syscall::invalid_argument))]
    InvalidArgument(InlineString),

    #[error("Process {pid} is not a child of process {parent}")]
    #[diagnostic(
        code(process::no_such_child),
        help("Only a parent may wait for its own, not yet reaped, children.")
    )]
    NoSuchChild { parent: u32, pid: u32 },

    #[error("Argument {index} is longer than {limit} bytes")]
    #[diagnostic(code(exec::argument_too_long))]
    ArgumentTooLong { index: usize, limit: usize },

    #[error("Too many arguments: limit is {limit}")]
    #[diagnostic(code(exec::too_many_arguments))]
    TooManyArguments { limit: usize },

    #[error("Bad user address: {0}")]
    #[diagnostic(
        code(vm::bad_address),
        help("The user pointer does not fall inside a defined region of the address space.")
    )]
    BadAddress(InlineString),

    #[error("Name too long: limit is {limit} bytes")]
    #[diagnostic(code(syscall::name_too_long))]
    NameTooLong { limit: usize },

    #[error("No such program: {0}")]
    #[diagnostic(code(exec::not_found))]
    NotFound(InlineString),

    #[error("Invalid executable: {0}")]
    #[diagnostic(code(exec::invalid_executable))]
    InvalidExecutable(InlineString),
}

impl KernelError {
    #[inline]
    pub fn resource_exhausted(resource: Resource, detail: impl Into<InlineString>) -> Self {
        Self::ResourceExhausted {
            resource,
            detail: detail.into(),
        }
    }

    #[inline]
    pub fn invalid_argument(msg: impl Into<InlineString>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn bad_address(msg: impl Into<InlineString>) -> Self {
        Self::BadAddress(msg.into())
    }

    /// Error number reported to user space
    #[must_use]
    pub const fn errno(&self) -> Errno {
        match self {
            Self::ResourceExhausted {
                resource: Resource::Pids,
                ..
            } => Errno::ENPROC,
            Self::ResourceExhausted { .. } => Errno::ENOMEM,
            Self::InvalidArgument(_) => Errno::EINVAL,
            Self::NoSuchChild { .. } => Errno::ECHILD,
            Self::ArgumentTooLong { .. } | Self::TooManyArguments { .. } => Errno::E2BIG,
            Self::BadAddress(_) => Errno::EFAULT,
            Self::NameTooLong { .. } => Errno::ENAMETOOLONG,
            Self::NotFound(_) => Errno::ENOENT,
            Self::InvalidExecutable(_) => Errno::ENOEXEC,
        }
    }
}

/// Abort on a broken kernel invariant
///
/// These are programming errors, not runtime conditions, so the caller is
/// never given a chance to recover.
#[cold]
#[track_caller]
pub fn fatal(msg: &str) -> ! {
    tracing::error!(reason = msg, "kernel invariant violated");
    panic!("fatal: {msg}");
}

/// Assert a kernel invariant, calling [`fatal`] when it does not hold
#[macro_export]
macro_rules! kassert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::core::errors::fatal(&format!($($arg)+));
        }
    };
}
