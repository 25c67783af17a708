/*!
 * Process Types
 * Common types for process management
 */

use crate::core::types::{ExitCode, Pid, UserPtr, VirtAddr};
use crate::core::limits::HEAP_BASE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Process has a task and an address space
    Running,
    /// Process has exited and holds its status until reaped
    Exited,
    /// Process record has been released
    Reaped,
}

/// Encoded status reported by waitpid
///
/// The exit code (or the signal number) sits above two flag bits: `0`
/// for a normal exit, so `raw() == code << 2`, and `1` for a process
/// killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WaitStatus(i32);

impl WaitStatus {
    const EXITED: i32 = 0;
    const SIGNALED: i32 = 1;

    #[inline]
    #[must_use]
    pub const fn exited(code: ExitCode) -> Self {
        Self((code << 2) | Self::EXITED)
    }

    #[inline]
    #[must_use]
    pub const fn signaled(signal: i32) -> Self {
        Self((signal << 2) | Self::SIGNALED)
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_exited(self) -> bool {
        self.0 & 3 == Self::EXITED
    }

    #[inline]
    #[must_use]
    pub const fn is_signaled(self) -> bool {
        self.0 & 3 == Self::SIGNALED
    }

    /// Exit code of a normal exit
    ///
    /// Meaningless unless [`Self::is_exited`].
    #[inline]
    #[must_use]
    pub const fn exit_code(self) -> ExitCode {
        self.0 >> 2
    }

    /// Signal that killed the process, if any
    #[inline]
    #[must_use]
    pub const fn term_signal(self) -> Option<i32> {
        if self.is_signaled() {
            Some(self.0 >> 2)
        } else {
            None
        }
    }
}

impl fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.term_signal() {
            Some(signal) => write!(f, "signaled({signal})"),
            None => write!(f, "exited({})", self.exit_code()),
        }
    }
}

/// User-visible registers carried across fork
///
/// A forked child resumes with the same values as its parent had at the
/// fork call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserState {
    /// Next free byte of the heap region
    pub brk: VirtAddr,
    pub argc: usize,
    pub argv: UserPtr,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            brk: HEAP_BASE,
            argc: 0,
            argv: UserPtr::NULL,
        }
    }
}

/// Where a new program starts: entry point plus its initial stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFrame {
    pub entry: UserPtr,
    pub argc: usize,
    pub argv: UserPtr,
    pub sp: UserPtr,
}

/// Process metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub state: ProcessState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
    pub children: Vec<Pid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<ExitCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    /// Tasks running the process's code
    pub tasks: usize,
}
