/*!
 * Core Types
 * Common types used across the kernel
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID type
pub type Pid = u32;

/// Exit code passed to `_exit`
pub type ExitCode = i32;

/// Virtual address in a user address space
pub type VirtAddr = usize;

/// Size type for memory operations
pub type Size = usize;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Pointer into a user address space
///
/// User pointers are never dereferenced directly; they are only handed to
/// the address space's copy-in/copy-out routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UserPtr(pub VirtAddr);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    #[inline(always)]
    #[must_use]
    pub const fn new(addr: VirtAddr) -> Self {
        Self(addr)
    }

    #[inline(always)]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    #[must_use]
    pub const fn addr(self) -> VirtAddr {
        self.0
    }

    /// Pointer `bytes` above this one, `None` on overflow
    #[inline]
    #[must_use]
    pub fn checked_add(self, bytes: usize) -> Option<UserPtr> {
        self.0.checked_add(bytes).map(UserPtr)
    }
}

impl fmt::Display for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<VirtAddr> for UserPtr {
    #[inline]
    fn from(addr: VirtAddr) -> Self {
        Self(addr)
    }
}

/// Round `value` up to the next multiple of `align` (a power of two)
#[inline(always)]
#[must_use]
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
