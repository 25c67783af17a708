/*!
 * VM and Task Traits
 * Collaborator interfaces consumed by the process manager
 */

use crate::core::types::{KernelResult, UserPtr, VirtAddr};
use crate::core::limits::USER_PTR_SIZE;
use crate::process::user::ProgramMain;
use std::fmt;

/// One user address space
///
/// Dropping a space releases its pages; [`AddressSpace::destroy`] does the
/// same but lets implementations log the teardown.
pub trait AddressSpace: Send + fmt::Debug {
    /// Identifier unique among live spaces, for tracing
    fn id(&self) -> u64;

    /// Pages currently backing this space
    fn pages(&self) -> usize;

    /// Deep copy used by fork; the copy shares nothing with `self`
    fn try_clone(&self) -> KernelResult<Box<dyn AddressSpace>>;

    /// Make this the space of the running task
    fn activate(&self);

    /// Stop using this space on the running task
    fn deactivate(&self);

    fn is_active(&self) -> bool;

    /// Define a region at `base` of `mem_size` bytes and fill its start
    /// with `data`
    fn load_segment(
        &mut self,
        base: VirtAddr,
        data: &[u8],
        mem_size: usize,
        writable: bool,
    ) -> KernelResult<()>;

    /// Define the user stack and return the initial stack pointer
    fn define_stack(&mut self) -> KernelResult<UserPtr>;

    /// Copy `dst.len()` bytes from user memory at `src`
    fn copy_in(&self, src: UserPtr, dst: &mut [u8]) -> KernelResult<()>;

    /// Copy `src` into user memory at `dst`; the target must be writable
    fn copy_out(&mut self, src: &[u8], dst: UserPtr) -> KernelResult<()>;

    /// Copy a NUL-terminated string of at most `max_len` bytes
    ///
    /// A string without a terminator within `max_len + 1` bytes fails with
    /// `NameTooLong { limit: max_len }`.
    fn copy_in_str(&self, src: UserPtr, max_len: usize) -> KernelResult<String>;

    /// Read one user pointer
    fn copy_in_ptr(&self, src: UserPtr) -> KernelResult<UserPtr> {
        let mut raw = [0u8; USER_PTR_SIZE];
        self.copy_in(src, &mut raw)?;
        Ok(UserPtr(u64::from_le_bytes(raw) as VirtAddr))
    }

    /// Tear the space down
    fn destroy(self: Box<Self>);
}

/// Factory for fresh, empty address spaces
pub trait VmSystem: Send + Sync {
    fn create(&self) -> KernelResult<Box<dyn AddressSpace>>;

    /// Pages handed out to live spaces
    fn pages_in_use(&self) -> usize;
}

/// Kernel task creation
pub trait TaskSpawner: Send + Sync {
    /// Start `entry` on a new task
    ///
    /// Fails with `ResourceExhausted` when no task can be created; `entry`
    /// is dropped without running in that case.
    fn spawn(&self, name: String, entry: Box<dyn FnOnce() + Send + 'static>) -> KernelResult<()>;

    /// Tasks started and not yet finished
    fn live_tasks(&self) -> usize;
}

/// Loads executables into address spaces
pub trait ExecutableLoader: Send + Sync {
    /// Load `path` into `space` and return its entry point
    ///
    /// Fails with `NotFound` for an unknown path and `InvalidExecutable`
    /// for a file that is not a program.
    fn load(&self, path: &str, space: &mut dyn AddressSpace) -> KernelResult<UserPtr>;

    /// Program code for an entry point returned by [`Self::load`]
    fn resolve(&self, entry: UserPtr) -> Option<ProgramMain>;
}
