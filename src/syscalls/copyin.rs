/*!
 * Syscall Argument Copy-In
 * Bounded copies of paths and argument vectors out of user memory
 */

use crate::core::errors::KernelError;
use crate::core::limits::{ARG_COUNT_MAX, PATH_MAX};
use crate::core::types::{KernelResult, UserPtr};
use crate::process::read_argv;
use crate::vm::AddressSpace;

/// Copy a program path
///
/// Null or empty fails with `InvalidArgument`, a path longer than
/// [`PATH_MAX`] with `NameTooLong`.
pub fn copyin_path(space: &dyn AddressSpace, path: UserPtr) -> KernelResult<String> {
    if path.is_null() {
        return Err(KernelError::invalid_argument("null program path"));
    }
    let path = space.copy_in_str(path, PATH_MAX)?;
    if path.is_empty() {
        return Err(KernelError::invalid_argument("empty program path"));
    }
    Ok(path)
}

/// Copy a NULL-terminated argv array
///
/// At most [`ARG_COUNT_MAX`] entries, each within the per-argument limit.
/// A null array fails with `InvalidArgument`.
pub fn copyin_argv(space: &dyn AddressSpace, argv: UserPtr) -> KernelResult<Vec<String>> {
    if argv.is_null() {
        return Err(KernelError::invalid_argument("null argv"));
    }
    read_argv(space, argv, ARG_COUNT_MAX)
}
