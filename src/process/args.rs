/*!
 * Argument Block
 *
 * Layout of argv on a fresh user stack, highest address first:
 *
 * ```text
 * stack top ->  +---------------------------+
 *               | "arg0\0" padded to 8      |
 *               | "arg1\0" padded to 8      |
 *               | ...                       |  strings, argv order upward
 * strings   ->  +---------------------------+
 *               | argv[argc] = NULL         |
 *               | ...                       |
 *               | argv[0]                   |  pointer array, argv order upward
 * argv = sp ->  +---------------------------+
 * ```
 */

use crate::core::errors::KernelError;
use crate::core::limits::{ARG_ALIGN, ARG_STR_MAX, USER_PTR_SIZE};
use crate::core::types::{round_up, KernelResult, UserPtr};
use crate::vm::AddressSpace;

/// Where the packed arguments ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout {
    pub argc: usize,
    /// Address of argv[0]
    pub argv: UserPtr,
    /// Initial stack pointer; equal to `argv`
    pub sp: UserPtr,
    /// Lowest address of the string area
    pub strings: UserPtr,
}

/// Arguments packed into their on-stack string image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgBlock {
    image: Vec<u8>,
    offsets: Vec<usize>,
}

impl ArgBlock {
    /// Pack `args`, NUL-terminated and each padded to [`ARG_ALIGN`]
    pub fn pack<S: AsRef<str>>(args: &[S]) -> Self {
        let mut image = Vec::new();
        let mut offsets = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.as_ref().as_bytes();
            offsets.push(image.len());
            image.extend_from_slice(arg);
            image.resize(image.len() + round_up(arg.len() + 1, ARG_ALIGN) - arg.len(), 0);
        }
        Self { image, offsets }
    }

    #[inline]
    pub fn argc(&self) -> usize {
        self.offsets.len()
    }

    /// Bytes the block occupies on the stack, pointer array included
    pub fn stack_size(&self) -> usize {
        self.image.len() + (self.argc() + 1) * USER_PTR_SIZE
    }

    /// Addresses the block takes below `stack_top`
    pub fn layout(&self, stack_top: UserPtr) -> KernelResult<StackLayout> {
        let strings = stack_top
            .addr()
            .checked_sub(self.image.len())
            .ok_or_else(|| KernelError::bad_address("argument block below address zero"))?;
        let argv = strings
            .checked_sub((self.argc() + 1) * USER_PTR_SIZE)
            .ok_or_else(|| KernelError::bad_address("argument block below address zero"))?;
        Ok(StackLayout {
            argc: self.argc(),
            argv: UserPtr(argv),
            sp: UserPtr(argv),
            strings: UserPtr(strings),
        })
    }

    /// Pointer array for `layout`, NULL-terminated, little endian
    fn pointer_array(&self, layout: &StackLayout) -> Vec<u8> {
        let mut array = Vec::with_capacity((self.argc() + 1) * USER_PTR_SIZE);
        for offset in &self.offsets {
            let ptr = (layout.strings.addr() + offset) as u64;
            array.extend_from_slice(&ptr.to_le_bytes());
        }
        array.extend_from_slice(&0u64.to_le_bytes());
        array
    }

    /// Copy the block onto the stack of `space` below `stack_top`
    pub fn write_to(
        &self,
        space: &mut dyn AddressSpace,
        stack_top: UserPtr,
    ) -> KernelResult<StackLayout> {
        let layout = self.layout(stack_top)?;
        space.copy_out(&self.image, layout.strings)?;
        space.copy_out(&self.pointer_array(&layout), layout.argv)?;
        Ok(layout)
    }
}

/// Read a NULL-terminated user argv array of at most `max_args` entries
///
/// More than `max_args` entries fails with `TooManyArguments`; a string
/// longer than [`ARG_STR_MAX`] with `ArgumentTooLong`.
pub fn read_argv(
    space: &dyn AddressSpace,
    argv: UserPtr,
    max_args: usize,
) -> KernelResult<Vec<String>> {
    let mut args = Vec::new();
    let mut slot = argv;
    loop {
        let ptr = space.copy_in_ptr(slot)?;
        if ptr.is_null() {
            return Ok(args);
        }
        if args.len() == max_args {
            return Err(KernelError::TooManyArguments { limit: max_args });
        }
        let arg = space
            .copy_in_str(ptr, ARG_STR_MAX)
            .map_err(|e| match e {
                KernelError::NameTooLong { limit } => KernelError::ArgumentTooLong {
                    index: args.len(),
                    limit,
                },
                other => other,
            })?;
        args.push(arg);
        slot = slot
            .checked_add(USER_PTR_SIZE)
            .ok_or_else(|| KernelError::bad_address("argv wraps the address space"))?;
    }
}
