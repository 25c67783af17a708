/*!
 * System Limits and Constants
 *
 * Centralized location for system-wide limits and layout constants.
 * Organized by domain.
 */

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Lowest pid handed out to user processes
/// Pids below this are reserved for the kernel
pub const PID_MIN: u32 = 2;

/// Highest pid handed out to user processes
pub const PID_MAX: u32 = 32767;

/// Default cap on simultaneously live process records (zombies included)
pub const DEFAULT_MAX_PROCESSES: usize = 256;

/// Signal reported to waiters when a program dies by panicking (SIGABRT)
pub const FAULT_SIGNAL: i32 = 6;

// =============================================================================
// EXEC LIMITS
// =============================================================================

/// Longest single argument string accepted by execv (terminator excluded)
pub const ARG_STR_MAX: usize = 1024;

/// Most arguments accepted by execv
pub const ARG_COUNT_MAX: usize = 64;

/// Longest program path accepted by execv (terminator excluded)
pub const PATH_MAX: usize = 1024;

/// Alignment of each packed argument string on the user stack
pub const ARG_ALIGN: usize = 8;

/// Width of a pointer in the user ABI
pub const USER_PTR_SIZE: usize = 8;

// =============================================================================
// ADDRESS SPACE LAYOUT
// =============================================================================

/// Page size of the simulated address spaces
pub const PAGE_SIZE: usize = 4096;

/// Top of the user stack (initial stack pointer)
pub const USERSTACK: usize = 0x8000_0000;

/// Pages reserved for the user stack
/// Large enough for a full argument block (64 args of 1024 bytes)
pub const USER_STACK_PAGES: usize = 24;

/// Base of the text segment written by the program loader
pub const TEXT_BASE: usize = 0x0040_0000;

/// Distance between the text segments of two registered programs
pub const TEXT_STRIDE: usize = 0x0001_0000;

/// Base of the per-process heap region
pub const HEAP_BASE: usize = 0x1000_0000;

/// Pages reserved for the heap region
/// Room for a program to build a full argv before calling execv
pub const HEAP_PAGES: usize = 24;

/// Default number of pages available to all address spaces together
pub const DEFAULT_VM_PAGES: usize = 4096;

// =============================================================================
// TRAFFIC SIMULATION
// =============================================================================

/// Default number of concurrent vehicle tasks in the driver
pub const DEFAULT_VEHICLES: usize = 10;

/// Default number of traversals per vehicle task
pub const DEFAULT_BOUNCES: usize = 5;
