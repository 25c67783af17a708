/*!
 * Process Module
 * Process records, the process table and the fork/exit/wait/exec lifecycle
 */

pub mod args;
pub mod manager;
pub mod manager_builder;
mod record;
mod table;
pub mod types;
pub mod user;

// Re-export for convenience
pub use args::{read_argv, ArgBlock, StackLayout};
pub use manager::ProcessManager;
pub use manager_builder::ProcessManagerBuilder;
pub use record::Process;
pub use types::{EntryFrame, ProcessInfo, ProcessState, UserState, WaitStatus};
pub use user::{ChildMain, ProgramMain, UserContext};
