/*!
 * VM Module
 * Address spaces, program loading and kernel tasks used by the process layer
 */

mod address_space;
mod loader;
mod task;
mod traits;

pub use address_space::{PageBudget, SimAddressSpace, SimVm};
pub use loader::{ProgramRegistry, EXEC_MAGIC};
pub use task::{exit_current, panic_message, TaskExit, ThreadSpawner};
pub use traits::{AddressSpace, ExecutableLoader, TaskSpawner, VmSystem};
