/*!
 * Synchronization Primitives
 *
 * Kernel-style blocking primitives for tasks running on host threads:
 * - [`Lock`]: named mutual exclusion with holder tracking
 * - [`CondVar`]: condition variable bound to a held [`Lock`]
 * - [`WaitState`]: one-shot completion value built from the two
 *
 * # Use Cases
 *
 * - **Intersection admission**: one lock, per-destination wait queues
 * - **Process exit**: per-process exit status that parents block on
 */

mod condvar;
mod lock;
mod traits;
mod wait;

pub use condvar::CondVar;
pub use lock::{Lock, LockGuard};
pub use traits::WakeResult;
pub use wait::WaitState;
