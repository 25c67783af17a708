/*!
 * Core Module
 * Fundamental kernel types, limits, configuration and error handling
 */

pub mod config;
pub mod data_structures;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::{ConfigError, KernelConfig};
pub use errors::{fatal, Errno, KernelError, Resource};
pub use types::*;
