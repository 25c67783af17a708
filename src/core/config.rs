/*!
 * Kernel Configuration
 *
 * Runtime configuration for the process subsystem, its hosted
 * collaborators and the traffic driver. Values come from defaults,
 * `KERNEL_*` environment variables, or a JSON document.
 */

use super::limits;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid pid range {min}..={max}")]
    InvalidPidRange { min: u32, max: u32 },

    #[error("Malformed configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct KernelConfig {
    /// Cap on live process records, zombies included
    pub max_processes: usize,
    /// Lowest pid handed out
    pub pid_min: u32,
    /// Highest pid handed out
    pub pid_max: u32,
    /// Pages shared by all simulated address spaces
    pub vm_pages: usize,
    /// Cap on concurrently running kernel tasks (`None` = unbounded)
    pub max_tasks: Option<usize>,
    /// Vehicle tasks started by the traffic driver
    pub vehicles: usize,
    /// Traversals per vehicle task
    pub bounces: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: limits::DEFAULT_MAX_PROCESSES,
            pid_min: limits::PID_MIN,
            pid_max: limits::PID_MAX,
            vm_pages: limits::DEFAULT_VM_PAGES,
            max_tasks: None,
            vehicles: limits::DEFAULT_VEHICLES,
            bounces: limits::DEFAULT_BOUNCES,
        }
    }
}

impl KernelConfig {
    /// Small footprint for tests: few pids, few pages
    pub const fn minimal() -> Self {
        Self {
            max_processes: 16,
            pid_min: limits::PID_MIN,
            pid_max: limits::PID_MAX,
            vm_pages: 1024,
            max_tasks: Some(32),
            vehicles: 4,
            bounces: 2,
        }
    }

    /// Load from `KERNEL_*` environment variables on top of the defaults
    ///
    /// Environment variables:
    /// - KERNEL_MAX_PROCESSES
    /// - KERNEL_PID_MIN / KERNEL_PID_MAX
    /// - KERNEL_VM_PAGES
    /// - KERNEL_MAX_TASKS
    /// - KERNEL_VEHICLES / KERNEL_BOUNCES
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = env_parse("KERNEL_MAX_PROCESSES")? {
            config.max_processes = v;
        }
        if let Some(v) = env_parse("KERNEL_PID_MIN")? {
            config.pid_min = v;
        }
        if let Some(v) = env_parse("KERNEL_PID_MAX")? {
            config.pid_max = v;
        }
        if let Some(v) = env_parse("KERNEL_VM_PAGES")? {
            config.vm_pages = v;
        }
        if let Some(v) = env_parse("KERNEL_MAX_TASKS")? {
            config.max_tasks = Some(v);
        }
        if let Some(v) = env_parse("KERNEL_VEHICLES")? {
            config.vehicles = v;
        }
        if let Some(v) = env_parse("KERNEL_BOUNCES")? {
            config.bounces = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(doc)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pid_min == 0 || self.pid_min > self.pid_max {
            return Err(ConfigError::InvalidPidRange {
                min: self.pid_min,
                max: self.pid_max,
            });
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(None),
    }
}
