/*!
 * Process Manager Builder
 * Builder pattern for ProcessManager construction
 */

use super::manager::ProcessManager;
use super::table::ProcessTable;
use crate::core::config::KernelConfig;
use crate::vm::{ExecutableLoader, ProgramRegistry, SimVm, TaskSpawner, ThreadSpawner, VmSystem};
use std::sync::Arc;
use tracing::info;

/// Builder for ProcessManager
///
/// Collaborators left unset get the hosted defaults: a [`SimVm`] sized by
/// `vm_pages`, a [`ThreadSpawner`] capped by `max_tasks` and an empty
/// [`ProgramRegistry`].
#[derive(Default)]
pub struct ProcessManagerBuilder {
    config: KernelConfig,
    vm: Option<Arc<dyn VmSystem>>,
    loader: Option<Arc<dyn ExecutableLoader>>,
    spawner: Option<Arc<dyn TaskSpawner>>,
}

impl ProcessManagerBuilder {
    /// Create a new ProcessManager builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Take limits from `config`
    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific VM system
    pub fn with_vm(mut self, vm: Arc<dyn VmSystem>) -> Self {
        self.vm = Some(vm);
        self
    }

    /// Use a specific executable loader
    pub fn with_loader(mut self, loader: Arc<dyn ExecutableLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Use a specific task spawner
    pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Build the ProcessManager
    pub fn build(self) -> Arc<ProcessManager> {
        let config = self.config;
        let mut features = Vec::new();

        let vm = self.vm.unwrap_or_else(|| {
            features.push("sim-vm");
            Arc::new(SimVm::new(config.vm_pages))
        });
        let loader = self.loader.unwrap_or_else(|| {
            features.push("program-registry");
            Arc::new(ProgramRegistry::new())
        });
        let spawner = self.spawner.unwrap_or_else(|| {
            features.push("thread-tasks");
            Arc::new(ThreadSpawner::new(config.max_tasks))
        });

        info!(
            max_processes = config.max_processes,
            pid_min = config.pid_min,
            pid_max = config.pid_max,
            defaults = %features.join(", "),
            "Process manager initialized"
        );

        Arc::new_cyclic(|this| ProcessManager {
            table: ProcessTable::new(config.pid_min, config.pid_max, config.max_processes),
            vm,
            loader,
            spawner,
            config,
            this: this.clone(),
        })
    }
}
