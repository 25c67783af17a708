//! Shared fixtures for process tests

use edu_kernel::{KernelConfig, ProcessManager, ProgramRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct Kernel {
    pub manager: Arc<ProcessManager>,
    pub registry: Arc<ProgramRegistry>,
}

pub fn kernel() -> Kernel {
    kernel_with(KernelConfig::minimal())
}

pub fn kernel_with(config: KernelConfig) -> Kernel {
    let registry = Arc::new(ProgramRegistry::new());
    let manager = ProcessManager::builder()
        .with_config(config)
        .with_loader(registry.clone())
        .build();
    Kernel { manager, registry }
}

/// Values reported by programs back to the test thread
pub type Log<T> = Arc<Mutex<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Poll `cond` until it holds or five seconds pass
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
