/*!
 * Program Loader
 *
 * Executables are entries in an in-memory registry. Each program gets its
 * own text segment, and the entry point is the base of that segment, so
 * the entry address alone identifies which code to run after exec.
 */

use super::traits::{AddressSpace, ExecutableLoader};
use crate::core::errors::KernelError;
use crate::core::limits::{HEAP_BASE, HEAP_PAGES, PAGE_SIZE, TEXT_BASE, TEXT_STRIDE};
use crate::core::types::{ExitCode, KernelResult, UserPtr};
use crate::process::user::{ProgramMain, UserContext};
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Leading bytes of every executable image
pub const EXEC_MAGIC: [u8; 4] = *b"\x7fELF";

struct Image {
    bytes: Arc<[u8]>,
    entry: Option<UserPtr>,
}

#[derive(Default)]
struct Registry {
    files: HashMap<String, Image, RandomState>,
    programs: HashMap<UserPtr, ProgramMain, RandomState>,
    next_slot: usize,
}

/// Registry of loadable programs keyed by path
#[derive(Default)]
pub struct ProgramRegistry {
    inner: RwLock<Registry>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register program code under `path` and return its entry point
    ///
    /// Registering a path again replaces the earlier program.
    pub fn register<F>(&self, path: &str, main: F) -> UserPtr
    where
        F: Fn(&mut UserContext) -> ExitCode + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let slot = inner.next_slot;
        inner.next_slot += 1;
        let entry = UserPtr(TEXT_BASE + slot * TEXT_STRIDE);
        crate::kassert!(
            entry.addr() + TEXT_STRIDE <= HEAP_BASE,
            "program registry full at {path}"
        );

        let mut bytes = EXEC_MAGIC.to_vec();
        bytes.extend_from_slice(path.as_bytes());
        if let Some(old) = inner.files.insert(
            path.to_owned(),
            Image {
                bytes: bytes.into(),
                entry: Some(entry),
            },
        ) {
            if let Some(old_entry) = old.entry {
                inner.programs.remove(&old_entry);
            }
        }
        inner.programs.insert(entry, Arc::new(main));
        info!(path, %entry, "Program registered");
        entry
    }

    /// Register a plain file that exists but is not executable
    pub fn register_file(&self, path: &str, contents: &[u8]) {
        let mut inner = self.inner.write();
        if let Some(old) = inner.files.insert(
            path.to_owned(),
            Image {
                bytes: contents.into(),
                entry: None,
            },
        ) {
            if let Some(old_entry) = old.entry {
                inner.programs.remove(&old_entry);
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.read().files.contains_key(path)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.inner.read().files.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl ExecutableLoader for ProgramRegistry {
    fn load(&self, path: &str, space: &mut dyn AddressSpace) -> KernelResult<UserPtr> {
        let (bytes, entry) = {
            let inner = self.inner.read();
            let image = inner
                .files
                .get(path)
                .ok_or_else(|| KernelError::NotFound(path.into()))?;
            (Arc::clone(&image.bytes), image.entry)
        };

        let entry = match entry {
            Some(entry) if bytes.starts_with(&EXEC_MAGIC) => entry,
            _ => return Err(KernelError::InvalidExecutable(path.into())),
        };

        space.load_segment(entry.addr(), &bytes, bytes.len(), false)?;
        space.load_segment(HEAP_BASE, &[], HEAP_PAGES * PAGE_SIZE, true)?;
        debug!(path, %entry, space = space.id(), "Program loaded");
        Ok(entry)
    }

    fn resolve(&self, entry: UserPtr) -> Option<ProgramMain> {
        self.inner.read().programs.get(&entry).cloned()
    }
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("paths", &self.paths())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{SimVm, VmSystem};

    #[test]
    fn test_load_known_program() {
        let registry = ProgramRegistry::new();
        let entry = registry.register("/bin/true", |_| 0);
        let vm = SimVm::new(64);
        let mut space = vm.create().unwrap();

        assert_eq!(registry.load("/bin/true", space.as_mut()).unwrap(), entry);
        let mut magic = [0u8; 4];
        space.copy_in(entry, &mut magic).unwrap();
        assert_eq!(magic, EXEC_MAGIC);
        assert!(registry.resolve(entry).is_some());
    }

    #[test]
    fn test_distinct_entries() {
        let registry = ProgramRegistry::new();
        let a = registry.register("/bin/a", |_| 1);
        let b = registry.register("/bin/b", |_| 2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_load_failures() {
        let registry = ProgramRegistry::new();
        registry.register_file("/etc/motd", b"hello");
        let vm = SimVm::new(64);
        let mut space = vm.create().unwrap();

        assert!(matches!(
            registry.load("/bin/missing", space.as_mut()),
            Err(KernelError::NotFound(_))
        ));
        assert!(matches!(
            registry.load("/etc/motd", space.as_mut()),
            Err(KernelError::InvalidExecutable(_))
        ));
        assert_eq!(space.pages(), 0);
    }
}
