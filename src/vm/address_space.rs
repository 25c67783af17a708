/*!
 * Simulated Address Spaces
 *
 * Byte-backed regions inside a shared page budget. Every space charges its
 * pages to the budget of the [`SimVm`] that created it and gives them back
 * when dropped, so exhausting the budget makes `create`, `try_clone` or
 * region definition fail with `ResourceExhausted`.
 */

use super::traits::{AddressSpace, VmSystem};
use crate::core::errors::{KernelError, Resource};
use crate::core::limits::{PAGE_SIZE, USERSTACK, USER_STACK_PAGES};
use crate::core::types::{round_up, KernelResult, UserPtr, VirtAddr};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Page pool shared by every space of one [`SimVm`]
#[derive(Debug)]
pub struct PageBudget {
    capacity: usize,
    used: AtomicUsize,
}

impl PageBudget {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    fn reserve(&self, pages: usize) -> KernelResult<()> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(pages).filter(|&total| total <= self.capacity)
            })
            .map(|_| ())
            .map_err(|used| {
                KernelError::resource_exhausted(
                    Resource::Memory,
                    format!("{pages} pages requested, {used}/{} in use", self.capacity),
                )
            })
    }

    fn release(&self, pages: usize) {
        self.used.fetch_sub(pages, Ordering::AcqRel);
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Clone)]
struct Region {
    base: VirtAddr,
    bytes: Vec<u8>,
    writable: bool,
}

impl Region {
    #[inline]
    fn end(&self) -> VirtAddr {
        self.base + self.bytes.len()
    }

    #[inline]
    fn pages(&self) -> usize {
        self.bytes.len() / PAGE_SIZE
    }

    #[inline]
    fn contains(&self, addr: VirtAddr, len: usize) -> bool {
        addr >= self.base && addr.checked_add(len).is_some_and(|end| end <= self.end())
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x}..{:#010x} {}",
            self.base,
            self.end(),
            if self.writable { "rw" } else { "r-" }
        )
    }
}

pub struct SimAddressSpace {
    id: u64,
    regions: Vec<Region>,
    stack: Option<UserPtr>,
    active: AtomicBool,
    budget: Arc<PageBudget>,
    ids: Arc<AtomicU64>,
}

impl SimAddressSpace {
    fn region(&self, addr: VirtAddr, len: usize) -> KernelResult<&Region> {
        self.regions
            .iter()
            .find(|r| r.contains(addr, len))
            .ok_or_else(|| KernelError::bad_address(format!("{} (+{len})", UserPtr(addr))))
    }

    fn region_mut(&mut self, addr: VirtAddr, len: usize) -> KernelResult<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.contains(addr, len))
            .ok_or_else(|| KernelError::bad_address(format!("{} (+{len})", UserPtr(addr))))
    }

    fn define(&mut self, base: VirtAddr, mem_size: usize, writable: bool) -> KernelResult<&mut Region> {
        if base == 0 || base % PAGE_SIZE != 0 {
            return Err(KernelError::invalid_argument(format!(
                "region base {} is not page aligned",
                UserPtr(base)
            )));
        }
        let size = round_up(mem_size.max(1), PAGE_SIZE);
        let end = base
            .checked_add(size)
            .ok_or_else(|| KernelError::invalid_argument("region wraps the address space"))?;
        if self.regions.iter().any(|r| base < r.end() && r.base < end) {
            return Err(KernelError::invalid_argument(format!(
                "region at {} overlaps an existing region",
                UserPtr(base)
            )));
        }

        self.budget.reserve(size / PAGE_SIZE)?;
        self.regions.push(Region {
            base,
            bytes: vec![0; size],
            writable,
        });
        let index = self.regions.len() - 1;
        Ok(&mut self.regions[index])
    }
}

impl AddressSpace for SimAddressSpace {
    fn id(&self) -> u64 {
        self.id
    }

    fn pages(&self) -> usize {
        self.regions.iter().map(Region::pages).sum()
    }

    fn try_clone(&self) -> KernelResult<Box<dyn AddressSpace>> {
        let pages = self.pages();
        self.budget.reserve(pages)?;
        let copy = SimAddressSpace {
            id: self.ids.fetch_add(1, Ordering::Relaxed),
            regions: self.regions.clone(),
            stack: self.stack,
            active: AtomicBool::new(false),
            budget: Arc::clone(&self.budget),
            ids: Arc::clone(&self.ids),
        };
        debug!(from = self.id, to = copy.id, pages, "Address space copied");
        Ok(Box::new(copy))
    }

    fn activate(&self) {
        self.active.store(true, Ordering::Release);
        trace!(space = self.id, "Address space activated");
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        trace!(space = self.id, "Address space deactivated");
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn load_segment(
        &mut self,
        base: VirtAddr,
        data: &[u8],
        mem_size: usize,
        writable: bool,
    ) -> KernelResult<()> {
        if data.len() > mem_size {
            return Err(KernelError::invalid_argument(format!(
                "segment data is {} bytes, memory size {mem_size}",
                data.len()
            )));
        }
        let region = self.define(base, mem_size, writable)?;
        region.bytes[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn define_stack(&mut self) -> KernelResult<UserPtr> {
        if let Some(top) = self.stack {
            return Ok(top);
        }
        let size = USER_STACK_PAGES * PAGE_SIZE;
        self.define(USERSTACK - size, size, true)?;
        let top = UserPtr(USERSTACK);
        self.stack = Some(top);
        Ok(top)
    }

    fn copy_in(&self, src: UserPtr, dst: &mut [u8]) -> KernelResult<()> {
        if src.is_null() {
            return Err(KernelError::bad_address("null pointer"));
        }
        let region = self.region(src.addr(), dst.len())?;
        let offset = src.addr() - region.base;
        dst.copy_from_slice(&region.bytes[offset..offset + dst.len()]);
        Ok(())
    }

    fn copy_out(&mut self, src: &[u8], dst: UserPtr) -> KernelResult<()> {
        if dst.is_null() {
            return Err(KernelError::bad_address("null pointer"));
        }
        let region = self.region_mut(dst.addr(), src.len())?;
        if !region.writable {
            return Err(KernelError::bad_address(format!("{dst} is read-only")));
        }
        let offset = dst.addr() - region.base;
        region.bytes[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn copy_in_str(&self, src: UserPtr, max_len: usize) -> KernelResult<String> {
        if src.is_null() {
            return Err(KernelError::bad_address("null pointer"));
        }
        let region = self.region(src.addr(), 1)?;
        let offset = src.addr() - region.base;
        // The string may run to the end of its region but never past it
        let window = &region.bytes[offset..region.bytes.len().min(offset + max_len + 1)];
        match window.iter().position(|&b| b == 0) {
            Some(len) => String::from_utf8(window[..len].to_vec())
                .map_err(|_| KernelError::invalid_argument("string is not valid UTF-8")),
            None if window.len() > max_len => Err(KernelError::NameTooLong { limit: max_len }),
            None => Err(KernelError::bad_address(format!(
                "string at {src} runs off its region"
            ))),
        }
    }

    fn destroy(self: Box<Self>) {
        debug!(space = self.id, pages = self.pages(), "Address space destroyed");
    }
}

impl Drop for SimAddressSpace {
    fn drop(&mut self) {
        self.budget.release(self.pages());
    }
}

impl fmt::Debug for SimAddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimAddressSpace")
            .field("id", &self.id)
            .field("regions", &self.regions)
            .field("active", &self.is_active())
            .finish()
    }
}

/// VM system handing out [`SimAddressSpace`]s from one page budget
#[derive(Debug)]
pub struct SimVm {
    budget: Arc<PageBudget>,
    ids: Arc<AtomicU64>,
}

impl SimVm {
    pub fn new(pages: usize) -> Self {
        Self {
            budget: Arc::new(PageBudget::new(pages)),
            ids: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn budget(&self) -> &PageBudget {
        &self.budget
    }
}

impl VmSystem for SimVm {
    fn create(&self) -> KernelResult<Box<dyn AddressSpace>> {
        let id = self.ids.fetch_add(1, Ordering::Relaxed);
        trace!(space = id, "Address space created");
        Ok(Box::new(SimAddressSpace {
            id,
            regions: Vec::new(),
            stack: None,
            active: AtomicBool::new(false),
            budget: Arc::clone(&self.budget),
            ids: Arc::clone(&self.ids),
        }))
    }

    fn pages_in_use(&self) -> usize {
        self.budget.used()
    }
}
