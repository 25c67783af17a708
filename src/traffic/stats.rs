/*!
 * Lock-Free Admission Statistics
 * Atomic counters updated on the admission paths, read as a snapshot
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for one intersection
///
/// # Performance
/// - Cache-line aligned to prevent false sharing with the occupancy lock
/// - All operations use relaxed ordering; snapshots are advisory
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct AdmissionStats {
    admitted: AtomicU64,
    blocked: AtomicU64,
    waits: AtomicU64,
    departed: AtomicU64,
    broadcasts: AtomicU64,
    peak_occupancy: AtomicUsize,
}

/// Point-in-time copy of [`AdmissionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdmissionSnapshot {
    /// Vehicles let into the intersection
    pub admitted: u64,
    /// Admissions that had to sleep at least once
    pub blocked: u64,
    /// Total sleeps on destination queues
    pub waits: u64,
    /// Vehicles that left
    pub departed: u64,
    /// Exits that emptied a movement and woke every queue
    pub broadcasts: u64,
    /// Most vehicles inside at once
    pub peak_occupancy: usize,
}

impl AdmissionStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub(super) fn record_admission(&self, waited: u64, occupancy: usize) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
        if waited > 0 {
            self.blocked.fetch_add(1, Ordering::Relaxed);
            self.waits.fetch_add(waited, Ordering::Relaxed);
        }
        self.peak_occupancy.fetch_max(occupancy, Ordering::Relaxed);
    }

    #[inline(always)]
    pub(super) fn record_departure(&self, broadcast: bool) {
        self.departed.fetch_add(1, Ordering::Relaxed);
        if broadcast {
            self.broadcasts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        AdmissionSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            departed: self.departed.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            peak_occupancy: self.peak_occupancy.load(Ordering::Relaxed),
        }
    }
}
