/*!
 * Intersection Admission Controller
 *
 * One lock guards the per-movement vehicle counts. A vehicle may enter
 * when none of the movements in its conflict set currently has a vehicle
 * inside; otherwise it sleeps on the queue of its destination direction
 * and re-checks after every wakeup.
 *
 * When a movement's count drops to zero, every destination queue is
 * broadcast: a vehicle bound for one destination may have been blocked by
 * traffic heading anywhere, so waking only one queue could strand it.
 * Woken vehicles that are still blocked simply re-check and sleep again.
 *
 * No fairness is provided; a steady stream of compatible traffic can keep
 * a conflicting vehicle waiting indefinitely. Deadlock cannot occur since
 * a waiting vehicle holds nothing inside the intersection.
 */

use super::conflict::{ConflictTable, MovementSet, CONFLICTS};
use super::direction::{Direction, Movement};
use super::stats::{AdmissionSnapshot, AdmissionStats};
use crate::core::errors::fatal;
use crate::core::sync::{CondVar, Lock};
use std::fmt;
use tracing::trace;

/// Vehicle counts per movement
#[derive(Debug, Clone, Default)]
struct Occupancy {
    counts: [u32; Movement::COUNT],
    total: usize,
}

impl Occupancy {
    /// Admission predicate: no conflicting movement has a vehicle inside
    #[inline]
    fn admits(&self, conflicts: MovementSet) -> bool {
        conflicts.iter().all(|m| self.counts[m.index()] == 0)
    }
}

pub struct Intersection {
    occupancy: Lock<Occupancy>,
    /// Wait queues indexed by destination direction
    queues: [CondVar; 4],
    conflicts: &'static ConflictTable,
    stats: AdmissionStats,
}

impl Intersection {
    pub fn new() -> Self {
        Self {
            occupancy: Lock::new("intersection", Occupancy::default()),
            queues: [
                CondVar::new("dest_north"),
                CondVar::new("dest_east"),
                CondVar::new("dest_south"),
                CondVar::new("dest_west"),
            ],
            conflicts: &CONFLICTS,
            stats: AdmissionStats::new(),
        }
    }

    /// Block until the movement may proceed, then mark it active
    ///
    /// A U-turn (`origin == destination`) is fatal.
    pub fn enter(&self, origin: Direction, destination: Direction) {
        self.enter_movement(movement_or_die(origin, destination));
    }

    /// Mark one vehicle of the movement as gone and wake blocked vehicles
    ///
    /// Leaving a movement with no vehicle inside is fatal.
    pub fn leave(&self, origin: Direction, destination: Direction) {
        self.leave_movement(movement_or_die(origin, destination));
    }

    pub fn enter_movement(&self, movement: Movement) {
        let conflicts = self.conflicts.conflicts_of(movement);
        let queue = &self.queues[movement.destination().index()];

        let mut occupancy = self.occupancy.acquire();
        let mut waited = 0u64;
        while !occupancy.admits(conflicts) {
            trace!(%movement, waited, "vehicle blocked");
            queue.wait(&mut occupancy);
            waited += 1;
        }

        occupancy.counts[movement.index()] += 1;
        occupancy.total += 1;
        self.stats.record_admission(waited, occupancy.total);
        trace!(%movement, inside = occupancy.total, "vehicle admitted");
    }

    pub fn leave_movement(&self, movement: Movement) {
        let mut occupancy = self.occupancy.acquire();
        let count = &mut occupancy.counts[movement.index()];
        if *count == 0 {
            fatal(&format!("vehicle left {movement} without entering"));
        }
        *count -= 1;
        let cleared = *count == 0;
        occupancy.total -= 1;

        if cleared {
            for queue in &self.queues {
                queue.broadcast(&occupancy);
            }
        }
        self.stats.record_departure(cleared);
        trace!(%movement, inside = occupancy.total, cleared, "vehicle left");
    }

    /// Movements with vehicles inside, and how many
    pub fn active(&self) -> Vec<(Movement, u32)> {
        let occupancy = self.occupancy.acquire();
        Movement::all()
            .map(|m| (m, occupancy.counts[m.index()]))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    /// Vehicles currently inside
    pub fn occupancy(&self) -> usize {
        self.occupancy.acquire().total
    }

    /// Vehicles asleep on destination queues
    pub fn waiting(&self) -> usize {
        self.queues.iter().map(CondVar::waiter_count).sum()
    }

    pub fn is_idle(&self) -> bool {
        self.occupancy() == 0 && self.waiting() == 0
    }

    pub fn stats(&self) -> AdmissionSnapshot {
        self.stats.snapshot()
    }
}

impl Default for Intersection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Intersection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intersection")
            .field("active", &self.active())
            .field("waiting", &self.waiting())
            .finish()
    }
}

fn movement_or_die(origin: Direction, destination: Direction) -> Movement {
    match Movement::new(origin, destination) {
        Some(movement) => movement,
        None => fatal(&format!("u-turn {origin}2{destination} is not a movement")),
    }
}
