/*!
 * Traffic Module
 * Four-way intersection admission control
 *
 * The simulation driver talks to one process-wide intersection through
 * [`init`], [`enter`], [`leave`] and [`cleanup`]. Using the intersection
 * before `init` or after `cleanup` is fatal.
 */

mod conflict;
mod controller;
mod direction;
pub mod simulation;
mod stats;

pub use conflict::{ConflictTable, MovementSet, CONFLICTS};
pub use controller::Intersection;
pub use direction::{Direction, Footprint, Movement, Quadrant, Turn};
pub use simulation::{CollisionMonitor, Simulation, SimulationReport};
pub use stats::{AdmissionSnapshot, AdmissionStats};

use crate::core::errors::fatal;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

static INTERSECTION: RwLock<Option<Arc<Intersection>>> = parking_lot::const_rwlock(None);

/// Create the process-wide intersection; called once before traffic starts
pub fn init() {
    let mut slot = INTERSECTION.write();
    if slot.is_some() {
        fatal("intersection initialized twice");
    }
    *slot = Some(Arc::new(Intersection::new()));
    info!("Intersection synchronization initialized");
}

/// Tear down the process-wide intersection once all traffic has finished
///
/// Returns the final admission statistics. Cleaning up while vehicles are
/// inside or waiting is fatal.
pub fn cleanup() -> AdmissionSnapshot {
    let intersection = match INTERSECTION.write().take() {
        Some(intersection) => intersection,
        None => fatal("intersection cleaned up before init"),
    };
    if !intersection.is_idle() {
        fatal("intersection cleaned up with traffic still inside");
    }
    let stats = intersection.stats();
    info!(
        admitted = stats.admitted,
        blocked = stats.blocked,
        peak = stats.peak_occupancy,
        "Intersection synchronization cleaned up"
    );
    stats
}

/// Block until a vehicle may go from `origin` to `destination`
pub fn enter(origin: Direction, destination: Direction) {
    current().enter(origin, destination);
}

/// Record that a vehicle going from `origin` to `destination` has left
pub fn leave(origin: Direction, destination: Direction) {
    current().leave(origin, destination);
}

/// Statistics of the live intersection
pub fn stats() -> AdmissionSnapshot {
    current().stats()
}

/// Whether [`init`] has run without a matching [`cleanup`]
pub fn is_initialized() -> bool {
    INTERSECTION.read().is_some()
}

fn current() -> Arc<Intersection> {
    // Clone out so no global guard is held while a vehicle sleeps
    let slot = INTERSECTION.read().clone();
    match slot {
        Some(intersection) => intersection,
        None => fatal("intersection used before init or after cleanup"),
    }
}
