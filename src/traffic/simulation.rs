/*!
 * Traffic Driver
 *
 * Bounded driver for the process-wide intersection: a fixed number of
 * vehicle threads each make a fixed number of random traversals. An
 * independent [`CollisionMonitor`] watches every traversal and counts
 * conflicting movements that are inside at the same time.
 */

use super::conflict::CONFLICTS;
use super::direction::{Direction, Movement};
use super::stats::AdmissionSnapshot;
use crate::core::config::KernelConfig;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Collision checker kept outside the controller
///
/// A vehicle reports itself after `enter` returns and before it calls
/// `leave`, so the monitor never sees a vehicle that the controller does
/// not consider inside. Any conflict it observes is a real one.
#[derive(Debug, Default)]
pub struct CollisionMonitor {
    inside: Mutex<[u32; Movement::COUNT]>,
    collisions: AtomicU64,
}

impl CollisionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arrived(&self, movement: Movement) {
        let mut inside = self.inside.lock();
        for other in CONFLICTS.conflicts_of(movement).iter() {
            if inside[other.index()] > 0 {
                self.collisions.fetch_add(1, Ordering::Relaxed);
                warn!(%movement, %other, "collision");
            }
        }
        inside[movement.index()] += 1;
    }

    pub fn departed(&self, movement: Movement) {
        self.inside.lock()[movement.index()] -= 1;
    }

    pub fn collisions(&self) -> u64 {
        self.collisions.load(Ordering::Relaxed)
    }
}

/// Outcome of a driver run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimulationReport {
    pub traversals: u64,
    pub collisions: u64,
    pub elapsed_ms: u64,
    pub stats: AdmissionSnapshot,
}

/// Driver parameters
#[derive(Debug, Clone)]
pub struct Simulation {
    pub vehicles: usize,
    pub bounces: usize,
    /// Longest time a vehicle spends inside the intersection
    pub max_dwell: Duration,
    pub seed: u64,
}

impl Simulation {
    pub fn new(vehicles: usize, bounces: usize) -> Self {
        Self {
            vehicles,
            bounces,
            max_dwell: Duration::from_micros(200),
            seed: 0x5eed,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(config.vehicles, config.bounces)
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the driver against the process-wide intersection
    ///
    /// Calls [`super::init`] before starting and [`super::cleanup`] after
    /// every vehicle has finished.
    pub fn run(&self) -> SimulationReport {
        let start = Instant::now();
        let monitor = Arc::new(CollisionMonitor::new());
        let traversals = Arc::new(AtomicU64::new(0));

        super::init();
        info!(vehicles = self.vehicles, bounces = self.bounces, "Traffic simulation starting");

        let handles: Vec<_> = (0..self.vehicles)
            .map(|vehicle| {
                let monitor = Arc::clone(&monitor);
                let traversals = Arc::clone(&traversals);
                let bounces = self.bounces;
                let max_dwell = self.max_dwell;
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(vehicle as u64));
                thread::Builder::new()
                    .name(format!("vehicle-{vehicle}"))
                    .spawn(move || {
                        for _ in 0..bounces {
                            let movement = random_movement(&mut rng);
                            let dwell = rng.gen_range(Duration::ZERO..=max_dwell);

                            super::enter(movement.origin(), movement.destination());
                            monitor.arrived(movement);
                            thread::sleep(dwell);
                            monitor.departed(movement);
                            super::leave(movement.origin(), movement.destination());

                            traversals.fetch_add(1, Ordering::Relaxed);
                        }
                    })
            })
            .collect();

        for handle in handles {
            match handle {
                Ok(handle) => {
                    if handle.join().is_err() {
                        warn!("vehicle thread panicked");
                    }
                }
                Err(e) => warn!(error = %e, "could not start vehicle thread"),
            }
        }

        let stats = super::cleanup();
        let report = SimulationReport {
            traversals: traversals.load(Ordering::Relaxed),
            collisions: monitor.collisions(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            stats,
        };
        info!(
            traversals = report.traversals,
            collisions = report.collisions,
            elapsed_ms = report.elapsed_ms,
            "Traffic simulation finished"
        );
        report
    }
}

fn random_movement(rng: &mut StdRng) -> Movement {
    loop {
        let origin = Direction::ALL[rng.gen_range(0..4)];
        let destination = Direction::ALL[rng.gen_range(0..4)];
        if let Some(movement) = Movement::new(origin, destination) {
            return movement;
        }
    }
}
