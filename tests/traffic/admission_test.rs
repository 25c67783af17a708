/*!
 * Intersection Admission Tests
 * Concurrent traffic against a private intersection
 */

use edu_kernel::traffic::{CollisionMonitor, Direction, Intersection, Movement, CONFLICTS};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn movement_strategy() -> impl Strategy<Value = Movement> {
    (0..Movement::COUNT).prop_map(|i| Movement::from_index(i).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_no_conflicting_movements_inside(
        routes in prop::collection::vec(prop::collection::vec(movement_strategy(), 1..8), 2..6)
    ) {
        let intersection = Arc::new(Intersection::new());
        let monitor = Arc::new(CollisionMonitor::new());

        let vehicles: Vec<_> = routes
            .into_iter()
            .map(|route| {
                let intersection = Arc::clone(&intersection);
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || {
                    for movement in route {
                        intersection.enter_movement(movement);
                        monitor.arrived(movement);
                        thread::sleep(Duration::from_micros(50));
                        monitor.departed(movement);
                        intersection.leave_movement(movement);
                    }
                })
            })
            .collect();

        for vehicle in vehicles {
            vehicle.join().unwrap();
        }

        prop_assert_eq!(monitor.collisions(), 0);
        prop_assert!(intersection.is_idle());
        let stats = intersection.stats();
        prop_assert_eq!(stats.admitted, stats.departed);
    }

    #[test]
    fn prop_conflict_is_symmetric(a in movement_strategy(), b in movement_strategy()) {
        prop_assert_eq!(CONFLICTS.conflict(a, b), CONFLICTS.conflict(b, a));
        prop_assert_eq!(
            CONFLICTS.conflict(a, b),
            a != b && a.footprint().overlaps(b.footprint())
        );
    }
}

#[test]
fn test_blocked_vehicle_admitted_after_conflict_clears() {
    let intersection = Arc::new(Intersection::new());
    // Left turn from the south covers every quadrant but SW
    intersection.enter(Direction::South, Direction::West);

    let blocked: Vec<_> = [(Direction::North, Direction::South), (Direction::East, Direction::West)]
        .into_iter()
        .map(|(origin, destination)| {
            let intersection = Arc::clone(&intersection);
            thread::spawn(move || {
                intersection.enter(origin, destination);
                intersection.leave(origin, destination);
            })
        })
        .collect();

    while intersection.waiting() < 2 {
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(intersection.occupancy(), 1);

    intersection.leave(Direction::South, Direction::West);
    for vehicle in blocked {
        vehicle.join().unwrap();
    }
    assert!(intersection.is_idle());
    assert!(intersection.stats().blocked >= 2);
}

#[test]
fn test_compatible_traffic_flows_together() {
    let intersection = Arc::new(Intersection::new());
    // Opposing straights use disjoint quadrant pairs
    intersection.enter(Direction::North, Direction::South);
    intersection.enter(Direction::South, Direction::North);

    let right_turn = {
        let intersection = Arc::clone(&intersection);
        thread::spawn(move || {
            // W2S only needs SW, which N2S holds
            intersection.enter(Direction::West, Direction::South);
            intersection.leave(Direction::West, Direction::South);
        })
    };
    while intersection.waiting() == 0 {
        thread::sleep(Duration::from_millis(2));
    }

    intersection.leave(Direction::North, Direction::South);
    right_turn.join().unwrap();
    intersection.leave(Direction::South, Direction::North);
    assert!(intersection.is_idle());
}
