/*!
 * Process-Wide Intersection Tests
 * init/enter/leave/cleanup and the traffic driver
 */

use edu_kernel::traffic::{self, Direction, Simulation};
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
#[serial]
fn test_init_enter_leave_cleanup() {
    assert!(!traffic::is_initialized());
    traffic::init();
    assert!(traffic::is_initialized());

    traffic::enter(Direction::East, Direction::North);
    traffic::enter(Direction::West, Direction::South);
    assert_eq!(traffic::stats().admitted, 2);
    traffic::leave(Direction::West, Direction::South);
    traffic::leave(Direction::East, Direction::North);

    let stats = traffic::cleanup();
    assert_eq!(stats.departed, 2);
    assert!(!traffic::is_initialized());
}

#[test]
#[serial]
fn test_simulation_has_no_collisions() {
    let report = Simulation::new(10, 20).with_seed(42).run();
    assert_eq!(report.collisions, 0);
    assert_eq!(report.traversals, 200);
    assert_eq!(report.stats.admitted, 200);
    assert_eq!(report.stats.departed, 200);
    assert!(!traffic::is_initialized());
}

#[test]
#[serial]
fn test_single_vehicle_never_waits() {
    let report = Simulation::new(1, 30).run();
    assert_eq!(report.stats.blocked, 0);
    assert_eq!(report.stats.peak_occupancy, 1);
}

#[test]
#[serial]
#[should_panic(expected = "before init")]
fn test_enter_before_init_is_fatal() {
    traffic::enter(Direction::North, Direction::East);
}

#[test]
#[serial]
#[should_panic(expected = "initialized twice")]
fn test_double_init_is_fatal() {
    traffic::init();
    // Leave the slot empty for the next test before dying
    let _cleanup = CleanupOnDrop;
    traffic::init();
}

#[test]
#[serial]
#[should_panic(expected = "traffic still inside")]
fn test_cleanup_with_traffic_is_fatal() {
    traffic::init();
    traffic::enter(Direction::South, Direction::North);
    traffic::cleanup();
}

/// Cleans the intersection up when dropped, including during a panic
struct CleanupOnDrop;

impl Drop for CleanupOnDrop {
    fn drop(&mut self) {
        traffic::cleanup();
    }
}
