//! End-to-end exploration scenarios.

use kshetra_nav::core::Pose2D;

use crate::harness::{HarnessConfig, TestHarness};

/// 3m x 2m empty room.
const EMPTY_ROOM: &str = "\
##############################
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
##############################
";

/// Room with a pallet in the middle of the floor.
const PALLET_ROOM: &str = "\
########################################
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#.................###..................#
#.................###..................#
#.................###..................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
#......................................#
########################################
";

/// Room with a sealed storage cage the sensor can never see into.
const SEALED_CAGE: &str = "\
##############################
#............................#
#............................#
#............................#
#............................#
#............................#
#...........######...........#
#...........#....#...........#
#...........#....#...........#
#...........#....#...........#
#...........######...........#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
#............................#
##############################
";

#[test]
fn test_explores_empty_room() {
    let start = Pose2D::new(1.55, 1.05, 0.0);
    let result = TestHarness::new(EMPTY_ROOM, start, HarnessConfig::default()).run();
    println!("{:?}", result);

    assert!(result.complete, "exploration did not finish: {:?}", result);
    assert!(result.coverage > 0.99, "coverage {:.3}", result.coverage);
    assert!(result.arrivals >= 1);
}

#[test]
fn test_explores_around_pallet() {
    let start = Pose2D::new(0.55, 1.05, 0.0);
    let result = TestHarness::new(PALLET_ROOM, start, HarnessConfig::default()).run();
    println!("{:?}", result);

    assert!(result.complete, "exploration did not finish: {:?}", result);
    assert!(result.coverage > 0.99, "coverage {:.3}", result.coverage);
}

#[test]
fn test_sealed_space_does_not_block_completion() {
    let start = Pose2D::new(0.55, 0.55, 0.0);
    let result = TestHarness::new(SEALED_CAGE, start, HarnessConfig::default()).run();
    println!("{:?}", result);

    assert!(result.complete, "exploration did not finish: {:?}", result);
    // The 4x3 cage interior stays unknown
    assert!(result.coverage < 1.0);
    assert!(result.coverage > 0.95, "coverage {:.3}", result.coverage);
}

#[test]
fn test_returns_to_start() {
    let mut config = HarnessConfig::default();
    config.nav.exploration.return_to_start = true;
    let start = Pose2D::new(1.55, 1.05, 0.0);
    let result = TestHarness::new(EMPTY_ROOM, start, config).run();
    println!("{:?}", result);

    assert!(result.complete, "exploration did not finish: {:?}", result);
    let home = result.start_pose.position();
    let distance = result.final_pose.position().distance(&home);
    assert!(distance <= 0.3, "ended {:.2}m from start", distance);
}
