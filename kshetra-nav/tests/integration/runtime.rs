//! Threaded navigator tests

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kshetra_nav::core::{Pose2D, VelocityCommand, WorldPoint};
use kshetra_nav::harness::parse_ascii_map;
use kshetra_nav::{FnSink, MapMessage, NavConfig, Navigator};

/// Fully known room: nothing left to explore.
const KNOWN_ROOM: &str = "\
############
#..........#
#..........#
#..........#
#..........#
#..........#
############
";

fn known_room() -> MapMessage {
    let grid = parse_ascii_map(KNOWN_ROOM, WorldPoint::ZERO, 0.1).unwrap();
    MapMessage::from_grid(&grid)
}

fn fast_config() -> NavConfig {
    let mut config = NavConfig::default();
    config.runtime.replan_interval_ms = 100;
    config.runtime.map_poll_ms = 20;
    config
}

/// Poll `done` every 10ms until it holds or `timeout` passes.
fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn test_known_room_completes_and_stops() {
    let (pose_tx, pose_rx) = crossbeam_channel::unbounded();
    let (map_tx, map_rx) = crossbeam_channel::unbounded();
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<VelocityCommand>();

    let handle = Navigator::spawn(fast_config(), pose_rx, map_rx, cmd_tx).unwrap();

    // No pose yet: the controller holds still
    let first = cmd_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(first, VelocityCommand::ZERO);

    map_tx.send(known_room()).unwrap();
    let start = Pose2D::new(0.55, 0.35, 0.0);
    let complete = wait_for(Duration::from_secs(5), || {
        pose_tx.send(start).unwrap();
        handle.is_exploration_complete()
    });
    assert!(complete, "exploration never completed");

    let diagnostics = handle.diagnostics();
    assert_eq!(diagnostics.generation, 1);
    assert!(diagnostics.frontiers.is_empty());
    assert!(handle.state().command_count() > 0);

    handle.shutdown();
    handle.join();

    // Final command after shutdown is a stop
    let last = cmd_rx.try_iter().last();
    assert_eq!(last, Some(VelocityCommand::ZERO));
}

#[test]
fn test_malformed_map_is_dropped() {
    let (_pose_tx, pose_rx) = crossbeam_channel::unbounded::<Pose2D>();
    let (map_tx, map_rx) = crossbeam_channel::unbounded();
    let commands = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&commands);
    let sink = FnSink(move |_: VelocityCommand| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let handle = Navigator::spawn(fast_config(), pose_rx, map_rx, sink).unwrap();

    let mut broken = known_room();
    broken.data.pop();
    map_tx.send(broken).unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(handle.model().snapshot().is_none());

    map_tx.send(known_room()).unwrap();
    assert!(wait_for(Duration::from_secs(2), || handle.model().generation() == 1));
    assert!(commands.load(Ordering::Relaxed) > 0);

    handle.shutdown();
    handle.join();
}

#[test]
fn test_closed_sink_shuts_down() {
    let (_pose_tx, pose_rx) = crossbeam_channel::unbounded::<Pose2D>();
    let (_map_tx, map_rx) = crossbeam_channel::unbounded::<MapMessage>();
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<VelocityCommand>();
    drop(cmd_rx);

    let handle = Navigator::spawn(fast_config(), pose_rx, map_rx, cmd_tx).unwrap();
    assert!(wait_for(Duration::from_secs(2), || handle.state().should_shutdown()));
    handle.join();
}

#[test]
fn test_invalid_config_refuses_to_start() {
    let (_pose_tx, pose_rx) = crossbeam_channel::unbounded::<Pose2D>();
    let (_map_tx, map_rx) = crossbeam_channel::unbounded::<MapMessage>();
    let (cmd_tx, _cmd_rx) = crossbeam_channel::unbounded::<VelocityCommand>();

    let mut config = NavConfig::default();
    config.runtime.control_rate_hz = 0.0;
    assert!(Navigator::spawn(config, pose_rx, map_rx, cmd_tx).is_err());
}

#[test]
fn test_sample_config_loads() {
    let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/kshetra.toml"));
    let config = NavConfig::load(path).unwrap();
    let defaults = NavConfig::default();
    assert_eq!(config.robot.half_width, defaults.robot.half_width);
    assert_eq!(config.planner.inflation_radius, defaults.planner.inflation_radius);
    assert_eq!(config.runtime.control_rate_hz, defaults.runtime.control_rate_hz);
}
