//! KshetraNav - navigation runtime driven by the kinematic simulator
//!
//! Loads a ground-truth ASCII map, places a simulated robot in it and runs
//! the navigator against the map the robot reveals:
//!
//! - **Simulator** (main thread, 50Hz): integrates commands, publishes poses,
//!   reveals cells in sensor range and publishes the map
//! - **Navigator** (mapping, planning and control threads): explores until no
//!   reachable frontier is left

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::TrySendError;
use tracing::{info, warn};

use kshetra_nav::core::{Pose2D, VelocityCommand, WorldPoint};
use kshetra_nav::error::{NavError, Result};
use kshetra_nav::harness::{parse_ascii_map, SimConfig, SimWorld};
use kshetra_nav::obstacles::ObstacleExtractor;
use kshetra_nav::planning::CostMap;
use kshetra_nav::{NavConfig, Navigator, OccupancyGrid};

const DEMO_MAP: &str = include_str!("../maps/warehouse.txt");

/// Explore a simulated warehouse floor.
#[derive(Parser, Debug)]
#[command(name = "kshetra-nav", version, about)]
struct Args {
    /// TOML configuration file (default: ./kshetra.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ground-truth ASCII map (default: built-in warehouse)
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Map resolution in meters per cell
    #[arg(long, default_value_t = 0.1)]
    resolution: f32,

    /// Give up after this many seconds
    #[arg(short, long, default_value_t = 300.0)]
    duration: f32,

    /// Start pose as x,y[,theta] (default: first traversable cell)
    #[arg(short, long, value_parser = parse_pose)]
    start: Option<Pose2D>,

    /// Simulated sensor range in meters
    #[arg(long, default_value_t = 2.0)]
    sensor_range: f32,

    /// Write the explored map here as ASCII when done
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_pose(s: &str) -> std::result::Result<Pose2D, String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("{:?}: {}", v, e)))
        .collect::<std::result::Result<_, _>>()?;
    match values.as_slice() {
        [x, y] => Ok(Pose2D::new(*x, *y, 0.0)),
        [x, y, theta] => Ok(Pose2D::new(*x, *y, *theta)),
        _ => Err(format!("expected x,y[,theta], got {:?}", s)),
    }
}

fn load_config(path: Option<&Path>) -> Result<NavConfig> {
    if let Some(path) = path {
        info!("Loading configuration from {:?}", path);
        return NavConfig::load(path);
    }
    if Path::new("kshetra.toml").exists() {
        info!("Loading configuration from kshetra.toml");
        NavConfig::load(Path::new("kshetra.toml"))
    } else {
        info!("Using default configuration");
        Ok(NavConfig::default())
    }
}

/// Center of the lowest-index cell the planner considers traversable.
fn default_start(truth: &OccupancyGrid, config: &NavConfig) -> Result<Pose2D> {
    let obstacles = ObstacleExtractor::new(config.extractor_config()).extract(truth);
    let cost_map = CostMap::build(truth, &obstacles, &config.cost_params());
    (0..truth.len())
        .map(|i| truth.coord_of(i))
        .find(|&c| cost_map.is_traversable(c))
        .map(|c| {
            let p = truth.cell_center(c);
            Pose2D::new(p.x, p.y, 0.0)
        })
        .ok_or_else(|| NavError::InvalidGrid("map has no traversable cell".to_string()))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kshetra_nav=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    info!("KshetraNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Clearance: inflation {:.2}m (robot half width {:.2}m)",
        config.planner.inflation_radius, config.robot.half_width
    );

    let text = match &args.map {
        Some(path) => {
            info!("Loading map from {:?}", path);
            std::fs::read_to_string(path)?
        }
        None => DEMO_MAP.to_string(),
    };
    let truth = parse_ascii_map(&text, WorldPoint::ZERO, args.resolution)?;
    let start = match args.start {
        Some(pose) => pose,
        None => default_start(&truth, &config)?,
    };
    info!(
        "Map {}x{} at {:.2}m/cell, start ({:.2}, {:.2}, {:.2})",
        truth.width(),
        truth.height(),
        truth.resolution(),
        start.x,
        start.y,
        start.theta
    );

    let mut world = SimWorld::new(
        truth,
        start,
        SimConfig {
            sensor_range: args.sensor_range,
            robot_radius: config.robot.half_width,
        },
    )?;

    let (pose_tx, pose_rx) = crossbeam_channel::bounded(16);
    let (map_tx, map_rx) = crossbeam_channel::bounded(2);
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<VelocityCommand>(64);
    let handle = Navigator::spawn(config, pose_rx, map_rx, cmd_tx)?;

    let sim_period = Duration::from_millis(20);
    let map_period = Duration::from_millis(200);
    let status_period = Duration::from_secs(5);
    let deadline = Duration::from_secs_f32(args.duration.max(0.0));

    let started = Instant::now();
    let mut last_map: Option<Instant> = None;
    let mut last_status = started;
    let mut command = VelocityCommand::ZERO;
    let mut last_step = started;

    loop {
        std::thread::sleep(sim_period);
        let now = Instant::now();

        if let Some(latest) = cmd_rx.try_iter().last() {
            command = latest;
        }
        world.step(command, now.duration_since(last_step).as_secs_f32());
        last_step = now;

        if let Err(TrySendError::Disconnected(_)) = pose_tx.try_send(world.pose()) {
            warn!("Navigator stopped accepting poses");
            break;
        }

        if last_map.map_or(true, |t| now.duration_since(t) >= map_period) {
            world.sense();
            match map_tx.try_send(world.map_message()) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    warn!("Navigator stopped accepting maps");
                    break;
                }
            }
            last_map = Some(now);
        }

        if now.duration_since(last_status) >= status_period {
            let diagnostics = handle.diagnostics();
            info!(
                "Coverage {:.0}%, {:.1}m driven, {} collisions, {:?}",
                world.coverage() * 100.0,
                world.distance_travelled(),
                world.collisions(),
                diagnostics.motion
            );
            last_status = now;
        }

        if handle.is_exploration_complete() {
            info!("Exploration completed successfully");
            break;
        }
        if now.duration_since(started) >= deadline {
            warn!("Time limit of {:.0}s reached", args.duration);
            break;
        }
        if handle.state().should_shutdown() {
            warn!("Navigator shut down unexpectedly");
            break;
        }
    }

    handle.shutdown();
    let diagnostics = handle.diagnostics();
    info!("Waiting for threads to finish...");
    handle.join();

    info!(
        "Finished: coverage {:.0}%, {:.1}m driven, {} collisions, {} obstacles, {} plans",
        world.coverage() * 100.0,
        world.distance_travelled(),
        world.collisions(),
        diagnostics.obstacles.len(),
        diagnostics.plans
    );
    for obstacle in &diagnostics.obstacles {
        info!(
            "Obstacle {}: {} cells at ({:.2}, {:.2}), radius {:.2}m",
            obstacle.id, obstacle.cells, obstacle.centroid.x, obstacle.centroid.y, obstacle.radius
        );
    }

    if let Some(path) = &args.output {
        let explored = world.observed_grid()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, explored.to_string())?;
        info!("Explored map saved to {:?}", path);
    }

    Ok(())
}
