//! Synchronous test harness
//!
//! Runs grid model, explorer and controller on one thread against a
//! [`SimWorld`], advancing a synthetic clock by a fixed step so runs are
//! deterministic.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kshetra_nav::control::{ControllerEvent, MotionController, TickInput};
use kshetra_nav::core::{Pose2D, PoseSample, WorldPoint};
use kshetra_nav::exploration::{Explorer, FrontierAnalyzer, GoalDecision};
use kshetra_nav::harness::{parse_ascii_map, SimConfig, SimWorld};
use kshetra_nav::obstacles::ObstacleExtractor;
use kshetra_nav::planning::{CancelToken, PathPlanner};
use kshetra_nav::{GridModel, NavConfig};

/// Harness configuration.
#[derive(Clone)]
pub struct HarnessConfig {
    pub nav: NavConfig,
    pub sim: SimConfig,
    pub resolution: f32,
    /// Simulation timestep
    pub dt: Duration,
    /// Map refresh interval (in simulation steps)
    pub map_interval: usize,
    pub max_steps: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            nav: NavConfig::default(),
            sim: SimConfig {
                sensor_range: 1.0,
                robot_radius: 0.10,
            },
            resolution: 0.1,
            dt: Duration::from_millis(50),
            map_interval: 4,
            max_steps: 6000,
        }
    }
}

/// Outcome of a run.
#[derive(Debug)]
pub struct RunResult {
    pub complete: bool,
    pub steps: usize,
    pub coverage: f32,
    pub collisions: usize,
    pub arrivals: usize,
    pub final_pose: Pose2D,
    pub start_pose: Pose2D,
}

pub struct TestHarness {
    config: HarnessConfig,
    world: SimWorld,
    model: GridModel,
    explorer: Explorer,
    controller: MotionController,
    now: Instant,
}

impl TestHarness {
    pub fn new(map: &str, start: Pose2D, config: HarnessConfig) -> Self {
        let truth = parse_ascii_map(map, WorldPoint::ZERO, config.resolution).unwrap();
        let world = SimWorld::new(truth, start, config.sim.clone()).unwrap();
        let nav = &config.nav;
        let model = GridModel::new(
            ObstacleExtractor::new(nav.extractor_config()),
            FrontierAnalyzer::new(nav.frontier_config()),
            nav.cost_params(),
        );
        let explorer = Explorer::new(
            nav.explorer_config(),
            FrontierAnalyzer::new(nav.frontier_config()),
            PathPlanner::new(nav.planner_config(), nav.cost_params()),
        );
        let controller = MotionController::new(nav.controller_config());
        Self {
            config,
            world,
            model,
            explorer,
            controller,
            now: Instant::now(),
        }
    }

    pub fn run(mut self) -> RunResult {
        let start_pose = self.world.pose();
        let dt = self.config.dt.as_secs_f32();
        let mut needs_plan = true;
        let mut complete = false;
        let mut arrivals = 0;
        let mut steps = 0;

        while steps < self.config.max_steps {
            if steps % self.config.map_interval == 0 {
                self.world.sense();
                let grid = self.world.observed_grid().unwrap();
                self.model.load_at(grid, self.now);
                needs_plan = true;
            }
            let snapshot = self.model.snapshot().unwrap();

            if needs_plan {
                needs_plan = false;
                let decision = self
                    .explorer
                    .select_goal(&snapshot, &self.world.pose(), self.now, &CancelToken::new())
                    .unwrap();
                match decision {
                    GoalDecision::Navigate { path, .. }
                    | GoalDecision::ReturnHome { path }
                    | GoalDecision::Escape { path } => {
                        self.controller.set_path(Arc::new(path));
                    }
                    GoalDecision::Complete => {
                        complete = true;
                        break;
                    }
                    GoalDecision::Unreachable { .. } | GoalDecision::Stuck => self.controller.clear(),
                }
            }

            let output = self.controller.tick(TickInput {
                now: self.now,
                pose: Some(PoseSample::new(self.world.pose(), self.now)),
                obstacles: Some(&*snapshot),
                grid_received_at: Some(snapshot.received_at()),
            });
            if let Some(ControllerEvent::Arrived { .. }) = output.event {
                self.explorer.mark_reached(self.now);
                arrivals += 1;
                needs_plan = true;
            }

            self.world.step(output.command, dt);
            self.now += self.config.dt;
            steps += 1;
        }

        RunResult {
            complete,
            steps,
            coverage: self.world.coverage(),
            collisions: self.world.collisions(),
            arrivals,
            final_pose: self.world.pose(),
            start_pose,
        }
    }
}
