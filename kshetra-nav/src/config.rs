//! Configuration loading for KshetraNav

use crate::control::ControllerConfig;
use crate::error::{NavError, Result};
use crate::exploration::{ExplorerConfig, FrontierConfig, FrontierPolicy};
use crate::obstacles::ExtractorConfig;
use crate::planning::{CostParams, PathCompression, PlannerConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
    #[serde(default)]
    pub frontier: FrontierSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub exploration: ExplorationSection,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Robot physical parameters
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Half of the robot's width in meters (default: 0.15)
    #[serde(default = "default_half_width")]
    pub half_width: f32,

    /// Maximum linear velocity in m/s (default: 0.3)
    #[serde(default = "default_max_linear")]
    pub max_linear_vel: f32,

    /// Maximum angular velocity in rad/s (default: 1.0)
    #[serde(default = "default_max_angular")]
    pub max_angular_vel: f32,
}

/// Map stream interpretation
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Occupancy values above this are Occupied (default: 3)
    #[serde(default = "default_occupied_threshold")]
    pub occupied_threshold: i8,
}

/// Obstacle extraction
#[derive(Clone, Debug, Deserialize)]
pub struct ObstacleConfig {
    /// Components with fewer cells are noise (default: 2)
    #[serde(default = "default_min_cells")]
    pub min_cells: usize,

    /// Bounding-box diagonal above which a component is structure (meters, unset = never)
    #[serde(default)]
    pub max_extent: Option<f32>,

    /// Fit circle/rectangle shapes to discrete obstacles (default: true)
    #[serde(default = "default_true")]
    pub estimate_shape: bool,
}

/// Frontier detection and ranking
#[derive(Clone, Debug, Deserialize)]
pub struct FrontierSection {
    /// Minimum frontier region size in cells (default: 1)
    #[serde(default = "default_min_frontier_size")]
    pub min_size: usize,

    /// Keep at most this many ranked frontiers (0 = unlimited)
    #[serde(default)]
    pub max_frontiers: usize,

    /// Ranking policy (default: nearest)
    #[serde(default)]
    pub policy: FrontierPolicy,
}

/// Cost map and A* settings
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerSection {
    /// Free cells within this distance of an obstacle are blocked (default: 0.2)
    #[serde(default = "default_inflation_radius")]
    pub inflation_radius: f32,

    /// 8-connected search (default: true)
    #[serde(default = "default_true")]
    pub allow_diagonal: bool,

    /// Clearance penalty weight, 0 disables it (default: 0.0)
    #[serde(default)]
    pub clearance_weight: f32,

    /// Penalty falls to zero at this obstacle distance (default: 0.5)
    #[serde(default = "default_clearance_distance")]
    pub clearance_distance: f32,

    /// Node expansions before giving up (default: 200000)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Waypoint compression (default: collinear)
    #[serde(default)]
    pub compression: PathCompression,
}

/// Motion controller gains and thresholds
#[derive(Clone, Debug, Deserialize)]
pub struct ControllerSection {
    #[serde(default = "default_kp_linear")]
    pub kp_linear: f32,

    #[serde(default = "default_kp_angular")]
    pub kp_angular: f32,

    /// Tolerance for passing intermediate waypoints (meters)
    #[serde(default = "default_waypoint_tolerance")]
    pub waypoint_tolerance: f32,

    /// Tolerance for reaching the final waypoint (meters)
    #[serde(default = "default_goal_tolerance")]
    pub goal_tolerance: f32,

    /// Rotate in place above this heading error (radians)
    #[serde(default = "default_turn_in_place_angle")]
    pub turn_in_place_angle: f32,

    /// Enter avoidance below this obstacle distance (meters)
    #[serde(default = "default_avoid_distance")]
    pub avoid_distance: f32,

    /// Leave avoidance above avoid_distance + this (meters)
    #[serde(default = "default_avoid_hysteresis")]
    pub avoid_hysteresis: f32,

    /// Linear velocity is zero at this obstacle distance (meters)
    #[serde(default = "default_min_safety_distance")]
    pub min_safety_distance: f32,

    /// Forward detection cone half-angle (radians)
    #[serde(default = "default_avoid_cone_half_angle")]
    pub avoid_cone_half_angle: f32,

    /// Angular bias away from obstacles (rad/s at full proximity)
    #[serde(default = "default_avoid_gain")]
    pub avoid_gain: f32,

    /// Pose staleness timeout (milliseconds)
    #[serde(default = "default_pose_timeout_ms")]
    pub pose_timeout_ms: u64,

    /// Grid staleness timeout (milliseconds, 0 = disabled)
    #[serde(default)]
    pub grid_timeout_ms: u64,
}

/// Exploration goal selection
#[derive(Clone, Debug, Deserialize)]
pub struct ExplorationSection {
    /// Return to start position when complete (default: false)
    #[serde(default)]
    pub return_to_start: bool,

    /// Cooldown before blacklisted targets can be retried (seconds)
    #[serde(default = "default_blacklist_cooldown_secs")]
    pub blacklist_cooldown_secs: f32,

    /// Skip candidates this close to a reached target (meters)
    #[serde(default = "default_visited_radius")]
    pub visited_radius: f32,

    /// Member cells tried per frontier (default: 3)
    #[serde(default = "default_targets_per_frontier")]
    pub targets_per_frontier: usize,

    /// Planner calls per goal selection (default: 10)
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Search radius for open space when inside obstacle clearance (meters)
    #[serde(default = "default_escape_distance")]
    pub escape_distance: f32,
}

/// Thread timing
#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Control loop rate in Hz (default: 20)
    #[serde(default = "default_control_rate_hz")]
    pub control_rate_hz: f32,

    /// Replan when idle at most this often (milliseconds)
    #[serde(default = "default_replan_interval_ms")]
    pub replan_interval_ms: u64,

    /// Map channel poll timeout (milliseconds)
    #[serde(default = "default_map_poll_ms")]
    pub map_poll_ms: u64,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_half_width() -> f32 {
    0.15
}
fn default_max_linear() -> f32 {
    0.3
}
fn default_max_angular() -> f32 {
    1.0
}
fn default_occupied_threshold() -> i8 {
    3
}
fn default_min_cells() -> usize {
    2
}
fn default_min_frontier_size() -> usize {
    1
}
fn default_inflation_radius() -> f32 {
    0.20
}
fn default_clearance_distance() -> f32 {
    0.50
}
fn default_max_iterations() -> usize {
    200_000
}

// Controller defaults
fn default_kp_linear() -> f32 {
    1.0
}
fn default_kp_angular() -> f32 {
    2.0
}
fn default_waypoint_tolerance() -> f32 {
    0.10
}
fn default_goal_tolerance() -> f32 {
    0.15
}
fn default_turn_in_place_angle() -> f32 {
    0.8
}
fn default_avoid_distance() -> f32 {
    0.30
}
fn default_avoid_hysteresis() -> f32 {
    0.05
}
fn default_min_safety_distance() -> f32 {
    0.10
}
fn default_avoid_cone_half_angle() -> f32 {
    0.6
}
fn default_avoid_gain() -> f32 {
    1.0
}
fn default_pose_timeout_ms() -> u64 {
    500
}

// Exploration defaults
fn default_blacklist_cooldown_secs() -> f32 {
    30.0
}
fn default_visited_radius() -> f32 {
    0.30
}
fn default_targets_per_frontier() -> usize {
    3
}
fn default_max_candidates() -> usize {
    10
}

fn default_escape_distance() -> f32 {
    0.5
}

// Runtime defaults
fn default_control_rate_hz() -> f32 {
    20.0
}
fn default_replan_interval_ms() -> u64 {
    1000
}
fn default_map_poll_ms() -> u64 {
    100
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            half_width: default_half_width(),
            max_linear_vel: default_max_linear(),
            max_angular_vel: default_max_angular(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            occupied_threshold: default_occupied_threshold(),
        }
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            min_cells: default_min_cells(),
            max_extent: None,
            estimate_shape: true,
        }
    }
}

impl Default for FrontierSection {
    fn default() -> Self {
        Self {
            min_size: default_min_frontier_size(),
            max_frontiers: 0,
            policy: FrontierPolicy::default(),
        }
    }
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            inflation_radius: default_inflation_radius(),
            allow_diagonal: true,
            clearance_weight: 0.0,
            clearance_distance: default_clearance_distance(),
            max_iterations: default_max_iterations(),
            compression: PathCompression::default(),
        }
    }
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            kp_linear: default_kp_linear(),
            kp_angular: default_kp_angular(),
            waypoint_tolerance: default_waypoint_tolerance(),
            goal_tolerance: default_goal_tolerance(),
            turn_in_place_angle: default_turn_in_place_angle(),
            avoid_distance: default_avoid_distance(),
            avoid_hysteresis: default_avoid_hysteresis(),
            min_safety_distance: default_min_safety_distance(),
            avoid_cone_half_angle: default_avoid_cone_half_angle(),
            avoid_gain: default_avoid_gain(),
            pose_timeout_ms: default_pose_timeout_ms(),
            grid_timeout_ms: 0,
        }
    }
}

impl Default for ExplorationSection {
    fn default() -> Self {
        Self {
            return_to_start: false,
            blacklist_cooldown_secs: default_blacklist_cooldown_secs(),
            visited_radius: default_visited_radius(),
            targets_per_frontier: default_targets_per_frontier(),
            max_candidates: default_max_candidates(),
            escape_distance: default_escape_distance(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: default_control_rate_hz(),
            replan_interval_ms: default_replan_interval_ms(),
            map_poll_ms: default_map_poll_ms(),
        }
    }
}

fn require(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(NavError::Config(message()))
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

impl NavConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let robot = &self.robot;
        let planner = &self.planner;
        let controller = &self.controller;

        require(positive(robot.half_width), || {
            format!("robot.half_width must be positive, got {}", robot.half_width)
        })?;
        require(positive(robot.max_linear_vel) && positive(robot.max_angular_vel), || {
            "robot velocity limits must be positive".to_string()
        })?;
        require(
            planner.inflation_radius.is_finite() && planner.inflation_radius >= robot.half_width,
            || {
                format!(
                    "planner.inflation_radius ({}) must be at least robot.half_width ({})",
                    planner.inflation_radius, robot.half_width
                )
            },
        )?;
        require(
            non_negative(planner.clearance_weight) && non_negative(planner.clearance_distance),
            || "planner clearance settings must be non-negative".to_string(),
        )?;
        require(planner.max_iterations > 0, || {
            "planner.max_iterations must be positive".to_string()
        })?;
        require(
            positive(controller.kp_linear) && positive(controller.kp_angular),
            || "controller gains must be positive".to_string(),
        )?;
        require(
            positive(controller.waypoint_tolerance) && positive(controller.goal_tolerance),
            || "controller tolerances must be positive".to_string(),
        )?;
        require(positive(controller.turn_in_place_angle), || {
            "controller.turn_in_place_angle must be positive".to_string()
        })?;
        require(
            non_negative(controller.min_safety_distance)
                && controller.min_safety_distance < controller.avoid_distance,
            || {
                format!(
                    "controller.min_safety_distance ({}) must be below avoid_distance ({})",
                    controller.min_safety_distance, controller.avoid_distance
                )
            },
        )?;
        require(
            non_negative(controller.avoid_hysteresis)
                && positive(controller.avoid_cone_half_angle)
                && non_negative(controller.avoid_gain),
            || "controller avoidance settings are out of range".to_string(),
        )?;
        require(controller.pose_timeout_ms > 0, || {
            "controller.pose_timeout_ms must be positive".to_string()
        })?;
        require(positive(self.runtime.control_rate_hz), || {
            format!(
                "runtime.control_rate_hz must be positive, got {}",
                self.runtime.control_rate_hz
            )
        })?;
        require(
            self.runtime.replan_interval_ms > 0 && self.runtime.map_poll_ms > 0,
            || "runtime intervals must be positive".to_string(),
        )?;
        require(
            self.exploration.blacklist_cooldown_secs.is_finite()
                && self.exploration.blacklist_cooldown_secs >= 0.0,
            || "exploration.blacklist_cooldown_secs must be non-negative".to_string(),
        )?;
        require(positive(self.exploration.escape_distance), || {
            format!(
                "exploration.escape_distance must be positive, got {}",
                self.exploration.escape_distance
            )
        })?;
        if let Some(extent) = self.obstacles.max_extent {
            require(positive(extent), || {
                format!("obstacles.max_extent must be positive, got {}", extent)
            })?;
        }
        Ok(())
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            min_cells: self.obstacles.min_cells,
            max_extent: self.obstacles.max_extent,
            estimate_shape: self.obstacles.estimate_shape,
        }
    }

    pub fn frontier_config(&self) -> FrontierConfig {
        FrontierConfig {
            min_size: self.frontier.min_size,
            max_frontiers: (self.frontier.max_frontiers > 0).then_some(self.frontier.max_frontiers),
            policy: self.frontier.policy,
        }
    }

    pub fn cost_params(&self) -> CostParams {
        CostParams {
            inflation_radius: self.planner.inflation_radius,
            clearance_distance: self.planner.clearance_distance,
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            allow_diagonal: self.planner.allow_diagonal,
            max_iterations: self.planner.max_iterations,
            clearance_weight: self.planner.clearance_weight,
            compression: self.planner.compression,
            ..PlannerConfig::default()
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let c = &self.controller;
        ControllerConfig {
            kp_linear: c.kp_linear,
            kp_angular: c.kp_angular,
            max_linear: self.robot.max_linear_vel,
            max_angular: self.robot.max_angular_vel,
            waypoint_tolerance: c.waypoint_tolerance,
            goal_tolerance: c.goal_tolerance,
            turn_in_place_angle: c.turn_in_place_angle,
            avoid_distance: c.avoid_distance,
            avoid_hysteresis: c.avoid_hysteresis,
            min_safety_distance: c.min_safety_distance,
            avoid_cone_half_angle: c.avoid_cone_half_angle,
            avoid_gain: c.avoid_gain,
            pose_timeout: Duration::from_millis(c.pose_timeout_ms),
            grid_timeout: (c.grid_timeout_ms > 0).then(|| Duration::from_millis(c.grid_timeout_ms)),
        }
    }

    pub fn explorer_config(&self) -> ExplorerConfig {
        let e = &self.exploration;
        ExplorerConfig {
            return_to_start: e.return_to_start,
            blacklist_cooldown: Duration::from_secs_f32(e.blacklist_cooldown_secs),
            visited_radius: e.visited_radius,
            targets_per_frontier: e.targets_per_frontier,
            max_candidates: e.max_candidates,
            escape_distance: e.escape_distance,
        }
    }

    /// Control loop period.
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.runtime.control_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NavConfig::default();
        config.validate().unwrap();
        assert_eq!(config.grid.occupied_threshold, 3);
        assert_eq!(config.frontier_config().max_frontiers, None);
        assert_eq!(config.controller_config().grid_timeout, None);
        assert_eq!(config.control_period(), Duration::from_millis(50));
        assert_eq!(config.explorer_config().escape_distance, 0.5);
    }

    #[test]
    fn test_load_partial_file() {
        let file = write_config(
            r#"
[robot]
half_width = 0.1

[planner]
inflation_radius = 0.12
compression = "line_of_sight"

[frontier]
max_frontiers = 4

[frontier.policy]
kind = "weighted"
size_weight = 1.0
distance_weight = 0.5

[controller]
grid_timeout_ms = 2000
"#,
        );
        let config = NavConfig::load(file.path()).unwrap();
        assert_eq!(config.robot.half_width, 0.1);
        assert_eq!(config.robot.max_linear_vel, 0.3);
        assert_eq!(config.planner.compression, PathCompression::LineOfSight);
        assert_eq!(config.frontier_config().max_frontiers, Some(4));
        assert_eq!(
            config.frontier.policy,
            FrontierPolicy::Weighted {
                size_weight: 1.0,
                distance_weight: 0.5
            }
        );
        assert_eq!(
            config.controller_config().grid_timeout,
            Some(Duration::from_secs(2))
        );
        assert_eq!(config.runtime.control_rate_hz, 20.0);
    }

    #[test]
    fn test_inflation_below_half_width_rejected() {
        let file = write_config("[robot]\nhalf_width = 0.3\n");
        let err = NavConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, NavError::Config(msg) if msg.contains("inflation_radius")));
    }

    #[test]
    fn test_bad_rates_rejected() {
        let mut config = NavConfig::default();
        config.runtime.control_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = NavConfig::default();
        config.controller.min_safety_distance = 0.5;
        assert!(config.validate().is_err());

        let mut config = NavConfig::default();
        config.exploration.escape_distance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let file = write_config("[robot\nhalf_width = ");
        assert!(matches!(
            NavConfig::load(file.path()),
            Err(NavError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = NavConfig::load(Path::new("/nonexistent/kshetra.toml"));
        assert!(matches!(result, Err(NavError::Config(_))));
    }
}
