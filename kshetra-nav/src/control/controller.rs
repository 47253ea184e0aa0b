//! Waypoint-following motion controller with obstacle-avoidance override.
//!
//! A pure state machine: every input, including the current time, arrives
//! through [`TickInput`], so the controller can be driven deterministically.
//!
//! ```text
//! Idle --set_path--> Following <--> Avoiding
//!                        |              |
//!                        +--> Arrived <-+ --> Idle
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::{PoseSample, Pose2D, VelocityCommand, WorldPoint};
use crate::planning::Path;

use super::avoidance::{ObstacleContact, ObstacleField};

/// Configuration for the motion controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Proportional gain on distance to the next waypoint
    pub kp_linear: f32,
    /// Proportional gain on heading error
    pub kp_angular: f32,
    /// Maximum linear velocity (m/s)
    pub max_linear: f32,
    /// Maximum angular velocity (rad/s)
    pub max_angular: f32,
    /// Distance tolerance for passing intermediate waypoints (meters)
    pub waypoint_tolerance: f32,
    /// Distance tolerance for reaching the final waypoint (meters)
    pub goal_tolerance: f32,
    /// Heading error above which the robot rotates in place (radians)
    pub turn_in_place_angle: f32,
    /// Obstacle surface distance that triggers avoidance (meters)
    pub avoid_distance: f32,
    /// Extra distance required before leaving avoidance (meters)
    pub avoid_hysteresis: f32,
    /// Linear velocity reaches zero at this distance (meters)
    pub min_safety_distance: f32,
    /// Half-angle of the forward detection cone (radians)
    pub avoid_cone_half_angle: f32,
    /// Angular bias gain away from the nearest obstacle (rad/s at full proximity)
    pub avoid_gain: f32,
    /// Poses older than this are stale
    pub pose_timeout: Duration,
    /// Grids older than this are stale; `None` disables the check
    pub grid_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kp_linear: 1.0,
            kp_angular: 2.0,
            max_linear: 0.3,
            max_angular: 1.0,
            waypoint_tolerance: 0.10,
            goal_tolerance: 0.15,
            turn_in_place_angle: 0.8,
            avoid_distance: 0.30,
            avoid_hysteresis: 0.05,
            min_safety_distance: 0.10,
            avoid_cone_half_angle: 0.6,
            avoid_gain: 1.0,
            pose_timeout: Duration::from_millis(500),
            grid_timeout: None,
        }
    }
}

/// Controller state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum MotionState {
    /// No path; emits zero
    #[default]
    Idle,
    /// Driving toward the next waypoint
    Following,
    /// Obstacle in the forward cone overrides the drive command
    Avoiding,
    /// Final waypoint reached on this tick
    Arrived,
}

/// Input that went stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleInput {
    Pose,
    Grid,
}

/// Notifications for goal selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControllerEvent {
    /// Final waypoint reached
    Arrived { goal: WorldPoint },
    /// A path was dropped because an input went stale
    Stalled(StaleInput),
}

/// Everything one control tick sees.
#[derive(Clone, Copy)]
pub struct TickInput<'a> {
    pub now: Instant,
    /// Last known pose, if any arrived yet
    pub pose: Option<PoseSample>,
    /// Obstacle view of the current map
    pub obstacles: Option<&'a dyn ObstacleField>,
    /// Receive time of the current map
    pub grid_received_at: Option<Instant>,
}

/// Result of one control tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlOutput {
    pub command: VelocityCommand,
    pub state: MotionState,
    pub event: Option<ControllerEvent>,
}

impl ControlOutput {
    fn stopped(state: MotionState, event: Option<ControllerEvent>) -> Self {
        Self {
            command: VelocityCommand::ZERO,
            state,
            event,
        }
    }
}

/// Waypoint-following motion controller.
#[derive(Debug)]
pub struct MotionController {
    config: ControllerConfig,
    state: MotionState,
    /// Current path to follow
    path: Option<Arc<Path>>,
    /// Index of the waypoint being driven to
    next_waypoint: usize,
}

impl MotionController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            state: MotionState::Idle,
            path: None,
            next_waypoint: 0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Final waypoint of the current path.
    pub fn goal(&self) -> Option<WorldPoint> {
        self.path.as_ref().and_then(|p| p.goal())
    }

    /// Replace the current path wholesale.
    pub fn set_path(&mut self, path: Arc<Path>) {
        if path.is_empty() {
            tracing::warn!("set_path: received empty path");
            self.clear();
            return;
        }
        tracing::info!(
            "set_path: {} waypoints, {:.2}m",
            path.len(),
            path.length()
        );
        self.path = Some(path);
        self.next_waypoint = 0;
        if self.state != MotionState::Avoiding {
            self.state = MotionState::Following;
        }
    }

    /// Drop the current path (abandoned goal) and go Idle.
    pub fn clear(&mut self) {
        self.path = None;
        self.next_waypoint = 0;
        self.state = MotionState::Idle;
    }

    /// Compute the command for this tick.
    pub fn tick(&mut self, input: TickInput<'_>) -> ControlOutput {
        if let Some(stale) = self.stale_input(&input) {
            let event = self.has_path().then_some(ControllerEvent::Stalled(stale));
            if event.is_some() {
                tracing::warn!("{:?} input stale, dropping path", stale);
            }
            self.clear();
            return ControlOutput::stopped(MotionState::Idle, event);
        }

        let Some(sample) = input.pose else {
            return ControlOutput::stopped(MotionState::Idle, None);
        };
        let pose = sample.pose;

        let Some(path) = self.path.clone() else {
            self.state = MotionState::Idle;
            return ControlOutput::stopped(MotionState::Idle, None);
        };
        let waypoints = path.waypoints();
        let last = waypoints.len() - 1;
        let goal = waypoints[last];

        if pose.position().distance(&goal) <= self.config.goal_tolerance {
            tracing::info!("Arrived at goal ({:.2}, {:.2})", goal.x, goal.y);
            self.clear();
            return ControlOutput::stopped(
                MotionState::Arrived,
                Some(ControllerEvent::Arrived { goal }),
            );
        }

        while self.next_waypoint < last
            && pose.position().distance(&waypoints[self.next_waypoint])
                <= self.config.waypoint_tolerance
        {
            self.next_waypoint += 1;
            tracing::debug!("Advanced to waypoint {}/{}", self.next_waypoint + 1, waypoints.len());
        }
        let target = waypoints[self.next_waypoint];

        let command = self.drive_to_point(&pose, target);

        let contact = input.obstacles.and_then(|field| {
            field.nearest_in_cone(
                &pose,
                self.config.avoid_distance + self.config.avoid_hysteresis,
                self.config.avoid_cone_half_angle,
            )
        });
        self.update_avoidance(contact);

        let command = match (self.state, contact) {
            (MotionState::Avoiding, Some(contact)) => self.avoid(command, &contact),
            _ => command,
        };

        ControlOutput {
            command: command.clamped(self.config.max_linear, self.config.max_angular),
            state: self.state,
            event: None,
        }
    }

    fn stale_input(&self, input: &TickInput<'_>) -> Option<StaleInput> {
        let pose_ok = input
            .pose
            .is_some_and(|s| s.pose.is_finite() && s.age(input.now) <= self.config.pose_timeout);
        if !pose_ok {
            return Some(StaleInput::Pose);
        }
        if let Some(timeout) = self.config.grid_timeout {
            let grid_ok = input
                .grid_received_at
                .is_some_and(|t| input.now.saturating_duration_since(t) <= timeout);
            if !grid_ok {
                return Some(StaleInput::Grid);
            }
        }
        None
    }

    fn update_avoidance(&mut self, contact: Option<ObstacleContact>) {
        let distance = contact.map(|c| c.distance);
        match self.state {
            MotionState::Following => {
                if let Some(d) = distance.filter(|&d| d < self.config.avoid_distance) {
                    tracing::info!("Obstacle at {:.2}m ahead, avoiding", d);
                    self.state = MotionState::Avoiding;
                }
            }
            MotionState::Avoiding => {
                let clear = distance
                    .map_or(true, |d| d > self.config.avoid_distance + self.config.avoid_hysteresis);
                if clear {
                    tracing::info!("Forward cone clear, resuming path");
                    self.state = MotionState::Following;
                }
            }
            MotionState::Idle | MotionState::Arrived => {}
        }
    }

    /// Proportional drive toward `target`; rotate in place on large heading error.
    fn drive_to_point(&self, pose: &Pose2D, target: WorldPoint) -> VelocityCommand {
        let distance = pose.position().distance(&target);
        let angle_error = pose.bearing_to(&target);

        let angular = (self.config.kp_angular * angle_error)
            .clamp(-self.config.max_angular, self.config.max_angular);

        let linear = if angle_error.abs() > self.config.turn_in_place_angle {
            0.0
        } else {
            ((self.config.kp_linear * distance).min(self.config.max_linear) * angle_error.cos())
                .max(0.0)
        };

        tracing::debug!(
            "drive_to_point: dist={:.2}m, angle_err={:.1}°, vel=({:.3},{:.3})",
            distance,
            angle_error.to_degrees(),
            linear,
            angular
        );

        VelocityCommand::new(linear, angular)
    }

    /// Scale linear speed by proximity and bias the turn away from the contact.
    fn avoid(&self, command: VelocityCommand, contact: &ObstacleContact) -> VelocityCommand {
        let band = self.config.avoid_distance - self.config.min_safety_distance;
        let scale = if band > 0.0 {
            ((contact.distance - self.config.min_safety_distance) / band).clamp(0.0, 1.0)
        } else if contact.distance > self.config.min_safety_distance {
            1.0
        } else {
            0.0
        };
        let away = if contact.bearing >= 0.0 { -1.0 } else { 1.0 };

        VelocityCommand::new(
            command.linear * scale,
            command.angular + away * self.config.avoid_gain * (1.0 - scale),
        )
    }
}
