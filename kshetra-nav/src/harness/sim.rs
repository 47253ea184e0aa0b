//! Kinematic differential-drive simulator.
//!
//! The world is a ground-truth grid. The robot integrates velocity commands
//! as a unicycle and reveals truth cells within sensor range that it has
//! line of sight to; the revealed cells form the map fed to the navigator.

use crate::core::{GridCoord, Pose2D, VelocityCommand};
use crate::error::{NavError, Result};
use crate::grid::{CellState, MapMessage, OccupancyGrid};

/// Simulator settings.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Sensor range (meters)
    pub sensor_range: f32,
    /// Collision footprint radius (meters)
    pub robot_radius: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sensor_range: 2.0,
            robot_radius: 0.10,
        }
    }
}

/// Ground-truth world, robot state and the map revealed so far.
#[derive(Debug)]
pub struct SimWorld {
    config: SimConfig,
    truth: OccupancyGrid,
    observed: Vec<CellState>,
    pose: Pose2D,
    collisions: usize,
    distance: f32,
}

impl SimWorld {
    /// Place the robot at `start`, which must be a Free truth cell, and take
    /// an initial reading.
    pub fn new(truth: OccupancyGrid, start: Pose2D, config: SimConfig) -> Result<Self> {
        let cell = truth.cell_at(start.position())?;
        if !truth.is_free(cell) {
            return Err(NavError::InvalidGrid(format!(
                "start cell ({}, {}) is not free",
                cell.x, cell.y
            )));
        }

        let mut world = Self {
            config,
            observed: vec![CellState::Unknown; truth.len()],
            truth,
            pose: start,
            collisions: 0,
            distance: 0.0,
        };
        world.sense();
        Ok(world)
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    pub fn truth(&self) -> &OccupancyGrid {
        &self.truth
    }

    /// Blocked translations so far.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Distance driven (meters).
    pub fn distance_travelled(&self) -> f32 {
        self.distance
    }

    /// Integrate `command` for `dt` seconds. A translation that would put
    /// the footprint on an Occupied cell or off the map is refused (the
    /// rotation still applies) and counted as a collision.
    pub fn step(&mut self, command: VelocityCommand, dt: f32) {
        let theta = self.pose.theta + command.angular * dt;
        let mid = self.pose.theta + 0.5 * command.angular * dt;
        let step = command.linear * dt;
        let next = Pose2D::new(
            self.pose.x + step * mid.cos(),
            self.pose.y + step * mid.sin(),
            theta,
        );

        if step.abs() > 0.0 && self.footprint_blocked(&next) {
            self.collisions += 1;
            tracing::debug!(
                "Simulated collision at ({:.2}, {:.2})",
                next.x,
                next.y
            );
            self.pose = Pose2D::new(self.pose.x, self.pose.y, theta);
            return;
        }

        self.distance += step.abs();
        self.pose = next;
    }

    fn footprint_blocked(&self, pose: &Pose2D) -> bool {
        let center = pose.position();
        let Ok(cell) = self.truth.cell_at(center) else {
            return true;
        };
        let resolution = self.truth.resolution();
        let half = 0.5 * resolution;
        let radius = self.config.robot_radius;
        let span = ((radius + half) / resolution).ceil() as i32;

        for dy in -span..=span {
            for dx in -span..=span {
                let c = GridCoord::new(cell.x + dx, cell.y + dy);
                if !self.truth.is_occupied(c) {
                    continue;
                }
                // Distance from the center to the cell's square
                let p = self.truth.cell_center(c);
                let gap_x = ((center.x - p.x).abs() - half).max(0.0);
                let gap_y = ((center.y - p.y).abs() - half).max(0.0);
                if gap_x.hypot(gap_y) < radius {
                    return true;
                }
            }
        }
        false
    }

    /// Reveal visible truth cells. Returns how many were newly revealed.
    pub fn sense(&mut self) -> usize {
        let Ok(origin) = self.truth.cell_at(self.pose.position()) else {
            return 0;
        };
        let resolution = self.truth.resolution();
        let range = self.config.sensor_range;
        let span = (range / resolution).ceil() as i32;
        let position = self.pose.position();
        let mut revealed = 0;

        for dy in -span..=span {
            for dx in -span..=span {
                let target = GridCoord::new(origin.x + dx, origin.y + dy);
                let Some(index) = self.truth.index(target) else {
                    continue;
                };
                if self.observed[index].is_known()
                    || self.truth.cell_center(target).distance(&position) > range
                    || !self.visible(origin, target)
                {
                    continue;
                }
                self.observed[index] = self.truth.state(target);
                revealed += 1;
            }
        }
        revealed
    }

    /// No Occupied truth cell strictly between `from` and `to` (Bresenham).
    fn visible(&self, from: GridCoord, to: GridCoord) -> bool {
        let (mut x, mut y) = (from.x, from.y);
        let dx = (to.x - x).abs();
        let dy = (to.y - y).abs();
        let sx = if x < to.x { 1 } else { -1 };
        let sy = if y < to.y { 1 } else { -1 };
        let mut err = dx - dy;

        while (x, y) != (to.x, to.y) {
            if (x, y) != (from.x, from.y) && self.truth.is_occupied(GridCoord::new(x, y)) {
                return false;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
        true
    }

    /// The revealed map as a grid.
    pub fn observed_grid(&self) -> Result<OccupancyGrid> {
        OccupancyGrid::new(
            self.truth.origin(),
            self.truth.resolution(),
            self.truth.width(),
            self.truth.height(),
            self.observed.clone(),
        )
    }

    /// The revealed map as a map-stream message.
    pub fn map_message(&self) -> MapMessage {
        MapMessage {
            origin: self.truth.origin(),
            resolution: self.truth.resolution(),
            width: self.truth.width(),
            height: self.truth.height(),
            data: self.observed.iter().map(|c| c.to_occupancy()).collect(),
        }
    }

    /// Fraction of truth Free cells revealed.
    pub fn coverage(&self) -> f32 {
        let (free, seen) = self
            .truth
            .cells()
            .iter()
            .zip(&self.observed)
            .filter(|(truth, _)| **truth == CellState::Free)
            .fold((0usize, 0usize), |(free, seen), (_, observed)| {
                (free + 1, seen + usize::from(observed.is_known()))
            });
        if free == 0 {
            1.0
        } else {
            seen as f32 / free as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorldPoint;
    use crate::harness::parse_ascii_map;
    use approx::assert_relative_eq;

    const ROOM: &str = "\
##########
#........#
#........#
#...##...#
#...##...#
#........#
##########
";

    fn world(range: f32) -> SimWorld {
        let truth = parse_ascii_map(ROOM, WorldPoint::ZERO, 0.1).unwrap();
        let config = SimConfig {
            sensor_range: range,
            robot_radius: 0.03,
        };
        SimWorld::new(truth, Pose2D::new(0.15, 0.15, 0.0), config).unwrap()
    }

    #[test]
    fn test_start_must_be_free() {
        let truth = parse_ascii_map(ROOM, WorldPoint::ZERO, 0.1).unwrap();
        assert!(SimWorld::new(truth.clone(), Pose2D::new(0.05, 0.05, 0.0), SimConfig::default()).is_err());
        assert!(SimWorld::new(truth, Pose2D::new(-1.0, 0.15, 0.0), SimConfig::default()).is_err());
    }

    #[test]
    fn test_sense_is_range_limited() {
        let world = world(0.3);
        let observed = world.observed_grid().unwrap();
        assert!(observed.is_free(GridCoord::new(1, 1)));
        assert!(observed.is_occupied(GridCoord::new(0, 0)));
        assert!(observed.is_unknown(GridCoord::new(8, 5)));
        assert!(world.coverage() < 0.5);
    }

    #[test]
    fn test_block_shadows_cells_behind_it() {
        let world = world(5.0);
        let observed = world.observed_grid().unwrap();
        // Block occupies x 4..5, y 2..3; the cell diagonally behind it is hidden
        assert!(observed.is_occupied(GridCoord::new(4, 3)));
        assert!(observed.is_unknown(GridCoord::new(6, 4)));
        assert!(observed.is_free(GridCoord::new(8, 1)));
    }

    #[test]
    fn test_step_integrates_unicycle() {
        let mut world = world(1.0);
        world.step(VelocityCommand::new(0.2, 0.0), 1.0);
        assert_relative_eq!(world.pose().x, 0.35, epsilon = 1e-5);
        assert_relative_eq!(world.pose().y, 0.15, epsilon = 1e-5);
        assert_relative_eq!(world.distance_travelled(), 0.2, epsilon = 1e-5);

        world.step(VelocityCommand::new(0.0, 1.0), 0.5);
        assert_relative_eq!(world.pose().theta, 0.5, epsilon = 1e-5);
        assert_eq!(world.collisions(), 0);
    }

    #[test]
    fn test_walls_block_translation() {
        let mut world = world(1.0);
        world.step(VelocityCommand::new(0.0, 0.0), 1.0);
        // Facing -x toward the left wall
        world.step(VelocityCommand::new(0.0, std::f32::consts::PI), 1.0);
        world.step(VelocityCommand::new(0.1, 0.0), 1.0);
        assert_eq!(world.collisions(), 1);
        assert_relative_eq!(world.pose().x, 0.15, epsilon = 1e-5);
    }

    #[test]
    fn test_map_message_matches_observed_grid() {
        let world = world(0.5);
        let msg = world.map_message();
        assert_eq!(msg.to_grid(3).unwrap(), world.observed_grid().unwrap());
    }
}
