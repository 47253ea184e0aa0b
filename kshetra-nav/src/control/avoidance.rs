//! Forward-cone obstacle queries used by the motion controller.

use crate::core::math::normalize_angle;
use crate::core::{GridCoord, Pose2D, WorldPoint};
use crate::grid::OccupancyGrid;

/// Closest obstacle cell seen in the forward cone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleContact {
    /// Distance from the robot center to the cell surface (meters)
    pub distance: f32,
    /// Bearing relative to the robot heading (radians, positive = left)
    pub bearing: f32,
    pub cell: GridCoord,
    /// Owning obstacle id, when the field knows it
    pub obstacle: Option<usize>,
}

/// Anything the controller can ask about obstacles ahead of it.
pub trait ObstacleField {
    /// Nearest obstacle cell within `range` meters whose bearing lies within
    /// `half_angle` of the robot heading.
    fn nearest_in_cone(&self, pose: &Pose2D, range: f32, half_angle: f32) -> Option<ObstacleContact>;
}

/// Raw occupied cells act as obstacles with no id.
impl ObstacleField for OccupancyGrid {
    fn nearest_in_cone(&self, pose: &Pose2D, range: f32, half_angle: f32) -> Option<ObstacleContact> {
        scan_cone(self, pose, range, half_angle, |grid, coord| {
            grid.is_occupied(coord).then_some(None)
        })
    }
}

/// Scan the square window around `pose` that covers `range`.
///
/// `obstacle_at` returns `Some(id)` for cells that count as obstacles. Ties on
/// distance keep the first cell in row-major order.
pub(crate) fn scan_cone<F>(
    grid: &OccupancyGrid,
    pose: &Pose2D,
    range: f32,
    half_angle: f32,
    obstacle_at: F,
) -> Option<ObstacleContact>
where
    F: Fn(&OccupancyGrid, GridCoord) -> Option<Option<usize>>,
{
    if !pose.is_finite() || !(range >= 0.0) {
        return None;
    }

    let resolution = grid.resolution();
    let half_cell = resolution * 0.5;
    let position = pose.position();
    let reach = range + resolution;
    let low = grid.clamp_cell(WorldPoint::new(position.x - reach, position.y - reach));
    let high = grid.clamp_cell(WorldPoint::new(position.x + reach, position.y + reach));

    let mut best: Option<ObstacleContact> = None;
    for y in low.y..=high.y {
        for x in low.x..=high.x {
            let coord = GridCoord::new(x, y);
            let Some(obstacle) = obstacle_at(grid, coord) else {
                continue;
            };

            let center = grid.cell_center(coord);
            let distance = (position.distance(&center) - half_cell).max(0.0);
            if distance > range {
                continue;
            }
            if best.is_some_and(|b| b.distance <= distance) {
                continue;
            }

            let bearing = normalize_angle(position.angle_to(&center) - pose.theta);
            if bearing.abs() > half_angle {
                continue;
            }

            best = Some(ObstacleContact {
                distance,
                bearing,
                cell: coord,
                obstacle,
            });
        }
    }
    best
}
