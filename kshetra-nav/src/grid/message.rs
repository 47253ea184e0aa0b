//! Map stream message.

use crate::core::WorldPoint;
use crate::error::Result;

use super::occupancy::OccupancyGrid;

/// A full map snapshot as published by a mapper: row-major `i8` occupancy
/// values (-1 unknown, 0..=100 occupancy probability), laid out like a ROS
/// `nav_msgs/OccupancyGrid`.
#[derive(Clone, Debug, PartialEq)]
pub struct MapMessage {
    pub origin: WorldPoint,
    pub resolution: f32,
    pub width: usize,
    pub height: usize,
    pub data: Vec<i8>,
}

impl MapMessage {
    /// Encode a grid (0 free, 100 occupied, -1 unknown).
    pub fn from_grid(grid: &OccupancyGrid) -> Self {
        Self {
            origin: grid.origin(),
            resolution: grid.resolution(),
            width: grid.width(),
            height: grid.height(),
            data: grid.cells().iter().map(|c| c.to_occupancy()).collect(),
        }
    }

    /// Validate and classify the message into an [`OccupancyGrid`].
    pub fn to_grid(&self, occupied_threshold: i8) -> Result<OccupancyGrid> {
        OccupancyGrid::from_occupancy_values(
            self.origin,
            self.resolution,
            self.width,
            self.height,
            &self.data,
            occupied_threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellState;

    #[test]
    fn test_message_classifies_with_threshold() {
        let msg = MapMessage {
            origin: WorldPoint::ZERO,
            resolution: 0.05,
            width: 4,
            height: 1,
            data: vec![-1, 2, 50, 100],
        };
        let grid = msg.to_grid(3).unwrap();
        assert_eq!(grid.cells(), &[
            CellState::Unknown,
            CellState::Free,
            CellState::Occupied,
            CellState::Occupied
        ]);
        assert_eq!(msg.to_grid(60).unwrap().count(CellState::Occupied), 1);
    }

    #[test]
    fn test_malformed_message_rejected() {
        let msg = MapMessage {
            origin: WorldPoint::ZERO,
            resolution: 0.05,
            width: 4,
            height: 2,
            data: vec![0; 5],
        };
        assert!(msg.to_grid(3).is_err());
    }
}
