//! Planned paths and waypoint compression.

use serde::{Deserialize, Serialize};

use crate::core::{GridCoord, WorldPoint};

use super::cost_map::CostMap;

/// How the raw cell sequence is reduced to waypoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCompression {
    /// One waypoint per cell
    None,
    /// Keep only cells where the step direction changes
    #[default]
    Collinear,
    /// Skip intermediate cells while a straight traversable line exists
    LineOfSight,
}

/// Result of path planning.
///
/// `cells` is the full 8- (or 4-) connected chain from start to goal.
/// `waypoints` are the cell centers left after compression; the first and
/// last always match the first and last cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    cells: Vec<GridCoord>,
    waypoints: Vec<WorldPoint>,
    cost: f32,
}

impl Path {
    pub(crate) fn new(cells: Vec<GridCoord>, waypoints: Vec<WorldPoint>, cost: f32) -> Self {
        Self {
            cells,
            waypoints,
            cost,
        }
    }

    pub fn cells(&self) -> &[GridCoord] {
        &self.cells
    }

    pub fn waypoints(&self) -> &[WorldPoint] {
        &self.waypoints
    }

    /// Accumulated search cost in meters (step length scaled by the
    /// clearance penalty).
    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn start(&self) -> Option<WorldPoint> {
        self.waypoints.first().copied()
    }

    pub fn goal(&self) -> Option<WorldPoint> {
        self.waypoints.last().copied()
    }

    /// Polyline length through the waypoints (meters).
    pub fn length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Reduce `cells` to the subset that becomes waypoints.
pub(crate) fn compress(cells: &[GridCoord], mode: PathCompression, cost_map: &CostMap) -> Vec<GridCoord> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }
    match mode {
        PathCompression::None => cells.to_vec(),
        PathCompression::Collinear => compress_collinear(cells),
        PathCompression::LineOfSight => compress_line_of_sight(cells, cost_map),
    }
}

fn compress_collinear(cells: &[GridCoord]) -> Vec<GridCoord> {
    let mut kept = vec![cells[0]];
    for i in 1..cells.len() - 1 {
        let incoming = cells[i] - cells[i - 1];
        let outgoing = cells[i + 1] - cells[i];
        if incoming != outgoing {
            kept.push(cells[i]);
        }
    }
    kept.push(cells[cells.len() - 1]);
    kept
}

fn compress_line_of_sight(cells: &[GridCoord], cost_map: &CostMap) -> Vec<GridCoord> {
    let mut kept = vec![cells[0]];
    let mut anchor = 0;
    while anchor < cells.len() - 1 {
        let mut next = anchor + 1;
        for candidate in (anchor + 2..cells.len()).rev() {
            if cost_map.line_of_sight(cells[anchor], cells[candidate]) {
                next = candidate;
                break;
            }
        }
        kept.push(cells[next]);
        anchor = next;
    }
    kept
}
