//! Connected-component extraction over Occupied cells.
//!
//! Components are grown with an explicit work-list stack (8-connectivity) and
//! a visited array indexed by cell index, so extraction depth does not depend
//! on the call stack. Obstacles are numbered in row-major order of their first
//! cell and member cells are kept sorted the same way, which makes the output
//! independent of the traversal order.

use serde::Serialize;
use std::f32::consts::SQRT_2;

use crate::core::{GridCoord, WorldPoint};
use crate::grid::{CellState, OccupancyGrid};

use super::shape::{estimate_shape, ShapeEstimate};

/// Label value for cells that belong to no obstacle.
const NO_LABEL: u32 = u32::MAX;

/// Configuration for obstacle extraction.
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Components with fewer cells are discarded as noise
    pub min_cells: usize,
    /// Components whose bounding-box diagonal exceeds this (meters) are
    /// tagged as structure (walls, borders)
    pub max_extent: Option<f32>,
    /// Fit a circle/rectangle shape to each discrete obstacle
    pub estimate_shape: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_cells: 2,
            max_extent: None,
            estimate_shape: true,
        }
    }
}

/// Whether a component is a discrete obstacle or a large structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ObstacleKind {
    Discrete,
    Structure,
}

/// A connected component of Occupied cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    /// Index within the extraction that produced it
    pub id: usize,
    pub kind: ObstacleKind,
    /// Member cells, sorted row-major
    pub cells: Vec<GridCoord>,
    /// Lowest column/row of the bounding box
    pub min_cell: GridCoord,
    /// Highest column/row of the bounding box
    pub max_cell: GridCoord,
    /// World-frame bounding box (cell edges)
    pub min_corner: WorldPoint,
    pub max_corner: WorldPoint,
    /// Mean of member cell centers
    pub centroid: WorldPoint,
    /// Largest centroid-to-cell-center distance plus half a cell diagonal
    pub radius: f32,
    pub shape: Option<ShapeEstimate>,
}

impl Obstacle {
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Membership test (binary search over the row-major cell list).
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.cells
            .binary_search_by_key(&coord.row_major_key(), |c| c.row_major_key())
            .is_ok()
    }

    /// Diagonal of the world-frame bounding box.
    pub fn extent(&self) -> f32 {
        self.min_corner.distance(&self.max_corner)
    }

    #[inline]
    pub fn is_discrete(&self) -> bool {
        self.kind == ObstacleKind::Discrete
    }
}

/// Result of extracting one grid.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
    /// Every component with at least `min_cells` cells
    pub obstacles: Vec<Obstacle>,
    /// Components discarded as noise, each sorted row-major
    pub noise: Vec<Vec<GridCoord>>,
    /// Obstacle id per cell index
    labels: Vec<u32>,
}

impl Extraction {
    /// Obstacle id owning the cell at `index`, if any.
    #[inline]
    pub fn label(&self, index: usize) -> Option<usize> {
        match self.labels.get(index) {
            Some(&l) if l != NO_LABEL => Some(l as usize),
            _ => None,
        }
    }
}

/// Extracts obstacles from occupancy grids.
#[derive(Clone, Debug, Default)]
pub struct ObstacleExtractor {
    config: ExtractorConfig,
}

impl ObstacleExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Obstacles of `grid` (discrete and structure), in row-major order of
    /// their first cell.
    pub fn extract(&self, grid: &OccupancyGrid) -> Vec<Obstacle> {
        self.extract_report(grid).obstacles
    }

    /// Full extraction: obstacles, noise components and the label array.
    pub fn extract_report(&self, grid: &OccupancyGrid) -> Extraction {
        let cells = grid.cells();
        let mut visited = vec![false; cells.len()];
        let mut labels = vec![NO_LABEL; cells.len()];
        let mut obstacles = Vec::new();
        let mut noise = Vec::new();
        let mut stack: Vec<usize> = Vec::new();

        for start in 0..cells.len() {
            if visited[start] || cells[start] != CellState::Occupied {
                continue;
            }

            let mut component = Vec::new();
            visited[start] = true;
            stack.push(start);

            while let Some(index) = stack.pop() {
                let coord = grid.coord_of(index);
                component.push(coord);
                for neighbor in coord.neighbors_8() {
                    if let Some(n) = grid.index(neighbor) {
                        if !visited[n] && cells[n] == CellState::Occupied {
                            visited[n] = true;
                            stack.push(n);
                        }
                    }
                }
            }

            component.sort_unstable_by_key(|c| c.row_major_key());

            if component.len() < self.config.min_cells.max(1) {
                noise.push(component);
                continue;
            }

            let id = obstacles.len();
            for &coord in &component {
                if let Some(index) = grid.index(coord) {
                    labels[index] = id as u32;
                }
            }
            obstacles.push(self.build_obstacle(id, component, grid));
        }

        tracing::debug!(
            "Extracted {} obstacles ({} noise components) from {}x{} grid",
            obstacles.len(),
            noise.len(),
            grid.width(),
            grid.height()
        );

        Extraction {
            obstacles,
            noise,
            labels,
        }
    }

    fn build_obstacle(&self, id: usize, cells: Vec<GridCoord>, grid: &OccupancyGrid) -> Obstacle {
        let resolution = grid.resolution();
        let origin = grid.origin();

        let mut min_cell = GridCoord::new(i32::MAX, i32::MAX);
        let mut max_cell = GridCoord::new(i32::MIN, i32::MIN);
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        let centers: Vec<WorldPoint> = cells
            .iter()
            .map(|&c| {
                min_cell = GridCoord::new(min_cell.x.min(c.x), min_cell.y.min(c.y));
                max_cell = GridCoord::new(max_cell.x.max(c.x), max_cell.y.max(c.y));
                let p = grid.cell_center(c);
                sum_x += p.x as f64;
                sum_y += p.y as f64;
                p
            })
            .collect();

        let n = cells.len() as f64;
        let centroid = WorldPoint::new((sum_x / n) as f32, (sum_y / n) as f32);
        let max_center_distance = centers
            .iter()
            .map(|p| p.distance(&centroid))
            .fold(0.0f32, f32::max);
        let radius = max_center_distance + resolution * SQRT_2 * 0.5;

        let min_corner = WorldPoint::new(
            origin.x + min_cell.x as f32 * resolution,
            origin.y + min_cell.y as f32 * resolution,
        );
        let max_corner = WorldPoint::new(
            origin.x + (max_cell.x + 1) as f32 * resolution,
            origin.y + (max_cell.y + 1) as f32 * resolution,
        );

        let kind = match self.config.max_extent {
            Some(limit) if min_corner.distance(&max_corner) > limit => ObstacleKind::Structure,
            _ => ObstacleKind::Discrete,
        };

        let shape = if self.config.estimate_shape && kind == ObstacleKind::Discrete {
            estimate_shape(&centers, resolution)
        } else {
            None
        };

        Obstacle {
            id,
            kind,
            cells,
            min_cell,
            max_cell,
            min_corner,
            max_corner,
            centroid,
            radius,
            shape,
        }
    }
}
