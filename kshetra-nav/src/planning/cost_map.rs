//! Cost map with obstacle inflation and a clearance penalty field.
//!
//! Built once per map snapshot:
//! 1. Base layer: Occupied is lethal, Unknown is blocked, Free is free.
//! 2. Inflation: every Free cell whose center lies within the inflation radius
//!    of an obstacle cell center is blocked (exact disk stamp).
//! 3. Clearance: a brushfire distance field from obstacle cells, turned into
//!    a soft penalty between the inflation radius and `clearance_distance`.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::{GridCoord, WorldPoint};
use crate::grid::{CellState, OccupancyGrid};
use crate::obstacles::Obstacle;

/// Cost thresholds for path planning
pub mod costs {
    /// Safe to traverse, no penalty
    pub const FREE: u8 = 0;
    /// Highest penalty a traversable cell can carry
    pub const NEAR_OBSTACLE: u8 = 50;
    /// Within the inflation radius of an obstacle
    pub const INFLATED: u8 = 253;
    /// Not yet observed
    pub const UNKNOWN: u8 = 254;
    /// Occupied or outside the grid
    pub const LETHAL: u8 = 255;
}

/// Geometry parameters for building a [`CostMap`].
#[derive(Clone, Debug, PartialEq)]
pub struct CostParams {
    /// Free cells within this distance of an obstacle cell are blocked (meters)
    pub inflation_radius: f32,
    /// Traversable cells closer than this to an obstacle are penalized (meters)
    pub clearance_distance: f32,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            inflation_radius: 0.20,
            clearance_distance: 0.50,
        }
    }
}

/// Cost map for path planning.
#[derive(Clone, Debug)]
pub struct CostMap {
    width: usize,
    height: usize,
    /// Resolution in meters per cell
    resolution: f32,
    /// Grid origin in world coordinates
    origin: WorldPoint,
    /// Cost values, see [`costs`]
    costs: Vec<u8>,
    /// Distance to nearest obstacle cell (in cells)
    distance_field: Vec<f32>,
    params: CostParams,
}

impl CostMap {
    /// Build the cost map for `grid`, inflating the cells of `obstacles`.
    pub fn build(grid: &OccupancyGrid, obstacles: &[Obstacle], params: &CostParams) -> Self {
        let width = grid.width();
        let height = grid.height();
        let resolution = grid.resolution();

        let mut costs: Vec<u8> = grid
            .cells()
            .iter()
            .map(|c| match c {
                CellState::Free => costs::FREE,
                CellState::Unknown => costs::UNKNOWN,
                CellState::Occupied => costs::LETHAL,
            })
            .collect();

        let mut distance_field = vec![f32::MAX; width * height];
        let mut queue = VecDeque::new();
        for coord in obstacles.iter().flat_map(|o| o.cells.iter()) {
            if let Some(index) = grid.index(*coord) {
                distance_field[index] = 0.0;
                queue.push_back(*coord);
            }
        }

        let stamp = Self::inflation_offsets(params.inflation_radius / resolution);
        if stamp.len() > 1 {
            for coord in obstacles.iter().flat_map(|o| o.cells.iter()) {
                for offset in &stamp {
                    if let Some(index) = grid.index(*coord + *offset) {
                        if costs[index] == costs::FREE {
                            costs[index] = costs::INFLATED;
                        }
                    }
                }
            }
        }

        Self::compute_distance_field_brushfire(&mut distance_field, width, height, &mut queue);

        let mut cost_map = Self {
            width,
            height,
            resolution,
            origin: grid.origin(),
            costs,
            distance_field,
            params: params.clone(),
        };
        cost_map.apply_clearance_layer();

        tracing::debug!(
            "Cost map built: {}x{}, inflation {:.2}m ({} offsets), {} obstacles",
            width,
            height,
            params.inflation_radius,
            stamp.len(),
            obstacles.len()
        );
        cost_map
    }

    /// All cell offsets whose center lies within `radius_cells` of the origin cell center.
    fn inflation_offsets(radius_cells: f32) -> Vec<GridCoord> {
        if !(radius_cells > 0.0) {
            return vec![GridCoord::new(0, 0)];
        }
        let reach = radius_cells.floor() as i32 + 1;
        let limit = radius_cells * radius_cells + 1e-4;
        let mut offsets = Vec::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy) as f32 <= limit {
                    offsets.push(GridCoord::new(dx, dy));
                }
            }
        }
        offsets
    }

    /// Compute distance field using Brushfire (BFS) algorithm.
    fn compute_distance_field_brushfire(
        distance_field: &mut [f32],
        width: usize,
        height: usize,
        queue: &mut VecDeque<GridCoord>,
    ) {
        let sqrt2 = std::f32::consts::SQRT_2;

        // 8-connected neighbors with distances
        let neighbors = [
            (-1, 0, 1.0),
            (1, 0, 1.0),
            (0, -1, 1.0),
            (0, 1, 1.0),
            (-1, -1, sqrt2),
            (1, -1, sqrt2),
            (-1, 1, sqrt2),
            (1, 1, sqrt2),
        ];

        while let Some(cell) = queue.pop_front() {
            let current_dist = distance_field[cell.y as usize * width + cell.x as usize];

            for &(dx, dy, step) in &neighbors {
                let nx = cell.x + dx;
                let ny = cell.y + dy;
                if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                    continue;
                }

                let neighbor_idx = ny as usize * width + nx as usize;
                let new_dist = current_dist + step;
                if new_dist < distance_field[neighbor_idx] {
                    distance_field[neighbor_idx] = new_dist;
                    queue.push_back(GridCoord::new(nx, ny));
                }
            }
        }
    }

    /// Write the clearance penalty into traversable cells as 1..=NEAR_OBSTACLE.
    fn apply_clearance_layer(&mut self) {
        for index in 0..self.costs.len() {
            if self.costs[index] != costs::FREE {
                continue;
            }
            let penalty = self.penalty_at(index);
            if penalty > 0.0 {
                self.costs[index] = ((costs::NEAR_OBSTACLE as f32 * penalty).round() as u8).max(1);
            }
        }
    }

    fn penalty_at(&self, index: usize) -> f32 {
        let inflation = self.params.inflation_radius;
        let clearance = self.params.clearance_distance;
        if clearance <= inflation {
            return 0.0;
        }
        let d = self.distance_field[index] * self.resolution;
        if d >= clearance {
            0.0
        } else if d <= inflation {
            1.0
        } else {
            1.0 - (d - inflation) / (clearance - inflation)
        }
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> Option<usize> {
        if coord.x < 0 || coord.y < 0 {
            return None;
        }
        let (x, y) = (coord.x as usize, coord.y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Get cost at grid coordinate (lethal outside the grid).
    #[inline]
    pub fn cost(&self, coord: GridCoord) -> u8 {
        self.index(coord)
            .map(|i| self.costs[i])
            .unwrap_or(costs::LETHAL)
    }

    /// A cell is traversable when it is Free and outside every inflation disk.
    #[inline]
    pub fn is_traversable(&self, coord: GridCoord) -> bool {
        self.cost(coord) <= costs::NEAR_OBSTACLE
    }

    /// Clearance penalty in [0, 1] (1 at the inflation boundary, 0 beyond
    /// `clearance_distance`). Zero outside the grid.
    #[inline]
    pub fn penalty(&self, coord: GridCoord) -> f32 {
        self.index(coord).map(|i| self.penalty_at(i)).unwrap_or(0.0)
    }

    /// Approximate distance to the nearest obstacle cell (meters); zero
    /// outside the grid, `f32::MAX` when the map has no obstacles.
    #[inline]
    pub fn obstacle_distance(&self, coord: GridCoord) -> f32 {
        match self.index(coord) {
            Some(i) if self.distance_field[i] == f32::MAX => f32::MAX,
            Some(i) => self.distance_field[i] * self.resolution,
            None => 0.0,
        }
    }

    /// Find the closest traversable cell to a target using BFS.
    ///
    /// Returns `None` if no traversable cell is found within `max_radius`
    /// cells (Chebyshev distance).
    pub fn find_closest_traversable(&self, target: GridCoord, max_radius: i32) -> Option<GridCoord> {
        if self.is_traversable(target) {
            return Some(target);
        }
        if target.chebyshev_distance(&self.clamp(target)) > max_radius {
            return None;
        }

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        queue.push_back(target);
        visited.insert(target);

        while let Some(current) = queue.pop_front() {
            if current.chebyshev_distance(&target) > max_radius {
                continue;
            }
            if self.is_traversable(current) {
                return Some(current);
            }
            for neighbor in current.neighbors_8() {
                if self.index(neighbor).is_some() && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    /// Check if line-of-sight is clear between two grid coordinates.
    ///
    /// Uses Bresenham's line algorithm to check all cells along the line.
    /// Diagonal steps also need both orthogonal side cells traversable, the
    /// same no-corner-cutting rule the A* search applies.
    pub fn line_of_sight(&self, from: GridCoord, to: GridCoord) -> bool {
        let mut x0 = from.x;
        let mut y0 = from.y;
        let x1 = to.x;
        let y1 = to.y;

        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            if !self.is_traversable(GridCoord::new(x0, y0)) {
                return false;
            }

            if x0 == x1 && y0 == y1 {
                break;
            }

            let e2 = 2 * err;
            let step_x = e2 > -dy;
            let step_y = e2 < dx;
            // A diagonal step may not squeeze between two blocked sides
            if step_x
                && step_y
                && (!self.is_traversable(GridCoord::new(x0 + sx, y0))
                    || !self.is_traversable(GridCoord::new(x0, y0 + sy)))
            {
                return false;
            }
            if step_x {
                err -= dy;
                x0 += sx;
            }
            if step_y {
                err += dx;
                y0 += sy;
            }
        }

        true
    }

    /// Convert world coordinates to grid coordinates (may be out of bounds).
    #[inline]
    pub fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        let x = ((point.x - self.origin.x) / self.resolution).floor() as i32;
        let y = ((point.y - self.origin.y) / self.resolution).floor() as i32;
        GridCoord::new(x, y)
    }

    /// Nearest in-grid coordinate.
    #[inline]
    pub fn clamp(&self, coord: GridCoord) -> GridCoord {
        GridCoord::new(
            coord.x.clamp(0, self.width as i32 - 1),
            coord.y.clamp(0, self.height as i32 - 1),
        )
    }

    /// Shortest 4-connected route from `start` out to the nearest traversable
    /// cell, crossing only inflated cells. Occupied and Unknown cells are
    /// never entered; `start` itself may be any in-grid cell. Returns the
    /// cell chain including both ends, or `None` when nothing traversable is
    /// reachable within `max_radius` cells (Chebyshev).
    pub fn escape_route(&self, start: GridCoord, max_radius: i32) -> Option<Vec<GridCoord>> {
        self.index(start)?;
        if self.is_traversable(start) {
            return Some(vec![start]);
        }

        let mut parent: HashMap<GridCoord, GridCoord> = HashMap::new();
        let mut queue = VecDeque::new();
        parent.insert(start, start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for neighbor in current.neighbors_4() {
                if neighbor.chebyshev_distance(&start) > max_radius
                    || parent.contains_key(&neighbor)
                {
                    continue;
                }
                let cost = self.cost(neighbor);
                if cost == costs::LETHAL || cost == costs::UNKNOWN {
                    continue;
                }
                parent.insert(neighbor, current);
                if self.is_traversable(neighbor) {
                    let mut route = vec![neighbor];
                    let mut cell = current;
                    while cell != start {
                        route.push(cell);
                        cell = *parent.get(&cell)?;
                    }
                    route.push(start);
                    route.reverse();
                    return Some(route);
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// Convert grid coordinates to world coordinates (cell center).
    #[inline]
    pub fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + (coord.x as f32 + 0.5) * self.resolution,
            self.origin.y + (coord.y as f32 + 0.5) * self.resolution,
        )
    }

    #[inline]
    pub fn contains(&self, coord: GridCoord) -> bool {
        self.index(coord).is_some()
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn params(&self) -> &CostParams {
        &self.params
    }
}
