//! Immutable occupancy grid.

use std::fmt;

use crate::core::{GridCoord, WorldPoint};
use crate::error::{NavError, Result};

use super::cell::CellState;

/// A validated, immutable occupancy grid snapshot.
///
/// `origin` is the world position of the lower-left corner of cell (0, 0).
/// Cells are stored row-major with row 0 at the lowest `y`.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    origin: WorldPoint,
    resolution: f32,
    width: usize,
    height: usize,
    cells: Vec<CellState>,
}

impl OccupancyGrid {
    /// Build a grid from a row-major cell array.
    ///
    /// Fails with [`NavError::InvalidGrid`] when the dimensions do not match
    /// the array length, when either dimension is zero, or when the
    /// resolution or origin is not a positive finite number.
    pub fn new(
        origin: WorldPoint,
        resolution: f32,
        width: usize,
        height: usize,
        cells: Vec<CellState>,
    ) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(NavError::InvalidGrid(format!(
                "resolution must be positive and finite, got {}",
                resolution
            )));
        }
        if !origin.is_finite() {
            return Err(NavError::InvalidGrid(format!(
                "origin must be finite, got ({}, {})",
                origin.x, origin.y
            )));
        }
        if width == 0 || height == 0 {
            return Err(NavError::InvalidGrid(format!(
                "dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        if width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(NavError::InvalidGrid(format!(
                "dimensions {}x{} exceed the addressable range",
                width, height
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            NavError::InvalidGrid(format!("dimensions {}x{} overflow", width, height))
        })?;
        if cells.len() != expected {
            return Err(NavError::InvalidGrid(format!(
                "{}x{} grid needs {} cells, got {}",
                width,
                height,
                expected,
                cells.len()
            )));
        }

        Ok(Self {
            origin,
            resolution,
            width,
            height,
            cells,
        })
    }

    /// Build a grid with every cell in the same state.
    pub fn filled(
        origin: WorldPoint,
        resolution: f32,
        width: usize,
        height: usize,
        state: CellState,
    ) -> Result<Self> {
        let len = width.checked_mul(height).ok_or_else(|| {
            NavError::InvalidGrid(format!("dimensions {}x{} overflow", width, height))
        })?;
        Self::new(origin, resolution, width, height, vec![state; len])
    }

    /// Build a grid by evaluating `f` for every cell.
    pub fn from_fn<F>(
        origin: WorldPoint,
        resolution: f32,
        width: usize,
        height: usize,
        mut f: F,
    ) -> Result<Self>
    where
        F: FnMut(GridCoord) -> CellState,
    {
        let mut cells = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                cells.push(f(GridCoord::new(x as i32, y as i32)));
            }
        }
        Self::new(origin, resolution, width, height, cells)
    }

    /// Build a grid from ROS-style `i8` occupancy values.
    pub fn from_occupancy_values(
        origin: WorldPoint,
        resolution: f32,
        width: usize,
        height: usize,
        values: &[i8],
        occupied_threshold: i8,
    ) -> Result<Self> {
        let cells = values
            .iter()
            .map(|&v| CellState::from_occupancy(v, occupied_threshold))
            .collect();
        Self::new(origin, resolution, width, height, cells)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false for a constructed grid; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Row-major cell states.
    #[inline]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// World-frame upper-right corner of the grid.
    pub fn max_corner(&self) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + self.width as f32 * self.resolution,
            self.origin.y + self.height as f32 * self.resolution,
        )
    }

    #[inline]
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    /// Row-major cell index, or `None` outside the grid.
    #[inline]
    pub fn index(&self, coord: GridCoord) -> Option<usize> {
        if self.contains(coord) {
            Some(coord.y as usize * self.width + coord.x as usize)
        } else {
            None
        }
    }

    /// Inverse of [`index`](Self::index). The index must be below `len()`.
    #[inline]
    pub fn coord_of(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// State of a cell; cells outside the grid read as `Unknown`.
    #[inline]
    pub fn state(&self, coord: GridCoord) -> CellState {
        self.index(coord)
            .map(|i| self.cells[i])
            .unwrap_or(CellState::Unknown)
    }

    #[inline]
    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.index(coord)
            .is_some_and(|i| self.cells[i] == CellState::Occupied)
    }

    #[inline]
    pub fn is_free(&self, coord: GridCoord) -> bool {
        self.index(coord)
            .is_some_and(|i| self.cells[i] == CellState::Free)
    }

    /// True for in-bounds Unknown cells only; the area beyond the grid edge is
    /// not treated as unexplored.
    #[inline]
    pub fn is_unknown(&self, coord: GridCoord) -> bool {
        self.index(coord)
            .is_some_and(|i| self.cells[i] == CellState::Unknown)
    }

    /// Map a world point to the cell containing it.
    pub fn cell_at(&self, point: WorldPoint) -> Result<GridCoord> {
        let fx = ((point.x - self.origin.x) / self.resolution).floor();
        let fy = ((point.y - self.origin.y) / self.resolution).floor();
        let in_x = fx >= 0.0 && fx < self.width as f32;
        let in_y = fy >= 0.0 && fy < self.height as f32;
        if !(in_x && in_y) {
            return Err(NavError::OutOfBounds(format!(
                "point ({:.3}, {:.3}) lies outside the {}x{} grid",
                point.x, point.y, self.width, self.height
            )));
        }
        Ok(GridCoord::new(fx as i32, fy as i32))
    }

    /// Nearest in-bounds cell to a world point.
    pub fn clamp_cell(&self, point: WorldPoint) -> GridCoord {
        let fx = ((point.x - self.origin.x) / self.resolution).floor();
        let fy = ((point.y - self.origin.y) / self.resolution).floor();
        let x = if fx.is_nan() { 0.0 } else { fx };
        let y = if fy.is_nan() { 0.0 } else { fy };
        GridCoord::new(
            x.clamp(0.0, (self.width - 1) as f32) as i32,
            y.clamp(0.0, (self.height - 1) as f32) as i32,
        )
    }

    /// World coordinate of a cell center.
    pub fn world_at(&self, coord: GridCoord) -> Result<WorldPoint> {
        if !self.contains(coord) {
            return Err(NavError::OutOfBounds(format!(
                "cell ({}, {}) lies outside the {}x{} grid",
                coord.x, coord.y, self.width, self.height
            )));
        }
        Ok(self.cell_center(coord))
    }

    /// World coordinate of a cell center without bounds checking.
    #[inline]
    pub fn cell_center(&self, coord: GridCoord) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + (coord.x as f32 + 0.5) * self.resolution,
            self.origin.y + (coord.y as f32 + 0.5) * self.resolution,
        )
    }

    /// Count cells in the given state.
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&c| c == state).count()
    }

    /// True when the cell is Free and shares an edge with an Unknown cell.
    #[inline]
    pub fn is_frontier_edge(&self, coord: GridCoord) -> bool {
        self.is_free(coord) && coord.neighbors_4().iter().any(|&n| self.is_unknown(n))
    }
}

/// Renders the grid in the ASCII map format, highest row first.
impl fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.height).rev() {
            let row = &self.cells[y * self.width..(y + 1) * self.width];
            let line: String = row.iter().map(|c| c.as_char()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
