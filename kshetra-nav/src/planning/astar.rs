//! A* path planner over the inflated cost map.
//!
//! Grid search with a tag array and parent-index array sized to the map, and
//! a `BinaryHeap` open list keyed by cell index. Equal `f` values are broken
//! by the smaller heuristic, then by the smaller cell index, so results do
//! not depend on heap internals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::SQRT_2;

use thiserror::Error;

use crate::core::{GridCoord, WorldPoint};
use crate::grid::OccupancyGrid;
use crate::obstacles::Obstacle;

use super::cancel::CancelToken;
use super::cost_map::{CostMap, CostParams, costs};
use super::path::{Path, PathCompression, compress};

/// Why planning produced no path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("goal lies on an occupied cell or outside the grid")]
    InvalidGoal,

    #[error("no traversable route between start and goal")]
    NoPath,

    #[error("planning cancelled")]
    Cancelled,

    #[error("search gave up after {0} expansions")]
    SearchExhausted(usize),
}

/// Configuration for the A* planner.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// 8-connected search with octile heuristic; 4-connected Manhattan otherwise
    pub allow_diagonal: bool,
    /// Maximum node expansions before giving up
    pub max_iterations: usize,
    /// Weight for the clearance penalty in step cost
    pub clearance_weight: f32,
    /// Waypoint reduction applied to the cell chain
    pub compression: PathCompression,
    /// Blocked start / inflated goal snap to a traversable cell this close (cells)
    pub snap_radius: i32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allow_diagonal: true,
            max_iterations: 200_000,
            clearance_weight: 0.0,
            compression: PathCompression::Collinear,
            snap_radius: 1,
        }
    }
}

/// Cancellation is polled once per this many expansions.
const CANCEL_POLL_INTERVAL: usize = 256;

const NO_PARENT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Unvisited,
    Open,
    Closed,
}

/// Open list entry.
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    f: f32,
    h: f32,
    g: f32,
    index: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f, then h, then index first)
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* path planner.
#[derive(Clone, Debug, Default)]
pub struct PathPlanner {
    config: PlannerConfig,
    cost: CostParams,
}

impl PathPlanner {
    pub fn new(config: PlannerConfig, cost: CostParams) -> Self {
        Self { config, cost }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn cost_params(&self) -> &CostParams {
        &self.cost
    }

    /// Cost map for `grid` with this planner's inflation settings.
    pub fn cost_map(&self, grid: &OccupancyGrid, obstacles: &[Obstacle]) -> CostMap {
        CostMap::build(grid, obstacles, &self.cost)
    }

    /// Plan a path from `start` to `goal` (world coordinates).
    pub fn plan(
        &self,
        grid: &OccupancyGrid,
        obstacles: &[Obstacle],
        start: WorldPoint,
        goal: WorldPoint,
    ) -> Result<Path, PlanError> {
        self.plan_with_cancel(grid, obstacles, start, goal, &CancelToken::new())
    }

    /// [`plan`](Self::plan) that gives up with [`PlanError::Cancelled`] once
    /// `cancel` is set.
    pub fn plan_with_cancel(
        &self,
        grid: &OccupancyGrid,
        obstacles: &[Obstacle],
        start: WorldPoint,
        goal: WorldPoint,
        cancel: &CancelToken,
    ) -> Result<Path, PlanError> {
        let cost_map = self.cost_map(grid, obstacles);
        self.plan_on(&cost_map, start, goal, cancel)
    }

    /// Plan over a prebuilt cost map.
    pub fn plan_on(
        &self,
        cost_map: &CostMap,
        start: WorldPoint,
        goal: WorldPoint,
        cancel: &CancelToken,
    ) -> Result<Path, PlanError> {
        if !goal.is_finite() {
            return Err(PlanError::InvalidGoal);
        }
        let goal_cell = cost_map.world_to_grid(goal);
        if !cost_map.contains(goal_cell) || cost_map.cost(goal_cell) == costs::LETHAL {
            return Err(PlanError::InvalidGoal);
        }
        let actual_start = self.snap_start(cost_map, start).ok_or(PlanError::NoPath)?;
        let actual_goal = cost_map
            .find_closest_traversable(goal_cell, self.config.snap_radius)
            .ok_or_else(|| {
                tracing::debug!(
                    "Goal ({}, {}) has no traversable cell nearby",
                    goal_cell.x,
                    goal_cell.y
                );
                PlanError::NoPath
            })?;

        let (cells, cost_cells, expansions) = self.search(cost_map, actual_start, actual_goal, cancel)?;

        let kept = compress(&cells, self.config.compression, cost_map);
        let waypoints: Vec<WorldPoint> = kept.iter().map(|&c| cost_map.grid_to_world(c)).collect();
        let cost = cost_cells * cost_map.resolution();

        tracing::debug!(
            "A* path: {} cells, {} waypoints, cost {:.2}m, {} expansions",
            cells.len(),
            waypoints.len(),
            cost,
            expansions
        );

        Ok(Path::new(cells, waypoints, cost))
    }

    /// Whether [`plan_on`](Self::plan_on) can begin at `start`: the start
    /// cell, or one within `snap_radius`, is traversable.
    pub fn can_start_from(&self, cost_map: &CostMap, start: WorldPoint) -> bool {
        self.snap_start(cost_map, start).is_some()
    }

    fn snap_start(&self, cost_map: &CostMap, start: WorldPoint) -> Option<GridCoord> {
        if !start.is_finite() {
            return None;
        }
        let start_cell = cost_map.world_to_grid(start);
        if start_cell.chebyshev_distance(&cost_map.clamp(start_cell)) > self.config.snap_radius {
            tracing::debug!("Start ({:.2}, {:.2}) lies outside the grid", start.x, start.y);
            return None;
        }
        let snapped = cost_map.find_closest_traversable(start_cell, self.config.snap_radius);
        if snapped.is_none() {
            tracing::debug!(
                "Start ({}, {}) has no traversable cell nearby",
                start_cell.x,
                start_cell.y
            );
        }
        snapped
    }

    /// Route from a start deep inside obstacle clearance out to the nearest
    /// traversable cell, through inflated cells only, within `max_radius`
    /// cells.
    pub fn escape(&self, cost_map: &CostMap, start: WorldPoint, max_radius: i32) -> Result<Path, PlanError> {
        if !start.is_finite() {
            return Err(PlanError::NoPath);
        }
        let cells = cost_map
            .escape_route(cost_map.world_to_grid(start), max_radius)
            .ok_or(PlanError::NoPath)?;
        let kept = compress(&cells, self.config.compression, cost_map);
        let waypoints: Vec<WorldPoint> = kept.iter().map(|&c| cost_map.grid_to_world(c)).collect();
        let cost = (cells.len() - 1) as f32 * cost_map.resolution();
        Ok(Path::new(cells, waypoints, cost))
    }

    /// Core search. Returns the cell chain, its cost in cells and the
    /// number of expansions.
    fn search(
        &self,
        cost_map: &CostMap,
        start: GridCoord,
        goal: GridCoord,
        cancel: &CancelToken,
    ) -> Result<(Vec<GridCoord>, f32, usize), PlanError> {
        let width = cost_map.width();
        let len = width * cost_map.height();
        let index_of = |c: GridCoord| c.y as usize * width + c.x as usize;
        let coord_of = |i: usize| GridCoord::new((i % width) as i32, (i / width) as i32);

        let mut tags = vec![Tag::Unvisited; len];
        let mut g_score = vec![f32::INFINITY; len];
        let mut parent = vec![NO_PARENT; len];
        let mut open = BinaryHeap::new();

        let start_index = index_of(start);
        let goal_index = index_of(goal);
        let h = self.heuristic(start, goal);
        g_score[start_index] = 0.0;
        tags[start_index] = Tag::Open;
        open.push(OpenEntry {
            f: h,
            h,
            g: 0.0,
            index: start_index,
        });

        let mut expansions = 0usize;

        while let Some(entry) = open.pop() {
            // Skip stale entries
            if tags[entry.index] == Tag::Closed || entry.g > g_score[entry.index] {
                continue;
            }
            tags[entry.index] = Tag::Closed;

            if entry.index == goal_index {
                let cells = Self::reconstruct_path(&parent, goal_index, coord_of);
                return Ok((cells, entry.g, expansions));
            }

            if expansions % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                tracing::debug!("A* cancelled after {} expansions", expansions);
                return Err(PlanError::Cancelled);
            }
            if expansions >= self.config.max_iterations {
                tracing::warn!("A* hit max iterations ({})", self.config.max_iterations);
                return Err(PlanError::SearchExhausted(expansions));
            }
            expansions += 1;

            let current = coord_of(entry.index);
            for (neighbor, step) in self.successors(cost_map, current) {
                let neighbor_index = index_of(neighbor);
                if tags[neighbor_index] == Tag::Closed {
                    continue;
                }

                let weight = 1.0 + self.config.clearance_weight * cost_map.penalty(neighbor);
                let tentative_g = entry.g + step * weight;
                if tentative_g < g_score[neighbor_index] {
                    g_score[neighbor_index] = tentative_g;
                    parent[neighbor_index] = entry.index as u32;
                    tags[neighbor_index] = Tag::Open;
                    let h = self.heuristic(neighbor, goal);
                    open.push(OpenEntry {
                        f: tentative_g + h,
                        h,
                        g: tentative_g,
                        index: neighbor_index,
                    });
                }
            }
        }

        Err(PlanError::NoPath)
    }

    /// Traversable neighbors with their base step length (cells).
    fn successors(&self, cost_map: &CostMap, current: GridCoord) -> Vec<(GridCoord, f32)> {
        let mut out = Vec::with_capacity(8);
        for neighbor in current.neighbors_4() {
            if cost_map.is_traversable(neighbor) {
                out.push((neighbor, 1.0));
            }
        }

        if self.config.allow_diagonal {
            for (dx, dy) in [(1, 1), (-1, 1), (-1, -1), (1, -1)] {
                let diagonal = GridCoord::new(current.x + dx, current.y + dy);
                // No corner cutting
                let side_x = GridCoord::new(current.x + dx, current.y);
                let side_y = GridCoord::new(current.x, current.y + dy);
                if cost_map.is_traversable(diagonal)
                    && cost_map.is_traversable(side_x)
                    && cost_map.is_traversable(side_y)
                {
                    out.push((diagonal, SQRT_2));
                }
            }
        }

        out
    }

    /// Octile distance when diagonals are allowed, Manhattan otherwise.
    #[inline]
    fn heuristic(&self, from: GridCoord, to: GridCoord) -> f32 {
        let dx = (to.x - from.x).abs() as f32;
        let dy = (to.y - from.y).abs() as f32;
        if self.config.allow_diagonal {
            dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
        } else {
            dx + dy
        }
    }

    /// Reconstruct path from the parent-index array.
    fn reconstruct_path(
        parent: &[u32],
        goal: usize,
        coord_of: impl Fn(usize) -> GridCoord,
    ) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut current = goal;

        loop {
            path.push(coord_of(current));
            match parent[current] {
                NO_PARENT => break,
                p => current = p as usize,
            }
        }

        path.reverse();
        path
    }
}
