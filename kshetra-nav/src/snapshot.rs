//! Grid model: the current map snapshot and the views derived from it.
//!
//! A [`MapSnapshot`] bundles one occupancy grid with its obstacle extraction,
//! frontier regions and cost map. Snapshots are immutable and shared as
//! `Arc`; [`GridModel::load`] builds the next one outside the lock and swaps
//! the pointer, so readers always see a complete old or complete new map.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::control::{scan_cone, ObstacleContact, ObstacleField};
use crate::core::{GridCoord, Pose2D, WorldPoint};
use crate::error::{NavError, Result};
use crate::exploration::{Frontier, FrontierAnalyzer, FrontierRegion};
use crate::grid::OccupancyGrid;
use crate::obstacles::{Extraction, Obstacle, ObstacleExtractor};
use crate::planning::{CostMap, CostParams};

/// One map and everything computed from it.
#[derive(Debug)]
pub struct MapSnapshot {
    generation: u64,
    received_at: Instant,
    grid: OccupancyGrid,
    extraction: Extraction,
    frontier_regions: Vec<FrontierRegion>,
    cost_map: CostMap,
}

impl MapSnapshot {
    /// Run extraction, frontier detection and cost map construction for `grid`.
    pub fn build(
        generation: u64,
        received_at: Instant,
        grid: OccupancyGrid,
        extractor: &ObstacleExtractor,
        analyzer: &FrontierAnalyzer,
        cost: &CostParams,
    ) -> Self {
        let extraction = extractor.extract_report(&grid);
        let frontier_regions = analyzer.detect_regions(&grid);
        let cost_map = CostMap::build(&grid, &extraction.obstacles, cost);
        Self {
            generation,
            received_at,
            grid,
            extraction,
            frontier_regions,
            cost_map,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Time since the grid was received.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// All obstacles, discrete and structure.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.extraction.obstacles
    }

    /// Discrete obstacles only, for reporting.
    pub fn discrete_obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.extraction.obstacles.iter().filter(|o| o.is_discrete())
    }

    pub fn extraction(&self) -> &Extraction {
        &self.extraction
    }

    /// Obstacle owning `coord`, if any.
    pub fn obstacle_at(&self, coord: GridCoord) -> Option<&Obstacle> {
        let index = self.grid.index(coord)?;
        self.extraction
            .label(index)
            .and_then(|id| self.extraction.obstacles.get(id))
    }

    /// Unranked frontier regions; empty means nothing is left to explore.
    pub fn frontier_regions(&self) -> &[FrontierRegion] {
        &self.frontier_regions
    }

    /// Frontier regions ranked for `pose`.
    pub fn frontiers(&self, analyzer: &FrontierAnalyzer, pose: &Pose2D) -> Vec<Frontier> {
        analyzer.rank(&self.grid, &self.frontier_regions, pose)
    }

    pub fn cost_map(&self) -> &CostMap {
        &self.cost_map
    }
}

/// Obstacle cells (including structures) are what the controller avoids;
/// occupied noise cells are ignored.
impl ObstacleField for MapSnapshot {
    fn nearest_in_cone(&self, pose: &Pose2D, range: f32, half_angle: f32) -> Option<ObstacleContact> {
        scan_cone(&self.grid, pose, range, half_angle, |grid, coord| {
            grid.index(coord)
                .and_then(|i| self.extraction.label(i))
                .map(Some)
        })
    }
}

/// Owner of the current map snapshot.
#[derive(Debug)]
pub struct GridModel {
    extractor: ObstacleExtractor,
    analyzer: FrontierAnalyzer,
    cost: CostParams,
    current: RwLock<Option<Arc<MapSnapshot>>>,
    next_generation: AtomicU64,
}

impl GridModel {
    pub fn new(extractor: ObstacleExtractor, analyzer: FrontierAnalyzer, cost: CostParams) -> Self {
        Self {
            extractor,
            analyzer,
            cost,
            current: RwLock::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Replace the current grid, received now.
    pub fn load(&self, grid: OccupancyGrid) -> Arc<MapSnapshot> {
        self.load_at(grid, Instant::now())
    }

    /// Replace the current grid. The snapshot is built before the swap, and
    /// a slower build never replaces a newer generation.
    pub fn load_at(&self, grid: OccupancyGrid, received_at: Instant) -> Arc<MapSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(MapSnapshot::build(
            generation,
            received_at,
            grid,
            &self.extractor,
            &self.analyzer,
            &self.cost,
        ));

        let mut current = self.current.write();
        let newer = current
            .as_ref()
            .map_or(true, |c| c.generation() < generation);
        if newer {
            *current = Some(Arc::clone(&snapshot));
        } else {
            tracing::debug!("Discarding map generation {} (older than current)", generation);
        }
        drop(current);

        tracing::debug!(
            "Loaded map generation {}: {}x{}, {} obstacles, {} frontier regions",
            generation,
            snapshot.grid().width(),
            snapshot.grid().height(),
            snapshot.obstacles().len(),
            snapshot.frontier_regions().len()
        );
        snapshot
    }

    /// Current snapshot, if a map has been loaded.
    pub fn snapshot(&self) -> Option<Arc<MapSnapshot>> {
        self.current.read().clone()
    }

    /// Generation of the current snapshot (0 before the first load).
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |s| s.generation())
    }

    fn require(&self) -> Result<Arc<MapSnapshot>> {
        self.snapshot().ok_or(NavError::NoMap)
    }

    pub fn cell_at(&self, point: WorldPoint) -> Result<GridCoord> {
        self.require()?.grid().cell_at(point)
    }

    pub fn world_at(&self, coord: GridCoord) -> Result<WorldPoint> {
        self.require()?.grid().world_at(coord)
    }

    pub fn clamp_cell(&self, point: WorldPoint) -> Result<GridCoord> {
        Ok(self.require()?.grid().clamp_cell(point))
    }

    pub fn is_occupied(&self, coord: GridCoord) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|s| s.grid().is_occupied(coord))
    }

    pub fn is_free(&self, coord: GridCoord) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|s| s.grid().is_free(coord))
    }

    pub fn is_unknown(&self, coord: GridCoord) -> bool {
        self.current
            .read()
            .as_ref()
            .is_some_and(|s| s.grid().is_unknown(coord))
    }

    pub fn extractor(&self) -> &ObstacleExtractor {
        &self.extractor
    }

    pub fn analyzer(&self) -> &FrontierAnalyzer {
        &self.analyzer
    }

    pub fn cost_params(&self) -> &CostParams {
        &self.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellState;

    fn model() -> GridModel {
        GridModel::new(
            ObstacleExtractor::default(),
            FrontierAnalyzer::default(),
            CostParams::default(),
        )
    }

    fn room(unknown_column: bool) -> OccupancyGrid {
        OccupancyGrid::from_fn(WorldPoint::ZERO, 0.1, 10, 10, |c| {
            if c.x == 0 || c.y == 0 || c.y == 9 {
                CellState::Occupied
            } else if c.x == 9 {
                if unknown_column {
                    CellState::Unknown
                } else {
                    CellState::Occupied
                }
            } else {
                CellState::Free
            }
        })
        .unwrap()
    }

    #[test]
    fn test_empty_model() {
        let model = model();
        assert!(model.snapshot().is_none());
        assert_eq!(model.generation(), 0);
        assert!(matches!(
            model.cell_at(WorldPoint::new(0.5, 0.5)),
            Err(NavError::NoMap)
        ));
        assert!(!model.is_free(GridCoord::new(1, 1)));
    }

    #[test]
    fn test_load_swaps_snapshot() {
        let model = model();
        let first = model.load(room(true));
        assert_eq!(first.generation(), 1);
        assert!(!first.frontier_regions().is_empty());
        assert!(model.is_free(GridCoord::new(5, 5)));
        assert!(model.is_unknown(GridCoord::new(9, 5)));

        let held = model.snapshot().unwrap();
        let second = model.load(room(false));
        assert_eq!(second.generation(), 2);
        assert_eq!(model.generation(), 2);
        assert!(model.snapshot().unwrap().frontier_regions().is_empty());
        // A reader holding the old snapshot still sees all of it.
        assert_eq!(held.generation(), 1);
        assert!(held.grid().is_unknown(GridCoord::new(9, 5)));
        assert!(!held.frontier_regions().is_empty());
    }

    #[test]
    fn test_coordinate_transforms() {
        let model = model();
        model.load(room(true));
        assert_eq!(
            model.cell_at(WorldPoint::new(0.55, 0.25)).unwrap(),
            GridCoord::new(5, 2)
        );
        assert!(matches!(
            model.cell_at(WorldPoint::new(-0.5, 0.25)),
            Err(NavError::OutOfBounds(_))
        ));
        assert!(matches!(
            model.world_at(GridCoord::new(10, 0)),
            Err(NavError::OutOfBounds(_))
        ));
        assert_eq!(
            model.clamp_cell(WorldPoint::new(-0.5, 0.25)).unwrap(),
            GridCoord::new(0, 2)
        );
    }

    #[test]
    fn test_obstacle_lookup_and_avoidance_field() {
        let model = model();
        let snapshot = model.load(room(true));
        assert_eq!(snapshot.obstacles().len(), 1);
        assert!(snapshot.obstacle_at(GridCoord::new(0, 5)).is_some());
        assert!(snapshot.obstacle_at(GridCoord::new(5, 5)).is_none());

        let pose = Pose2D::new(0.25, 0.55, std::f32::consts::PI);
        let contact = snapshot.nearest_in_cone(&pose, 0.3, 0.5).unwrap();
        assert_eq!(contact.cell, GridCoord::new(0, 5));
        assert_eq!(contact.obstacle, Some(0));
    }

    #[test]
    fn test_snapshot_age() {
        let model = model();
        let received = Instant::now();
        let snapshot = model.load_at(room(true), received);
        assert_eq!(
            snapshot.age(received + Duration::from_millis(250)),
            Duration::from_millis(250)
        );
    }
}
