//! Frontier detection for autonomous exploration.
//!
//! A frontier-edge cell is a Free cell sharing an edge with an Unknown cell.
//! Edge cells are grouped into 4-connected regions; regions are computed once
//! per map snapshot and ranked against the robot pose on demand.

use std::sync::Arc;

use crate::core::{GridCoord, Pose2D, WorldPoint};
use crate::grid::OccupancyGrid;

use super::policy::{FrontierPolicy, FrontierRanking};

/// Configuration for frontier detection.
#[derive(Clone, Debug)]
pub struct FrontierConfig {
    /// Regions with fewer cells are ignored
    pub min_size: usize,
    /// Keep at most this many ranked frontiers
    pub max_frontiers: Option<usize>,
    /// Ranking policy
    pub policy: FrontierPolicy,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_frontiers: None,
            policy: FrontierPolicy::Nearest,
        }
    }
}

/// A connected group of frontier-edge cells, independent of the robot pose.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierRegion {
    /// Member cells, sorted row-major
    pub cells: Vec<GridCoord>,
    /// Mean of member cell centers
    pub centroid: WorldPoint,
    /// Member cell closest to the centroid
    pub centroid_cell: GridCoord,
}

impl FrontierRegion {
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

/// A frontier region ranked against a robot pose.
#[derive(Clone, Debug, PartialEq)]
pub struct Frontier {
    pub region: FrontierRegion,
    /// Member cell closest to the robot
    pub nearest_cell: GridCoord,
    /// World center of `nearest_cell`
    pub nearest_point: WorldPoint,
    /// Euclidean distance from the robot to `nearest_point` (meters)
    pub distance: f32,
    /// Policy-specific score (higher is better)
    pub score: f32,
}

impl Frontier {
    #[inline]
    pub fn size(&self) -> usize {
        self.region.size()
    }

    #[inline]
    pub fn centroid(&self) -> WorldPoint {
        self.region.centroid
    }

    /// Deterministic tie-break key: centroid cell, row then column.
    #[inline]
    pub fn tie_key(&self) -> (i32, i32) {
        self.region.centroid_cell.row_major_key()
    }

    /// Member cells ordered by distance from `from`, closest first.
    pub fn cells_by_distance(&self, grid: &OccupancyGrid, from: WorldPoint) -> Vec<GridCoord> {
        let mut cells = self.region.cells.clone();
        cells.sort_by(|a, b| {
            let da = grid.cell_center(*a).distance_squared(&from);
            let db = grid.cell_center(*b).distance_squared(&from);
            da.total_cmp(&db)
                .then_with(|| a.row_major_key().cmp(&b.row_major_key()))
        });
        cells
    }
}

/// Frontier detector and ranker.
#[derive(Clone, Debug)]
pub struct FrontierAnalyzer {
    config: FrontierConfig,
    ranking: Arc<dyn FrontierRanking>,
}

impl Default for FrontierAnalyzer {
    fn default() -> Self {
        Self::new(FrontierConfig::default())
    }
}

impl FrontierAnalyzer {
    /// Create an analyzer ranking with `config.policy`.
    pub fn new(config: FrontierConfig) -> Self {
        let ranking: Arc<dyn FrontierRanking> = Arc::new(config.policy);
        Self { config, ranking }
    }

    /// Replace the ranking policy with a custom one.
    pub fn with_ranking(mut self, ranking: Arc<dyn FrontierRanking>) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    /// Detect and rank frontiers. Empty means exploration is complete.
    pub fn find_frontiers(&self, grid: &OccupancyGrid, pose: &Pose2D) -> Vec<Frontier> {
        let regions = self.detect_regions(grid);
        self.rank(grid, &regions, pose)
    }

    /// Group frontier-edge cells into 4-connected regions, in row-major
    /// order of their first cell.
    pub fn detect_regions(&self, grid: &OccupancyGrid) -> Vec<FrontierRegion> {
        let len = grid.len();
        let mut is_edge = vec![false; len];
        let mut edge_count = 0usize;
        for (index, edge) in is_edge.iter_mut().enumerate() {
            if grid.is_frontier_edge(grid.coord_of(index)) {
                *edge = true;
                edge_count += 1;
            }
        }
        if edge_count == 0 {
            return Vec::new();
        }

        let mut visited = vec![false; len];
        let mut stack: Vec<usize> = Vec::new();
        let mut regions = Vec::new();

        for start in 0..len {
            if !is_edge[start] || visited[start] {
                continue;
            }

            let mut cells = Vec::new();
            visited[start] = true;
            stack.push(start);
            while let Some(index) = stack.pop() {
                let coord = grid.coord_of(index);
                cells.push(coord);
                for neighbor in coord.neighbors_4() {
                    if let Some(n) = grid.index(neighbor) {
                        if is_edge[n] && !visited[n] {
                            visited[n] = true;
                            stack.push(n);
                        }
                    }
                }
            }

            if cells.len() < self.config.min_size {
                continue;
            }
            cells.sort_unstable_by_key(|c| c.row_major_key());
            regions.push(Self::build_region(cells, grid));
        }

        tracing::debug!(
            "Detected {} frontier regions from {} edge cells",
            regions.len(),
            edge_count
        );
        regions
    }

    /// Rank precomputed regions against the robot pose, best first.
    pub fn rank(
        &self,
        grid: &OccupancyGrid,
        regions: &[FrontierRegion],
        pose: &Pose2D,
    ) -> Vec<Frontier> {
        let robot = pose.position();
        let mut frontiers: Vec<Frontier> = regions
            .iter()
            .map(|region| {
                let (nearest_cell, nearest_point, distance_sq) = region
                    .cells
                    .iter()
                    .map(|&c| {
                        let p = grid.cell_center(c);
                        (c, p, p.distance_squared(&robot))
                    })
                    .fold(None, |best: Option<(GridCoord, WorldPoint, f32)>, cand| match best {
                        Some(b) if b.2 <= cand.2 => Some(b),
                        _ => Some(cand),
                    })
                    .unwrap_or((region.centroid_cell, region.centroid, f32::MAX));
                Frontier {
                    region: region.clone(),
                    nearest_cell,
                    nearest_point,
                    distance: distance_sq.sqrt(),
                    score: 0.0,
                }
            })
            .collect();

        self.ranking.rank(&mut frontiers);
        if let Some(max) = self.config.max_frontiers {
            frontiers.truncate(max);
        }
        frontiers
    }

    fn build_region(cells: Vec<GridCoord>, grid: &OccupancyGrid) -> FrontierRegion {
        let n = cells.len() as f64;
        let (sx, sy) = cells.iter().fold((0.0f64, 0.0f64), |(sx, sy), &c| {
            let p = grid.cell_center(c);
            (sx + p.x as f64, sy + p.y as f64)
        });
        let centroid = WorldPoint::new((sx / n) as f32, (sy / n) as f32);

        // Cells are row-major, so the first minimum wins ties.
        let centroid_cell = cells
            .iter()
            .copied()
            .fold(None, |best: Option<(GridCoord, f32)>, c| {
                let d = grid.cell_center(c).distance_squared(&centroid);
                match best {
                    Some(b) if b.1 <= d => Some(b),
                    _ => Some((c, d)),
                }
            })
            .map(|(c, _)| c)
            .unwrap_or_default();

        FrontierRegion {
            cells,
            centroid,
            centroid_cell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellState;
    use std::collections::HashSet;

    /// Free interior with a one-cell Unknown border.
    fn bordered_grid(width: usize, height: usize) -> OccupancyGrid {
        OccupancyGrid::from_fn(WorldPoint::ZERO, 0.1, width, height, |c| {
            let border = c.x == 0
                || c.y == 0
                || c.x == width as i32 - 1
                || c.y == height as i32 - 1;
            if border {
                CellState::Unknown
            } else {
                CellState::Free
            }
        })
        .unwrap()
    }

    /// A 2-cell opening on the left wall near the robot and a fully unknown
    /// right column far away.
    fn two_pocket_grid() -> OccupancyGrid {
        OccupancyGrid::from_fn(WorldPoint::ZERO, 0.1, 20, 10, |c| match (c.x, c.y) {
            (0, 4) | (0, 5) => CellState::Unknown,
            (0, _) => CellState::Occupied,
            (19, _) => CellState::Unknown,
            _ => CellState::Free,
        })
        .unwrap()
    }

    #[test]
    fn test_border_frontier_is_inner_ring() {
        let grid = bordered_grid(8, 6);
        let analyzer = FrontierAnalyzer::default();
        let frontiers = analyzer.find_frontiers(&grid, &Pose2D::new(0.4, 0.3, 0.0));

        // The inner ring is 4-connected, so it forms one region.
        assert_eq!(frontiers.len(), 1);
        let cells: HashSet<GridCoord> = frontiers[0].region.cells.iter().copied().collect();
        let mut expected = HashSet::new();
        for y in 1..5 {
            for x in 1..7 {
                if x == 1 || x == 6 || y == 1 || y == 4 {
                    expected.insert(GridCoord::new(x, y));
                }
            }
        }
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_no_frontiers_fully_explored() {
        let grid =
            OccupancyGrid::filled(WorldPoint::ZERO, 0.05, 20, 20, CellState::Free).unwrap();
        let analyzer = FrontierAnalyzer::default();
        assert!(analyzer
            .find_frontiers(&grid, &Pose2D::new(0.5, 0.5, 0.0))
            .is_empty());
    }

    #[test]
    fn test_diagonal_edges_are_separate_regions() {
        // Two edge cells touching only at a corner.
        let grid = OccupancyGrid::from_fn(WorldPoint::ZERO, 0.1, 2, 2, |c| match (c.x, c.y) {
            (0, 0) | (1, 1) => CellState::Free,
            _ => CellState::Unknown,
        })
        .unwrap();
        let regions = FrontierAnalyzer::default().detect_regions(&grid);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_policies_order() {
        let grid = two_pocket_grid();
        let pose = Pose2D::new(0.25, 0.45, 0.0);

        let nearest = FrontierAnalyzer::default().find_frontiers(&grid, &pose);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].size(), 2);
        assert_eq!(nearest[1].size(), 10);
        assert!(nearest[0].distance <= nearest[1].distance);

        let largest = FrontierAnalyzer::new(FrontierConfig {
            policy: FrontierPolicy::Largest,
            ..Default::default()
        })
        .find_frontiers(&grid, &pose);
        assert!(largest[0].size() > largest[1].size());

        let weighted = FrontierAnalyzer::new(FrontierConfig {
            policy: FrontierPolicy::Weighted {
                size_weight: 2.0,
                distance_weight: 0.5,
            },
            ..Default::default()
        })
        .find_frontiers(&grid, &pose);
        assert!(weighted[0].score >= weighted[1].score);
        assert_eq!(weighted[0].size(), largest[0].size());
    }

    #[test]
    fn test_min_size_and_max_frontiers() {
        let grid = two_pocket_grid();
        let pose = Pose2D::new(0.25, 0.45, 0.0);

        let analyzer = FrontierAnalyzer::new(FrontierConfig {
            min_size: 5,
            ..Default::default()
        });
        let frontiers = analyzer.find_frontiers(&grid, &pose);
        assert_eq!(frontiers.len(), 1);
        assert!(frontiers[0].size() >= 5);

        let analyzer = FrontierAnalyzer::new(FrontierConfig {
            max_frontiers: Some(1),
            ..Default::default()
        });
        assert_eq!(analyzer.find_frontiers(&grid, &pose).len(), 1);
    }

    #[test]
    fn test_deterministic_tie_break() {
        // Two single-cell pockets equidistant from the robot.
        let grid = OccupancyGrid::from_fn(WorldPoint::ZERO, 1.0, 5, 5, |c| {
            if (c.x, c.y) == (0, 2) || (c.x, c.y) == (4, 2) {
                CellState::Unknown
            } else {
                CellState::Free
            }
        })
        .unwrap();
        let pose = Pose2D::new(2.5, 2.5, 0.0);
        let analyzer = FrontierAnalyzer::default();
        let first = analyzer.find_frontiers(&grid, &pose);
        let second = analyzer.find_frontiers(&grid, &pose);
        assert_eq!(first, second);
        assert!(first[0].tie_key() < first[1].tie_key());
    }
}
