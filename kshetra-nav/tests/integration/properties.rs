//! Properties of the navigation core over fixed and random grids.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use kshetra_nav::control::{ControllerConfig, MotionController, MotionState, TickInput};
use kshetra_nav::core::{GridCoord, Pose2D, PoseSample, VelocityCommand, WorldPoint};
use kshetra_nav::exploration::FrontierAnalyzer;
use kshetra_nav::obstacles::{ExtractorConfig, ObstacleExtractor};
use kshetra_nav::planning::{CostParams, PathPlanner, PlanError, PlannerConfig};
use kshetra_nav::{CellState, OccupancyGrid};

const RES: f32 = 0.1;

fn planner(inflation_radius: f32) -> PathPlanner {
    PathPlanner::new(
        PlannerConfig::default(),
        CostParams {
            inflation_radius,
            ..CostParams::default()
        },
    )
}

fn center(grid: &OccupancyGrid, c: GridCoord) -> WorldPoint {
    grid.cell_center(c)
}

fn state_from(code: u8) -> CellState {
    match code {
        0 => CellState::Free,
        1 => CellState::Occupied,
        _ => CellState::Unknown,
    }
}

/// Random grid up to 10x10 with all three states.
fn grid_strategy() -> impl Strategy<Value = OccupancyGrid> {
    (1usize..=10, 1usize..=10)
        .prop_flat_map(|(w, h)| (Just(w), Just(h), prop::collection::vec(0u8..3, w * h)))
        .prop_map(|(w, h, codes)| {
            let cells = codes.into_iter().map(state_from).collect();
            OccupancyGrid::new(WorldPoint::ZERO, RES, w, h, cells).unwrap()
        })
}

/// 12x12 known grid, mostly free.
fn floor_strategy() -> impl Strategy<Value = OccupancyGrid> {
    prop::collection::vec(prop::bool::weighted(0.15), 144).prop_map(|occupied| {
        let cells = occupied
            .into_iter()
            .map(|o| if o { CellState::Occupied } else { CellState::Free })
            .collect();
        OccupancyGrid::new(WorldPoint::ZERO, RES, 12, 12, cells).unwrap()
    })
}

proptest! {
    #[test]
    fn prop_extraction_partitions_occupied_cells(grid in grid_strategy(), min_cells in 1usize..4) {
        let extractor = ObstacleExtractor::new(ExtractorConfig {
            min_cells,
            ..ExtractorConfig::default()
        });
        let extraction = extractor.extract_report(&grid);

        let mut seen = HashSet::new();
        for cell in extraction
            .obstacles
            .iter()
            .flat_map(|o| o.cells.iter())
            .chain(extraction.noise.iter().flatten())
        {
            prop_assert!(grid.is_occupied(*cell));
            prop_assert!(seen.insert(*cell), "cell {:?} assigned twice", cell);
        }
        prop_assert_eq!(seen.len(), grid.count(CellState::Occupied));
        for obstacle in &extraction.obstacles {
            prop_assert!(obstacle.size() >= min_cells);
        }
    }

    #[test]
    fn prop_frontiers_empty_iff_no_free_cell_touches_unknown(grid in grid_strategy()) {
        let analyzer = FrontierAnalyzer::default();
        let frontiers = analyzer.find_frontiers(&grid, &Pose2D::default());

        let touching = (0..grid.len()).map(|i| grid.coord_of(i)).any(|c| {
            grid.is_free(c) && c.neighbors_4().iter().any(|&n| grid.is_unknown(n))
        });
        prop_assert_eq!(frontiers.is_empty(), !touching);
    }

    #[test]
    fn prop_extraction_and_frontiers_idempotent(grid in grid_strategy()) {
        let extractor = ObstacleExtractor::default();
        let analyzer = FrontierAnalyzer::default();
        let pose = Pose2D::new(0.3, 0.3, 0.0);

        prop_assert_eq!(extractor.extract(&grid), extractor.extract(&grid));
        prop_assert_eq!(
            analyzer.find_frontiers(&grid, &pose),
            analyzer.find_frontiers(&grid, &pose)
        );
    }

    #[test]
    fn prop_plan_stays_on_traversable_cells(
        grid in floor_strategy(),
        start in 0usize..144,
        goal in 0usize..144,
    ) {
        let start = grid.coord_of(start);
        let goal = grid.coord_of(goal);
        let obstacles = ObstacleExtractor::default().extract(&grid);
        let planner = planner(0.1);
        let cost_map = planner.cost_map(&grid, &obstacles);

        match planner.plan(&grid, &obstacles, center(&grid, start), center(&grid, goal)) {
            Ok(path) => {
                let cells = path.cells();
                prop_assert!(!cells.is_empty());
                prop_assert!(cells.iter().all(|&c| cost_map.is_traversable(c)));
                prop_assert!(cells[0].chebyshev_distance(&start) <= 1);
                prop_assert!(cells[cells.len() - 1].chebyshev_distance(&goal) <= 1);
                for pair in cells.windows(2) {
                    prop_assert_eq!(pair[0].chebyshev_distance(&pair[1]), 1);
                }
                prop_assert!(path.waypoints().len() <= cells.len());
            }
            Err(PlanError::InvalidGoal) => prop_assert!(grid.is_occupied(goal)),
            Err(PlanError::NoPath) => {}
            Err(e) => prop_assert!(false, "unexpected error {:?}", e),
        }
    }

    #[test]
    fn prop_inflation_never_shortens_paths(
        grid in floor_strategy(),
        start in 0usize..144,
        goal in 0usize..144,
    ) {
        let start = grid.coord_of(start);
        let goal = grid.coord_of(goal);
        let obstacles = ObstacleExtractor::default().extract(&grid);
        let inflated = planner(0.1);
        let inflated_map = inflated.cost_map(&grid, &obstacles);
        prop_assume!(inflated_map.is_traversable(start) && inflated_map.is_traversable(goal));

        let a = center(&grid, start);
        let b = center(&grid, goal);
        if let Ok(inflated_path) = inflated.plan(&grid, &obstacles, a, b) {
            let bare_path = planner(0.0).plan(&grid, &obstacles, a, b);
            prop_assert!(bare_path.is_ok());
            let bare_cost = bare_path.map(|p| p.cost()).unwrap_or(f32::MAX);
            prop_assert!(bare_cost <= inflated_path.cost() + 1e-4);
        }
    }
}

#[test]
fn test_block_forces_detour_outside_inflation() {
    let grid = OccupancyGrid::from_fn(WorldPoint::ZERO, RES, 10, 10, |c| {
        if (4..=5).contains(&c.x) && (4..=5).contains(&c.y) {
            CellState::Occupied
        } else {
            CellState::Free
        }
    })
    .unwrap();
    let obstacles = ObstacleExtractor::default().extract(&grid);
    assert_eq!(obstacles.len(), 1);

    let planner = planner(0.1);
    let path = planner
        .plan(&grid, &obstacles, WorldPoint::new(0.05, 0.05), WorldPoint::new(0.95, 0.95))
        .unwrap();

    let straight = 9.0 * std::f32::consts::SQRT_2 * RES;
    assert!(path.cost() > straight + 1e-3, "no detour: {}", path.cost());

    let block = &obstacles[0].cells;
    for cell in path.cells() {
        let clear = block.iter().all(|b| {
            let (dx, dy) = (cell.x - b.x, cell.y - b.y);
            dx * dx + dy * dy > 1
        });
        assert!(clear, "path cell {:?} inside inflated block", cell);
    }
}

#[test]
fn test_wall_gives_no_path() {
    let grid = OccupancyGrid::from_fn(WorldPoint::ZERO, RES, 10, 10, |c| {
        if c.x == 5 {
            CellState::Occupied
        } else {
            CellState::Free
        }
    })
    .unwrap();
    let obstacles = ObstacleExtractor::default().extract(&grid);
    let result = planner(0.0).plan(
        &grid,
        &obstacles,
        WorldPoint::new(0.15, 0.55),
        WorldPoint::new(0.85, 0.55),
    );
    assert_eq!(result, Err(PlanError::NoPath));
}

#[test]
fn test_unknown_border_frontier_is_inner_ring() {
    let (w, h) = (8, 6);
    let grid = OccupancyGrid::from_fn(WorldPoint::ZERO, RES, w, h, |c| {
        if c.x == 0 || c.y == 0 || c.x == w as i32 - 1 || c.y == h as i32 - 1 {
            CellState::Unknown
        } else {
            CellState::Free
        }
    })
    .unwrap();

    let frontiers = FrontierAnalyzer::default().find_frontiers(&grid, &Pose2D::new(0.4, 0.3, 0.0));
    assert_eq!(frontiers.len(), 1);

    let found: HashSet<GridCoord> = frontiers[0].region.cells.iter().copied().collect();
    let expected: HashSet<GridCoord> = (0..grid.len())
        .map(|i| grid.coord_of(i))
        .filter(|c| grid.is_free(*c))
        .filter(|c| c.x == 1 || c.y == 1 || c.x == w as i32 - 2 || c.y == h as i32 - 2)
        .collect();
    assert_eq!(found, expected);
}

#[test]
fn test_controller_zero_when_idle_or_stale() {
    let grid = OccupancyGrid::filled(WorldPoint::ZERO, RES, 20, 5, CellState::Free).unwrap();
    let path = Arc::new(
        planner(0.0)
            .plan(&grid, &[], WorldPoint::new(0.05, 0.25), WorldPoint::new(1.85, 0.25))
            .unwrap(),
    );
    let config = ControllerConfig::default();
    let timeout = config.pose_timeout;
    let t0 = Instant::now();
    let fresh = |at: Instant| Some(PoseSample::new(Pose2D::new(0.05, 0.25, 0.0), at));
    let input = |now: Instant, pose: Option<PoseSample>| TickInput {
        now,
        pose,
        obstacles: None,
        grid_received_at: None,
    };

    // Idle
    let mut controller = MotionController::new(config.clone());
    let out = controller.tick(input(t0, fresh(t0)));
    assert_eq!(out.command, VelocityCommand::ZERO);
    assert_eq!(out.state, MotionState::Idle);

    // Following, then the pose goes stale
    controller.set_path(Arc::clone(&path));
    let out = controller.tick(input(t0, fresh(t0)));
    assert_eq!(out.state, MotionState::Following);
    assert!(!out.command.is_zero());

    let late = t0 + timeout + Duration::from_millis(1);
    let out = controller.tick(input(late, fresh(t0)));
    assert_eq!(out.command, VelocityCommand::ZERO);
    assert_eq!(out.state, MotionState::Idle);

    // No pose at all
    let mut controller = MotionController::new(config);
    controller.set_path(path);
    let out = controller.tick(input(t0, None));
    assert_eq!(out.command, VelocityCommand::ZERO);
    assert_eq!(out.state, MotionState::Idle);
}
