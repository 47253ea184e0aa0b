//! Exploration goal selection.
//!
//! Ranks the frontiers of a map snapshot, asks the planner for a path to
//! candidate cells of each frontier in rank order, and blacklists targets the
//! planner rejects so the next-ranked frontier gets a turn. Blacklisted and
//! already-reached targets are skipped until their cooldown expires.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::{GridCoord, Pose2D, WorldPoint};
use crate::planning::{CancelToken, Path, PathPlanner, PlanError};
use crate::snapshot::MapSnapshot;

use super::frontier::{Frontier, FrontierAnalyzer};

/// Configuration for the explorer.
#[derive(Clone, Debug)]
pub struct ExplorerConfig {
    /// Whether to return to start position when exploration is complete
    pub return_to_start: bool,
    /// Cooldown before a blacklisted or reached target can be retried
    pub blacklist_cooldown: Duration,
    /// Candidates this close to a reached target are skipped (meters)
    pub visited_radius: f32,
    /// Member cells tried per frontier before moving to the next one
    pub targets_per_frontier: usize,
    /// Planner calls allowed per selection
    pub max_candidates: usize,
    /// How far to search for open space when the robot sits inside obstacle
    /// clearance (meters)
    pub escape_distance: f32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            return_to_start: false,
            blacklist_cooldown: Duration::from_secs(30),
            visited_radius: 0.30,
            targets_per_frontier: 3,
            max_candidates: 10,
            escape_distance: 0.5,
        }
    }
}

/// Outcome of one goal selection.
#[derive(Clone, Debug, PartialEq)]
pub enum GoalDecision {
    /// Drive to a frontier cell
    Navigate {
        path: Path,
        target: GridCoord,
        frontier_size: usize,
    },
    /// No frontiers left; drive back to the start pose
    ReturnHome { path: Path },
    /// No frontiers left and nothing else to do
    Complete,
    /// Frontiers exist but none could be planned to right now
    Unreachable { frontiers: usize },
    /// The robot sits inside obstacle clearance; drive out to open space
    /// before selecting a goal
    Escape { path: Path },
    /// The robot sits inside obstacle clearance with no way out in reach
    Stuck,
}

/// Frontier-based goal selection.
#[derive(Debug)]
pub struct Explorer {
    config: ExplorerConfig,
    analyzer: FrontierAnalyzer,
    planner: PathPlanner,
    /// Starting position
    start_pose: Option<Pose2D>,
    /// Target of the last Navigate decision
    current_target: Option<GridCoord>,
    /// Blacklisted targets with timestamp when blacklisted
    blacklist: HashMap<GridCoord, Instant>,
    /// Reached targets with timestamp when reached
    reached: HashMap<GridCoord, Instant>,
    returning_home: bool,
    home_reached: bool,
    /// The last decision was an Escape
    escaping: bool,
}

impl Explorer {
    pub fn new(config: ExplorerConfig, analyzer: FrontierAnalyzer, planner: PathPlanner) -> Self {
        Self {
            config,
            analyzer,
            planner,
            start_pose: None,
            current_target: None,
            blacklist: HashMap::new(),
            reached: HashMap::new(),
            returning_home: false,
            home_reached: false,
            escaping: false,
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &FrontierAnalyzer {
        &self.analyzer
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn start_pose(&self) -> Option<Pose2D> {
        self.start_pose
    }

    pub fn current_target(&self) -> Option<GridCoord> {
        self.current_target
    }

    /// Set the pose to return to; otherwise the first pose seen is used.
    pub fn set_start_pose(&mut self, pose: Pose2D) {
        self.start_pose = Some(pose);
    }

    /// Choose the next goal for `pose` on `snapshot`.
    ///
    /// Only [`PlanError::Cancelled`] is returned as an error; planner
    /// rejections are handled by falling back to other targets.
    pub fn select_goal(
        &mut self,
        snapshot: &MapSnapshot,
        pose: &Pose2D,
        now: Instant,
        cancel: &CancelToken,
    ) -> Result<GoalDecision, PlanError> {
        if self.start_pose.is_none() {
            tracing::info!("Exploration started at ({:.2}, {:.2})", pose.x, pose.y);
            self.start_pose = Some(*pose);
        }
        self.clean_blacklist(now);
        self.escaping = false;

        let frontiers = snapshot.frontiers(&self.analyzer, pose);
        if frontiers.is_empty() {
            self.current_target = None;
            return self.finish(snapshot, pose, cancel);
        }
        self.returning_home = false;
        self.home_reached = false;

        // Planner failures below must be the targets' fault, not the start's
        if let Some(decision) = self.escape_if_boxed_in(snapshot, pose) {
            return Ok(decision);
        }

        if let Some(decision) = self.keep_current_target(snapshot, &frontiers, pose, now, cancel)? {
            return Ok(decision);
        }

        let grid = snapshot.grid();
        let robot = pose.position();
        let mut attempts = 0usize;

        for frontier in &frontiers {
            let candidates: Vec<GridCoord> = frontier
                .cells_by_distance(grid, robot)
                .into_iter()
                .filter(|&c| !self.is_blacklisted(c, now) && !self.near_reached(snapshot, c))
                .take(self.config.targets_per_frontier)
                .collect();

            for target in candidates {
                if attempts >= self.config.max_candidates {
                    break;
                }
                attempts += 1;

                match self.plan_to(snapshot, pose, grid.cell_center(target), cancel) {
                    Ok(path) => {
                        tracing::info!(
                            "Selected frontier target ({}, {}): {} cells, {:.2}m away, path {:.2}m",
                            target.x,
                            target.y,
                            frontier.size(),
                            frontier.distance,
                            path.length()
                        );
                        self.current_target = Some(target);
                        return Ok(GoalDecision::Navigate {
                            path,
                            target,
                            frontier_size: frontier.size(),
                        });
                    }
                    Err(PlanError::Cancelled) => return Err(PlanError::Cancelled),
                    Err(e) => {
                        tracing::warn!(
                            "Frontier target ({}, {}) rejected: {}",
                            target.x,
                            target.y,
                            e
                        );
                        self.blacklist(target, now);
                    }
                }
            }
        }

        self.current_target = None;
        tracing::warn!(
            "No reachable frontier target among {} frontiers ({} candidates tried)",
            frontiers.len(),
            attempts
        );
        Ok(GoalDecision::Unreachable {
            frontiers: frontiers.len(),
        })
    }

    /// Keep driving to the previous target while it is still a frontier cell.
    fn keep_current_target(
        &mut self,
        snapshot: &MapSnapshot,
        frontiers: &[Frontier],
        pose: &Pose2D,
        now: Instant,
        cancel: &CancelToken,
    ) -> Result<Option<GoalDecision>, PlanError> {
        let Some(target) = self.current_target else {
            return Ok(None);
        };
        let Some(frontier) = frontiers.iter().find(|f| f.region.cells.contains(&target)) else {
            self.current_target = None;
            return Ok(None);
        };
        if self.is_blacklisted(target, now) {
            self.current_target = None;
            return Ok(None);
        }

        match self.plan_to(snapshot, pose, snapshot.grid().cell_center(target), cancel) {
            Ok(path) => {
                tracing::debug!("Replanned to current target ({}, {})", target.x, target.y);
                Ok(Some(GoalDecision::Navigate {
                    path,
                    target,
                    frontier_size: frontier.size(),
                }))
            }
            Err(PlanError::Cancelled) => Err(PlanError::Cancelled),
            Err(e) => {
                tracing::warn!(
                    "Current target ({}, {}) no longer reachable: {}",
                    target.x,
                    target.y,
                    e
                );
                self.blacklist(target, now);
                self.current_target = None;
                Ok(None)
            }
        }
    }

    /// No frontiers left: optionally drive home, then report completion.
    fn finish(
        &mut self,
        snapshot: &MapSnapshot,
        pose: &Pose2D,
        cancel: &CancelToken,
    ) -> Result<GoalDecision, PlanError> {
        let home = match self.start_pose {
            Some(start) if self.config.return_to_start && !self.home_reached => start.position(),
            _ => return Ok(GoalDecision::Complete),
        };

        if pose.position().distance(&home) <= self.config.visited_radius {
            self.home_reached = true;
            self.returning_home = false;
            tracing::info!("Exploration complete, robot is home");
            return Ok(GoalDecision::Complete);
        }

        if let Some(decision) = self.escape_if_boxed_in(snapshot, pose) {
            return Ok(decision);
        }

        match self.plan_to(snapshot, pose, home, cancel) {
            Ok(path) => {
                if !self.returning_home {
                    tracing::info!("Exploration complete, returning to start ({:.2}, {:.2})", home.x, home.y);
                }
                self.returning_home = true;
                Ok(GoalDecision::ReturnHome { path })
            }
            Err(PlanError::Cancelled) => Err(PlanError::Cancelled),
            Err(e) => {
                tracing::warn!("Cannot plan back to start: {}", e);
                self.home_reached = true;
                self.returning_home = false;
                Ok(GoalDecision::Complete)
            }
        }
    }

    /// When no path can start from `pose`, route out to the nearest
    /// traversable cell instead.
    fn escape_if_boxed_in(&mut self, snapshot: &MapSnapshot, pose: &Pose2D) -> Option<GoalDecision> {
        let cost_map = snapshot.cost_map();
        if self.planner.can_start_from(cost_map, pose.position()) {
            return None;
        }

        let radius = (self.config.escape_distance / cost_map.resolution()).ceil() as i32;
        match self.planner.escape(cost_map, pose.position(), radius) {
            Ok(path) => {
                if let Some(exit) = path.goal() {
                    tracing::warn!(
                        "Robot at ({:.2}, {:.2}) is inside obstacle clearance, escaping to ({:.2}, {:.2})",
                        pose.x,
                        pose.y,
                        exit.x,
                        exit.y
                    );
                }
                self.escaping = true;
                Some(GoalDecision::Escape { path })
            }
            Err(_) => {
                tracing::warn!(
                    "Robot at ({:.2}, {:.2}) is boxed in, no open space within {:.2}m",
                    pose.x,
                    pose.y,
                    self.config.escape_distance
                );
                Some(GoalDecision::Stuck)
            }
        }
    }

    fn plan_to(
        &self,
        snapshot: &MapSnapshot,
        pose: &Pose2D,
        goal: WorldPoint,
        cancel: &CancelToken,
    ) -> Result<Path, PlanError> {
        self.planner
            .plan_on(snapshot.cost_map(), pose.position(), goal, cancel)
    }

    /// Record that the controller reached the current goal.
    pub fn mark_reached(&mut self, now: Instant) {
        if self.escaping {
            tracing::debug!("Left obstacle clearance");
            self.escaping = false;
            return;
        }
        if self.returning_home {
            tracing::info!("Returned to start");
            self.returning_home = false;
            self.home_reached = true;
        }
        if let Some(target) = self.current_target.take() {
            tracing::debug!("Reached frontier target ({}, {})", target.x, target.y);
            self.reached.insert(target, now);
        }
    }

    /// Forget the current target (goal abandoned).
    pub fn abandon(&mut self) {
        self.current_target = None;
        self.returning_home = false;
        self.escaping = false;
    }

    /// Blacklist a target until the cooldown expires.
    pub fn blacklist(&mut self, target: GridCoord, now: Instant) {
        tracing::info!("Blacklisting frontier target ({}, {})", target.x, target.y);
        self.blacklist.insert(target, now);
    }

    /// Check if a target is blacklisted (and cooldown hasn't expired).
    pub fn is_blacklisted(&self, target: GridCoord, now: Instant) -> bool {
        self.blacklist
            .get(&target)
            .is_some_and(|&at| now.saturating_duration_since(at) < self.config.blacklist_cooldown)
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    fn near_reached(&self, snapshot: &MapSnapshot, cell: GridCoord) -> bool {
        let grid = snapshot.grid();
        let point = grid.cell_center(cell);
        self.reached
            .keys()
            .any(|&r| grid.cell_center(r).distance(&point) <= self.config.visited_radius)
    }

    /// Clean up expired blacklist and reached entries.
    fn clean_blacklist(&mut self, now: Instant) {
        let cooldown = self.config.blacklist_cooldown;
        self.blacklist
            .retain(|_, at| now.saturating_duration_since(*at) < cooldown);
        self.reached
            .retain(|_, at| now.saturating_duration_since(*at) < cooldown);
    }
}
