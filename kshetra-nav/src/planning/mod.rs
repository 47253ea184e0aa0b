//! Path planning module for autonomous navigation.
//!
//! This module provides:
//! - Cost map with exact obstacle inflation and a clearance penalty field
//! - A* grid planner with cooperative cancellation
//! - Planned paths with waypoint compression

mod astar;
mod cancel;
mod cost_map;
mod path;

pub use astar::{PathPlanner, PlanError, PlannerConfig};
pub use cancel::CancelToken;
pub use cost_map::{CostMap, CostParams, costs};
pub use path::{Path, PathCompression};
