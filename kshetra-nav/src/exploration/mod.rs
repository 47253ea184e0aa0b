//! Autonomous exploration module.
//!
//! This module provides frontier-based exploration capabilities:
//! - Frontier detection and clustering
//! - Swappable frontier ranking policies
//! - Goal selection with fallback and blacklisting

mod explorer;
mod frontier;
mod policy;

pub use explorer::{Explorer, ExplorerConfig, GoalDecision};
pub use frontier::{Frontier, FrontierAnalyzer, FrontierConfig, FrontierRegion};
pub use policy::{FrontierPolicy, FrontierRanking};
