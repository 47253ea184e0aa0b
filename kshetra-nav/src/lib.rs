//! KshetraNav - frontier exploration and obstacle-aware navigation over 2-D
//! occupancy grids.
//!
//! ## Pipeline
//!
//! - [`grid`]: immutable occupancy snapshots and coordinate transforms
//! - [`obstacles`]: occupied cells clustered into obstacles with shape summaries
//! - [`exploration`]: frontier detection, ranking and goal selection
//! - [`planning`]: cost map and A* with cancellation
//! - [`control`]: waypoint following with an obstacle-avoidance override
//!
//! [`snapshot::GridModel`] ties the map-derived views into one atomically
//! swapped [`snapshot::MapSnapshot`]; [`threads::Navigator`] runs the whole
//! stack on mapping, planning and control threads.

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod exploration;
pub mod grid;
pub mod harness;
pub mod obstacles;
pub mod planning;
pub mod shared;
pub mod snapshot;
pub mod threads;

pub use config::NavConfig;
pub use core::{GridCoord, Pose2D, PoseSample, VelocityCommand, WorldPoint};
pub use error::{NavError, Result};
pub use grid::{CellState, MapMessage, OccupancyGrid};
pub use snapshot::{GridModel, MapSnapshot};
pub use threads::{CommandSink, FnSink, Navigator, NavigatorHandle};
