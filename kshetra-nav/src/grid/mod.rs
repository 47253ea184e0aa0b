//! Occupancy grid snapshots.
//!
//! A grid is immutable once built: construction validates the dimensions and
//! every query afterwards is O(1) against the row-major cell array.

mod cell;
mod message;
mod occupancy;

pub use cell::CellState;
pub use message::MapMessage;
pub use occupancy::OccupancyGrid;
