//! Core geometric types shared by every navigation component.
//!
//! - [`GridCoord`] / [`WorldPoint`]: cell indices and map-frame positions
//! - [`Pose2D`] / [`PoseSample`]: robot pose, optionally stamped on arrival
//! - [`VelocityCommand`]: the controller output
//! - [`math`]: angle helpers

pub mod math;
mod point;
mod pose;
mod velocity;

pub use point::{GridCoord, WorldPoint};
pub use pose::{Pose2D, PoseSample};
pub use velocity::VelocityCommand;
