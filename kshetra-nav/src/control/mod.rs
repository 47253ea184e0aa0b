//! Motion control: waypoint following with an obstacle-avoidance override.

mod avoidance;
mod controller;

pub use avoidance::{ObstacleContact, ObstacleField};
pub(crate) use avoidance::scan_cone;
pub use controller::{
    ControlOutput, ControllerConfig, ControllerEvent, MotionController, MotionState, StaleInput,
    TickInput,
};
