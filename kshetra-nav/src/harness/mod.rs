//! Test harness: ASCII maps and a kinematic simulator.
//!
//! Lets the navigation stack run end to end without a robot. The binary and
//! the integration tests drive a [`SimWorld`] whose revealed map feeds the
//! navigator the way a mapper would.

mod ascii;
mod sim;

pub use ascii::{load_ascii_map, parse_ascii_map};
pub use sim::{SimConfig, SimWorld};
