//! Integration tests for kshetra-nav
//!
//! - `exploration`: the full pipeline stepped synchronously against the
//!   simulator with a synthetic clock
//! - `properties`: grid/extraction/frontier/planner/controller properties,
//!   including proptest sweeps over random small grids
//! - `runtime`: the threaded navigator end to end
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kshetra-nav --test integration -- --nocapture
//! ```

mod exploration;
mod harness;
mod properties;
mod runtime;
