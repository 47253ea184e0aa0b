//! Shared state for the multi-threaded runtime.
//!
//! Provides thread-safe shared state between:
//! - Mapping thread (snapshot builds)
//! - Planning thread (goal selection, path publishing)
//! - Control thread (pose intake, controller ticks, commands)

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::control::MotionState;
use crate::core::{PoseSample, VelocityCommand, WorldPoint};
use crate::obstacles::{ObstacleKind, ShapeEstimate};
use crate::planning::{CancelToken, Path};
use crate::snapshot::MapSnapshot;

/// Read-only summary of one obstacle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObstacleSummary {
    pub id: usize,
    pub kind: ObstacleKind,
    pub cells: usize,
    pub centroid: WorldPoint,
    pub radius: f32,
    pub shape: Option<ShapeEstimate>,
}

/// Read-only summary of one frontier region.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrontierSummary {
    pub centroid: WorldPoint,
    pub size: usize,
}

/// Diagnostic view of the navigator.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Generation of the snapshot the summaries were taken from
    pub generation: u64,
    /// Discrete obstacles only
    pub obstacles: Vec<ObstacleSummary>,
    pub frontiers: Vec<FrontierSummary>,
    pub motion: MotionState,
    pub goal: Option<WorldPoint>,
    pub last_command: VelocityCommand,
    /// Path slot updates so far
    pub plans: u64,
}

impl Diagnostics {
    /// Replace the map-derived summaries with those of `snapshot`.
    pub fn update_map(&mut self, snapshot: &MapSnapshot) {
        self.generation = snapshot.generation();
        self.obstacles = snapshot
            .discrete_obstacles()
            .map(|o| ObstacleSummary {
                id: o.id,
                kind: o.kind,
                cells: o.size(),
                centroid: o.centroid,
                radius: o.radius,
                shape: o.shape,
            })
            .collect();
        self.frontiers = snapshot
            .frontier_regions()
            .iter()
            .map(|r| FrontierSummary {
                centroid: r.centroid,
                size: r.size(),
            })
            .collect();
    }
}

/// Latest published path and its sequence number.
#[derive(Debug, Default)]
struct PathSlot {
    sequence: u64,
    path: Option<Arc<Path>>,
}

/// Shared state between all threads.
#[derive(Debug, Default)]
pub struct NavState {
    /// Shutdown signal for graceful termination
    shutdown: AtomicBool,

    /// Exploration complete flag
    exploration_complete: AtomicBool,

    /// Last pose received (updated by control thread)
    pose: Mutex<Option<PoseSample>>,

    /// Path for the controller (written by planning thread)
    path: RwLock<PathSlot>,

    /// Token of the planning computation in flight
    planning: Mutex<CancelToken>,

    diagnostics: RwLock<Diagnostics>,

    /// Commands published (for status reporting)
    commands: AtomicU64,
}

impl NavState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.cancel_planning();
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Mark exploration as complete (or resumed).
    pub fn set_exploration_complete(&self, complete: bool) {
        self.exploration_complete.store(complete, Ordering::Release);
    }

    /// Check if exploration is complete.
    pub fn is_exploration_complete(&self) -> bool {
        self.exploration_complete.load(Ordering::Acquire)
    }

    pub fn pose(&self) -> Option<PoseSample> {
        *self.pose.lock()
    }

    pub fn set_pose(&self, sample: PoseSample) {
        *self.pose.lock() = Some(sample);
    }

    /// Publish a new path (or `None` to stop). Returns its sequence number.
    pub fn publish_path(&self, path: Option<Arc<Path>>) -> u64 {
        let mut slot = self.path.write();
        slot.sequence += 1;
        slot.path = path;
        slot.sequence
    }

    /// Path published after `seen`, if any.
    pub fn path_since(&self, seen: u64) -> Option<(u64, Option<Arc<Path>>)> {
        let slot = self.path.read();
        (slot.sequence > seen).then(|| (slot.sequence, slot.path.clone()))
    }

    pub fn path_sequence(&self) -> u64 {
        self.path.read().sequence
    }

    /// Start a planning computation; returns the token it must poll.
    pub fn begin_planning(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.planning.lock() = token.clone();
        token
    }

    /// Abandon the planning computation in flight, if any.
    pub fn cancel_planning(&self) {
        self.planning.lock().cancel();
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().clone()
    }

    pub fn update_diagnostics(&self, update: impl FnOnce(&mut Diagnostics)) {
        update(&mut self.diagnostics.write());
    }

    pub fn record_command(&self, command: VelocityCommand, motion: MotionState) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        let mut diagnostics = self.diagnostics.write();
        diagnostics.last_command = command;
        diagnostics.motion = motion;
    }

    /// Number of commands published.
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }
}
