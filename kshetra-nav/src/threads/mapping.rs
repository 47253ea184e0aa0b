//! Mapping thread: map intake and snapshot builds.
//!
//! This thread receives map messages and:
//! - Converts the latest pending message into an occupancy grid
//! - Builds the snapshot (obstacles, frontiers, cost map) and swaps it in
//! - Cancels in-flight planning and wakes the planner

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::NavConfig;
use crate::grid::MapMessage;
use crate::shared::NavState;
use crate::snapshot::GridModel;

use super::PlanTrigger;

/// Mapping thread state and logic.
pub struct MappingThread {
    state: Arc<NavState>,
    model: Arc<GridModel>,
    map_rx: Receiver<MapMessage>,
    trigger_tx: Sender<PlanTrigger>,
    occupied_threshold: i8,
    poll_interval: Duration,
    maps_received: u64,
    maps_dropped: u64,
}

impl MappingThread {
    pub fn new(
        config: &NavConfig,
        state: Arc<NavState>,
        model: Arc<GridModel>,
        map_rx: Receiver<MapMessage>,
        trigger_tx: Sender<PlanTrigger>,
    ) -> Self {
        Self {
            state,
            model,
            map_rx,
            trigger_tx,
            occupied_threshold: config.grid.occupied_threshold,
            poll_interval: Duration::from_millis(config.runtime.map_poll_ms),
            maps_received: 0,
            maps_dropped: 0,
        }
    }

    /// Run the mapping thread main loop.
    pub fn run(&mut self) {
        tracing::info!("Mapping thread started");

        loop {
            if self.state.should_shutdown() {
                tracing::info!(
                    "Mapping thread shutting down ({} maps, {} dropped)",
                    self.maps_received,
                    self.maps_dropped
                );
                break;
            }

            match self.map_rx.recv_timeout(self.poll_interval) {
                Ok(message) => {
                    // Only the newest pending map matters
                    let message = self.map_rx.try_iter().last().unwrap_or(message);
                    self.ingest(message, Instant::now());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Map channel disconnected, mapping thread exiting");
                    break;
                }
            }
        }
    }

    /// Convert, build and publish one map. Malformed maps are dropped.
    fn ingest(&mut self, message: MapMessage, received_at: Instant) {
        self.maps_received += 1;

        let grid = match message.to_grid(self.occupied_threshold) {
            Ok(grid) => grid,
            Err(e) => {
                self.maps_dropped += 1;
                tracing::warn!("Dropping malformed map: {}", e);
                return;
            }
        };

        let snapshot = self.model.load_at(grid, received_at);
        self.state
            .update_diagnostics(|diagnostics| diagnostics.update_map(&snapshot));
        self.state.cancel_planning();

        tracing::debug!(
            "Map generation {} ready in {:.1}ms",
            snapshot.generation(),
            received_at.elapsed().as_secs_f32() * 1000.0
        );

        if self
            .trigger_tx
            .send(PlanTrigger::MapUpdated(snapshot.generation()))
            .is_err()
        {
            tracing::debug!("Planning thread gone, map not announced");
        }
    }
}
