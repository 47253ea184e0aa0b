//! Planning thread: goal selection and path planning.
//!
//! This thread wakes on new snapshots and controller events and:
//! - Runs the explorer against the latest snapshot and pose
//! - Publishes the resulting path (or a stop) into the path slot
//! - Tracks exploration completion

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::config::NavConfig;
use crate::control::ControllerEvent;
use crate::exploration::{Explorer, GoalDecision};
use crate::planning::{Path, PlanError};
use crate::shared::NavState;
use crate::snapshot::GridModel;

use super::PlanTrigger;

/// Planning thread state and logic.
pub struct PlanningThread {
    state: Arc<NavState>,
    model: Arc<GridModel>,
    explorer: Explorer,
    trigger_rx: Receiver<PlanTrigger>,
    replan_interval: Duration,
    pose_timeout: Duration,
    /// A replan has been requested and not yet run
    pending: bool,
    /// The controller holds a path from this thread
    active: bool,
    last_plan: Option<Instant>,
    last_status_time: Instant,
    status_interval: Duration,
}

impl PlanningThread {
    pub fn new(
        config: &NavConfig,
        state: Arc<NavState>,
        model: Arc<GridModel>,
        explorer: Explorer,
        trigger_rx: Receiver<PlanTrigger>,
    ) -> Self {
        Self {
            state,
            model,
            explorer,
            trigger_rx,
            replan_interval: Duration::from_millis(config.runtime.replan_interval_ms),
            pose_timeout: Duration::from_millis(config.controller.pose_timeout_ms),
            pending: true,
            active: false,
            last_plan: None,
            last_status_time: Instant::now(),
            status_interval: Duration::from_secs(3),
        }
    }

    /// Run the planning thread main loop.
    pub fn run(&mut self) {
        tracing::info!("Planning thread started");

        loop {
            if self.state.should_shutdown() {
                tracing::info!("Planning thread shutting down");
                break;
            }

            match self.trigger_rx.recv_timeout(self.wait_time(Instant::now())) {
                Ok(trigger) => {
                    self.handle(trigger);
                    while let Ok(trigger) = self.trigger_rx.try_recv() {
                        self.handle(trigger);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Idle: retry periodically in case new frontiers appeared
                    if !self.active {
                        self.pending = true;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Trigger channel disconnected, planning thread exiting");
                    break;
                }
            }

            let now = Instant::now();
            if self.pending && self.is_due(now) {
                self.plan_once(now);
            }

            if self.last_status_time.elapsed() >= self.status_interval {
                self.log_status();
                self.last_status_time = Instant::now();
            }
        }
    }

    fn handle(&mut self, trigger: PlanTrigger) {
        match trigger {
            PlanTrigger::MapUpdated(generation) => {
                tracing::trace!("Replan requested by map generation {}", generation);
                self.pending = true;
            }
            PlanTrigger::Controller(ControllerEvent::Arrived { goal }) => {
                tracing::debug!("Controller arrived at ({:.2}, {:.2})", goal.x, goal.y);
                self.explorer.mark_reached(Instant::now());
                self.active = false;
                self.pending = true;
            }
            PlanTrigger::Controller(ControllerEvent::Stalled(input)) => {
                tracing::warn!("Controller stalled on stale {:?}, abandoning goal", input);
                self.explorer.abandon();
                self.active = false;
                self.pending = true;
            }
        }
    }

    /// Map-driven replans are spaced by the replan interval while a path
    /// is being followed; anything else runs immediately.
    fn is_due(&self, now: Instant) -> bool {
        !self.active
            || self
                .last_plan
                .map_or(true, |t| now.saturating_duration_since(t) >= self.replan_interval)
    }

    fn wait_time(&self, now: Instant) -> Duration {
        match self.last_plan {
            Some(t) if self.pending && self.active => self
                .replan_interval
                .saturating_sub(now.saturating_duration_since(t))
                .max(Duration::from_millis(1)),
            _ => self.replan_interval,
        }
    }

    fn plan_once(&mut self, now: Instant) {
        let Some(snapshot) = self.model.snapshot() else {
            return;
        };
        let Some(sample) = self.state.pose() else {
            return;
        };
        if sample.age(now) > self.pose_timeout {
            tracing::debug!("Pose is stale, postponing planning");
            return;
        }

        self.pending = false;
        self.last_plan = Some(now);
        let cancel = self.state.begin_planning();

        let started = Instant::now();
        let decision = self
            .explorer
            .select_goal(&snapshot, &sample.pose, now, &cancel);
        tracing::debug!(
            "Goal selection on generation {} took {:.1}ms",
            snapshot.generation(),
            started.elapsed().as_secs_f32() * 1000.0
        );

        match decision {
            Ok(GoalDecision::Navigate { path, .. }) | Ok(GoalDecision::ReturnHome { path }) => {
                self.state.set_exploration_complete(false);
                self.publish(path);
            }
            Ok(GoalDecision::Complete) => {
                if !self.state.is_exploration_complete() {
                    tracing::info!("Exploration complete");
                    self.state.set_exploration_complete(true);
                }
                self.stop();
            }
            Ok(GoalDecision::Unreachable { frontiers }) => {
                tracing::warn!("{} frontiers remain but none is reachable", frontiers);
                self.stop();
            }
            Ok(GoalDecision::Escape { path }) => self.publish(path),
            Ok(GoalDecision::Stuck) => self.stop(),
            Err(PlanError::Cancelled) => {
                tracing::debug!("Planning cancelled, will retry on the latest snapshot");
                self.pending = true;
            }
            Err(e) => {
                tracing::error!("Goal selection failed: {}", e);
                self.stop();
            }
        }
    }

    fn publish(&mut self, path: Path) {
        let goal = path.goal();
        let sequence = self.state.publish_path(Some(Arc::new(path)));
        self.state.update_diagnostics(|d| {
            d.goal = goal;
            d.plans = sequence;
        });
        self.active = true;
    }

    fn stop(&mut self) {
        if self.active {
            let sequence = self.state.publish_path(None);
            self.state.update_diagnostics(|d| {
                d.goal = None;
                d.plans = sequence;
            });
        }
        self.active = false;
    }

    fn log_status(&self) {
        let diagnostics = self.state.diagnostics();
        tracing::info!(
            "Status: map gen {}, {} obstacles, {} frontiers, {:?}, {} blacklisted",
            diagnostics.generation,
            diagnostics.obstacles.len(),
            diagnostics.frontiers.len(),
            diagnostics.motion,
            self.explorer.blacklist_len()
        );
    }
}
