//! Control thread: pose intake and fixed-rate velocity commands.
//!
//! This thread runs at the control rate and, every tick:
//! - Drains the pose channel without blocking (last pose wins)
//! - Picks up newly published paths
//! - Ticks the motion controller and publishes its command
//! - Forwards controller events to the planning thread

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::config::NavConfig;
use crate::control::{ControlOutput, MotionController, ObstacleField, TickInput};
use crate::core::{Pose2D, PoseSample, VelocityCommand};
use crate::shared::NavState;
use crate::snapshot::GridModel;

use super::{CommandSink, PlanTrigger};

/// Control thread state and logic.
pub struct ControlThread<S: CommandSink> {
    state: Arc<NavState>,
    model: Arc<GridModel>,
    pose_rx: Receiver<Pose2D>,
    sink: S,
    trigger_tx: Sender<PlanTrigger>,
    controller: MotionController,
    period: Duration,
    /// Last path sequence handed to the controller
    path_seen: u64,
    pose_stream_open: bool,
}

impl<S: CommandSink> ControlThread<S> {
    pub fn new(
        config: &NavConfig,
        state: Arc<NavState>,
        model: Arc<GridModel>,
        pose_rx: Receiver<Pose2D>,
        sink: S,
        trigger_tx: Sender<PlanTrigger>,
    ) -> Self {
        Self {
            state,
            model,
            pose_rx,
            sink,
            trigger_tx,
            controller: MotionController::new(config.controller_config()),
            period: config.control_period(),
            path_seen: 0,
            pose_stream_open: true,
        }
    }

    /// Run the control thread main loop.
    pub fn run(&mut self) {
        tracing::info!("Control thread started ({:?} period)", self.period);
        let mut next_tick = Instant::now();

        loop {
            if self.state.should_shutdown() {
                tracing::info!("Control thread shutting down");
                self.sink.send_command(VelocityCommand::ZERO);
                break;
            }

            let now = Instant::now();
            let output = self.step(now);

            if !self.sink.send_command(output.command) {
                tracing::error!("Command sink closed, shutting down");
                self.state.signal_shutdown();
                break;
            }
            self.state.record_command(output.command, output.state);

            if let Some(event) = output.event {
                if self.trigger_tx.send(PlanTrigger::Controller(event)).is_err() {
                    tracing::debug!("Planning thread gone, dropped {:?}", event);
                }
            }

            // Fixed rate; skip missed ticks instead of bursting
            next_tick += self.period;
            let now = Instant::now();
            if next_tick > now {
                std::thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    }

    /// One control tick at `now`.
    fn step(&mut self, now: Instant) -> ControlOutput {
        self.drain_poses(now);

        if let Some((sequence, path)) = self.state.path_since(self.path_seen) {
            self.path_seen = sequence;
            match path {
                Some(path) => self.controller.set_path(path),
                None => self.controller.clear(),
            }
        }

        let snapshot = self.model.snapshot();
        let obstacles = snapshot.as_deref().map(|s| s as &dyn ObstacleField);
        self.controller.tick(TickInput {
            now,
            pose: self.state.pose(),
            obstacles,
            grid_received_at: snapshot.as_ref().map(|s| s.received_at()),
        })
    }

    fn drain_poses(&mut self, now: Instant) {
        let mut latest = None;
        loop {
            match self.pose_rx.try_recv() {
                Ok(pose) => latest = Some(pose),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pose_stream_open {
                        tracing::warn!("Pose channel disconnected");
                        self.pose_stream_open = false;
                    }
                    break;
                }
            }
        }

        match latest {
            Some(pose) if pose.is_finite() => self.state.set_pose(PoseSample::new(pose, now)),
            Some(pose) => tracing::warn!("Ignoring non-finite pose {:?}", pose),
            None => {}
        }
    }
}
