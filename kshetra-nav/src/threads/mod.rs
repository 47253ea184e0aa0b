//! Multi-threaded runtime for KshetraNav.
//!
//! Separates concerns into three threads:
//! - Mapping thread: map intake and snapshot builds
//! - Planning thread: goal selection and path planning
//! - Control thread: pose intake and fixed-rate velocity commands

mod control;
mod mapping;
mod planning;

pub use control::ControlThread;
pub use mapping::MappingThread;
pub use planning::PlanningThread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::config::NavConfig;
use crate::control::ControllerEvent;
use crate::core::{Pose2D, VelocityCommand};
use crate::error::Result;
use crate::exploration::{Explorer, FrontierAnalyzer};
use crate::grid::MapMessage;
use crate::obstacles::ObstacleExtractor;
use crate::planning::PathPlanner;
use crate::shared::{Diagnostics, NavState};
use crate::snapshot::GridModel;

/// Destination for velocity commands.
pub trait CommandSink: Send + 'static {
    /// Deliver one command. Returns false once the consumer is gone.
    fn send_command(&mut self, command: VelocityCommand) -> bool;
}

impl CommandSink for Sender<VelocityCommand> {
    fn send_command(&mut self, command: VelocityCommand) -> bool {
        self.send(command).is_ok()
    }
}

/// Adapts a closure into a [`CommandSink`].
pub struct FnSink<F>(pub F);

impl<F> CommandSink for FnSink<F>
where
    F: FnMut(VelocityCommand) + Send + 'static,
{
    fn send_command(&mut self, command: VelocityCommand) -> bool {
        (self.0)(command);
        true
    }
}

/// Wake-ups for the planning thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlanTrigger {
    /// A new snapshot of this generation was swapped in
    MapUpdated(u64),
    /// The controller finished or dropped its path
    Controller(ControllerEvent),
}

/// Thread handles for the running navigator.
pub struct NavigatorHandle {
    state: Arc<NavState>,
    model: Arc<GridModel>,
    mapping: JoinHandle<()>,
    planning: JoinHandle<()>,
    control: JoinHandle<()>,
}

impl NavigatorHandle {
    pub fn state(&self) -> &Arc<NavState> {
        &self.state
    }

    pub fn model(&self) -> &Arc<GridModel> {
        &self.model
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics()
    }

    pub fn is_exploration_complete(&self) -> bool {
        self.state.is_exploration_complete()
    }

    /// Ask every thread to stop.
    pub fn shutdown(&self) {
        self.state.signal_shutdown();
    }

    /// Wait for all threads to exit.
    pub fn join(self) {
        for (name, handle) in [
            ("mapping", self.mapping),
            ("planning", self.planning),
            ("control", self.control),
        ] {
            if handle.join().is_err() {
                tracing::error!("{} thread panicked", name);
            }
        }
    }
}

/// Entry point for the threaded runtime.
pub struct Navigator;

impl Navigator {
    /// Spawn the mapping, planning and control threads.
    ///
    /// Poses arrive on `pose_rx`, full maps on `map_rx`; commands leave
    /// through `sink` at the configured control rate.
    pub fn spawn<S: CommandSink>(
        config: NavConfig,
        pose_rx: Receiver<Pose2D>,
        map_rx: Receiver<MapMessage>,
        sink: S,
    ) -> Result<NavigatorHandle> {
        config.validate()?;

        let state = Arc::new(NavState::new());
        let frontier_config = config.frontier_config();
        let model = Arc::new(GridModel::new(
            ObstacleExtractor::new(config.extractor_config()),
            FrontierAnalyzer::new(frontier_config.clone()),
            config.cost_params(),
        ));
        let explorer = Explorer::new(
            config.explorer_config(),
            FrontierAnalyzer::new(frontier_config),
            PathPlanner::new(config.planner_config(), config.cost_params()),
        );

        // Replan triggers (unbounded: one entry per map or controller event)
        let (trigger_tx, trigger_rx) = crossbeam_channel::unbounded::<PlanTrigger>();

        let mapping_thread = MappingThread::new(
            &config,
            Arc::clone(&state),
            Arc::clone(&model),
            map_rx,
            trigger_tx.clone(),
        );
        let planning_thread = PlanningThread::new(
            &config,
            Arc::clone(&state),
            Arc::clone(&model),
            explorer,
            trigger_rx,
        );
        let control_thread = ControlThread::new(
            &config,
            Arc::clone(&state),
            Arc::clone(&model),
            pose_rx,
            sink,
            trigger_tx,
        );

        let mapping = thread::Builder::new()
            .name("mapping".into())
            .spawn(move || {
                let mut mapping_thread = mapping_thread;
                mapping_thread.run();
            })?;

        let planning = thread::Builder::new()
            .name("planning".into())
            .spawn(move || {
                let mut planning_thread = planning_thread;
                planning_thread.run();
            })
            .inspect_err(|_| state.signal_shutdown())?;

        let control = thread::Builder::new()
            .name("control".into())
            .spawn(move || {
                let mut control_thread = control_thread;
                control_thread.run();
            })
            .inspect_err(|_| state.signal_shutdown())?;

        tracing::info!(
            "Navigator started (control {:.0} Hz)",
            config.runtime.control_rate_hz
        );

        Ok(NavigatorHandle {
            state,
            model,
            mapping,
            planning,
            control,
        })
    }
}
