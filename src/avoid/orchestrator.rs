//! The avoidance orchestrator: a fixed-rate tick loop driving the state
//! machine.
//!
//! Each tick reads the latest inputs once, evaluates the transition table,
//! launches at most one background search, consumes at most one completed
//! search result, and always publishes the current best waypoint window.
//! The tick never blocks on the search; completion is observed by polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::config::MargaConfig;
use crate::core::{Pose2D, TransformTree};
use crate::path::WaypointPath;
use crate::search::LatticePlanner;

use super::inputs::{InputSnapshot, LatestInputs};
use super::merge::{merge_avoid_path, MergeParams, MergedPath};
use super::state::AvoidState;
use super::task::{GoalCandidate, PlanOutcome, PlanRequest, SearchTask};

/// The currently published avoidance path.
struct ActiveAvoidance {
    merged: WaypointPath,
    end_of_avoid_index: usize,
}

/// Avoidance orchestrator. Owns all mutable state; see the module docs for
/// the tick contract.
pub struct AvoidOrchestrator {
    config: MargaConfig,
    planner: Arc<LatticePlanner>,
    inputs: Arc<LatestInputs>,
    transforms: Arc<TransformTree>,
    publisher: Sender<WaypointPath>,
    shutdown: Arc<AtomicBool>,

    state: AvoidState,
    /// The single in-flight background search, if any.
    task: Option<SearchTask>,
    active: Option<ActiveAvoidance>,
    last_plan_time: Option<Instant>,
    last_published: Option<WaypointPath>,
    last_status: Instant,
}

impl AvoidOrchestrator {
    pub fn new(
        config: MargaConfig,
        inputs: Arc<LatestInputs>,
        transforms: Arc<TransformTree>,
        publisher: Sender<WaypointPath>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let planner = Arc::new(LatticePlanner::new(config.search.clone()));
        Self {
            config,
            planner,
            inputs,
            transforms,
            publisher,
            shutdown,
            state: AvoidState::Initializing,
            task: None,
            active: None,
            last_plan_time: None,
            last_published: None,
            last_status: Instant::now(),
        }
    }

    pub fn state(&self) -> AvoidState {
        self.state
    }

    /// Whether a background search is currently in flight.
    pub fn search_in_flight(&self) -> bool {
        self.task.is_some()
    }

    /// Run the fixed-rate loop until shutdown is signaled.
    pub fn run(&mut self) {
        info!(rate_hz = self.config.avoid.update_rate_hz, "avoidance loop started");
        let interval = Duration::from_secs_f32(1.0 / self.config.avoid.update_rate_hz);

        loop {
            let tick_start = Instant::now();
            if self.shutdown.load(Ordering::Acquire) {
                info!("avoidance loop shutting down");
                break;
            }

            self.tick();

            let elapsed = tick_start.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
    }

    /// One cycle of the state machine.
    pub fn tick(&mut self) {
        // Not-yet-initialized is deferral, not failure: publish nothing.
        let Some(snap) = self.inputs.snapshot() else {
            return;
        };
        if self.state == AvoidState::Initializing {
            info!("all inputs received, relaying waypoints");
            self.state = AvoidState::Relaying;
        }

        let obstacle = self.obstacle_ahead(&snap);

        // A result arriving outside Planning belongs to a superseded
        // request: consume it exactly once and discard it.
        if self.state != AvoidState::Planning {
            let stale = self.task.as_mut().and_then(|t| t.try_take());
            if let Some(outcome) = stale {
                debug!(
                    result = outcome.name(),
                    "discarding search result from a superseded request"
                );
                self.task = None;
            }
        }

        match self.state {
            AvoidState::Initializing => {}
            AvoidState::Relaying => {
                self.active = None;
                if self.config.avoid.enable_avoidance {
                    if let Some(index) = obstacle {
                        info!(obstacle_index = index, "obstacle ahead, stopping");
                        self.state = AvoidState::Stopping;
                    }
                }
            }
            AvoidState::Stopping => match obstacle {
                None => {
                    info!("obstacle cleared, relaying");
                    self.active = None;
                    self.state = AvoidState::Relaying;
                }
                Some(index) => {
                    if self.task.is_none()
                        && self.replan_due()
                        && self.launch_search(&snap, index)
                    {
                        self.state = AvoidState::Planning;
                    }
                }
            },
            AvoidState::Planning => {
                if obstacle.is_none() {
                    // The in-flight search keeps running; its result will be
                    // discarded on arrival.
                    info!("obstacle cleared while planning, relaying");
                    self.active = None;
                    self.state = AvoidState::Relaying;
                } else {
                    let completed = match self.task.as_mut() {
                        Some(task) => task.try_take().map(|o| (o, task.costmap_to_base())),
                        None => None,
                    };
                    if let Some((outcome, costmap_to_base)) = completed {
                        self.task = None;
                        self.apply_outcome(outcome, costmap_to_base, &snap);
                    } else if self.task.is_none() {
                        self.state = AvoidState::Stopping;
                    }
                }
            }
            AvoidState::Avoiding => self.update_avoiding(&snap, obstacle),
        }

        self.publish(&snap, obstacle);
        self.log_status(&snap, obstacle);
    }

    /// The obstacle index, if one is reported within the active path window.
    /// Indices behind the vehicle or outside the base path mean no obstacle.
    fn obstacle_ahead(&self, snap: &InputSnapshot) -> Option<usize> {
        let index = snap.obstacle_index?;
        if index < snap.closest_index
            || index >= snap.base_path.len()
            || index >= snap.closest_index + self.config.avoid.safety_waypoints_size
        {
            return None;
        }
        Some(index)
    }

    fn replan_due(&self) -> bool {
        match self.last_plan_time {
            None => true,
            Some(t) => t.elapsed().as_secs_f32() >= self.config.avoid.replan_interval_secs,
        }
    }

    /// Compute the search request for the reported obstacle and launch the
    /// background task. Returns false (and stays in the current state) when
    /// a transform is unavailable this tick or no goal candidate exists.
    fn launch_search(&mut self, snap: &InputSnapshot, obstacle_index: usize) -> bool {
        let base = &snap.base_path;
        let costmap_frame = snap.costmap.frame();

        let base_to_costmap = match self.transforms.lookup(&base.frame, costmap_frame) {
            Ok(t) => t,
            Err(e) => {
                warn!("{e}; skipping planning this tick");
                return false;
            }
        };
        let pose_to_costmap = match self.transforms.lookup(&snap.pose.frame, costmap_frame) {
            Ok(t) => t,
            Err(e) => {
                warn!("{e}; skipping planning this tick");
                return false;
            }
        };

        let start = pose_to_costmap.compose(snap.pose.pose);

        // Goal candidates step outward from just beyond the obstacle.
        let delta = self.config.avoid.search_waypoints_delta.max(1);
        let mut candidates = Vec::new();
        let mut offset = delta;
        while offset <= self.config.avoid.search_waypoints_size {
            let index = obstacle_index + offset;
            if index >= base.len() {
                break;
            }
            candidates.push(GoalCandidate {
                index,
                pose: base_to_costmap.compose(base.waypoints[index].pose),
            });
            offset += delta;
        }
        if candidates.is_empty() {
            warn!(obstacle_index, "no goal candidates beyond the obstacle");
            return false;
        }

        let request = PlanRequest {
            start,
            candidates,
            costmap: Arc::clone(&snap.costmap),
        };
        match SearchTask::spawn(
            Arc::clone(&self.planner),
            request,
            base_to_costmap.inverse(),
        ) {
            Ok(task) => {
                info!(obstacle_index, "launched avoidance search");
                self.task = Some(task);
                self.last_plan_time = Some(Instant::now());
                true
            }
            Err(e) => {
                warn!("failed to spawn search worker: {e}");
                false
            }
        }
    }

    /// Apply a consumed search result to the state machine.
    fn apply_outcome(
        &mut self,
        outcome: PlanOutcome,
        costmap_to_base: Pose2D,
        snap: &InputSnapshot,
    ) {
        match outcome {
            PlanOutcome::Found { path, goal_index } => {
                let params = MergeParams {
                    avoid_velocity: self.config.avoid.avoid_waypoints_velocity,
                    avoid_start_velocity: self.config.avoid.avoid_start_velocity,
                    rejoin_tolerance: self.config.avoid.rejoin_tolerance,
                };
                match merge_avoid_path(
                    &snap.base_path,
                    &path,
                    costmap_to_base,
                    snap.closest_index,
                    goal_index,
                    &params,
                ) {
                    Some(MergedPath {
                        path,
                        end_of_avoid_index,
                    }) => {
                        info!(
                            waypoints = path.len(),
                            rejoin_index = goal_index,
                            "avoidance path merged, avoiding"
                        );
                        self.active = Some(ActiveAvoidance {
                            merged: path,
                            end_of_avoid_index,
                        });
                        self.state = AvoidState::Avoiding;
                    }
                    None => {
                        warn!("merge failed, holding at obstacle");
                        self.active = None;
                        self.state = AvoidState::Stopping;
                    }
                }
            }
            PlanOutcome::NoPath | PlanOutcome::Timeout => {
                info!(result = outcome.name(), "no usable avoidance path, holding");
                self.active = None;
                self.state = AvoidState::Stopping;
            }
        }
    }

    fn update_avoiding(&mut self, snap: &InputSnapshot, obstacle: Option<usize>) {
        let Some(active) = self.active.as_ref() else {
            self.state = AvoidState::Stopping;
            return;
        };

        let Some(obstacle_index) = obstacle else {
            info!("obstacle cleared, relaying");
            self.active = None;
            self.state = AvoidState::Relaying;
            return;
        };

        // Vehicle progress is measured on the merged path itself.
        let Some(pose) = self.pose_in_frame(snap, &active.merged.frame) else {
            return;
        };
        let closest_on_merged = match active.merged.closest_waypoint(pose.position()) {
            Some(i) => i,
            None => return,
        };

        if closest_on_merged >= active.end_of_avoid_index {
            info!("passed the end of the detour, relaying");
            self.active = None;
            self.state = AvoidState::Relaying;
        } else if self.task.is_none() && self.replan_due() {
            // The merged path stays published while the fresh search runs.
            info!("replan interval elapsed, refreshing avoidance path");
            if self.launch_search(snap, obstacle_index) {
                self.state = AvoidState::Planning;
            }
        }
    }

    /// Publish the current best window. Falls back to the last valid path
    /// when a transform miss prevents computing a fresh one this tick.
    fn publish(&mut self, snap: &InputSnapshot, obstacle: Option<usize>) {
        let window = self.current_window(snap, obstacle);
        let path = match window {
            Some(path) => {
                self.last_published = Some(path.clone());
                path
            }
            None => match &self.last_published {
                Some(path) => path.clone(),
                None => return,
            },
        };

        debug_assert!(!path.is_empty());
        if self.publisher.send(path).is_err() {
            warn!("waypoint subscriber disconnected");
        }
    }

    fn current_window(&self, snap: &InputSnapshot, obstacle: Option<usize>) -> Option<WaypointPath> {
        let window_size = self.config.avoid.safety_waypoints_size;
        match (&self.state, &self.active) {
            (AvoidState::Initializing, _) => None,
            (AvoidState::Relaying, _) => {
                Some(snap.base_path.window(snap.closest_index, window_size))
            }
            (AvoidState::Stopping | AvoidState::Planning, None) => {
                // Hold short of the obstacle: the window ends at the
                // pre-obstacle waypoint (never empty, the closest waypoint
                // itself is always included).
                let size = match obstacle {
                    Some(index) if index > snap.closest_index => {
                        (index - snap.closest_index).min(window_size)
                    }
                    Some(_) => 1,
                    None => window_size,
                };
                Some(snap.base_path.window(snap.closest_index, size))
            }
            (AvoidState::Stopping | AvoidState::Planning | AvoidState::Avoiding, Some(active)) => {
                let pose = self.pose_in_frame(snap, &active.merged.frame)?;
                let start = active.merged.closest_waypoint(pose.position())?;
                Some(active.merged.window(start, window_size))
            }
            (AvoidState::Avoiding, None) => None,
        }
    }

    fn pose_in_frame(&self, snap: &InputSnapshot, frame: &crate::core::FrameId) -> Option<Pose2D> {
        match self.transforms.lookup(&snap.pose.frame, frame) {
            Ok(t) => Some(t.compose(snap.pose.pose)),
            Err(e) => {
                warn!("{e}; republishing last path");
                None
            }
        }
    }

    fn log_status(&mut self, snap: &InputSnapshot, obstacle: Option<usize>) {
        if self.last_status.elapsed() < Duration::from_secs(2) {
            return;
        }
        self.last_status = Instant::now();
        info!(
            state = self.state.name(),
            closest = snap.closest_index,
            obstacle = ?obstacle,
            speed = snap.velocity.linear,
            searching = self.task.is_some(),
            "avoidance status"
        );
    }
}
