//! Background search task.
//!
//! At most one search runs at a time; the orchestrator owns the task handle
//! and observes completion by polling, never by blocking. The worker sends
//! exactly one outcome through a bounded channel and exits, so a result can
//! be neither lost nor consumed twice.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::core::Pose2D;
use crate::error::Result;
use crate::grid::OccupancyGrid;
use crate::path::WaypointPath;
use crate::search::{LatticePlanner, SearchRequest, SearchResult};

/// One candidate goal: a base-path waypoint index and its pose expressed in
/// the costmap's frame.
#[derive(Clone, Debug)]
pub struct GoalCandidate {
    pub index: usize,
    pub pose: Pose2D,
}

/// Immutable input to one background planning run: the start pose and goal
/// candidates are already in the costmap's frame, and the grid snapshot
/// stays untouched while the worker reads it.
#[derive(Clone, Debug)]
pub struct PlanRequest {
    pub start: Pose2D,
    pub candidates: Vec<GoalCandidate>,
    pub costmap: Arc<OccupancyGrid>,
}

/// Outcome of one planning run.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanOutcome {
    /// A detour was found to the candidate at `goal_index`.
    Found {
        path: WaypointPath,
        goal_index: usize,
    },
    /// Every candidate was exhausted without a feasible path.
    NoPath,
    /// The shared expansion/time budget ran out first.
    Timeout,
}

impl PlanOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            PlanOutcome::Found { .. } => "found",
            PlanOutcome::NoPath => "no path",
            PlanOutcome::Timeout => "timeout",
        }
    }
}

/// Handle to the single in-flight background search.
pub struct SearchTask {
    rx: Receiver<PlanOutcome>,
    handle: Option<JoinHandle<()>>,
    /// Transform snapshot taken at launch, used to merge the detour into the
    /// base path when the result arrives.
    costmap_to_base: Pose2D,
}

impl SearchTask {
    /// Spawn the worker. It tries each goal candidate in order under one
    /// shared wall-clock budget and reports the first feasible path.
    pub fn spawn(
        planner: Arc<LatticePlanner>,
        request: PlanRequest,
        costmap_to_base: Pose2D,
    ) -> Result<Self> {
        let (tx, rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("avoid-search".into())
            .spawn(move || {
                let outcome = run_candidate_sweep(&planner, &request);
                debug!(result = outcome.name(), "search worker finished");
                // The orchestrator may have moved on; a dropped receiver
                // just means the result is discarded.
                let _ = tx.send(outcome);
            })?;

        Ok(Self {
            rx,
            handle: Some(handle),
            costmap_to_base,
        })
    }

    /// Non-blocking poll. Returns the outcome exactly once, reaping the
    /// worker thread on delivery.
    pub fn try_take(&mut self) -> Option<PlanOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Some(outcome)
            }
            Err(_) => None,
        }
    }

    pub fn costmap_to_base(&self) -> Pose2D {
        self.costmap_to_base
    }
}

/// Try candidates nearest-first until one yields a path. All candidates
/// share one deadline so the sweep cannot exceed the configured budget.
fn run_candidate_sweep(planner: &LatticePlanner, request: &PlanRequest) -> PlanOutcome {
    let deadline = Instant::now() + planner.config().time_budget();

    for candidate in &request.candidates {
        if Instant::now() >= deadline {
            return PlanOutcome::Timeout;
        }
        let search = SearchRequest {
            start: request.start,
            goal: candidate.pose,
            costmap: Arc::clone(&request.costmap),
        };
        match planner.search_until(&search, deadline) {
            SearchResult::Found(path) => {
                return PlanOutcome::Found {
                    path,
                    goal_index: candidate.index,
                }
            }
            SearchResult::Timeout => return PlanOutcome::Timeout,
            SearchResult::NoPath => continue,
        }
    }
    PlanOutcome::NoPath
}
