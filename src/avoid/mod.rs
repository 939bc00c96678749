//! Avoidance orchestration: the state machine that decides between relaying
//! the base path, holding at an obstacle, planning a detour on a background
//! task, and publishing a merged avoidance path.

mod inputs;
mod merge;
mod orchestrator;
mod state;
mod task;

pub use inputs::{InputSnapshot, LatestInputs};
pub use merge::{merge_avoid_path, MergeParams, MergedPath};
pub use orchestrator::AvoidOrchestrator;
pub use state::AvoidState;
pub use task::{GoalCandidate, PlanOutcome, PlanRequest, SearchTask};
