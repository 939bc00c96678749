//! Pose-lattice search engine.
//!
//! Given a start pose, a goal pose, and an occupancy grid snapshot, the
//! engine searches a lattice of discretized (x, y, heading) states connected
//! by feasible arc motions and returns a drivable detour path or a failure.
//! The search is bounded by a node-expansion and wall-clock budget so it can
//! run on a background thread without stalling the control loop.

mod lattice;
mod planner;

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::core::Pose2D;
use crate::grid::OccupancyGrid;
use crate::path::WaypointPath;

pub use lattice::{arc_delta, heading_bin, motion_primitives, MotionPrimitive};
pub use planner::LatticePlanner;

/// Immutable input to one search: poses are expressed in the costmap's
/// frame, and the grid snapshot stays untouched for the search's lifetime.
#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub start: Pose2D,
    pub goal: Pose2D,
    pub costmap: Arc<OccupancyGrid>,
}

/// Outcome of one search. `Timeout` covers both the node-expansion and the
/// wall-clock budget; callers treat it exactly like `NoPath`.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchResult {
    Found(WaypointPath),
    NoPath,
    Timeout,
}

/// Search engine configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchConfig {
    /// Cell size of the search lattice in meters. Independent of the
    /// costmap resolution; collision checks still consult every grid cell.
    #[serde(default = "default_lattice_resolution")]
    pub lattice_resolution: f32,

    /// Number of discrete heading bins in the lattice.
    #[serde(default = "default_theta_bins")]
    pub theta_bins: usize,

    /// Minimum turning radius in meters.
    #[serde(default = "default_turning_radius")]
    pub turning_radius: f32,

    /// Arc length of one motion primitive in meters.
    #[serde(default = "default_arc_length")]
    pub arc_length: f32,

    /// Whether reverse arcs are part of the motion set.
    #[serde(default = "default_allow_reverse")]
    pub allow_reverse: bool,

    /// Cost multiplier applied to reverse motion.
    #[serde(default = "default_reverse_penalty")]
    pub reverse_penalty: f32,

    /// Vehicle footprint radius in meters for collision checks.
    #[serde(default = "default_vehicle_radius")]
    pub vehicle_radius: f32,

    /// Grid cost at or above which a cell counts as an obstacle.
    #[serde(default = "default_obstacle_threshold")]
    pub obstacle_threshold: u8,

    /// Distance tolerance for reaching the goal (meters).
    #[serde(default = "default_goal_tolerance_m")]
    pub goal_tolerance_m: f32,

    /// Heading tolerance for reaching the goal (radians).
    #[serde(default = "default_goal_tolerance_rad")]
    pub goal_tolerance_rad: f32,

    /// Maximum node expansions before giving up.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Wall-clock budget in milliseconds.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
}

impl SearchConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            lattice_resolution: default_lattice_resolution(),
            theta_bins: default_theta_bins(),
            turning_radius: default_turning_radius(),
            arc_length: default_arc_length(),
            allow_reverse: default_allow_reverse(),
            reverse_penalty: default_reverse_penalty(),
            vehicle_radius: default_vehicle_radius(),
            obstacle_threshold: default_obstacle_threshold(),
            goal_tolerance_m: default_goal_tolerance_m(),
            goal_tolerance_rad: default_goal_tolerance_rad(),
            max_expansions: default_max_expansions(),
            time_budget_ms: default_time_budget_ms(),
        }
    }
}

fn default_lattice_resolution() -> f32 {
    0.5
}
fn default_theta_bins() -> usize {
    48
}
fn default_turning_radius() -> f32 {
    6.0
}
fn default_arc_length() -> f32 {
    1.0
}
fn default_allow_reverse() -> bool {
    false
}
fn default_reverse_penalty() -> f32 {
    2.0
}
fn default_vehicle_radius() -> f32 {
    1.0
}
fn default_obstacle_threshold() -> u8 {
    100
}
fn default_goal_tolerance_m() -> f32 {
    1.0
}
fn default_goal_tolerance_rad() -> f32 {
    0.35
}
fn default_max_expansions() -> usize {
    50_000
}
fn default_time_budget_ms() -> u64 {
    1000
}
