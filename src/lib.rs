//! marga-nav - Local obstacle-avoidance waypoint planner.
//!
//! Relays a pre-planned global waypoint path and, when an obstacle is
//! reported on it, plans a short-horizon detour over the live costmap with a
//! pose-lattice search on a background thread, splices the detour into the
//! path, and publishes the result at a fixed rate. If no valid detour
//! exists the published path ends short of the obstacle so the vehicle
//! holds safely.
//!
//! ## Architecture
//!
//! - Inbound updates (pose, velocity, base path, costmap, waypoint indices)
//!   overwrite whole-value snapshots in [`avoid::LatestInputs`]; they never
//!   block and never run planning logic inline.
//! - The [`avoid::AvoidOrchestrator`] tick loop evaluates the state machine
//!   (Initializing / Relaying / Stopping / Planning / Avoiding), launches at
//!   most one bounded background search, and publishes every tick.
//! - The [`search::LatticePlanner`] searches discretized (x, y, heading)
//!   states connected by turning-radius-bounded arcs over an immutable grid
//!   snapshot.

pub mod avoid;
pub mod config;
pub mod core;
pub mod error;
pub mod grid;
pub mod path;
pub mod search;

pub use crate::avoid::{AvoidOrchestrator, AvoidState, LatestInputs};
pub use crate::config::{AvoidConfig, MargaConfig};
pub use crate::core::{FrameId, FramedPose, Point2D, Pose2D, TransformTree, Velocity};
pub use crate::error::{MargaError, Result};
pub use crate::grid::{CellState, CostmapView, GridCoord, OccupancyGrid};
pub use crate::path::{Waypoint, WaypointPath};
pub use crate::search::{LatticePlanner, SearchConfig, SearchRequest, SearchResult};
