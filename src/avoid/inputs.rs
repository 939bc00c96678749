//! Latest-value store for asynchronous inbound updates.
//!
//! Each input has one slot that is overwritten whole on every update, so a
//! reader can never observe a half-updated value. The tick reads all slots
//! once into an [`InputSnapshot`] and works on that immutable set for the
//! rest of the cycle; updates arriving mid-tick are picked up next tick.

use std::sync::{Arc, RwLock};

use crate::core::{FramedPose, Velocity};
use crate::error::{MargaError, Result};
use crate::grid::OccupancyGrid;
use crate::path::WaypointPath;

/// One whole-value-replacement slot.
#[derive(Debug)]
struct Latest<T>(RwLock<Option<T>>);

impl<T: Clone> Latest<T> {
    fn new() -> Self {
        Self(RwLock::new(None))
    }

    fn store(&self, value: T) {
        if let Ok(mut guard) = self.0.write() {
            *guard = Some(value);
        }
    }

    fn load(&self) -> Option<T> {
        self.0.read().ok().and_then(|guard| guard.clone())
    }
}

/// Shared store of the latest known inputs.
///
/// Clones of the `Arc`-wrapped store are handed to whatever transport glue
/// receives the updates; setters never block the control loop and never run
/// planning logic inline.
#[derive(Debug)]
pub struct LatestInputs {
    pose: Latest<FramedPose>,
    velocity: Latest<Velocity>,
    base_path: Latest<Arc<WaypointPath>>,
    costmap: Latest<Arc<OccupancyGrid>>,
    closest_index: Latest<usize>,
    /// Inner `None` is the "no obstacle" sentinel; the slot itself starts
    /// empty but an obstacle report is not required for initialization.
    obstacle_index: Latest<Option<usize>>,
}

impl LatestInputs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pose: Latest::new(),
            velocity: Latest::new(),
            base_path: Latest::new(),
            costmap: Latest::new(),
            closest_index: Latest::new(),
            obstacle_index: Latest::new(),
        })
    }

    pub fn set_pose(&self, pose: FramedPose) {
        self.pose.store(pose);
    }

    pub fn set_velocity(&self, velocity: Velocity) {
        self.velocity.store(velocity);
    }

    /// Replace the base waypoint path. An empty path is malformed input and
    /// is rejected rather than stored.
    pub fn set_base_path(&self, path: WaypointPath) -> Result<()> {
        if path.is_empty() {
            return Err(MargaError::InvalidInput(
                "base waypoint path must not be empty".to_string(),
            ));
        }
        self.base_path.store(Arc::new(path));
        Ok(())
    }

    /// Replace the costmap. The grid was validated at construction; storing
    /// it as an `Arc` makes the per-tick snapshot O(1) and guarantees an
    /// in-flight search keeps reading the grid it started with.
    pub fn set_costmap(&self, grid: OccupancyGrid) {
        self.costmap.store(Arc::new(grid));
    }

    pub fn set_closest_index(&self, index: usize) {
        self.closest_index.store(index);
    }

    /// Report the obstacle waypoint index, or `None` when the obstacle has
    /// cleared.
    pub fn set_obstacle_index(&self, index: Option<usize>) {
        self.obstacle_index.store(index);
    }

    /// Read every slot once. Returns `None` until each required input has
    /// been received at least once.
    pub fn snapshot(&self) -> Option<InputSnapshot> {
        Some(InputSnapshot {
            pose: self.pose.load()?,
            velocity: self.velocity.load()?,
            base_path: self.base_path.load()?,
            costmap: self.costmap.load()?,
            closest_index: self.closest_index.load()?,
            obstacle_index: self.obstacle_index.load().flatten(),
        })
    }
}

/// Immutable working set for one tick.
#[derive(Clone, Debug)]
pub struct InputSnapshot {
    pub pose: FramedPose,
    pub velocity: Velocity,
    pub base_path: Arc<WaypointPath>,
    pub costmap: Arc<OccupancyGrid>,
    pub closest_index: usize,
    pub obstacle_index: Option<usize>,
}
