//! Waypoint path types.
//!
//! A waypoint is a pose with a target velocity and an ordinal index; a path
//! is an ordered sequence of waypoints tagged with the frame its poses are
//! expressed in. Order is the direction of travel and is never reordered by
//! any operation here — windows and merges only slice and splice.

use crate::core::{FrameId, Point2D, Pose2D};

/// A single waypoint along a path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub pose: Pose2D,
    /// Target linear velocity in m/s when tracking this waypoint.
    pub velocity: f32,
    /// Ordinal position along the owning path.
    pub index: u32,
}

impl Waypoint {
    pub fn new(pose: Pose2D, velocity: f32, index: u32) -> Self {
        Self {
            pose,
            velocity,
            index,
        }
    }
}

/// An ordered waypoint sequence in a named frame.
#[derive(Clone, Debug, PartialEq)]
pub struct WaypointPath {
    pub frame: FrameId,
    pub waypoints: Vec<Waypoint>,
}

impl WaypointPath {
    pub fn new(frame: impl Into<FrameId>, waypoints: Vec<Waypoint>) -> Self {
        Self {
            frame: frame.into(),
            waypoints,
        }
    }

    /// Build a path from poses, assigning a uniform velocity and sequential
    /// indices in traversal order.
    pub fn from_poses(
        frame: impl Into<FrameId>,
        poses: impl IntoIterator<Item = Pose2D>,
        velocity: f32,
    ) -> Self {
        let waypoints = poses
            .into_iter()
            .enumerate()
            .map(|(i, pose)| Waypoint::new(pose, velocity, i as u32))
            .collect();
        Self::new(frame, waypoints)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Index of the waypoint nearest to `point`. `None` on an empty path.
    pub fn closest_waypoint(&self, point: Point2D) -> Option<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = a.pose.position().distance(point);
                let db = b.pose.position().distance(point);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// Extract a window of at most `size` waypoints starting at `start`,
    /// re-indexed from zero. Always yields at least one waypoint when
    /// `start` is in range.
    pub fn window(&self, start: usize, size: usize) -> WaypointPath {
        let start = start.min(self.waypoints.len().saturating_sub(1));
        let end = (start + size.max(1)).min(self.waypoints.len());
        let mut windowed = WaypointPath::new(
            self.frame.clone(),
            self.waypoints[start..end].to_vec(),
        );
        windowed.reindex();
        windowed
    }

    /// Reassign sequential indices in traversal order.
    pub fn reindex(&mut self) {
        for (i, wp) in self.waypoints.iter_mut().enumerate() {
            wp.index = i as u32;
        }
    }
}
