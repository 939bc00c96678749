//! Splices a found detour into the base waypoint path.
//!
//! The merged path keeps the base waypoints up to the detour start, carries
//! the detour segment converted into the base path's frame with a velocity
//! ramp, and resumes the base path past the rejoin waypoint. Waypoint order
//! is preserved throughout; only indices are reassigned.

use tracing::warn;

use crate::core::Pose2D;
use crate::path::{Waypoint, WaypointPath};

/// Merge parameters, taken from configuration.
#[derive(Clone, Copy, Debug)]
pub struct MergeParams {
    /// Cruise velocity for the detour segment (m/s).
    pub avoid_velocity: f32,
    /// Velocity at the start of the detour segment (m/s).
    pub avoid_start_velocity: f32,
    /// Maximum distance between the detour's end and the rejoin waypoint (m).
    pub rejoin_tolerance: f32,
}

/// A merged avoidance path.
#[derive(Clone, Debug)]
pub struct MergedPath {
    /// Full path: base prefix, detour, base suffix, re-indexed from zero.
    pub path: WaypointPath,
    /// Index of the first waypoint after the detour segment; once the
    /// vehicle's closest waypoint reaches it the avoidance is complete.
    pub end_of_avoid_index: usize,
}

/// Merge `detour` (in the costmap's frame) into `base`.
///
/// Returns `None` when the detour is unusable — empty, aimed past the end of
/// the base path, or ending too far from the rejoin waypoint — which the
/// orchestrator treats exactly like a failed search.
pub fn merge_avoid_path(
    base: &WaypointPath,
    detour: &WaypointPath,
    costmap_to_base: Pose2D,
    closest_index: usize,
    rejoin_index: usize,
    params: &MergeParams,
) -> Option<MergedPath> {
    if detour.is_empty() {
        warn!("detour path is empty, cannot merge");
        return None;
    }
    let rejoin = match base.get(rejoin_index) {
        Some(wp) => wp,
        None => {
            warn!(rejoin_index, "rejoin index outside base path, cannot merge");
            return None;
        }
    };

    // Convert the detour into the base path's frame.
    let detour_poses: Vec<Pose2D> = detour
        .waypoints
        .iter()
        .map(|wp| costmap_to_base.compose(wp.pose))
        .collect();

    let rejoin_gap = detour_poses
        .last()
        .map(|p| p.distance(rejoin.pose))
        .unwrap_or(f32::MAX);
    if rejoin_gap > params.rejoin_tolerance {
        warn!(
            rejoin_gap,
            tolerance = params.rejoin_tolerance,
            "detour does not reach the base path, cannot merge"
        );
        return None;
    }

    let closest_index = closest_index.min(base.len() - 1);
    let mut waypoints: Vec<Waypoint> = Vec::with_capacity(base.len() + detour_poses.len());

    // Base prefix up to the detour start, unchanged.
    waypoints.extend_from_slice(&base.waypoints[..closest_index]);

    // Detour segment: velocities ramp from the start velocity up to cruise.
    let n = detour_poses.len();
    for (i, pose) in detour_poses.into_iter().enumerate() {
        let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 1.0 };
        let velocity =
            params.avoid_start_velocity + (params.avoid_velocity - params.avoid_start_velocity) * t;
        waypoints.push(Waypoint::new(pose, velocity, 0));
    }
    let end_of_avoid_index = waypoints.len();

    // Base suffix, resuming past the rejoin waypoint.
    if rejoin_index + 1 < base.len() {
        waypoints.extend_from_slice(&base.waypoints[rejoin_index + 1..]);
    }

    let mut path = WaypointPath::new(base.frame.clone(), waypoints);
    path.reindex();

    Some(MergedPath {
        path,
        end_of_avoid_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> MergeParams {
        MergeParams {
            avoid_velocity: 3.0,
            avoid_start_velocity: 1.0,
            rejoin_tolerance: 1.0,
        }
    }

    fn base_path() -> WaypointPath {
        WaypointPath::from_poses(
            "map",
            (0..20).map(|i| Pose2D::new(i as f32, 0.0, 0.0)),
            5.0,
        )
    }

    /// A detour from x=3 that bulges to y=2 and comes back down at x=10.
    fn detour() -> WaypointPath {
        let poses = [
            Pose2D::new(3.0, 0.0, 0.5),
            Pose2D::new(5.0, 2.0, 0.0),
            Pose2D::new(8.0, 2.0, -0.5),
            Pose2D::new(10.0, 0.2, 0.0),
        ];
        WaypointPath::from_poses("costmap", poses, 0.0)
    }

    #[test]
    fn test_merge_splices_prefix_detour_suffix() {
        let base = base_path();
        let merged =
            merge_avoid_path(&base, &detour(), Pose2D::identity(), 3, 10, &params()).unwrap();

        // 3 prefix + 4 detour + 9 suffix (indices 11..=19).
        assert_eq!(merged.path.len(), 16);
        assert_eq!(merged.end_of_avoid_index, 7);

        // Prefix untouched, suffix resumes past the rejoin waypoint.
        assert_eq!(merged.path.waypoints[0].pose.x, 0.0);
        assert_eq!(merged.path.waypoints[2].velocity, 5.0);
        assert_eq!(merged.path.waypoints[7].pose.x, 11.0);
        assert_eq!(merged.path.waypoints[15].pose.x, 19.0);

        // Indices strictly increasing after the reindex.
        for pair in merged.path.waypoints.windows(2) {
            assert!(pair[1].index > pair[0].index);
        }
    }

    #[test]
    fn test_detour_velocity_ramp() {
        let base = base_path();
        let merged =
            merge_avoid_path(&base, &detour(), Pose2D::identity(), 3, 10, &params()).unwrap();

        let vs: Vec<f32> = merged.path.waypoints[3..7].iter().map(|w| w.velocity).collect();
        assert_relative_eq!(vs[0], 1.0);
        assert_relative_eq!(*vs.last().unwrap(), 3.0);
        for pair in vs.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_detour_converted_into_base_frame() {
        let base = base_path();
        // Costmap frame sits 1m left of the map frame.
        let costmap_to_base = Pose2D::new(0.0, -1.0, 0.0);
        let shifted = WaypointPath::from_poses(
            "costmap",
            detour().waypoints.iter().map(|w| {
                Pose2D::new(w.pose.x, w.pose.y + 1.0, w.pose.theta)
            }),
            0.0,
        );

        let merged =
            merge_avoid_path(&base, &shifted, costmap_to_base, 3, 10, &params()).unwrap();
        assert_relative_eq!(merged.path.waypoints[4].pose.y, 2.0, epsilon = 1e-5);
        assert_eq!(merged.path.frame, base.frame);
    }

    #[test]
    fn test_rejoin_too_far_fails() {
        let base = base_path();
        let short = WaypointPath::from_poses(
            "costmap",
            [Pose2D::new(3.0, 0.0, 0.0), Pose2D::new(5.0, 3.0, 0.0)],
            0.0,
        );
        assert!(merge_avoid_path(&base, &short, Pose2D::identity(), 3, 10, &params()).is_none());
    }

    #[test]
    fn test_empty_detour_and_bad_rejoin_fail() {
        let base = base_path();
        let empty = WaypointPath::new("costmap", vec![]);
        assert!(merge_avoid_path(&base, &empty, Pose2D::identity(), 3, 10, &params()).is_none());
        assert!(
            merge_avoid_path(&base, &detour(), Pose2D::identity(), 3, 99, &params()).is_none()
        );
    }
}
