//! Lattice discretization and arc motion primitives.
//!
//! Successor states are generated by driving a fixed arc length at one of
//! three curvatures (straight, full left, full right at the minimum turning
//! radius), forward and optionally in reverse. The pose delta of a partial
//! arc is exact under the unicycle model, which lets the collision check
//! sample the swept path at sub-cell spacing.

use std::f32::consts::PI;

use crate::core::Pose2D;

use super::SearchConfig;

/// One feasible motion: a constant-curvature arc.
#[derive(Clone, Copy, Debug)]
pub struct MotionPrimitive {
    /// Signed curvature in 1/m (0 for straight, positive turns left).
    pub curvature: f32,
    /// +1.0 forward, -1.0 reverse.
    pub direction: f32,
    /// Arc length in meters.
    pub length: f32,
    /// Traversal cost (length scaled by the reverse penalty when backing).
    pub cost: f32,
}

/// Pose delta, in the starting pose's frame, after driving `length` meters
/// along an arc of the given curvature and direction.
#[inline]
pub fn arc_delta(curvature: f32, direction: f32, length: f32) -> Pose2D {
    let dtheta = direction * curvature * length;
    if curvature == 0.0 {
        Pose2D::new(direction * length, 0.0, 0.0)
    } else {
        Pose2D::new(
            dtheta.sin() / curvature,
            (1.0 - dtheta.cos()) / curvature,
            dtheta,
        )
    }
}

impl MotionPrimitive {
    /// Pose delta for the full arc.
    #[inline]
    pub fn delta(&self) -> Pose2D {
        arc_delta(self.curvature, self.direction, self.length)
    }

    /// Pose delta for the arc truncated to `fraction` of its length.
    #[inline]
    pub fn partial_delta(&self, fraction: f32) -> Pose2D {
        arc_delta(self.curvature, self.direction, self.length * fraction)
    }
}

/// The motion set for a configuration: straight plus both full-lock arcs,
/// duplicated in reverse when enabled.
pub fn motion_primitives(config: &SearchConfig) -> Vec<MotionPrimitive> {
    let curvatures = [0.0, 1.0 / config.turning_radius, -1.0 / config.turning_radius];
    let mut primitives = Vec::with_capacity(if config.allow_reverse { 6 } else { 3 });

    for &curvature in &curvatures {
        primitives.push(MotionPrimitive {
            curvature,
            direction: 1.0,
            length: config.arc_length,
            cost: config.arc_length,
        });
    }
    if config.allow_reverse {
        for &curvature in &curvatures {
            primitives.push(MotionPrimitive {
                curvature,
                direction: -1.0,
                length: config.arc_length,
                cost: config.arc_length * config.reverse_penalty,
            });
        }
    }
    primitives
}

/// Discretize a heading into one of `bins` lattice bins.
#[inline]
pub fn heading_bin(theta: f32, bins: usize) -> u16 {
    let step = 2.0 * PI / bins as f32;
    let positive = theta.rem_euclid(2.0 * PI);
    ((positive / step).round() as usize % bins) as u16
}
