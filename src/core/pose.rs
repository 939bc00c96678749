//! 2D pose and point types for vehicle position and orientation.
//!
//! Coordinate convention follows ROS REP-103:
//! - X-forward, Y-left, Z-up (right-handed)
//! - Counter-clockwise positive rotation

use super::math::normalize_angle;

/// A 2D point in meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Point2D) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A 2D pose representing position and orientation.
///
/// Position in meters, heading in radians normalized to [-π, π),
/// counter-clockwise positive from the X-axis. Poses are immutable values;
/// every transformation produces a new pose.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose2D {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

impl Pose2D {
    /// Create a new pose. The heading is normalized to [-π, π).
    #[inline]
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    /// The identity pose (origin, facing along X).
    #[inline]
    pub const fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    /// Get the position as a point.
    #[inline]
    pub fn position(self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Euclidean distance between the positions of two poses.
    #[inline]
    pub fn distance(self, other: Pose2D) -> f32 {
        self.position().distance(other.position())
    }

    /// Transform a point from this pose's local frame to the parent frame.
    #[inline]
    pub fn transform_point(self, point: Point2D) -> Point2D {
        let (sin, cos) = self.theta.sin_cos();
        Point2D {
            x: self.x + point.x * cos - point.y * sin,
            y: self.y + point.x * sin + point.y * cos,
        }
    }

    /// Transform a point from the parent frame into this pose's local frame.
    #[inline]
    pub fn inverse_transform_point(self, point: Point2D) -> Point2D {
        let (sin, cos) = self.theta.sin_cos();
        let dx = point.x - self.x;
        let dy = point.y - self.y;
        Point2D {
            x: dx * cos + dy * sin,
            y: -dx * sin + dy * cos,
        }
    }

    /// Compose this pose with another: apply `other` in `self`'s frame.
    ///
    /// Treating poses as rigid transforms, this is `self * other`.
    #[inline]
    pub fn compose(self, other: Pose2D) -> Self {
        let pos = self.transform_point(other.position());
        Self::new(pos.x, pos.y, self.theta + other.theta)
    }

    /// The inverse transform: `pose.compose(pose.inverse()) ≈ identity`.
    #[inline]
    pub fn inverse(self) -> Self {
        let (sin, cos) = self.theta.sin_cos();
        Self::new(
            -self.x * cos - self.y * sin,
            self.x * sin - self.y * cos,
            -self.theta,
        )
    }
}

/// Vehicle velocity: linear speed plus angular rate. Frame-independent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// Linear speed in m/s (positive forward).
    pub linear: f32,
    /// Angular rate in rad/s (CCW positive).
    pub angular: f32,
}

impl Velocity {
    #[inline]
    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }
}
