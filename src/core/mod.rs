//! Core geometry types: 2D poses, frame tags, and rigid-transform lookup.

pub mod frames;
pub mod math;
pub mod pose;

pub use frames::{FrameId, FramedPose, TransformError, TransformTree};
pub use pose::{Point2D, Pose2D, Velocity};
