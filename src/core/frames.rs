//! Coordinate frame tags and rigid-transform lookup.
//!
//! A pose is only comparable to a grid or another pose when both are
//! expressed in the same frame, so poses crossing module boundaries carry a
//! [`FrameId`]. The [`TransformTree`] resolves the rigid transform between
//! two named frames as a pure lookup; callers query it fresh each time a
//! conversion is needed instead of caching transforms implicitly.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use super::pose::Pose2D;

/// Name of a coordinate frame (e.g. "map", "velodyne", "costmap").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A pose tagged with the frame it is expressed in.
#[derive(Clone, Debug, PartialEq)]
pub struct FramedPose {
    pub pose: Pose2D,
    pub frame: FrameId,
}

impl FramedPose {
    pub fn new(pose: Pose2D, frame: impl Into<FrameId>) -> Self {
        Self {
            pose,
            frame: frame.into(),
        }
    }

    /// Express this pose in `target`, producing a new value.
    pub fn in_frame(&self, target: &FrameId, tree: &TransformTree) -> Result<FramedPose, TransformError> {
        let transform = tree.lookup(&self.frame, target)?;
        Ok(FramedPose {
            pose: transform.compose(self.pose),
            frame: target.clone(),
        })
    }
}

/// Transform lookup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("no transform from '{from}' to '{to}'")]
    Unavailable { from: FrameId, to: FrameId },
}

/// Registry of rigid transforms between named frames.
///
/// Edges are registered directionally (`set(from, to, t)` means
/// `p_to = t ∘ p_from`) and resolved in either direction, chaining through
/// intermediate frames when no direct edge exists.
#[derive(Debug, Default)]
pub struct TransformTree {
    edges: HashMap<FrameId, Vec<(FrameId, Pose2D)>>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the transform mapping points in `from` into `to`.
    ///
    /// The reverse direction is derived automatically.
    pub fn set(&mut self, from: impl Into<FrameId>, to: impl Into<FrameId>, transform: Pose2D) {
        let from = from.into();
        let to = to.into();
        self.edges
            .entry(from.clone())
            .or_default()
            .push((to.clone(), transform));
        self.edges
            .entry(to)
            .or_default()
            .push((from, transform.inverse()));
    }

    /// Resolve the transform mapping points expressed in `from` into `to`.
    pub fn lookup(&self, from: &FrameId, to: &FrameId) -> Result<Pose2D, TransformError> {
        if from == to {
            return Ok(Pose2D::identity());
        }

        // BFS over registered edges; frame graphs are tiny.
        let mut queue = VecDeque::new();
        let mut visited: HashMap<&FrameId, Pose2D> = HashMap::new();
        queue.push_back(from);
        visited.insert(from, Pose2D::identity());

        while let Some(frame) = queue.pop_front() {
            let accumulated = visited[frame];
            if let Some(neighbors) = self.edges.get(frame) {
                for (next, edge) in neighbors {
                    if visited.contains_key(next) {
                        continue;
                    }
                    let chained = edge.compose(accumulated);
                    if next == to {
                        return Ok(chained);
                    }
                    visited.insert(next, chained);
                    queue.push_back(next);
                }
            }
        }

        Err(TransformError::Unavailable {
            from: from.clone(),
            to: to.clone(),
        })
    }
}
