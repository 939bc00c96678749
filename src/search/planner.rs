//! A* search over the pose lattice.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use crate::core::math::angle_diff;
use crate::core::Pose2D;
use crate::grid::{disc_template, CostmapView, GridCoord};
use crate::path::{Waypoint, WaypointPath};

use super::lattice::{heading_bin, motion_primitives, MotionPrimitive};
use super::{SearchConfig, SearchRequest, SearchResult};

/// Discrete lattice state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeKey {
    x: i32,
    y: i32,
    heading: u16,
}

/// Open-set entry ordered by f-score.
#[derive(Clone, Debug)]
struct SearchNode {
    key: NodeKey,
    f_score: f32,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (lower f_score = higher priority)
        other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pose-lattice A* planner.
///
/// The planner is stateless between searches; it can be shared freely and a
/// given [`SearchRequest`] always reproduces the same [`SearchResult`].
pub struct LatticePlanner {
    config: SearchConfig,
    primitives: Vec<MotionPrimitive>,
}

impl LatticePlanner {
    pub fn new(config: SearchConfig) -> Self {
        let primitives = motion_primitives(&config);
        Self { config, primitives }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run one search under the configured expansion and time budget.
    pub fn search(&self, request: &SearchRequest) -> SearchResult {
        self.search_until(request, Instant::now() + self.config.time_budget())
    }

    /// Run one search that must finish before `deadline`, whichever of the
    /// deadline and the expansion budget comes first.
    pub fn search_until(&self, request: &SearchRequest, deadline: Instant) -> SearchResult {
        let view = CostmapView::new(&request.costmap, self.config.obstacle_threshold);
        let template = disc_template(self.config.vehicle_radius, request.costmap.resolution());

        if !self.pose_free(&view, &template, request.start) {
            tracing::warn!("search start pose is in collision or outside the grid");
            return SearchResult::NoPath;
        }
        if !self.pose_free(&view, &template, request.goal) {
            return SearchResult::NoPath;
        }

        let start_key = self.discretize(request.start);

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<NodeKey, f32> = HashMap::new();
        let mut parent: HashMap<NodeKey, NodeKey> = HashMap::new();
        let mut pose_of: HashMap<NodeKey, Pose2D> = HashMap::new();
        let mut closed: HashSet<NodeKey> = HashSet::new();

        g_score.insert(start_key, 0.0);
        pose_of.insert(start_key, request.start);
        open.push(SearchNode {
            key: start_key,
            f_score: self.heuristic(request.start, request.goal),
        });

        let mut expansions = 0usize;

        while let Some(node) = open.pop() {
            expansions += 1;
            if expansions > self.config.max_expansions {
                tracing::warn!(expansions, "search exceeded expansion budget");
                return SearchResult::Timeout;
            }
            if expansions % 256 == 0 && Instant::now() >= deadline {
                tracing::warn!(expansions, "search exceeded time budget");
                return SearchResult::Timeout;
            }

            if closed.contains(&node.key) {
                continue;
            }
            closed.insert(node.key);

            let pose = pose_of[&node.key];
            if self.at_goal(pose, request.goal) {
                let path = self.reconstruct(&parent, &pose_of, node.key, request);
                return SearchResult::Found(path);
            }

            let current_g = g_score[&node.key];
            for primitive in &self.primitives {
                let Some(successor) = self.apply_primitive(&view, &template, pose, primitive)
                else {
                    continue;
                };

                let key = self.discretize(successor);
                if closed.contains(&key) {
                    continue;
                }

                let tentative_g = current_g + primitive.cost;
                let existing = g_score.get(&key).copied().unwrap_or(f32::MAX);
                if tentative_g < existing {
                    g_score.insert(key, tentative_g);
                    parent.insert(key, node.key);
                    pose_of.insert(key, successor);
                    open.push(SearchNode {
                        key,
                        f_score: tentative_g + self.heuristic(successor, request.goal),
                    });
                }
            }
        }

        SearchResult::NoPath
    }

    /// Apply a motion primitive, checking the swept path for collisions at
    /// sub-cell spacing. Returns the successor pose, or `None` when any
    /// sample is blocked or leaves the grid.
    fn apply_primitive(
        &self,
        view: &CostmapView<'_>,
        template: &[GridCoord],
        from: Pose2D,
        primitive: &MotionPrimitive,
    ) -> Option<Pose2D> {
        let step = view.grid().resolution() * 0.5;
        let samples = (primitive.length / step).ceil().max(1.0) as usize;

        let mut successor = from;
        for i in 1..=samples {
            let fraction = i as f32 / samples as f32;
            successor = from.compose(primitive.partial_delta(fraction));
            if !self.pose_free(view, template, successor) {
                return None;
            }
        }
        Some(successor)
    }

    fn pose_free(&self, view: &CostmapView<'_>, template: &[GridCoord], pose: Pose2D) -> bool {
        let cell = view.point_to_grid(pose.position());
        view.footprint_free(cell, template)
    }

    fn discretize(&self, pose: Pose2D) -> NodeKey {
        let res = self.config.lattice_resolution;
        NodeKey {
            x: (pose.x / res).floor() as i32,
            y: (pose.y / res).floor() as i32,
            heading: heading_bin(pose.theta, self.config.theta_bins),
        }
    }

    fn at_goal(&self, pose: Pose2D, goal: Pose2D) -> bool {
        pose.distance(goal) <= self.config.goal_tolerance_m
            && angle_diff(pose.theta, goal.theta).abs() <= self.config.goal_tolerance_rad
    }

    /// Admissible lower bound: the straight-line distance, or the arc length
    /// needed to rotate the residual heading error at the minimum turning
    /// radius, whichever is larger.
    fn heuristic(&self, pose: Pose2D, goal: Pose2D) -> f32 {
        let distance = pose.distance(goal);
        let rotation = self.config.turning_radius * angle_diff(pose.theta, goal.theta).abs();
        distance.max(rotation)
    }

    /// Backtrack parent links into a waypoint path in the costmap's frame,
    /// ordinal indices assigned in traversal order. Velocities are assigned
    /// later by the merge step.
    fn reconstruct(
        &self,
        parent: &HashMap<NodeKey, NodeKey>,
        pose_of: &HashMap<NodeKey, Pose2D>,
        goal_key: NodeKey,
        request: &SearchRequest,
    ) -> WaypointPath {
        let mut poses = Vec::new();
        let mut current = goal_key;
        loop {
            poses.push(pose_of[&current]);
            match parent.get(&current) {
                Some(&p) => current = p,
                None => break,
            }
        }
        poses.reverse();

        let waypoints = poses
            .into_iter()
            .enumerate()
            .map(|(i, pose)| Waypoint::new(pose, 0.0, i as u32))
            .collect();
        WaypointPath::new(request.costmap.frame().clone(), waypoints)
    }
}
