//! Avoidance orchestrator scenario tests.
//!
//! Drives a real orchestrator (background search thread included) through
//! synthetic scenarios over a straight base path with an obstacle block in
//! the costmap:
//!
//! | Scenario | Setup | Expectation |
//! |----------|-------|-------------|
//! | A | obstacle with clear space around it | Avoiding, merged detour rejoins base |
//! | B | corridor fully walled off | holds in Stopping, path ends pre-obstacle |
//! | C | obstacle clears while Planning | Relaying, stale result discarded |
//! | D | avoidance disabled | Relaying forever, no search launched |
//! | E | replan interval elapses while Avoiding | fresh search, old path stays published |
//!
//! Ticks are driven manually so state can be asserted between cycles; the
//! search still runs on its own thread exactly as in production.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use marga_nav::avoid::LatestInputs;
use marga_nav::grid::costs;
use marga_nav::{
    AvoidOrchestrator, AvoidState, FramedPose, MargaConfig, OccupancyGrid, Pose2D, TransformTree,
    Velocity, WaypointPath,
};

const OBSTACLE_INDEX: usize = 20;

struct Harness {
    inputs: Arc<LatestInputs>,
    orchestrator: AvoidOrchestrator,
    rx: Receiver<WaypointPath>,
}

fn test_config() -> MargaConfig {
    let mut config = MargaConfig::default();
    config.avoid.search_waypoints_size = 10;
    config.avoid.search_waypoints_delta = 2;
    config.avoid.avoid_waypoints_velocity = 3.0;
    config.avoid.avoid_start_velocity = 1.0;
    config.avoid.replan_interval_secs = 10.0;
    config.search.theta_bins = 16;
    config.search.turning_radius = 1.0;
    config.search.arc_length = 0.6;
    config.search.vehicle_radius = 0.4;
    config.search.goal_tolerance_m = 0.5;
    config.search.goal_tolerance_rad = 0.6;
    config.search.time_budget_ms = 2000;
    config
}

/// 50-waypoint straight base path in "map"; costmap frame offset by 10m in Y
/// so the merge exercises a real frame conversion. `blocked` rectangles are
/// in costmap cell coordinates (0.5m cells, corridor center at cell y = 20).
fn harness(config: MargaConfig, blocked: &[(i32, i32, i32, i32)]) -> Harness {
    let base_path =
        WaypointPath::from_poses("map", (0..50).map(|i| Pose2D::new(i as f32, 0.0, 0.0)), 5.0);

    let mut transforms = TransformTree::new();
    transforms.set("map", "costmap", Pose2D::new(0.0, 10.0, 0.0));

    let mut costmap = OccupancyGrid::empty("costmap", Pose2D::identity(), 0.5, 100, 40).unwrap();
    for &(x0, y0, x1, y1) in blocked {
        costmap.fill_rect(x0, y0, x1, y1, costs::LETHAL);
    }

    let inputs = LatestInputs::new();
    inputs.set_base_path(base_path).unwrap();
    inputs.set_costmap(costmap);
    inputs.set_velocity(Velocity::new(1.0, 0.0));
    inputs.set_pose(FramedPose::new(Pose2D::new(10.0, 0.0, 0.0), "map"));
    inputs.set_closest_index(10);

    let (tx, rx) = crossbeam_channel::unbounded();
    let orchestrator = AvoidOrchestrator::new(
        config,
        Arc::clone(&inputs),
        Arc::new(transforms),
        tx,
        Arc::new(AtomicBool::new(false)),
    );

    Harness {
        inputs,
        orchestrator,
        rx,
    }
}

/// The obstacle block used by the nominal scenarios: covers base waypoints
/// 19-21 with free space on both sides of the corridor.
fn obstacle_block() -> (i32, i32, i32, i32) {
    (38, 17, 42, 23)
}

impl Harness {
    /// Tick until the predicate holds, failing after `timeout`.
    fn tick_until(&mut self, timeout: Duration, pred: impl Fn(&AvoidOrchestrator) -> bool) {
        let deadline = Instant::now() + timeout;
        loop {
            self.orchestrator.tick();
            if pred(&self.orchestrator) {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "condition not reached in {timeout:?}, state is {}",
                self.orchestrator.state().name()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Latest published path, draining the channel and checking that no
    /// empty path was ever published along the way.
    fn latest_published(&self) -> WaypointPath {
        let mut latest = None;
        for path in self.rx.try_iter() {
            assert!(!path.is_empty(), "published an empty path");
            latest = Some(path);
        }
        latest.expect("orchestrator should have published")
    }

    /// Every path published so far must be non-empty.
    fn assert_no_empty_publishes(&self) {
        for path in self.rx.try_iter() {
            assert!(!path.is_empty(), "published an empty path");
        }
    }
}

#[test]
fn scenario_a_avoids_and_rejoins() {
    let mut h = harness(test_config(), &[obstacle_block()]);
    h.inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    h.tick_until(Duration::from_secs(5), |o| o.state() == AvoidState::Avoiding);

    let published = h.latest_published();
    assert!(!published.is_empty());

    // The detour deviates from the straight base path...
    let max_dev = published
        .waypoints
        .iter()
        .map(|w| w.pose.y.abs())
        .fold(0.0f32, f32::max);
    assert!(max_dev > 0.8, "expected a lateral detour, got {max_dev}");

    // ...and rejoins it: the window runs through to the base path's end.
    let last = published.waypoints.last().unwrap();
    assert!(last.pose.x > 45.0);
    assert!(last.pose.y.abs() < 0.1);

    // Passing the end of the detour drops back to relaying even while the
    // obstacle index is still being reported.
    h.inputs
        .set_pose(FramedPose::new(Pose2D::new(26.0, 0.0, 0.0), "map"));
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.state(), AvoidState::Relaying);

    h.assert_no_empty_publishes();
}

#[test]
fn scenario_b_blocked_corridor_holds_short_of_obstacle() {
    // Wall across the entire corridor: no detour exists.
    let mut h = harness(test_config(), &[(38, 0, 42, 39)]);
    h.inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    // The search must actually launch, fail to find a path, and return the
    // machine to Stopping.
    h.tick_until(Duration::from_secs(5), |o| o.search_in_flight());
    h.tick_until(Duration::from_secs(5), |o| {
        o.state() == AvoidState::Stopping && !o.search_in_flight()
    });

    // Keep ticking: with the replan interval pending, it stays held.
    for _ in 0..10 {
        h.orchestrator.tick();
        assert_ne!(h.orchestrator.state(), AvoidState::Avoiding);
    }

    // Published path ends at the pre-obstacle waypoint.
    let published = h.latest_published();
    let last = published.waypoints.last().unwrap();
    assert_eq!(last.pose.x, (OBSTACLE_INDEX - 1) as f32);

    h.assert_no_empty_publishes();
}

#[test]
fn scenario_c_obstacle_clears_while_planning() {
    let mut h = harness(test_config(), &[obstacle_block()]);
    h.inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    h.tick_until(Duration::from_secs(5), |o| {
        o.state() == AvoidState::Planning
    });

    // Obstacle clears while the search is (or may still be) in flight.
    h.inputs.set_obstacle_index(None);
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.state(), AvoidState::Relaying);

    // Whatever the search returns is discarded without a state change.
    h.tick_until(Duration::from_secs(5), |o| !o.search_in_flight());
    for _ in 0..5 {
        h.orchestrator.tick();
        assert_eq!(h.orchestrator.state(), AvoidState::Relaying);
    }

    // Published path is the plain base window again, not a stale detour.
    let published = h.latest_published();
    assert!(published.waypoints.iter().all(|w| w.pose.y == 0.0));
    assert_eq!(published.waypoints[0].pose.x, 10.0);

    h.assert_no_empty_publishes();
}

#[test]
fn scenario_d_disabled_avoidance_never_searches() {
    let mut config = test_config();
    config.avoid.enable_avoidance = false;
    let mut h = harness(config, &[obstacle_block()]);
    h.inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    for _ in 0..20 {
        h.orchestrator.tick();
        assert_eq!(h.orchestrator.state(), AvoidState::Relaying);
        assert!(!h.orchestrator.search_in_flight());
    }

    // Degraded to a pass-through relay: the full base window is published.
    let published = h.latest_published();
    assert!(published.waypoints.iter().all(|w| w.pose.y == 0.0));
    assert!(published.waypoints.last().unwrap().pose.x > 45.0);

    h.assert_no_empty_publishes();
}

#[test]
fn transform_miss_defers_planning_and_keeps_publishing() {
    // Same scenario as A, but the map -> costmap transform is never
    // registered: planning is skipped tick after tick while the vehicle
    // keeps receiving a valid held path.
    let base_path =
        WaypointPath::from_poses("map", (0..50).map(|i| Pose2D::new(i as f32, 0.0, 0.0)), 5.0);
    let costmap = OccupancyGrid::empty("costmap", Pose2D::identity(), 0.5, 100, 40).unwrap();

    let inputs = LatestInputs::new();
    inputs.set_base_path(base_path).unwrap();
    inputs.set_costmap(costmap);
    inputs.set_velocity(Velocity::new(1.0, 0.0));
    inputs.set_pose(FramedPose::new(Pose2D::new(10.0, 0.0, 0.0), "map"));
    inputs.set_closest_index(10);
    inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut orchestrator = AvoidOrchestrator::new(
        test_config(),
        Arc::clone(&inputs),
        Arc::new(TransformTree::new()),
        tx,
        Arc::new(AtomicBool::new(false)),
    );

    for _ in 0..10 {
        orchestrator.tick();
        assert_eq!(orchestrator.state(), AvoidState::Stopping);
        assert!(!orchestrator.search_in_flight());
    }

    let mut published = 0;
    for path in rx.try_iter() {
        assert!(!path.is_empty());
        assert_eq!(
            path.waypoints.last().unwrap().pose.x,
            (OBSTACLE_INDEX - 1) as f32
        );
        published += 1;
    }
    assert_eq!(published, 10, "every tick must publish");
}

#[test]
fn scenario_e_replan_keeps_previous_path_until_fresh_one() {
    let mut config = test_config();
    config.avoid.replan_interval_secs = 0.05;
    let mut h = harness(config, &[obstacle_block()]);
    h.inputs.set_obstacle_index(Some(OBSTACLE_INDEX));

    h.tick_until(Duration::from_secs(5), |o| o.state() == AvoidState::Avoiding);

    // Let the replan interval elapse with the obstacle still present.
    thread::sleep(Duration::from_millis(80));
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.state(), AvoidState::Planning);
    assert!(h.orchestrator.search_in_flight());

    // The previously merged path remains published while replanning.
    let published = h.latest_published();
    let max_dev = published
        .waypoints
        .iter()
        .map(|w| w.pose.y.abs())
        .fold(0.0f32, f32::max);
    assert!(max_dev > 0.8, "held path should still be the detour");

    // The fresh search completes and avoidance resumes.
    h.tick_until(Duration::from_secs(5), |o| o.state() == AvoidState::Avoiding);

    h.assert_no_empty_publishes();
}
