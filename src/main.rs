//! marga-nav - Local obstacle-avoidance waypoint planner.
//!
//! The binary drives the avoidance node through a built-in synthetic
//! scenario: a straight base path with an obstacle block in the costmap.
//! A simple kinematic vehicle follows whatever the node publishes, so the
//! full relay -> stop -> plan -> avoid -> rejoin cycle can be watched from
//! the log without any transport or hardware attached.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use marga_nav::avoid::LatestInputs;
use marga_nav::{
    AvoidOrchestrator, FramedPose, MargaConfig, OccupancyGrid, Pose2D, TransformTree, Velocity,
    WaypointPath,
};

#[derive(Parser, Debug)]
#[command(name = "marga-nav", about = "Local obstacle-avoidance waypoint planner")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of simulation steps
    #[arg(long, default_value_t = 400)]
    steps: usize,

    /// Base-path waypoint index blocked by the simulated obstacle
    #[arg(long, default_value_t = 30)]
    obstacle_at: usize,
}

fn main() -> marga_nav::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marga_nav=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("loading configuration from {:?}", path);
            MargaConfig::load(path)?
        }
        None => {
            info!("using default configuration");
            MargaConfig::default()
        }
    };
    // The synthetic scenario is small; tighten the search to its scale.
    config.search.turning_radius = config.search.turning_radius.min(2.0);
    config.search.vehicle_radius = config.search.vehicle_radius.min(0.5);
    config.search.arc_length = config.search.arc_length.min(0.8);
    config.search.goal_tolerance_m = config.search.goal_tolerance_m.max(0.8);
    config.validate()?;

    info!("marga-nav v{}", env!("CARGO_PKG_VERSION"));

    // Scenario: 100 waypoints at 1m spacing along X in the map frame, with
    // the costmap frame shifted so frame conversion is actually exercised.
    let base_path = WaypointPath::from_poses(
        "map",
        (0..100).map(|i| Pose2D::new(i as f32, 0.0, 0.0)),
        5.0,
    );

    let mut transforms = TransformTree::new();
    transforms.set("map", "costmap", Pose2D::new(0.0, 10.0, 0.0));

    // 60m x 20m costmap at 0.5m resolution covering the path corridor.
    let mut costmap = OccupancyGrid::empty("costmap", Pose2D::identity(), 0.5, 120, 40)?;
    let obstacle_x = args.obstacle_at as f32;
    let (cx, cy) = ((obstacle_x / 0.5) as i32, (10.0 / 0.5) as i32);
    costmap.fill_rect(cx - 3, cy - 4, cx + 3, cy + 4, marga_nav::grid::costs::LETHAL);

    let inputs = LatestInputs::new();
    inputs.set_base_path(base_path.clone())?;
    inputs.set_costmap(costmap);
    inputs.set_velocity(Velocity::new(2.0, 0.0));
    inputs.set_pose(FramedPose::new(Pose2D::identity(), "map"));
    inputs.set_closest_index(0);

    let (path_tx, path_rx) = crossbeam_channel::unbounded();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut orchestrator = AvoidOrchestrator::new(
        config,
        Arc::clone(&inputs),
        Arc::new(transforms),
        path_tx,
        Arc::clone(&shutdown),
    );
    let handle = thread::Builder::new()
        .name("avoidance".into())
        .spawn(move || orchestrator.run())
        .expect("failed to spawn avoidance thread");

    // Kinematic mock vehicle: each step it jumps to the next published
    // waypoint and reports its pose and closest base waypoint back.
    let mut pose = Pose2D::identity();
    let mut steps = 0;
    inputs.set_obstacle_index(Some(args.obstacle_at));
    info!(obstacle_at = args.obstacle_at, "simulated obstacle reported");

    while steps < args.steps {
        let published = match path_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(path) => path,
            Err(_) => {
                warn!("no published path within 2s, aborting");
                break;
            }
        };

        if let Some(next) = published.waypoints.get(1) {
            pose = next.pose;
        }
        inputs.set_pose(FramedPose::new(pose, "map"));
        let closest = base_path
            .closest_waypoint(pose.position())
            .unwrap_or(0);
        inputs.set_closest_index(closest);

        // Perception stops reporting the obstacle once it is behind us.
        if closest > args.obstacle_at {
            inputs.set_obstacle_index(None);
        }

        if closest + 2 >= base_path.len() {
            info!(steps, "vehicle reached the end of the base path");
            break;
        }
        steps += 1;
    }

    info!(
        final_x = pose.x,
        final_y = pose.y,
        "simulation finished, shutting down"
    );
    shutdown.store(true, Ordering::Release);
    if handle.join().is_err() {
        warn!("avoidance thread panicked");
    }

    Ok(())
}
