//! Configuration loading for marga-nav

use std::path::Path;

use serde::Deserialize;

use crate::error::{MargaError, Result};
use crate::search::SearchConfig;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, Default)]
pub struct MargaConfig {
    #[serde(default)]
    pub avoid: AvoidConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Avoidance orchestrator settings
#[derive(Clone, Debug, Deserialize)]
pub struct AvoidConfig {
    /// Whether obstacle avoidance is active; when false the node is a
    /// pass-through relay (default: true)
    #[serde(default = "default_enable_avoidance")]
    pub enable_avoidance: bool,

    /// Number of waypoints in the published window (default: 100)
    #[serde(default = "default_safety_waypoints_size")]
    pub safety_waypoints_size: usize,

    /// State machine tick rate in Hz (default: 10.0)
    #[serde(default = "default_update_rate_hz")]
    pub update_rate_hz: f32,

    /// How far past the obstacle goal candidates may reach, in waypoints
    /// (default: 50)
    #[serde(default = "default_search_waypoints_size")]
    pub search_waypoints_size: usize,

    /// Spacing between successive goal candidates, in waypoints (default: 2)
    #[serde(default = "default_search_waypoints_delta")]
    pub search_waypoints_delta: usize,

    /// Cruise velocity on the detour segment in m/s (default: 2.8)
    #[serde(default = "default_avoid_waypoints_velocity")]
    pub avoid_waypoints_velocity: f32,

    /// Velocity at the start of the detour segment in m/s (default: 1.4)
    #[serde(default = "default_avoid_start_velocity")]
    pub avoid_start_velocity: f32,

    /// Minimum interval between avoidance searches in seconds (default: 2.0)
    #[serde(default = "default_replan_interval_secs")]
    pub replan_interval_secs: f32,

    /// Maximum gap between the detour's end and the base path at the rejoin
    /// waypoint, in meters (default: 1.0)
    #[serde(default = "default_rejoin_tolerance")]
    pub rejoin_tolerance: f32,
}

impl Default for AvoidConfig {
    fn default() -> Self {
        Self {
            enable_avoidance: default_enable_avoidance(),
            safety_waypoints_size: default_safety_waypoints_size(),
            update_rate_hz: default_update_rate_hz(),
            search_waypoints_size: default_search_waypoints_size(),
            search_waypoints_delta: default_search_waypoints_delta(),
            avoid_waypoints_velocity: default_avoid_waypoints_velocity(),
            avoid_start_velocity: default_avoid_start_velocity(),
            replan_interval_secs: default_replan_interval_secs(),
            rejoin_tolerance: default_rejoin_tolerance(),
        }
    }
}

// Default value functions
fn default_enable_avoidance() -> bool {
    true
}
fn default_safety_waypoints_size() -> usize {
    100
}
fn default_update_rate_hz() -> f32 {
    10.0
}
fn default_search_waypoints_size() -> usize {
    50
}
fn default_search_waypoints_delta() -> usize {
    2
}
fn default_avoid_waypoints_velocity() -> f32 {
    2.8
}
fn default_avoid_start_velocity() -> f32 {
    1.4
}
fn default_replan_interval_secs() -> f32 {
    2.0
}
fn default_rejoin_tolerance() -> f32 {
    1.0
}

impl MargaConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("failed to read config file: {e}")))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the node cannot run with. These are fatal at
    /// startup, not recoverable at runtime.
    pub fn validate(&self) -> Result<()> {
        fn fail(msg: String) -> Result<()> {
            Err(MargaError::Config(msg))
        }

        if self.avoid.update_rate_hz <= 0.0 {
            return fail(format!(
                "update_rate_hz must be positive, got {}",
                self.avoid.update_rate_hz
            ));
        }
        if self.avoid.safety_waypoints_size == 0 {
            return fail("safety_waypoints_size must be non-zero".to_string());
        }
        if self.avoid.search_waypoints_delta == 0 {
            return fail("search_waypoints_delta must be non-zero".to_string());
        }
        if self.avoid.replan_interval_secs < 0.0 {
            return fail(format!(
                "replan_interval_secs must not be negative, got {}",
                self.avoid.replan_interval_secs
            ));
        }
        if self.search.lattice_resolution <= 0.0 {
            return fail(format!(
                "search.lattice_resolution must be positive, got {}",
                self.search.lattice_resolution
            ));
        }
        if self.search.theta_bins == 0 {
            return fail("search.theta_bins must be non-zero".to_string());
        }
        if self.search.turning_radius <= 0.0 {
            return fail(format!(
                "search.turning_radius must be positive, got {}",
                self.search.turning_radius
            ));
        }
        if self.search.arc_length <= 0.0 {
            return fail(format!(
                "search.arc_length must be positive, got {}",
                self.search.arc_length
            ));
        }
        if self.search.max_expansions == 0 {
            return fail("search.max_expansions must be non-zero".to_string());
        }
        Ok(())
    }
}
