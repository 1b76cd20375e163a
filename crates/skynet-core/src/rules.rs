//! Fixed sizing parameters for the airspace engine.

use serde::{Deserialize, Serialize};

/// Capacities and operating constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceLimits {
    /// Maximum number of graph nodes (airports + waypoints)
    pub node_capacity: usize,
    /// Maximum number of flights waiting to land
    pub queue_capacity: usize,
    /// Bucket count of the flight registry (prime)
    pub registry_buckets: usize,
    /// Radar grid edge length; coordinates run 0..grid_size
    pub grid_size: i32,
    /// Fuel percentage consumed by one move between nodes
    pub fuel_per_move: f64,
}

impl Default for AirspaceLimits {
    fn default() -> Self {
        Self {
            node_capacity: 100,
            queue_capacity: 100,
            registry_buckets: 101,
            grid_size: 20,
            fuel_per_move: 2.0,
        }
    }
}
