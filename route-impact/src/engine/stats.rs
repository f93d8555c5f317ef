//! Engine statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::feed::LoadStats;

/// A point-in-time view of the engine, for health checks and dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatistics {
    pub is_loaded: bool,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub routes: usize,
    pub stops: usize,
    pub route_shapes: usize,
    pub segments: usize,
    /// Statistics of the load that produced the current snapshot.
    pub load: Option<LoadStats>,
    pub cache: CacheStats,
    /// Successful loads since the engine was created.
    pub loads_completed: u64,
    /// Coordinate queries that ran a grid search (cache misses).
    pub coordinate_searches: u64,
    /// The most recent load failure, cleared by a successful load.
    pub last_error: Option<String>,
}
