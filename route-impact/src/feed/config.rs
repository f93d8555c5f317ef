//! Feed loading configuration.

use std::time::Duration;

use crate::domain::BoundingBox;

use super::error::DataLoadError;

/// Default freshness window: 24 hours.
const DEFAULT_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Default load deadline: 2 minutes.
const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Default wait after a failed load: 5 minutes.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5 * 60);

/// Default grid cell size in degrees (roughly 550 m north-south).
const DEFAULT_GRID_SIZE_DEG: f64 = 0.005;

/// Configuration for loading and indexing the static feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Rows outside this rectangle are dropped at load time.
    pub bounds: BoundingBox,

    /// A loaded snapshot younger than this is not reloaded.
    pub freshness: Duration,

    /// Loads running longer than this are abandoned.
    pub load_timeout: Duration,

    /// After a failed load, further attempts wait this long.
    pub retry_after: Duration,

    /// Grid cell size in degrees, shared by the shape and stop grids.
    pub grid_size_deg: f64,
}

impl FeedConfig {
    /// Set the region of interest.
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the freshness window.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Set the load deadline.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Set the retry interval after a failed load.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Set the grid cell size in degrees.
    pub fn with_grid_size_deg(mut self, grid_size_deg: f64) -> Self {
        self.grid_size_deg = grid_size_deg;
        self
    }

    /// Check the settings a load depends on. The grid cell size must be a
    /// positive finite number of degrees and the bounds a proper rectangle.
    pub fn validate(&self) -> Result<(), DataLoadError> {
        if !(self.grid_size_deg.is_finite() && self.grid_size_deg > 0.0) {
            return Err(DataLoadError::InvalidConfig(format!(
                "grid cell size must be positive, got {}",
                self.grid_size_deg
            )));
        }
        self.bounds
            .validate()
            .map_err(|e| DataLoadError::InvalidConfig(format!("bounds: {e}")))
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::north_east_england(),
            freshness: DEFAULT_FRESHNESS,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            retry_after: DEFAULT_RETRY_AFTER,
            grid_size_deg: DEFAULT_GRID_SIZE_DEG,
        }
    }
}
