//! An immutable, fully indexed view of one loaded feed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::{BoundingBox, Route, RouteId, Stop, StopId, TripId};
use crate::geometry::{self, RouteGeometry, ShapeIdx, SpatialGrid};

use super::config::FeedConfig;
use super::error::DataLoadError;
use super::loader::{FeedTables, LoadStats, load_tables};
use super::source::FeedSource;

/// Index of a [`Stop`] within a [`FeedSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopIdx(pub usize);

/// Routes, stops and geometry of a loaded feed, with their grid indexes.
///
/// Built once per load and shared read-only between queries.
#[derive(Debug)]
pub struct FeedSnapshot {
    routes: BTreeMap<RouteId, Route>,
    by_short_name: HashMap<String, RouteId>,
    stops: Vec<Stop>,
    /// Per stop, the routes serving it that have no shape geometry.
    fallback_routes: Vec<Vec<RouteId>>,
    geometry: RouteGeometry,
    shape_grid: SpatialGrid<ShapeIdx>,
    stop_grid: SpatialGrid<StopIdx>,
    bounds: BoundingBox,
    stats: LoadStats,
    loaded_at: DateTime<Utc>,
}

impl FeedSnapshot {
    /// Load and index a feed. Blocking; call from a worker thread.
    pub fn load(source: &dyn FeedSource, config: &FeedConfig) -> Result<Self, DataLoadError> {
        config.validate()?;
        let started = Instant::now();
        let tables = load_tables(source, &config.bounds)?;
        let mut snapshot = Self::from_tables(tables, config);
        snapshot.stats.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            source = %source.describe(),
            routes = snapshot.routes.len(),
            stops = snapshot.stops.len(),
            route_shapes = snapshot.stats.route_shapes,
            segments = snapshot.stats.segments,
            skipped = snapshot.stats.total_skipped(),
            elapsed_ms = snapshot.stats.elapsed_ms,
            "Loaded transit feed"
        );
        Ok(snapshot)
    }

    /// Assemble geometry and build both grids from parsed tables.
    ///
    /// `config` is expected to pass [`FeedConfig::validate`].
    pub fn from_tables(tables: FeedTables, config: &FeedConfig) -> Self {
        let FeedTables {
            routes,
            stops,
            shape_points,
            trips,
            stop_times,
            mut stats,
        } = tables;

        let geometry = geometry::build(&routes, &trips, &shape_points);

        let mut shape_grid = SpatialGrid::new(config.grid_size_deg);
        for (idx, shape) in geometry.shapes().iter().enumerate() {
            for segment in shape.segments.iter() {
                shape_grid.insert_segment(segment.start, segment.end, ShapeIdx(idx));
            }
        }

        let mut stop_grid = SpatialGrid::new(config.grid_size_deg);
        for (idx, stop) in stops.iter().enumerate() {
            stop_grid.insert(stop.location, StopIdx(idx));
        }

        let stop_index: HashMap<&StopId, usize> =
            stops.iter().enumerate().map(|(i, s)| (&s.id, i)).collect();
        let trip_routes: HashMap<&TripId, &RouteId> =
            trips.iter().map(|t| (&t.id, &t.route_id)).collect();
        let mut serving: Vec<BTreeSet<RouteId>> = vec![BTreeSet::new(); stops.len()];
        for stop_time in &stop_times {
            let (Some(&idx), Some(route_id)) = (
                stop_index.get(&stop_time.stop_id),
                trip_routes.get(&stop_time.trip_id),
            ) else {
                continue;
            };
            if !geometry.has_geometry(route_id) {
                serving[idx].insert((*route_id).clone());
            }
        }
        let fallback_routes = serving
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect();

        let routes: BTreeMap<RouteId, Route> =
            routes.into_iter().map(|r| (r.id.clone(), r)).collect();
        // Lowest route id wins when several routes share a short name
        let mut by_short_name = HashMap::new();
        for route in routes.values() {
            by_short_name
                .entry(route.short_name.to_lowercase())
                .or_insert_with(|| route.id.clone());
        }

        stats.route_shapes = geometry.len();
        stats.segments = geometry.segment_count();
        stats.shape_grid_cells = shape_grid.cell_count();
        stats.stop_grid_cells = stop_grid.cell_count();

        Self {
            routes,
            by_short_name,
            stops,
            fallback_routes,
            geometry,
            shape_grid,
            stop_grid,
            bounds: config.bounds,
            stats,
            loaded_at: Utc::now(),
        }
    }

    /// Look up a route by id.
    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    /// Look up a route by short name, ignoring case.
    pub fn route_by_short_name(&self, short_name: &str) -> Option<&Route> {
        self.by_short_name
            .get(&short_name.to_lowercase())
            .and_then(|id| self.routes.get(id))
    }

    /// All routes in id order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, idx: StopIdx) -> Option<&Stop> {
        self.stops.get(idx.0)
    }

    /// Routes without shape geometry that serve a stop.
    pub fn fallback_routes_at(&self, idx: StopIdx) -> &[RouteId] {
        self.fallback_routes
            .get(idx.0)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn geometry(&self) -> &RouteGeometry {
        &self.geometry
    }

    pub fn shape_grid(&self) -> &SpatialGrid<ShapeIdx> {
        &self.shape_grid
    }

    pub fn stop_grid(&self) -> &SpatialGrid<StopIdx> {
        &self.stop_grid
    }

    /// The region the feed was restricted to.
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
