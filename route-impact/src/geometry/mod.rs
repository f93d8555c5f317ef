//! Spatial structures over the loaded feed.
//!
//! Great-circle measurement, the uniform grid index, and assembly of route
//! polylines from trips and shape points.

mod assemble;
mod distance;
mod grid;

pub use assemble::{RouteGeometry, RouteShape, Segment, SegmentHit, ShapeIdx, build};
pub use distance::{
    METERS_PER_DEGREE_LAT, Projection, haversine_m, initial_bearing_deg, meters_per_degree_lng,
    project_onto_segment,
};
pub use grid::{CellKey, SpatialGrid};
