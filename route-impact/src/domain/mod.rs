//! Domain types for the route impact engine.
//!
//! Feed entities and coordinates. All types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod coord;
mod ids;
mod transit;

pub use coord::{BoundingBox, GeoPoint, InvalidCoordinate};
pub use ids::{RouteId, ShapeId, StopId, TripId};
pub use transit::{Direction, Route, ShapePoint, Stop, StopTime, Trip};
