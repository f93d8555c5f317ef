//! Great-circle measurements.
//!
//! Distances, bearings and closest points on segments all come from `geo`'s
//! haversine algorithms, treating each shape segment as a great-circle arc.

use geo::{Closest, HaversineBearing, HaversineClosestPoint, HaversineDistance, Line};

use crate::domain::GeoPoint;

/// Metres per degree of latitude (mean).
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Metres per degree of longitude at the given latitude.
pub fn meters_per_degree_lng(lat: f64) -> f64 {
    METERS_PER_DEGREE_LAT * lat.to_radians().cos()
}

/// Great-circle distance in metres.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    a.to_geo().haversine_distance(&b.to_geo())
}

/// Initial bearing from `a` towards `b`, degrees clockwise from north in [0, 360).
pub fn initial_bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let bearing = a.to_geo().haversine_bearing(b.to_geo());
    let normalized = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// The closest point on a segment to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Closest point on the segment.
    pub point: GeoPoint,
    /// Normalised position along the segment: 0 at `start`, 1 at `end`.
    pub position: f64,
    /// Great-circle distance from the query point to `point`, metres.
    pub distance_m: f64,
}

/// Project `p` onto the segment `start`-`end`, clamped to its endpoints.
pub fn project_onto_segment(p: GeoPoint, start: GeoPoint, end: GeoPoint) -> Projection {
    let length_m = haversine_m(start, end);
    if length_m == 0.0 {
        return at(p, start, 0.0);
    }

    let line = Line::new(start.to_geo(), end.to_geo());
    let foot = match line.haversine_closest_point(&p.to_geo()) {
        Closest::Intersection(q) | Closest::SinglePoint(q) => GeoPoint::new(q.y(), q.x()).ok(),
        Closest::Indeterminate => None,
    };
    let Some(point) = foot else {
        // Nearer endpoint
        return if haversine_m(p, start) <= haversine_m(p, end) {
            at(p, start, 0.0)
        } else {
            at(p, end, 1.0)
        };
    };

    let position = (haversine_m(start, point) / length_m).clamp(0.0, 1.0);
    at(p, point, position)
}

fn at(p: GeoPoint, point: GeoPoint, position: f64) -> Projection {
    Projection {
        point,
        position,
        distance_m: haversine_m(p, point),
    }
}
