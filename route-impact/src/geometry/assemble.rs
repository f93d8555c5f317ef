//! Route geometry assembly.
//!
//! Joins trips to routes and shapes to produce one [`RouteShape`] per distinct
//! (route, direction, shape) triple, each with its ordered polyline and
//! precomputed segments. Pure transformation of already-loaded tables.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Direction, GeoPoint, Route, RouteId, ShapeId, ShapePoint, Trip};

use super::distance::{haversine_m, initial_bearing_deg, project_onto_segment};

/// Index of a [`RouteShape`] within a [`RouteGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeIdx(pub usize);

/// One straight piece of a shape polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub shape_id: ShapeId,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub length_m: f64,
    /// Initial bearing from `start` to `end`, degrees in [0, 360).
    pub bearing_deg: f64,
}

impl Segment {
    fn between(shape_id: &ShapeId, start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            shape_id: shape_id.clone(),
            start,
            end,
            length_m: haversine_m(start, end),
            bearing_deg: initial_bearing_deg(start, end),
        }
    }
}

/// Where a query point lands on a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentHit {
    /// Index into [`RouteShape::segments`].
    pub index: usize,
    /// Normalised position along that segment.
    pub position: f64,
    pub distance_m: f64,
    pub bearing_deg: f64,
}

/// The geometry one route travels in one direction along one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteShape {
    pub route_id: RouteId,
    pub direction: Option<Direction>,
    pub shape_id: ShapeId,
    pub headsign: Option<String>,
    /// Shared between every route that runs the same shape.
    pub points: Arc<[ShapePoint]>,
    pub segments: Arc<[Segment]>,
    pub total_length_m: f64,
}

impl RouteShape {
    /// Find the segment closest to `point`.
    ///
    /// Stops scanning as soon as a segment within `early_exit_m` is found;
    /// past that point a closer segment would not change the confidence tier.
    pub fn nearest_segment(&self, point: GeoPoint, early_exit_m: f64) -> Option<SegmentHit> {
        let mut best: Option<SegmentHit> = None;

        for (index, segment) in self.segments.iter().enumerate() {
            let proj = project_onto_segment(point, segment.start, segment.end);
            if best.is_none_or(|b| proj.distance_m < b.distance_m) {
                best = Some(SegmentHit {
                    index,
                    position: proj.position,
                    distance_m: proj.distance_m,
                    bearing_deg: segment.bearing_deg,
                });
            }
            if proj.distance_m < early_exit_m {
                break;
            }
        }

        best
    }
}

/// All route shapes of a feed, ordered by (route, direction, shape).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteGeometry {
    shapes: Vec<RouteShape>,
    by_route: BTreeMap<RouteId, Range<usize>>,
}

impl RouteGeometry {
    /// All shapes in deterministic order.
    pub fn shapes(&self) -> &[RouteShape] {
        &self.shapes
    }

    /// Look up a shape by index.
    pub fn get(&self, idx: ShapeIdx) -> Option<&RouteShape> {
        self.shapes.get(idx.0)
    }

    /// Shapes belonging to a route (empty if the route has no geometry).
    pub fn for_route(&self, route_id: &RouteId) -> &[RouteShape] {
        self.by_route
            .get(route_id)
            .map(|range| &self.shapes[range.clone()])
            .unwrap_or(&[])
    }

    /// Whether the route has any usable geometry.
    pub fn has_geometry(&self, route_id: &RouteId) -> bool {
        self.by_route.contains_key(route_id)
    }

    /// Iterate `(route, shapes)` pairs in route order.
    pub fn by_route(&self) -> impl Iterator<Item = (&RouteId, &[RouteShape])> {
        self.by_route
            .iter()
            .map(|(id, range)| (id, &self.shapes[range.clone()]))
    }

    /// Number of route shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Returns true if no route has geometry.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Total number of segments across all route shapes.
    pub fn segment_count(&self) -> usize {
        self.shapes.iter().map(|s| s.segments.len()).sum()
    }
}

/// Points and segments of one shape, built once and shared.
struct Polyline {
    points: Arc<[ShapePoint]>,
    segments: Arc<[Segment]>,
    total_length_m: f64,
}

/// Group, order and segment shape points. Shapes with fewer than two
/// distinct vertices carry no usable geometry and are dropped.
fn build_polylines(shape_points: &[ShapePoint]) -> HashMap<ShapeId, Polyline> {
    let mut grouped: HashMap<&ShapeId, Vec<&ShapePoint>> = HashMap::new();
    for point in shape_points {
        grouped.entry(&point.shape_id).or_default().push(point);
    }

    grouped
        .into_iter()
        .filter_map(|(shape_id, mut points)| {
            // Total order so duplicate sequence numbers resolve the same way
            // regardless of input order.
            points.sort_by(|a, b| {
                a.sequence
                    .cmp(&b.sequence)
                    .then(a.location.lat().total_cmp(&b.location.lat()))
                    .then(a.location.lng().total_cmp(&b.location.lng()))
            });
            points.dedup_by_key(|p| p.sequence);

            if points.len() < 2 {
                return None;
            }

            let segments: Vec<Segment> = points
                .windows(2)
                .map(|pair| Segment::between(shape_id, pair[0].location, pair[1].location))
                .collect();
            let total_length_m = segments.iter().map(|s| s.length_m).sum();
            let points: Vec<ShapePoint> = points.into_iter().cloned().collect();

            Some((
                shape_id.clone(),
                Polyline {
                    points: points.into(),
                    segments: segments.into(),
                    total_length_m,
                },
            ))
        })
        .collect()
}

/// Build route geometry from loaded tables.
///
/// Trips referencing unknown routes, or shapes without usable geometry, are
/// ignored. The result does not depend on the order of any input table.
pub fn build(routes: &[Route], trips: &[Trip], shape_points: &[ShapePoint]) -> RouteGeometry {
    let polylines = build_polylines(shape_points);
    let known_routes: HashSet<&RouteId> = routes.iter().map(|r| &r.id).collect();

    // (route, direction, shape) -> headsign. The smallest headsign wins so the
    // choice is stable under trip reordering.
    let mut triples: BTreeMap<(RouteId, Option<Direction>, ShapeId), Option<String>> =
        BTreeMap::new();
    for trip in trips {
        let Some(shape_id) = &trip.shape_id else {
            continue;
        };
        if !known_routes.contains(&trip.route_id) || !polylines.contains_key(shape_id) {
            continue;
        }

        let headsign = triples
            .entry((trip.route_id.clone(), trip.direction, shape_id.clone()))
            .or_default();
        match (headsign.as_ref(), trip.headsign.as_ref()) {
            (None, Some(new)) => *headsign = Some(new.clone()),
            (Some(old), Some(new)) if new < old => *headsign = Some(new.clone()),
            _ => {}
        }
    }

    let mut shapes = Vec::with_capacity(triples.len());
    let mut by_route: BTreeMap<RouteId, Range<usize>> = BTreeMap::new();

    for ((route_id, direction, shape_id), headsign) in triples {
        let Some(polyline) = polylines.get(&shape_id) else {
            continue;
        };

        let idx = shapes.len();
        by_route
            .entry(route_id.clone())
            .and_modify(|range| range.end = idx + 1)
            .or_insert(idx..idx + 1);

        shapes.push(RouteShape {
            route_id,
            direction,
            shape_id,
            headsign,
            points: Arc::clone(&polyline.points),
            segments: Arc::clone(&polyline.segments),
            total_length_m: polyline.total_length_m,
        });
    }

    RouteGeometry { shapes, by_route }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TripId;

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    fn route(id: &str, short: &str) -> Route {
        Route {
            id: RouteId::new(id),
            short_name: short.to_string(),
            long_name: None,
            route_type: Some(3),
            color_hint: None,
        }
    }

    fn trip(id: &str, route: &str, shape: Option<&str>, dir: Option<u8>, headsign: Option<&str>) -> Trip {
        Trip {
            id: TripId::new(id),
            route_id: RouteId::new(route),
            shape_id: shape.map(ShapeId::new),
            direction: dir.and_then(Direction::from_id),
            headsign: headsign.map(str::to_string),
        }
    }

    fn shape_pt(shape: &str, lat: f64, lng: f64, seq: u32) -> ShapePoint {
        ShapePoint {
            shape_id: ShapeId::new(shape),
            location: pt(lat, lng),
            sequence: seq,
        }
    }

    fn sample_points() -> Vec<ShapePoint> {
        vec![
            shape_pt("S1", 54.88, -1.57, 10),
            shape_pt("S1", 54.90, -1.57, 20),
            shape_pt("S1", 54.92, -1.57, 35),
            shape_pt("S2", 54.92, -1.571, 1),
            shape_pt("S2", 54.88, -1.571, 2),
            shape_pt("LONE", 54.9, -1.6, 1),
        ]
    }

    #[test]
    fn orders_points_by_sequence_not_input_order() {
        let mut points = sample_points();
        points.reverse();
        let geometry = build(
            &[route("R1", "21")],
            &[trip("T1", "R1", Some("S1"), Some(0), None)],
            &points,
        );

        let shape = &geometry.shapes()[0];
        let seqs: Vec<u32> = shape.points.iter().map(|p| p.sequence).collect();
        assert_eq!(seqs, vec![10, 20, 35]);
        assert_eq!(shape.segments.len(), 2);
        // Heading north
        assert!(shape.segments[0].bearing_deg < 1.0 || shape.segments[0].bearing_deg > 359.0);
        assert!((shape.total_length_m - 4_448.0).abs() < 20.0, "{}", shape.total_length_m);
    }

    #[test]
    fn one_shape_per_distinct_triple() {
        let trips = vec![
            trip("T1", "R1", Some("S1"), Some(0), Some("Durham")),
            trip("T2", "R1", Some("S1"), Some(0), Some("Chester-le-Street")),
            trip("T3", "R1", Some("S2"), Some(1), Some("Newcastle")),
            trip("T4", "R1", None, Some(0), None),
        ];
        let geometry = build(&[route("R1", "21")], &trips, &sample_points());

        assert_eq!(geometry.len(), 2);
        let shapes = geometry.for_route(&RouteId::new("R1"));
        assert_eq!(shapes[0].direction, Some(Direction::Outbound));
        assert_eq!(shapes[0].headsign.as_deref(), Some("Chester-le-Street"));
        assert_eq!(shapes[1].direction, Some(Direction::Inbound));
        assert_eq!(shapes[1].shape_id, ShapeId::new("S2"));
        // Heading south
        assert!((shapes[1].segments[0].bearing_deg - 180.0).abs() < 1.0);
    }

    #[test]
    fn skips_unknown_routes_and_single_point_shapes() {
        let trips = vec![
            trip("T1", "GHOST", Some("S1"), Some(0), None),
            trip("T2", "R1", Some("LONE"), Some(0), None),
            trip("T3", "R1", Some("MISSING"), Some(0), None),
        ];
        let geometry = build(&[route("R1", "21")], &trips, &sample_points());
        assert!(geometry.is_empty());
        assert!(!geometry.has_geometry(&RouteId::new("R1")));
        assert!(geometry.for_route(&RouteId::new("R1")).is_empty());
    }

    #[test]
    fn shapes_are_shared_between_routes() {
        let trips = vec![
            trip("T1", "R1", Some("S1"), Some(0), None),
            trip("T2", "R2", Some("S1"), Some(0), None),
        ];
        let geometry = build(&[route("R1", "21"), route("R2", "X21")], &trips, &sample_points());
        let a = &geometry.for_route(&RouteId::new("R1"))[0];
        let b = &geometry.for_route(&RouteId::new("R2"))[0];
        assert!(Arc::ptr_eq(&a.segments, &b.segments));
        assert_eq!(geometry.segment_count(), 4);
        assert_eq!(geometry.by_route().count(), 2);
    }

    #[test]
    fn duplicate_sequence_numbers_keep_one_vertex() {
        let points = vec![
            shape_pt("S1", 54.88, -1.57, 1),
            shape_pt("S1", 54.89, -1.57, 1),
            shape_pt("S1", 54.90, -1.57, 2),
        ];
        let geometry = build(
            &[route("R1", "21")],
            &[trip("T1", "R1", Some("S1"), None, None)],
            &points,
        );
        assert_eq!(geometry.shapes()[0].points.len(), 2);
        assert_eq!(geometry.shapes()[0].points[0].location, pt(54.88, -1.57));
    }

    #[test]
    fn nearest_segment_reports_position_and_exits_early() {
        let geometry = build(
            &[route("R1", "21")],
            &[trip("T1", "R1", Some("S1"), Some(0), None)],
            &sample_points(),
        );
        let shape = &geometry.shapes()[0];

        // On the first segment, a quarter of the way along
        let hit = shape.nearest_segment(pt(54.885, -1.57), 50.0).unwrap();
        assert_eq!(hit.index, 0);
        assert!((hit.position - 0.25).abs() < 0.01);
        assert!(hit.distance_m < 1.0);

        // On the second segment
        let hit = shape.nearest_segment(pt(54.91, -1.5705), 50.0).unwrap();
        assert_eq!(hit.index, 1);
        assert!(hit.distance_m < 40.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::TripId;
    use proptest::prelude::*;

    fn fixture() -> (Vec<Route>, Vec<Trip>, Vec<ShapePoint>) {
        let routes = vec![
            Route {
                id: RouteId::new("R1"),
                short_name: "21".into(),
                long_name: None,
                route_type: Some(3),
                color_hint: None,
            },
            Route {
                id: RouteId::new("R2"),
                short_name: "X1".into(),
                long_name: None,
                route_type: Some(3),
                color_hint: None,
            },
        ];
        let trip = |id: &str, r: &str, s: &str, d: u8, h: &str| Trip {
            id: TripId::new(id),
            route_id: RouteId::new(r),
            shape_id: Some(ShapeId::new(s)),
            direction: Direction::from_id(d),
            headsign: Some(h.to_string()),
        };
        let trips = vec![
            trip("T1", "R1", "A", 0, "South"),
            trip("T2", "R1", "A", 0, "Birtley"),
            trip("T3", "R1", "B", 1, "North"),
            trip("T4", "R2", "C", 0, "West"),
            trip("T5", "R2", "C", 0, "Airport"),
        ];
        let mut points = Vec::new();
        for (shape, lng) in [("A", -1.57), ("B", -1.571), ("C", -1.65)] {
            for seq in 0..6u32 {
                points.push(ShapePoint {
                    shape_id: ShapeId::new(shape),
                    location: GeoPoint::new(54.88 + 0.01 * seq as f64, lng).unwrap(),
                    sequence: seq * 3,
                });
            }
        }
        (routes, trips, points)
    }

    proptest! {
        /// Row order of trips and shape points never changes the assembled geometry.
        #[test]
        fn load_order_independent(
            trips in Just(fixture().1).prop_shuffle(),
            points in Just(fixture().2).prop_shuffle(),
        ) {
            let (routes, base_trips, base_points) = fixture();
            let expected = build(&routes, &base_trips, &base_points);
            let actual = build(&routes, &trips, &points);
            prop_assert_eq!(actual, expected);
        }
    }
}
