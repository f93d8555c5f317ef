//! Point-to-route matching.
//!
//! Override zones take precedence. Otherwise candidates come from the grid
//! ring covering each search radius in turn, are refined with exact
//! point-to-segment distances, and scored by the configured curves. The
//! search stops at the first radius that yields a candidate.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::domain::{GeoPoint, RouteId};
use crate::feed::{FeedSnapshot, StopIdx};
use crate::geometry::{SegmentHit, ShapeIdx, haversine_m};

use super::config::MatchConfig;
use super::resolve_route;
use super::result::{CoordinateMatch, MatchResult, MatchType, Method, rank};
use super::tables::MatchingTables;

/// Matches coordinates against one loaded feed.
pub struct CoordinateMatcher<'a> {
    snapshot: &'a FeedSnapshot,
    tables: &'a MatchingTables,
    config: &'a MatchConfig,
}

impl<'a> CoordinateMatcher<'a> {
    pub fn new(snapshot: &'a FeedSnapshot, tables: &'a MatchingTables, config: &'a MatchConfig) -> Self {
        Self {
            snapshot,
            tables,
            config,
        }
    }

    /// Routes near `point`, searching no further than `max_radius_m`.
    ///
    /// Never fails: a point outside the region or far from every route
    /// yields an empty match.
    pub fn match_point(&self, point: GeoPoint, max_radius_m: f64) -> CoordinateMatch {
        if let Some(zone_match) = self.match_zone(point) {
            return zone_match;
        }

        if !self.snapshot.bounds().contains(point) {
            debug!(%point, "Point outside feed region");
            return CoordinateMatch::empty();
        }

        let mut search = Search::default();
        for radius in self.config.radii_up_to(max_radius_m) {
            let routes = self.search(point, radius, max_radius_m, &mut search);
            if !routes.is_empty() {
                debug!(
                    %point,
                    radius,
                    routes = routes.len(),
                    shapes_measured = search.shapes.len(),
                    "Coordinate match"
                );
                let confidence = routes[0].confidence;
                return CoordinateMatch {
                    routes,
                    confidence,
                    method: Method::Coordinate,
                    radius_used: Some(radius),
                };
            }
        }

        debug!(%point, max_radius_m, "No routes within range");
        CoordinateMatch::empty()
    }

    /// The first override zone containing the point, as a match.
    fn match_zone(&self, point: GeoPoint) -> Option<CoordinateMatch> {
        let zone = self.tables.zone_at(point)?;

        let mut by_route: BTreeMap<RouteId, MatchResult> = BTreeMap::new();
        for name in &zone.routes {
            let (route_id, short_name) = resolve_route(Some(self.snapshot), name);
            by_route.entry(route_id.clone()).or_insert_with(|| {
                MatchResult::new(route_id, short_name, zone.confidence, MatchType::Zone)
            });
        }
        let mut routes: Vec<MatchResult> = by_route.into_values().collect();
        rank(&mut routes);

        debug!(%point, zone = %zone.description, routes = routes.len(), "Override zone match");
        Some(CoordinateMatch {
            routes,
            confidence: zone.confidence,
            method: Method::Zone,
            radius_used: None,
        })
    }

    /// One round of the progressive search. Distances measured in earlier
    /// rounds are reused.
    fn search(
        &self,
        point: GeoPoint,
        radius_m: f64,
        max_radius_m: f64,
        search: &mut Search,
    ) -> Vec<MatchResult> {
        let mut best: HashMap<RouteId, MatchResult> = HashMap::new();

        let shape_ring = self.snapshot.shape_grid().ring_for_radius(point, radius_m);
        for idx in self.snapshot.shape_grid().neighbors(point, shape_ring) {
            let Some(shape) = self.snapshot.geometry().get(idx) else {
                continue;
            };
            let hit = *search
                .shapes
                .entry(idx)
                .or_insert_with(|| shape.nearest_segment(point, self.config.early_exit_m));
            let Some(hit) = hit.filter(|h| h.distance_m <= radius_m) else {
                continue;
            };

            let candidate = MatchResult {
                distance_meters: Some(hit.distance_m),
                direction: shape.direction,
                segment_index: Some(hit.index),
                segment_position: Some(hit.position),
                bearing_degrees: Some(hit.bearing_deg),
                ..MatchResult::new(
                    shape.route_id.clone(),
                    self.short_name(&shape.route_id),
                    self.config.shape_curve.score(hit.distance_m, max_radius_m),
                    MatchType::Shape,
                )
            };
            keep_best(&mut best, candidate);
        }

        let stop_ring = self.snapshot.stop_grid().ring_for_radius(point, radius_m);
        for idx in self.snapshot.stop_grid().neighbors(point, stop_ring) {
            let routes = self.snapshot.fallback_routes_at(idx);
            if routes.is_empty() {
                continue;
            }
            let Some(stop) = self.snapshot.stop(idx) else {
                continue;
            };
            let distance_m = *search
                .stops
                .entry(idx)
                .or_insert_with(|| haversine_m(point, stop.location));
            if distance_m > radius_m {
                continue;
            }

            let confidence = self.config.stop_curve.score(distance_m, max_radius_m);
            for route_id in routes {
                let candidate = MatchResult {
                    distance_meters: Some(distance_m),
                    ..MatchResult::new(
                        route_id.clone(),
                        self.short_name(route_id),
                        confidence,
                        MatchType::Stop,
                    )
                };
                keep_best(&mut best, candidate);
            }
        }

        let mut routes: Vec<MatchResult> = best.into_values().collect();
        rank(&mut routes);
        routes
    }

    fn short_name(&self, route_id: &RouteId) -> String {
        self.snapshot
            .route(route_id)
            .map(|r| r.short_name.clone())
            .unwrap_or_else(|| route_id.to_string())
    }
}

/// Per-query memo of measured distances.
#[derive(Default)]
struct Search {
    shapes: HashMap<ShapeIdx, Option<SegmentHit>>,
    stops: HashMap<StopIdx, f64>,
}

/// One result per route: highest confidence, then nearest.
fn keep_best(best: &mut HashMap<RouteId, MatchResult>, candidate: MatchResult) {
    match best.get(&candidate.route_id) {
        Some(existing)
            if existing.confidence > candidate.confidence
                || (existing.confidence == candidate.confidence
                    && existing.distance_meters <= candidate.distance_meters) => {}
        _ => {
            best.insert(candidate.route_id.clone(), candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    use crate::domain::Direction;
    use crate::feed::{FeedConfig, FeedTable, fixtures};
    use crate::geometry::{METERS_PER_DEGREE_LAT, meters_per_degree_lng};
    use crate::matcher::tables::tyne_and_wear;

    static SNAPSHOT: LazyLock<FeedSnapshot> = LazyLock::new(|| {
        FeedSnapshot::load(&fixtures::tyne_and_wear(), &FeedConfig::default()).unwrap()
    });

    static TABLES: LazyLock<MatchingTables> = LazyLock::new(tyne_and_wear);

    fn matcher<'a>(snapshot: &'a FeedSnapshot, config: &'a MatchConfig) -> CoordinateMatcher<'a> {
        CoordinateMatcher::new(snapshot, &TABLES, config)
    }

    fn pt(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    /// A point `meters` east of route 21's outbound line at 54.90N.
    pub(super) fn east_of_route_21(meters: f64) -> GeoPoint {
        pt(54.90, -1.5700 + meters / meters_per_degree_lng(54.90))
    }

    fn ids(m: &CoordinateMatch) -> Vec<&str> {
        m.routes.iter().map(|r| r.route_id.as_str()).collect()
    }

    #[test]
    fn zone_takes_precedence_over_geometry() {
        let config = MatchConfig::default();
        // On X1's line and inside the central interchange zone
        let m = matcher(&SNAPSHOT, &config).match_point(pt(54.9760, -1.6150), 500.0);

        assert_eq!(m.method, Method::Zone);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.radius_used, None);
        assert!(m.routes.iter().all(|r| r.match_type == MatchType::Zone));

        // Loaded routes resolve to their ids, others keep their short name
        let x1 = m.routes.iter().find(|r| r.short_name == "X1").unwrap();
        assert_eq!(x1.route_id, RouteId::new("RX1"));
        let q3 = m.routes.iter().find(|r| r.short_name == "Q3").unwrap();
        assert_eq!(q3.route_id, RouteId::new("Q3"));
    }

    #[test]
    fn near_segment_scores_high() {
        let config = MatchConfig::default();
        let m = matcher(&SNAPSHOT, &config).match_point(east_of_route_21(30.0), 500.0);

        assert_eq!(m.method, Method::Coordinate);
        assert_eq!(m.radius_used, Some(75.0));
        assert!(m.confidence >= 0.9);
        assert_eq!(ids(&m), vec!["R21", "RX21"]);

        let r21 = &m.routes[0];
        assert_eq!(r21.match_type, MatchType::Shape);
        assert_eq!(r21.direction, Some(Direction::Outbound));
        assert!((r21.distance_meters.unwrap() - 30.0).abs() < 1.0);
        // Between vertices at 54.89 and 54.90, at the end of segment 1
        assert_eq!(r21.segment_index, Some(1));
        assert!(r21.bearing_degrees.unwrap() < 1.0);
    }

    #[test]
    fn progressive_radius_expands_until_found() {
        let config = MatchConfig::default();
        let m = matcher(&SNAPSHOT, &config).match_point(east_of_route_21(200.0), 500.0);

        assert_eq!(m.radius_used, Some(300.0));
        let expected = (1.0f64 - 200.0 / 500.0).sqrt();
        assert!((m.confidence - expected).abs() < 0.01, "{}", m.confidence);
    }

    #[test]
    fn max_radius_limits_search() {
        let config = MatchConfig::default();
        let m = matcher(&SNAPSHOT, &config).match_point(east_of_route_21(200.0), 150.0);
        assert!(m.routes.is_empty());
        assert_eq!(m.method, Method::None);
    }

    #[test]
    fn far_from_everything_is_empty() {
        let config = MatchConfig::default();
        let m = matcher(&SNAPSHOT, &config).match_point(pt(54.80, -1.45), 500.0);
        assert!(m.routes.is_empty());
        assert_eq!(m.confidence, 0.0);
    }

    #[test]
    fn outside_region_is_empty() {
        let config = MatchConfig::default();
        let m = matcher(&SNAPSHOT, &config).match_point(pt(51.5, -0.12), 500.0);
        assert!(m.routes.is_empty());
    }

    #[test]
    fn routes_without_geometry_match_by_stop() {
        let config = MatchConfig::default();
        let near_portobello = pt(54.900 + 100.0 / METERS_PER_DEGREE_LAT, -1.6200);
        let m = matcher(&SNAPSHOT, &config).match_point(near_portobello, 500.0);

        assert_eq!(ids(&m), vec!["R78"]);
        let r78 = &m.routes[0];
        assert_eq!(r78.match_type, MatchType::Stop);
        assert_eq!(r78.short_name, "78");
        assert_eq!(m.radius_used, Some(150.0));
        assert!((r78.confidence - 0.64).abs() < 0.01, "{}", r78.confidence);
    }

    #[test]
    fn missing_shapes_fall_back_to_stops() {
        let source = fixtures::tyne_and_wear().without_table(FeedTable::Shapes);
        let snapshot = FeedSnapshot::load(&source, &FeedConfig::default()).unwrap();
        let config = MatchConfig::default();

        // 30 m east of Birtley Interchange
        let m = matcher(&snapshot, &config).match_point(east_of_route_21(30.0), 500.0);
        assert_eq!(ids(&m), vec!["R21"]);
        assert_eq!(m.routes[0].match_type, MatchType::Stop);
    }

    #[test]
    fn keep_best_prefers_confidence_then_distance() {
        let mut best = HashMap::new();
        let result = |c: f64, d: f64| MatchResult {
            distance_meters: Some(d),
            ..MatchResult::new(RouteId::new("R1"), "1", c, MatchType::Shape)
        };
        keep_best(&mut best, result(0.5, 100.0));
        keep_best(&mut best, result(0.7, 200.0));
        keep_best(&mut best, result(0.7, 150.0));
        keep_best(&mut best, result(0.6, 10.0));

        let kept = &best[&RouteId::new("R1")];
        assert_eq!(kept.confidence, 0.7);
        assert_eq!(kept.distance_meters, Some(150.0));
    }
}
