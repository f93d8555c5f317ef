//! Match result types, serialized for collaborators as camelCase JSON.

use serde::Serialize;

use crate::domain::{Direction, RouteId};

/// How a single route was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Inside an override zone.
    Zone,
    /// Near a route shape segment.
    Shape,
    /// Near a stop of a route without shape geometry.
    Stop,
    /// Named by a text pattern.
    Text,
}

/// Which matcher produced an overall result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Zone,
    Coordinate,
    Text,
    None,
}

/// Coarse confidence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    None,
    Low,
    Medium,
    High,
}

/// One affected route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub route_id: RouteId,
    pub short_name: String,
    pub confidence: f64,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<usize>,
    /// Normalised position along the nearest segment, 0 at its start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing_degrees: Option<f64>,
}

impl MatchResult {
    /// A result without geometric detail.
    pub fn new(route_id: RouteId, short_name: impl Into<String>, confidence: f64, match_type: MatchType) -> Self {
        Self {
            route_id,
            short_name: short_name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            match_type,
            distance_meters: None,
            direction: None,
            segment_index: None,
            segment_position: None,
            bearing_degrees: None,
        }
    }
}

/// Ranking order: confidence descending, then distance ascending (results
/// without a distance last), then route id.
pub(crate) fn rank(results: &mut [MatchResult]) {
    results.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| {
                let da = a.distance_meters.unwrap_or(f64::INFINITY);
                let db = b.distance_meters.unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
            })
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
}

/// Whether a result list upholds the output invariants: confidences in
/// [0, 1] and no route id repeated.
pub(crate) fn is_consistent(results: &[MatchResult]) -> bool {
    let mut seen = std::collections::HashSet::new();
    results
        .iter()
        .all(|r| (0.0..=1.0).contains(&r.confidence) && seen.insert(&r.route_id))
}

/// Output of the coordinate matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateMatch {
    pub routes: Vec<MatchResult>,
    /// Highest route confidence, 0 when empty.
    pub confidence: f64,
    pub method: Method,
    /// The radius at which candidates were found, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_used: Option<f64>,
}

impl CoordinateMatch {
    /// Nothing within range.
    pub fn empty() -> Self {
        Self {
            routes: Vec::new(),
            confidence: 0.0,
            method: Method::None,
            radius_used: None,
        }
    }
}

/// Output of the text matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMatch {
    pub routes: Vec<MatchResult>,
    pub confidence: f64,
    pub method: Method,
    /// Descriptions of the patterns that fired.
    pub matched_patterns: Vec<String>,
}

impl TextMatch {
    /// No pattern fired.
    pub fn empty() -> Self {
        Self {
            routes: Vec::new(),
            confidence: 0.0,
            method: Method::None,
            matched_patterns: Vec::new(),
        }
    }
}

/// The combined answer for one incident.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalMatch {
    pub routes: Vec<MatchResult>,
    pub confidence: f64,
    pub method: Method,
    pub accuracy: Accuracy,
    /// False when the feed was unavailable and only text matching ran.
    pub feed_ready: bool,
}

impl FinalMatch {
    /// Short names of the affected routes, in rank order.
    pub fn affects_routes(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.short_name.as_str()).collect()
    }
}
