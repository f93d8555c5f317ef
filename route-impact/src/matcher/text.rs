//! Free-text matching against the pattern table.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::RouteId;
use crate::feed::FeedSnapshot;

use super::resolve_route;
use super::result::{MatchResult, MatchType, Method, TextMatch, rank};
use super::tables::MatchingTables;

/// Match an incident's location text and description.
///
/// Every pattern found contributes its routes; a route named by several
/// patterns keeps the best confidence among them. Without a snapshot, route
/// short names stand in for route ids.
pub fn match_text(
    tables: &MatchingTables,
    snapshot: Option<&FeedSnapshot>,
    location_text: Option<&str>,
    description: Option<&str>,
) -> TextMatch {
    let text = [location_text, description]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if text.trim().is_empty() {
        return TextMatch::empty();
    }

    let mut by_route: BTreeMap<RouteId, MatchResult> = BTreeMap::new();
    let mut matched_patterns = Vec::new();
    let mut confidence: f64 = 0.0;

    for pattern in tables.patterns_in(&text) {
        confidence = confidence.max(pattern.confidence);
        matched_patterns.push(if pattern.description.is_empty() {
            pattern.pattern.clone()
        } else {
            pattern.description.clone()
        });

        for name in &pattern.routes {
            let (route_id, short_name) = resolve_route(snapshot, name);
            let entry = by_route.entry(route_id.clone()).or_insert_with(|| {
                MatchResult::new(route_id, short_name, pattern.confidence, MatchType::Text)
            });
            entry.confidence = entry.confidence.max(pattern.confidence);
        }
    }

    if by_route.is_empty() {
        return TextMatch::empty();
    }

    let mut routes: Vec<MatchResult> = by_route.into_values().collect();
    rank(&mut routes);

    debug!(patterns = ?matched_patterns, routes = routes.len(), "Text match");
    TextMatch {
        routes,
        confidence,
        method: Method::Text,
        matched_patterns,
    }
}
