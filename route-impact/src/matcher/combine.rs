//! Merging coordinate and text results into one answer per incident.

use std::collections::{HashMap, HashSet};

use super::config::MatchConfig;
use super::result::{Accuracy, CoordinateMatch, FinalMatch, MatchResult, Method, TextMatch, rank};

/// Confidence tier for an overall confidence.
pub fn accuracy_for(confidence: f64, config: &MatchConfig) -> Accuracy {
    if confidence >= config.high_threshold {
        Accuracy::High
    } else if confidence >= config.medium_threshold {
        Accuracy::Medium
    } else {
        Accuracy::Low
    }
}

/// Combine the outputs of both matchers.
///
/// The input with the higher confidence decides the method and accuracy; ties
/// go to the coordinate result. Routes are the union of both, with one entry
/// per route id and per short name (the most confident wins), ranked and
/// truncated to `config.max_routes`.
pub fn combine(
    coordinate: Option<&CoordinateMatch>,
    text: Option<&TextMatch>,
    config: &MatchConfig,
    feed_ready: bool,
) -> FinalMatch {
    let coordinate = coordinate.filter(|c| !c.routes.is_empty());
    let text = text.filter(|t| !t.routes.is_empty());

    let (confidence, method) = match (coordinate, text) {
        (Some(c), Some(t)) if t.confidence > c.confidence => (t.confidence, t.method),
        (Some(c), _) => (c.confidence, c.method),
        (None, Some(t)) => (t.confidence, t.method),
        (None, None) => {
            return FinalMatch {
                routes: Vec::new(),
                confidence: 0.0,
                method: Method::None,
                accuracy: Accuracy::None,
                feed_ready,
            };
        }
    };

    let candidates = coordinate
        .into_iter()
        .flat_map(|c| c.routes.iter())
        .chain(text.into_iter().flat_map(|t| t.routes.iter()));
    let routes = dedup(candidates, config.max_routes);

    FinalMatch {
        routes,
        confidence,
        method,
        accuracy: accuracy_for(confidence, config),
        feed_ready,
    }
}

/// Keep the best entry per route id, then per short name, in rank order.
fn dedup<'a>(candidates: impl Iterator<Item = &'a MatchResult>, max: usize) -> Vec<MatchResult> {
    let mut by_id: HashMap<_, &MatchResult> = HashMap::new();
    for candidate in candidates {
        by_id
            .entry(&candidate.route_id)
            .and_modify(|kept| {
                if candidate.confidence > kept.confidence {
                    *kept = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut routes: Vec<MatchResult> = by_id.into_values().cloned().collect();
    rank(&mut routes);

    let mut seen_names = HashSet::new();
    routes.retain(|r| seen_names.insert(r.short_name.clone()));
    routes.truncate(max);
    routes
}
