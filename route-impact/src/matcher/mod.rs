//! Route matching.
//!
//! Two independent matchers answer "which routes does this incident affect":
//! [`CoordinateMatcher`] from a point, [`match_text`] from free text. Their
//! results are merged by [`combine`].

mod combine;
mod config;
mod coordinate;
mod result;
mod tables;
mod text;

pub use combine::{accuracy_for, combine};
pub use config::{ConfidenceCurve, MatchConfig};
pub use coordinate::CoordinateMatcher;
pub use result::{
    Accuracy, CoordinateMatch, FinalMatch, MatchResult, MatchType, Method, TextMatch,
};
pub(crate) use result::is_consistent;
pub use tables::{
    MatchingTables, MatchingTablesBuilder, OverrideZone, TablesError, TextPattern, tyne_and_wear,
};
pub use text::match_text;

use crate::domain::RouteId;
use crate::feed::FeedSnapshot;

/// Map a table's route short name to `(route id, short name)`.
///
/// Names the feed knows resolve to the loaded route; others, or any name
/// when no feed is loaded, use the short name as the id.
pub(crate) fn resolve_route(snapshot: Option<&FeedSnapshot>, short_name: &str) -> (RouteId, String) {
    match snapshot.and_then(|s| s.route_by_short_name(short_name)) {
        Some(route) => (route.id.clone(), route.short_name.clone()),
        None => (RouteId::new(short_name), short_name.to_string()),
    }
}
