//! Typed rows of the static transit feed.
//!
//! These are the already-validated forms of the CSV records: coordinates are
//! `GeoPoint`s, identifiers are newtypes, and optional text is `None` rather
//! than an empty string.

use serde::Serialize;

use super::coord::GeoPoint;
use super::ids::{RouteId, ShapeId, StopId, TripId};

/// Direction of travel, from the feed's `direction_id`.
///
/// The meaning of 0 and 1 is agency-specific; they only distinguish the two
/// variants of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `direction_id = 0`
    Outbound,
    /// `direction_id = 1`
    Inbound,
}

impl Direction {
    /// Map a feed `direction_id` value. Values other than 0 and 1 are unknown.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Direction::Outbound),
            1 => Some(Direction::Inbound),
            _ => None,
        }
    }

    /// The feed `direction_id` value.
    pub fn id(self) -> u8 {
        match self {
            Direction::Outbound => 0,
            Direction::Inbound => 1,
        }
    }
}

/// A transit route.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    /// The externally meaningful label ("21", "X1"). Never empty: falls back to
    /// the long name, then the id, when the feed leaves it blank.
    pub short_name: String,
    pub long_name: Option<String>,
    /// Feed `route_type` (3 = bus).
    pub route_type: Option<u16>,
    /// `#RRGGBB` when the feed supplies a well-formed colour.
    pub color_hint: Option<String>,
}

impl Route {
    /// Normalise a feed colour to `#RRGGBB`, discarding malformed values.
    pub fn normalize_color(raw: &str) -> Option<String> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(format!("#{}", hex.to_ascii_uppercase()))
        } else {
            None
        }
    }
}

/// A stop inside the configured region.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub name: String,
    pub location: GeoPoint,
    pub code: Option<String>,
}

/// A vertex of a shape polyline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapePoint {
    pub shape_id: ShapeId,
    pub location: GeoPoint,
    /// Ascending within a shape; not necessarily contiguous.
    pub sequence: u32,
}

/// A trip, reduced to the linkage needed for geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub shape_id: Option<ShapeId>,
    pub direction: Option<Direction>,
    pub headsign: Option<String>,
}

/// A trip's visit to a stop. Only which stops a trip serves is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct StopTime {
    pub trip_id: TripId,
    pub stop_id: StopId,
}
