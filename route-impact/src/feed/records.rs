//! Raw CSV rows and their conversion into domain types.
//!
//! Each record mirrors the columns the engine consumes from one feed file.
//! Unknown columns are ignored by serde; a row that fails to deserialize or
//! to validate is skipped by the loader and counted.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::{
    BoundingBox, Direction, GeoPoint, Route, RouteId, ShapeId, ShapePoint, Stop, StopId, StopTime,
    Trip, TripId,
};

use super::source::FeedTable;

/// What became of one row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Row<T> {
    Kept(T),
    /// Missing key fields or unusable values.
    Malformed,
    /// Valid, but outside the configured region.
    OutOfRegion,
}

/// A CSV row type for one feed table.
pub(crate) trait FeedRecord: DeserializeOwned {
    type Item;

    const TABLE: FeedTable;

    fn into_item(self, bounds: &BoundingBox) -> Row<Self::Item>;
}

/// Treat blank text as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A required key column: absent or blank makes the row malformed.
fn key(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Validate a coordinate pair and check it against the region.
fn locate(lat: Option<f64>, lng: Option<f64>, bounds: &BoundingBox) -> Row<GeoPoint> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Row::Malformed;
    };
    match GeoPoint::new(lat, lng) {
        Ok(point) if bounds.contains(point) => Row::Kept(point),
        Ok(_) => Row::OutOfRegion,
        Err(_) => Row::Malformed,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RouteRecord {
    route_id: String,
    route_short_name: Option<String>,
    route_long_name: Option<String>,
    route_type: Option<u16>,
    route_color: Option<String>,
}

impl FeedRecord for RouteRecord {
    type Item = Route;

    const TABLE: FeedTable = FeedTable::Routes;

    fn into_item(self, _bounds: &BoundingBox) -> Row<Route> {
        let Some(id) = key(self.route_id) else {
            return Row::Malformed;
        };
        let long_name = non_blank(self.route_long_name);
        let short_name = non_blank(self.route_short_name)
            .or_else(|| long_name.clone())
            .unwrap_or_else(|| id.clone());

        Row::Kept(Route {
            id: RouteId::new(id),
            short_name,
            long_name,
            route_type: self.route_type,
            color_hint: self
                .route_color
                .as_deref()
                .and_then(Route::normalize_color),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StopRecord {
    stop_id: String,
    stop_name: Option<String>,
    stop_lat: Option<f64>,
    stop_lon: Option<f64>,
    stop_code: Option<String>,
}

impl FeedRecord for StopRecord {
    type Item = Stop;

    const TABLE: FeedTable = FeedTable::Stops;

    fn into_item(self, bounds: &BoundingBox) -> Row<Stop> {
        let Some(id) = key(self.stop_id) else {
            return Row::Malformed;
        };
        let location = match locate(self.stop_lat, self.stop_lon, bounds) {
            Row::Kept(point) => point,
            Row::Malformed => return Row::Malformed,
            Row::OutOfRegion => return Row::OutOfRegion,
        };

        Row::Kept(Stop {
            name: non_blank(self.stop_name).unwrap_or_else(|| id.clone()),
            id: StopId::new(id),
            location,
            code: non_blank(self.stop_code),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShapeRecord {
    shape_id: String,
    shape_pt_lat: Option<f64>,
    shape_pt_lon: Option<f64>,
    shape_pt_sequence: u32,
}

impl FeedRecord for ShapeRecord {
    type Item = ShapePoint;

    const TABLE: FeedTable = FeedTable::Shapes;

    fn into_item(self, bounds: &BoundingBox) -> Row<ShapePoint> {
        let Some(id) = key(self.shape_id) else {
            return Row::Malformed;
        };
        match locate(self.shape_pt_lat, self.shape_pt_lon, bounds) {
            Row::Kept(location) => Row::Kept(ShapePoint {
                shape_id: ShapeId::new(id),
                location,
                sequence: self.shape_pt_sequence,
            }),
            Row::Malformed => Row::Malformed,
            Row::OutOfRegion => Row::OutOfRegion,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TripRecord {
    trip_id: String,
    route_id: String,
    shape_id: Option<String>,
    direction_id: Option<u8>,
    trip_headsign: Option<String>,
}

impl FeedRecord for TripRecord {
    type Item = Trip;

    const TABLE: FeedTable = FeedTable::Trips;

    fn into_item(self, _bounds: &BoundingBox) -> Row<Trip> {
        let (Some(id), Some(route_id)) = (key(self.trip_id), key(self.route_id)) else {
            return Row::Malformed;
        };
        Row::Kept(Trip {
            id: TripId::new(id),
            route_id: RouteId::new(route_id),
            shape_id: non_blank(self.shape_id).map(ShapeId::new),
            direction: self.direction_id.and_then(Direction::from_id),
            headsign: non_blank(self.trip_headsign),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StopTimeRecord {
    trip_id: String,
    stop_id: String,
}

impl FeedRecord for StopTimeRecord {
    type Item = StopTime;

    const TABLE: FeedTable = FeedTable::StopTimes;

    fn into_item(self, _bounds: &BoundingBox) -> Row<StopTime> {
        let (Some(trip_id), Some(stop_id)) = (key(self.trip_id), key(self.stop_id)) else {
            return Row::Malformed;
        };
        Row::Kept(StopTime {
            trip_id: TripId::new(trip_id),
            stop_id: StopId::new(stop_id),
        })
    }
}
