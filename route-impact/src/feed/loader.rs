//! CSV parsing of feed tables into typed, region-filtered rows.

use std::collections::HashSet;

use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{BoundingBox, Route, ShapePoint, Stop, StopTime, Trip};

use super::error::DataLoadError;
use super::records::{
    FeedRecord, Row, RouteRecord, ShapeRecord, StopRecord, StopTimeRecord, TripRecord,
};
use super::source::{FeedSource, FeedTable};

/// Row accounting for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    /// Data rows read, excluding the header.
    pub rows: usize,
    /// Rows kept.
    pub loaded: usize,
    /// Rows that could not be parsed, lacked key fields, or repeated an id.
    pub skipped: usize,
    /// Rows with valid coordinates outside the region.
    pub out_of_region: usize,
    /// Rows referencing a route, trip, or stop that was not loaded.
    pub unlinked: usize,
}

/// Outcome of a feed load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    pub routes: TableStats,
    pub stops: TableStats,
    pub shapes: TableStats,
    pub trips: TableStats,
    pub stop_times: TableStats,
    /// Optional tables that were missing or unreadable.
    pub absent: Vec<FeedTable>,
    pub route_shapes: usize,
    pub segments: usize,
    pub shape_grid_cells: usize,
    pub stop_grid_cells: usize,
    pub elapsed_ms: u64,
}

impl LoadStats {
    /// Rows skipped as malformed across all tables.
    pub fn total_skipped(&self) -> usize {
        [
            self.routes,
            self.stops,
            self.shapes,
            self.trips,
            self.stop_times,
        ]
        .iter()
        .map(|t| t.skipped)
        .sum()
    }
}

/// The typed tables of one feed, before geometry assembly.
#[derive(Debug, Clone, Default)]
pub struct FeedTables {
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub shape_points: Vec<ShapePoint>,
    pub trips: Vec<Trip>,
    pub stop_times: Vec<StopTime>,
    pub stats: LoadStats,
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn unreadable(file: FeedTable, cause: impl ToString) -> DataLoadError {
    DataLoadError::Unreadable {
        file,
        cause: cause.to_string(),
    }
}

/// Parse one table's bytes.
///
/// A header row lacking a required column makes the whole table unreadable;
/// individual bad rows are only counted.
pub(crate) fn parse_table<R: FeedRecord>(
    data: &[u8],
    bounds: &BoundingBox,
) -> Result<(Vec<R::Item>, TableStats), DataLoadError> {
    let table = R::TABLE;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(strip_utf8_bom(data));

    let headers = reader.headers().map_err(|e| unreadable(table, e))?.clone();
    for column in table.required_columns() {
        if !headers.iter().any(|h| h == *column) {
            return Err(unreadable(table, format!("missing column {column}")));
        }
    }

    let mut items = Vec::new();
    let mut stats = TableStats::default();

    for result in reader.deserialize::<R>() {
        stats.rows += 1;
        match result {
            Ok(record) => match record.into_item(bounds) {
                Row::Kept(item) => items.push(item),
                Row::Malformed => stats.skipped += 1,
                Row::OutOfRegion => stats.out_of_region += 1,
            },
            Err(e) if e.is_io_error() => return Err(unreadable(table, e)),
            Err(_) => stats.skipped += 1,
        }
    }

    stats.loaded = items.len();
    debug!(
        file = %table,
        rows = stats.rows,
        skipped = stats.skipped,
        out_of_region = stats.out_of_region,
        "Parsed feed table"
    );
    Ok((items, stats))
}

/// Read and parse a table. `Ok(None)` if the source does not have it.
fn read_table<R: FeedRecord>(
    source: &dyn FeedSource,
    bounds: &BoundingBox,
) -> Result<Option<(Vec<R::Item>, TableStats)>, DataLoadError> {
    let table = R::TABLE;
    match source.read(table).map_err(|e| unreadable(table, e))? {
        Some(bytes) => parse_table::<R>(&bytes, bounds).map(Some),
        None => Ok(None),
    }
}

fn read_required<R: FeedRecord>(
    source: &dyn FeedSource,
    bounds: &BoundingBox,
) -> Result<(Vec<R::Item>, TableStats), DataLoadError> {
    read_table::<R>(source, bounds)?.ok_or(DataLoadError::Missing { file: R::TABLE })
}

/// Optional tables degrade to empty; the table is recorded as absent.
fn read_optional<R: FeedRecord>(
    source: &dyn FeedSource,
    bounds: &BoundingBox,
    absent: &mut Vec<FeedTable>,
) -> (Vec<R::Item>, TableStats) {
    match read_table::<R>(source, bounds) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            debug!(file = %R::TABLE, "Optional feed table not present");
            absent.push(R::TABLE);
            Default::default()
        }
        Err(e) => {
            warn!(file = %R::TABLE, error = %e, "Ignoring unreadable optional feed table");
            absent.push(R::TABLE);
            Default::default()
        }
    }
}

/// Keep the first row for each key; later repeats count as skipped.
fn dedup_by<T, K: Eq + std::hash::Hash>(
    items: Vec<T>,
    stats: &mut TableStats,
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut seen = HashSet::new();
    let kept: Vec<T> = items.into_iter().filter(|item| seen.insert(key(item))).collect();
    stats.skipped += stats.loaded - kept.len();
    stats.loaded = kept.len();
    kept
}

/// Load every table the engine uses from `source`.
///
/// Routes, stops and trips are required. Trips referencing unknown routes and
/// stop times referencing unknown trips or stops are dropped and counted as
/// unlinked.
pub fn load_tables(
    source: &dyn FeedSource,
    bounds: &BoundingBox,
) -> Result<FeedTables, DataLoadError> {
    let mut stats = LoadStats::default();

    let (routes, mut route_stats) = read_required::<RouteRecord>(source, bounds)?;
    let routes = dedup_by(routes, &mut route_stats, |r| r.id.clone());
    stats.routes = route_stats;

    let (stops, mut stop_stats) = read_required::<StopRecord>(source, bounds)?;
    let stops = dedup_by(stops, &mut stop_stats, |s| s.id.clone());
    stats.stops = stop_stats;

    let (shape_points, shape_stats) = read_optional::<ShapeRecord>(source, bounds, &mut stats.absent);
    stats.shapes = shape_stats;

    let (trips, mut trip_stats) = read_required::<TripRecord>(source, bounds)?;
    let route_ids: HashSet<_> = routes.iter().map(|r| &r.id).collect();
    let trips = dedup_by(trips, &mut trip_stats, |t| t.id.clone());
    let trips: Vec<Trip> = trips
        .into_iter()
        .filter(|t| route_ids.contains(&t.route_id))
        .collect();
    trip_stats.unlinked = trip_stats.loaded - trips.len();
    trip_stats.loaded = trips.len();
    stats.trips = trip_stats;

    let (stop_times, mut stop_time_stats) =
        read_optional::<StopTimeRecord>(source, bounds, &mut stats.absent);
    let trip_ids: HashSet<_> = trips.iter().map(|t| &t.id).collect();
    let stop_ids: HashSet<_> = stops.iter().map(|s| &s.id).collect();
    let stop_times: Vec<StopTime> = stop_times
        .into_iter()
        .filter(|st| trip_ids.contains(&st.trip_id) && stop_ids.contains(&st.stop_id))
        .collect();
    stop_time_stats.unlinked = stop_time_stats.loaded - stop_times.len();
    stop_time_stats.loaded = stop_times.len();
    stats.stop_times = stop_time_stats;

    Ok(FeedTables {
        routes,
        stops,
        shape_points,
        trips,
        stop_times,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RouteId;
    use crate::feed::fixtures;
    use crate::feed::source::MemorySource;

    fn region() -> BoundingBox {
        BoundingBox::north_east_england()
    }

    #[test]
    fn loads_fixture_feed() {
        let tables = load_tables(&fixtures::tyne_and_wear(), &region()).unwrap();

        assert_eq!(tables.routes.len(), 4);
        assert_eq!(tables.stops.len(), 5);
        assert_eq!(tables.trips.len(), 5);
        assert!(tables.stats.absent.is_empty());

        // The second R21 row repeats an id and is skipped
        assert_eq!(tables.stats.routes.skipped, 1);
        assert_eq!(tables.routes[0].short_name, "21");

        // London stop, NaN stop and a stop without coordinates
        assert_eq!(tables.stats.stops.out_of_region, 1);
        assert_eq!(tables.stats.stops.skipped, 2);

        assert_eq!(tables.stats.shapes.out_of_region, 1);
        assert_eq!(tables.stats.shapes.skipped, 1);

        assert_eq!(tables.stats.trips.unlinked, 1);
        assert_eq!(tables.stats.stop_times.unlinked, 1);
        assert_eq!(tables.stats.total_skipped(), 4);
    }

    #[test]
    fn strips_bom_and_trims_headers() {
        let data = "\u{feff} route_id , route_short_name \n R1 , 21 \n";
        let (routes, stats) = parse_table::<RouteRecord>(data.as_bytes(), &region()).unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(routes[0].id, RouteId::new("R1"));
        assert_eq!(routes[0].short_name, "21");
    }

    #[test]
    fn ignores_unknown_columns_and_counts_bad_rows() {
        let data = "stop_id,zone_id,stop_lat,stop_lon,wheelchair_boarding\n\
                    S1,Z1,54.9,-1.57,1\n\
                    S2,Z1,fifty-four,-1.57,1\n\
                    S3\n";
        let (stops, stats) = parse_table::<StopRecord>(data.as_bytes(), &region()).unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn missing_required_column_is_unreadable() {
        let data = "stop_id,stop_name,stop_lat\nS1,Birtley,54.9\n";
        let err = parse_table::<StopRecord>(data.as_bytes(), &region()).unwrap_err();
        assert_eq!(
            err,
            DataLoadError::Unreadable {
                file: FeedTable::Stops,
                cause: "missing column stop_lon".into(),
            }
        );
    }

    #[test]
    fn missing_required_table() {
        let source = fixtures::tyne_and_wear().without_table(FeedTable::Trips);
        let err = load_tables(&source, &region()).unwrap_err();
        assert_eq!(
            err,
            DataLoadError::Missing {
                file: FeedTable::Trips
            }
        );
    }

    #[test]
    fn missing_optional_tables_are_recorded() {
        let source = fixtures::tyne_and_wear()
            .without_table(FeedTable::Shapes)
            .without_table(FeedTable::StopTimes);
        let tables = load_tables(&source, &region()).unwrap();
        assert!(tables.shape_points.is_empty());
        assert!(tables.stop_times.is_empty());
        assert_eq!(tables.stats.absent, vec![FeedTable::Shapes, FeedTable::StopTimes]);
    }

    #[test]
    fn unreadable_optional_table_degrades() {
        let source = fixtures::tyne_and_wear().with_table(FeedTable::Shapes, "shape_id,foo\nS1,2\n");
        let tables = load_tables(&source, &region()).unwrap();
        assert!(tables.shape_points.is_empty());
        assert_eq!(tables.stats.absent, vec![FeedTable::Shapes]);
    }

    #[test]
    fn stop_times_need_only_trip_and_stop() {
        let source = fixtures::tyne_and_wear()
            .with_table(FeedTable::StopTimes, "trip_id,stop_id\nT21_0,S1\nT21_0,S2\n");
        let tables = load_tables(&source, &region()).unwrap();
        assert_eq!(tables.stop_times.len(), 2);
        assert_eq!(tables.stop_times[1].stop_id.as_str(), "S2");
        assert!(tables.stats.absent.is_empty());
    }

    #[test]
    fn empty_required_table_is_unreadable() {
        let source = MemorySource::new()
            .with_table(FeedTable::Routes, "")
            .with_table(FeedTable::Stops, "stop_id,stop_lat,stop_lon\n")
            .with_table(FeedTable::Trips, "trip_id,route_id\n");
        let err = load_tables(&source, &region()).unwrap_err();
        assert_eq!(err.file(), Some(FeedTable::Routes));
    }
}
