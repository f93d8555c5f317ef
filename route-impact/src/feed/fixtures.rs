//! A small synthetic feed around Birtley and central Newcastle.
//!
//! Route 21 runs north-south along longitude -1.5700 (outbound) and -1.5702
//! (inbound) between 54.88N and 54.92N. X21 shares the outbound shape. X1 runs
//! east-west along 54.9760N through the central interchange. Route 78 has no
//! shape and is only reachable through its stops at -1.6200.
//!
//! Each table also carries rows the loader must reject.

use super::source::{FeedTable, MemorySource};

pub(crate) const ROUTES: &str = "\
route_id,agency_id,route_short_name,route_long_name,route_type,route_color
R21,GNE,21,Newcastle - Durham,3,e2001a
RX21,GNE,X21,Newcastle - Durham Express,3,
RX1,GNE,X1,Newcastle - Metrocentre,3,00ff00
R78,GNE,78,Birtley - Washington,3,
R21,GNE,21A,Duplicate id,3,
";

pub(crate) const STOPS: &str = "\
stop_id,stop_code,stop_name,stop_lat,stop_lon,location_type
S1,ntyadg,Birtley North,54.885,-1.5700,0
S2,,Birtley Interchange,54.900,-1.5700,0
S3,,Birtley South,54.915,-1.5700,0
S4,,Portobello,54.900,-1.6200,0
S5,,Vigo,54.905,-1.6200,0
S6,,Kings Cross,51.5308,-0.1238,0
S7,,Broken,NaN,-1.5700,0
S8,,No coordinates,,,0
";

pub(crate) const SHAPES: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence,shape_dist_traveled
S21_0,54.880,-1.5700,10,
S21_0,54.890,-1.5700,20,
S21_0,54.900,-1.5700,30,
S21_0,54.910,-1.5700,40,
S21_0,54.920,-1.5700,50,
S21_0,abc,-1.5700,60,
S21_1,54.920,-1.5702,1,
S21_1,54.900,-1.5702,2,
S21_1,54.880,-1.5702,3,
SX1,54.9760,-1.7000,1,
SX1,54.9760,-1.6500,2,
SX1,54.9760,-1.6000,3,
SX1,54.9760,-1.5500,4,
SX1,51.5000,-0.1200,5,
";

pub(crate) const TRIPS: &str = "\
route_id,service_id,trip_id,trip_headsign,direction_id,shape_id
R21,WK,T21_0,Durham,0,S21_0
R21,WK,T21_1,Newcastle,1,S21_1
RX21,WK,TX21_0,Durham,0,S21_0
RX1,WK,TX1_0,Metrocentre,0,SX1
R78,WK,T78_0,Washington,0,
GHOST,WK,TG,Nowhere,0,S21_0
";

pub(crate) const STOP_TIMES: &str = "\
trip_id,arrival_time,departure_time,stop_id,stop_sequence
T21_0,08:00:00,08:00:00,S1,1
T21_0,08:05:00,08:05:00,S2,2
T21_0,08:10:00,08:10:00,S3,3
T78_0,09:00:00,09:00:00,S4,1
T78_0,09:04:00,09:04:00,S5,2
T78_0,09:30:00,09:30:00,S6,3
";

/// The full fixture feed.
pub(crate) fn tyne_and_wear() -> MemorySource {
    MemorySource::new()
        .with_table(FeedTable::Routes, ROUTES)
        .with_table(FeedTable::Stops, STOPS)
        .with_table(FeedTable::Shapes, SHAPES)
        .with_table(FeedTable::Trips, TRIPS)
        .with_table(FeedTable::StopTimes, STOP_TIMES)
}
