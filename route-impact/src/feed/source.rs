//! Where feed tables come from.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// The feed tables the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedTable {
    Routes,
    Stops,
    Shapes,
    Trips,
    StopTimes,
}

impl FeedTable {
    /// All tables, in load order.
    pub const ALL: [FeedTable; 5] = [
        FeedTable::Routes,
        FeedTable::Stops,
        FeedTable::Shapes,
        FeedTable::Trips,
        FeedTable::StopTimes,
    ];

    /// Conventional file name within a feed.
    pub fn file_name(self) -> &'static str {
        match self {
            FeedTable::Routes => "routes.txt",
            FeedTable::Stops => "stops.txt",
            FeedTable::Shapes => "shapes.txt",
            FeedTable::Trips => "trips.txt",
            FeedTable::StopTimes => "stop_times.txt",
        }
    }

    /// Whether loading fails without this table.
    ///
    /// Without shapes the engine falls back to stop proximity; without
    /// stop times it loses that fallback too. Neither is fatal.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            FeedTable::Routes | FeedTable::Stops | FeedTable::Trips
        )
    }

    /// Columns that must be present in the header row.
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            FeedTable::Routes => &["route_id"],
            FeedTable::Stops => &["stop_id", "stop_lat", "stop_lon"],
            FeedTable::Shapes => &["shape_id", "shape_pt_lat", "shape_pt_lon", "shape_pt_sequence"],
            FeedTable::Trips => &["trip_id", "route_id"],
            FeedTable::StopTimes => &["trip_id", "stop_id"],
        }
    }
}

impl fmt::Display for FeedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A provider of raw feed table contents.
///
/// This abstraction allows the loader to be tested with in-memory fixtures.
/// Implementations are called from a blocking worker thread.
pub trait FeedSource: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Read a whole table. `Ok(None)` means the table does not exist.
    fn read(&self, table: FeedTable) -> io::Result<Option<Vec<u8>>>;
}

/// A feed unpacked into a directory of `*.txt` files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// Create a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The feed directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FeedSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn read(&self, table: FeedTable) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.dir.join(table.file_name())) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A feed held in memory, table by table.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<FeedTable, Vec<u8>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table's CSV contents.
    pub fn with_table(mut self, table: FeedTable, contents: impl Into<String>) -> Self {
        self.tables.insert(table, contents.into().into_bytes());
        self
    }

    /// Remove a table.
    pub fn without_table(mut self, table: FeedTable) -> Self {
        self.tables.remove(&table);
        self
    }
}

impl FeedSource for MemorySource {
    fn describe(&self) -> String {
        format!("in-memory feed ({} tables)", self.tables.len())
    }

    fn read(&self, table: FeedTable) -> io::Result<Option<Vec<u8>>> {
        Ok(self.tables.get(&table).cloned())
    }
}
