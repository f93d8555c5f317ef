//! Static transit feed loading.
//!
//! Reads the routes, stops, shapes, trips and stop times tables from a
//! [`FeedSource`], keeps the rows inside the configured region, and indexes
//! them into an immutable [`FeedSnapshot`].

mod config;
mod error;
mod loader;
mod records;
mod snapshot;
mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::FeedConfig;
pub use error::DataLoadError;
pub use loader::{FeedTables, LoadStats, TableStats, load_tables};
pub use snapshot::{FeedSnapshot, StopIdx};
pub use source::{DirectorySource, FeedSource, FeedTable, MemorySource};
