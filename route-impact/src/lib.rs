//! Bus route impact engine.
//!
//! Answers: "which bus routes does this traffic incident affect?" Incidents
//! are matched against a static transit feed by location and by the road
//! and place names in their text.

pub mod cache;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod geometry;
pub mod matcher;
