//! Override zones and text patterns.
//!
//! Both tables name routes by short name, the label operators and the public
//! use. A built-in default covers Tyne and Wear; deployments can replace it
//! with a JSON file of the same shape:
//!
//! ```json
//! {
//!   "zones": [{ "bounds": { "minLat": 54.97, "minLng": -1.62, "maxLat": 54.98, "maxLng": -1.61 },
//!               "routes": ["1", "X1"], "confidence": 1.0, "description": "City centre" }],
//!   "patterns": [{ "pattern": "a1", "routes": ["21"], "confidence": 0.85, "wholeWord": true }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{BoundingBox, GeoPoint};

/// Errors loading or validating matching tables.
#[derive(Debug, thiserror::Error)]
pub enum TablesError {
    /// Table file could not be read
    #[error("failed to read matching tables from {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Table file is not valid JSON of the expected shape
    #[error("invalid matching tables JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An override zone violates a table invariant
    #[error("override zone {index} ({description}): {reason}")]
    InvalidZone {
        index: usize,
        description: String,
        reason: String,
    },

    /// A text pattern violates a table invariant
    #[error("text pattern {index} ({pattern:?}): {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: String,
    },
}

/// A rectangle whose incidents affect a fixed set of routes, regardless of
/// geometry. Used for interchanges where every route converges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideZone {
    pub bounds: BoundingBox,
    pub routes: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
}

/// A road, landmark or area name that implies a set of routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPattern {
    /// Matched case-insensitively as a substring.
    pub pattern: String,
    pub routes: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    /// Require non-alphanumeric characters (or the text's ends) on both sides.
    #[serde(default)]
    pub whole_word: bool,
}

impl TextPattern {
    /// Whether the pattern occurs in `text`, which must already be lowercase.
    pub fn is_found_in(&self, text: &str) -> bool {
        let needle = self.pattern.to_lowercase();
        if needle.is_empty() {
            return false;
        }
        if !self.whole_word {
            return text.contains(&needle);
        }

        text.match_indices(&needle).any(|(start, _)| {
            let end = start + needle.len();
            let before = text[..start].chars().next_back();
            let after = text[end..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    }
}

fn check_confidence(confidence: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(format!("confidence {confidence} is outside [0, 1]"))
    }
}

/// Override zones and text patterns, validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingTables {
    #[serde(default)]
    pub zones: Vec<OverrideZone>,
    #[serde(default)]
    pub patterns: Vec<TextPattern>,
}

impl MatchingTables {
    /// Parse and validate tables from JSON.
    pub fn from_json(json: &str) -> Result<Self, TablesError> {
        let tables: MatchingTables = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    /// Read, parse and validate a JSON table file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TablesError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TablesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check every zone and pattern.
    pub fn validate(&self) -> Result<(), TablesError> {
        for (index, zone) in self.zones.iter().enumerate() {
            let invalid = |reason: String| TablesError::InvalidZone {
                index,
                description: zone.description.clone(),
                reason,
            };
            zone.bounds
                .validate()
                .map_err(|e| invalid(format!("bad bounds: {e}")))?;
            check_confidence(zone.confidence).map_err(invalid)?;
            if zone.routes.is_empty() {
                return Err(invalid("no routes".into()));
            }
        }

        for (index, pattern) in self.patterns.iter().enumerate() {
            let invalid = |reason: String| TablesError::InvalidPattern {
                index,
                pattern: pattern.pattern.clone(),
                reason,
            };
            if pattern.pattern.trim().is_empty() {
                return Err(invalid("empty pattern".into()));
            }
            check_confidence(pattern.confidence).map_err(invalid)?;
            if pattern.routes.is_empty() {
                return Err(invalid("no routes".into()));
            }
        }

        Ok(())
    }

    /// The first zone, in table order, containing the point.
    pub fn zone_at(&self, point: GeoPoint) -> Option<&OverrideZone> {
        self.zones.iter().find(|zone| zone.bounds.contains(point))
    }

    /// Patterns found in `text`, which must already be lowercase.
    pub fn patterns_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a TextPattern> + 'a {
        self.patterns.iter().filter(move |p| p.is_found_in(text))
    }
}

/// Builder for matching tables.
#[derive(Debug, Default)]
pub struct MatchingTablesBuilder {
    inner: MatchingTables,
}

impl MatchingTablesBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an override zone from its south-west and north-east corners.
    pub fn zone(
        mut self,
        description: &str,
        (min_lat, min_lng): (f64, f64),
        (max_lat, max_lng): (f64, f64),
        routes: &[&str],
        confidence: f64,
    ) -> Self {
        self.inner.zones.push(OverrideZone {
            bounds: BoundingBox {
                min_lat,
                min_lng,
                max_lat,
                max_lng,
            },
            routes: routes.iter().map(|r| r.to_string()).collect(),
            confidence,
            description: description.to_string(),
        });
        self
    }

    /// Add a substring pattern.
    pub fn pattern(self, pattern: &str, routes: &[&str], confidence: f64, description: &str) -> Self {
        self.push_pattern(pattern, routes, confidence, description, false)
    }

    /// Add a pattern that must stand as a whole word.
    pub fn word(self, pattern: &str, routes: &[&str], confidence: f64, description: &str) -> Self {
        self.push_pattern(pattern, routes, confidence, description, true)
    }

    fn push_pattern(
        mut self,
        pattern: &str,
        routes: &[&str],
        confidence: f64,
        description: &str,
        whole_word: bool,
    ) -> Self {
        self.inner.patterns.push(TextPattern {
            pattern: pattern.to_lowercase(),
            routes: routes.iter().map(|r| r.to_string()).collect(),
            confidence,
            description: description.to_string(),
            whole_word,
        });
        self
    }

    /// Build and validate the tables.
    pub fn build(self) -> Result<MatchingTables, TablesError> {
        self.inner.validate()?;
        Ok(self.inner)
    }

    /// Build without validation, for tables known to be well formed.
    pub(crate) fn finish(self) -> MatchingTables {
        self.inner
    }
}

/// The default tables for Tyne and Wear.
pub fn tyne_and_wear() -> MatchingTables {
    MatchingTablesBuilder::new()
        // Haymarket, Eldon Square and Central Station stands
        .zone(
            "Central interchange",
            (54.9735, -1.6180),
            (54.9780, -1.6115),
            &["1", "10", "12", "21", "X1", "X21", "Q3"],
            1.0,
        )
        .zone(
            "Gateshead Interchange",
            (54.9595, -1.6060),
            (54.9625, -1.6010),
            &["21", "X21", "53", "54", "56", "93", "94"],
            0.95,
        )
        .zone(
            "Metrocentre",
            (54.9560, -1.6700),
            (54.9610, -1.6600),
            &["X1", "10", "100", "Q3"],
            0.9,
        )
        // Major roads. "a1" must not fire inside "a167" or "a184".
        .word("a1", &["21", "X21", "X1"], 0.85, "A1 Western Bypass")
        .word("a167", &["21", "X21"], 0.8, "A167 Durham Road")
        .word("a184", &["93", "94"], 0.75, "A184 Felling bypass")
        .word("a19", &["X7", "306"], 0.75, "A19 and Tyne Tunnel approach")
        .word("a69", &["X84", "X85", "685"], 0.8, "A69 Carlisle road")
        .pattern("coast road", &["306", "308", "309"], 0.8, "A1058 Coast Road")
        .pattern("tyne tunnel", &["X7", "306"], 0.8, "Tyne Tunnel")
        .pattern("west road", &["1", "38", "39"], 0.7, "West Road, Benwell")
        .pattern("durham road", &["21", "X21", "53"], 0.75, "Durham Road, Low Fell")
        .pattern("great north road", &["X77", "X78", "43"], 0.7, "Great North Road, Gosforth")
        // Areas and landmarks
        .pattern("quayside", &["Q3", "12"], 0.7, "Newcastle Quayside")
        .pattern("metrocentre", &["X1", "10", "100"], 0.75, "Metrocentre")
        .pattern("birtley", &["21", "X21", "78"], 0.6, "Birtley")
        .pattern("washington", &["X1", "78"], 0.5, "Washington")
        .finish()
}
