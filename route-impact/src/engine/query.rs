//! Incident records as received from collaborators.

use serde::{Deserialize, Serialize};

use crate::domain::{GeoPoint, InvalidCoordinate};

/// A raw latitude/longitude pair, not yet validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// The parts of a traffic incident the engine matches on.
///
/// Every field is optional: an incident may carry a location, a description,
/// both or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQuery {
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub search_radius_meters: Option<f64>,
}

impl IncidentQuery {
    /// An incident at a point.
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            coordinates: Some(Coordinates { lat, lng }),
            ..Self::default()
        }
    }

    /// An incident described only by its location text.
    pub fn text(location_text: impl Into<String>) -> Self {
        Self {
            location_text: Some(location_text.into()),
            ..Self::default()
        }
    }

    /// Add location text.
    pub fn with_location_text(mut self, location_text: impl Into<String>) -> Self {
        self.location_text = Some(location_text.into());
        self
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Limit the coordinate search radius.
    pub fn with_radius(mut self, meters: f64) -> Self {
        self.search_radius_meters = Some(meters);
        self
    }

    /// The validated point, if coordinates were given.
    pub fn point(&self) -> Option<Result<GeoPoint, InvalidCoordinate>> {
        self.coordinates.map(|c| GeoPoint::new(c.lat, c.lng))
    }
}
