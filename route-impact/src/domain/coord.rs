//! Geographic coordinate types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a coordinate pair is unusable.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum InvalidCoordinate {
    /// Latitude or longitude is NaN or infinite
    #[error("coordinate is not finite")]
    NotFinite,

    /// Latitude outside [-90, 90]
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    /// Longitude outside [-180, 180]
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// A WGS84 point with finite, in-range latitude and longitude.
///
/// Any `GeoPoint` is valid by construction, so a loaded stop or shape point can
/// never carry a NaN into distance calculations.
///
/// # Examples
///
/// ```
/// use route_impact::domain::GeoPoint;
///
/// let birtley = GeoPoint::new(54.9, -1.57).unwrap();
/// assert_eq!(birtley.lat(), 54.9);
///
/// assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
/// assert!(GeoPoint::new(91.0, 0.0).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Create a point, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(InvalidCoordinate::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinate::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(InvalidCoordinate::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Linear interpolation between two points, `t` in [0, 1].
    ///
    /// Stays valid because both endpoints are valid and `t` is clamped.
    pub(crate) fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        let t = t.clamp(0.0, 1.0);
        GeoPoint {
            lat: self.lat + t * (other.lat - self.lat),
            lng: self.lng + t * (other.lng - self.lng),
        }
    }

    /// Convert to a `geo` point (x = longitude, y = latitude).
    pub(crate) fn to_geo(self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }
}

impl fmt::Debug for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeoPoint({:.6}, {:.6})", self.lat, self.lng)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// An axis-aligned latitude/longitude rectangle with inclusive edges.
///
/// Used both for the feed's region of interest and for override zones.
/// Rectangles crossing the antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// The whole globe.
    pub const WORLD: BoundingBox = BoundingBox {
        min_lat: -90.0,
        min_lng: -180.0,
        max_lat: 90.0,
        max_lng: 180.0,
    };

    /// Build a rectangle from any two opposite corners.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            min_lat: a.lat.min(b.lat),
            min_lng: a.lng.min(b.lng),
            max_lat: a.lat.max(b.lat),
            max_lng: a.lng.max(b.lng),
        }
    }

    /// Tyne and Wear plus the surrounding commuter belt.
    pub fn north_east_england() -> Self {
        Self {
            min_lat: 54.70,
            min_lng: -2.00,
            max_lat: 55.20,
            max_lng: -1.20,
        }
    }

    /// Whether the point lies inside or on the edge of the rectangle.
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }

    /// Checks the invariants a deserialized rectangle may violate.
    pub fn validate(&self) -> Result<(), InvalidCoordinate> {
        GeoPoint::new(self.min_lat, self.min_lng)?;
        GeoPoint::new(self.max_lat, self.max_lng)?;
        if self.min_lat > self.max_lat {
            return Err(InvalidCoordinate::Latitude(self.min_lat));
        }
        if self.min_lng > self.max_lng {
            return Err(InvalidCoordinate::Longitude(self.min_lng));
        }
        Ok(())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::north_east_england()
    }
}
