//! Matching configuration.

/// Distance-to-confidence mapping.
///
/// `clamp(1 - d / max_radius, 0, 1) ^ exponent`, plus every boost whose
/// threshold `d` falls under, clamped to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceCurve {
    /// Below 1 the curve falls off gently, above 1 steeply.
    pub exponent: f64,

    /// `(threshold_m, boost)` pairs. Boosts are cumulative.
    pub boosts: Vec<(f64, f64)>,
}

impl ConfidenceCurve {
    /// Create a curve with the default near-distance boosts.
    pub fn new(exponent: f64) -> Self {
        Self {
            exponent,
            boosts: vec![(50.0, 0.2), (25.0, 0.3)],
        }
    }

    /// Replace the near-distance boosts.
    pub fn with_boosts(mut self, boosts: Vec<(f64, f64)>) -> Self {
        self.boosts = boosts;
        self
    }

    /// Confidence for a candidate `distance_m` away, searched out to
    /// `max_radius_m`. Always in [0, 1] and non-increasing in distance.
    pub fn score(&self, distance_m: f64, max_radius_m: f64) -> f64 {
        if !distance_m.is_finite() || max_radius_m <= 0.0 {
            return 0.0;
        }
        let base = (1.0 - distance_m / max_radius_m).clamp(0.0, 1.0);
        let boost: f64 = self
            .boosts
            .iter()
            .filter(|(threshold, _)| distance_m < *threshold)
            .map(|(_, boost)| boost.max(0.0))
            .sum();
        (base.powf(self.exponent) + boost).clamp(0.0, 1.0)
    }
}

/// Configuration for coordinate and text matching.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Ascending search radii in metres, tried in order.
    pub search_radii_m: Vec<f64>,

    /// Radius used when a query does not give one.
    pub default_radius_m: f64,

    /// Largest radius a query may ask for; larger requests are clamped.
    pub max_search_radius_m: f64,

    /// A segment closer than this ends the scan of its shape.
    pub early_exit_m: f64,

    /// Scoring for distances to shape geometry.
    pub shape_curve: ConfidenceCurve,

    /// Scoring for distances to stops of routes without geometry.
    pub stop_curve: ConfidenceCurve,

    /// Most routes reported per incident.
    pub max_routes: usize,

    /// Confidence at or above this is `high` accuracy.
    pub high_threshold: f64,

    /// Confidence at or above this is `medium` accuracy.
    pub medium_threshold: f64,
}

impl MatchConfig {
    /// The radii to try for a search out to `max_radius_m`, ascending.
    ///
    /// Configured radii beyond the maximum are dropped and the maximum itself
    /// is appended when it is not already listed.
    pub fn radii_up_to(&self, max_radius_m: f64) -> Vec<f64> {
        let mut radii: Vec<f64> = self
            .search_radii_m
            .iter()
            .copied()
            .filter(|r| *r > 0.0 && *r <= max_radius_m)
            .collect();
        radii.sort_by(f64::total_cmp);
        radii.dedup();
        if radii.last().is_none_or(|last| *last < max_radius_m) {
            radii.push(max_radius_m);
        }
        radii
    }

    /// Set the search radii.
    pub fn with_search_radii(mut self, radii_m: Vec<f64>) -> Self {
        self.search_radii_m = radii_m;
        self
    }

    /// Set the default search radius.
    pub fn with_default_radius(mut self, radius_m: f64) -> Self {
        self.default_radius_m = radius_m;
        self
    }

    /// Set the largest radius a query may ask for.
    pub fn with_max_search_radius(mut self, radius_m: f64) -> Self {
        self.max_search_radius_m = radius_m;
        self
    }

    /// The radius to search for a requested one: the default when the
    /// request is missing or unusable, never more than the configured cap.
    pub fn effective_radius(&self, requested_m: Option<f64>) -> f64 {
        requested_m
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.default_radius_m)
            .min(self.max_search_radius_m)
    }

    /// Set the maximum number of reported routes.
    pub fn with_max_routes(mut self, max_routes: usize) -> Self {
        self.max_routes = max_routes;
        self
    }

    /// Set both scoring curves.
    pub fn with_curves(mut self, shape: ConfidenceCurve, stop: ConfidenceCurve) -> Self {
        self.shape_curve = shape;
        self.stop_curve = stop;
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            search_radii_m: vec![75.0, 150.0, 300.0, 500.0],
            default_radius_m: 500.0,
            max_search_radius_m: 5_000.0,
            early_exit_m: 50.0,
            shape_curve: ConfidenceCurve::new(0.5),
            stop_curve: ConfidenceCurve::new(2.0),
            max_routes: 12,
            high_threshold: 0.8,
            medium_threshold: 0.5,
        }
    }
}
