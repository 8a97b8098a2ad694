use serde::{Deserialize, Serialize};

/// A planar coordinate in a projected, linear-unit reference system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        self.distance_sq_to(other).sqrt()
    }

    /// Squared Euclidean distance. Radius tests compare this against `r * r`
    /// everywhere so that index queries and brute force agree exactly.
    pub fn distance_sq_to(&self, other: &GeoPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A located record carrying one non-negative mass (population or capacity).
pub trait WeightedPoi {
    fn get_location(&self) -> &GeoPoint;
    fn get_weight(&self) -> f64;
}
