use serde::{Deserialize, Serialize};

use crate::data::poi::{GeoPoint, WeightedPoi};
use crate::error::{AccessError, Result};

/// A population mass at a location. Identity is the position in its
/// [`PointSet`]; `attributes` holds the original record's fields so they
/// can be written back out untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    location: GeoPoint,
    weight: f64,
    attributes: Vec<String>,
}

impl DemandPoint {
    pub fn new(location: GeoPoint, weight: f64) -> Self {
        Self {
            location,
            weight,
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(location: GeoPoint, weight: f64, attributes: Vec<String>) -> Self {
        Self {
            location,
            weight,
            attributes,
        }
    }

    pub fn get_location(&self) -> &GeoPoint {
        &self.location
    }

    pub fn get_weight(&self) -> f64 {
        self.weight
    }

    pub fn get_attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Copy of this point with the weight multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            weight: self.weight * factor,
            ..self.clone()
        }
    }
}

/// A resource location (e.g. a charging station) with its capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyPoint {
    location: GeoPoint,
    capacity: f64,
    attributes: Vec<String>,
}

impl SupplyPoint {
    pub fn new(location: GeoPoint, capacity: f64) -> Self {
        Self {
            location,
            capacity,
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(location: GeoPoint, capacity: f64, attributes: Vec<String>) -> Self {
        Self {
            location,
            capacity,
            attributes,
        }
    }

    pub fn get_location(&self) -> &GeoPoint {
        &self.location
    }

    pub fn get_capacity(&self) -> f64 {
        self.capacity
    }

    pub fn get_attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            capacity: self.capacity * factor,
            ..self.clone()
        }
    }
}

impl WeightedPoi for DemandPoint {
    fn get_location(&self) -> &GeoPoint {
        &self.location
    }

    fn get_weight(&self) -> f64 {
        self.weight
    }
}

impl WeightedPoi for SupplyPoint {
    fn get_location(&self) -> &GeoPoint {
        &self.location
    }

    fn get_weight(&self) -> f64 {
        self.capacity
    }
}

/// An ordered collection of points sharing one coordinate system.
///
/// `columns` names the entries of each point's `attributes`; `crs` is an
/// optional label that is only ever compared, never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet<T> {
    points: Vec<T>,
    columns: Vec<String>,
    crs: Option<String>,
}

impl<T> PointSet<T> {
    pub fn new(points: Vec<T>) -> Self {
        Self {
            points,
            columns: Vec::new(),
            crs: None,
        }
    }

    pub fn with_columns(points: Vec<T>, columns: Vec<String>) -> Self {
        Self {
            points,
            columns,
            crs: None,
        }
    }

    pub fn set_crs(&mut self, crs: Option<String>) {
        self.crs = crs;
    }

    pub fn get_crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub fn get_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn points(&self) -> &[T] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }
}

impl<T: WeightedPoi> PointSet<T> {
    pub fn locations(&self) -> Vec<GeoPoint> {
        self.points.iter().map(|p| *p.get_location()).collect()
    }

    /// Checks the shape of the set: non-empty, finite coordinates, finite
    /// non-negative weights. `label` names the set in error messages.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.points.is_empty() {
            return Err(AccessError::InvalidInput(format!("{} point set is empty", label)));
        }

        for (idx, point) in self.points.iter().enumerate() {
            let location = point.get_location();
            if !location.is_finite() {
                return Err(AccessError::InvalidInput(format!(
                    "{} point {} has a non-finite coordinate ({}, {})",
                    label, idx, location.x, location.y
                )));
            }

            let weight = point.get_weight();
            if !weight.is_finite() || weight < 0.0 {
                return Err(AccessError::InvalidInput(format!(
                    "{} point {} has weight {}, expected a finite value >= 0",
                    label, idx, weight
                )));
            }
        }

        Ok(())
    }
}

impl<T> FromIterator<T> for PointSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_sets() {
        let set: PointSet<DemandPoint> = PointSet::new(Vec::new());
        assert!(matches!(set.validate("demand"), Err(AccessError::InvalidInput(_))));
    }

    #[test]
    fn validate_rejects_negative_and_nan_weights() {
        let negative = PointSet::new(vec![DemandPoint::new(GeoPoint::new(0.0, 0.0), -1.0)]);
        assert!(matches!(negative.validate("demand"), Err(AccessError::InvalidInput(_))));

        let nan = PointSet::new(vec![SupplyPoint::new(GeoPoint::new(0.0, 0.0), f64::NAN)]);
        assert!(matches!(nan.validate("supply"), Err(AccessError::InvalidInput(_))));
    }

    #[test]
    fn validate_rejects_non_finite_coordinates() {
        let set = PointSet::new(vec![SupplyPoint::new(GeoPoint::new(f64::INFINITY, 0.0), 1.0)]);
        assert!(matches!(set.validate("supply"), Err(AccessError::InvalidInput(_))));
    }

    #[test]
    fn zero_weight_is_valid() {
        let set = PointSet::new(vec![DemandPoint::new(GeoPoint::new(0.0, 0.0), 0.0)]);
        assert!(set.validate("demand").is_ok());
    }

    #[test]
    fn scaling_keeps_location_and_attributes() {
        let point = SupplyPoint::with_attributes(GeoPoint::new(1.0, 2.0), 3.0, vec!["a".into()]);
        let scaled = point.scaled(2.0);
        assert_eq!(scaled.get_capacity(), 6.0);
        assert_eq!(scaled.get_location(), point.get_location());
        assert_eq!(scaled.get_attributes(), point.get_attributes());
    }
}
