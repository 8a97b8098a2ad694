use serde::{Deserialize, Serialize};

use crate::models::point::DemandPoint;

/// A demand record with its accessibility score appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedDemand {
    pub point: DemandPoint,
    pub accessibility: f64,
}

/// Counts of points resolved by the zero-contribution fallback.
///
/// None of these abort a run; they are reported for visibility only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub supply_count: usize,
    pub demand_count: usize,
    /// Supply points with no demand point within the catchment radius.
    pub unreached_supply: usize,
    /// Supply points whose decayed competing demand fell below epsilon.
    pub negligible_competition: usize,
    /// Demand points with no supply point within the catchment radius.
    pub unreached_demand: usize,
}

impl Diagnostics {
    /// Supply points whose ratio was forced to zero for either reason.
    pub fn zero_ratio_supply(&self) -> usize {
        self.unreached_supply + self.negligible_competition
    }
}

/// Output of one accessibility run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityResult {
    /// Input demand order preserved.
    pub demand: Vec<AugmentedDemand>,
    /// Aligned by index with the input supply collection.
    pub supply_ratios: Vec<f64>,
    pub diagnostics: Diagnostics,
}

impl AccessibilityResult {
    pub fn scores(&self) -> Vec<f64> {
        self.demand.iter().map(|d| d.accessibility).collect()
    }
}
