use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::access_config::AccessConfig;
use crate::config::constants::PROGRESS_MIN_POINTS;
use crate::core::kernel::{DistanceDecay, GaussianKernel};
use crate::data::poi::GeoPoint;
use crate::error::{AccessError, Result};
use crate::models::point::{DemandPoint, PointSet, SupplyPoint};
use crate::models::result::{AccessibilityResult, AugmentedDemand, Diagnostics};
use crate::utils::logging::{self, AccessStep, OperationCategory};
use crate::utils::spatial_index::SpatialIndex;

/// Outcome of Step 1 for a single supply point.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SupplyOutcome {
    Ratio(f64),
    /// No demand point within the catchment radius.
    Unreached,
    /// Decayed competing demand below the epsilon floor.
    Negligible,
}

impl SupplyOutcome {
    fn ratio(self) -> f64 {
        match self {
            SupplyOutcome::Ratio(r) => r,
            SupplyOutcome::Unreached | SupplyOutcome::Negligible => 0.0,
        }
    }
}

/// Step 1 output: one ratio per supply point plus the fallback counts.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyRatios {
    pub ratios: Vec<f64>,
    pub unreached: usize,
    pub negligible_competition: usize,
}

/// Step 2 output: one score per demand point plus the fallback count.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandScores {
    pub scores: Vec<f64>,
    pub unreached: usize,
}

/// Gaussian two-step floating catchment area over one demand and one
/// supply set.
///
/// Construction performs the whole validation pass and builds both spatial
/// indices; after that neither step can fail. Each step only reads shared
/// immutable state and writes its own output slot, so both run on the rayon
/// pool when `parallel` is set. Sums are accumulated in ascending neighbour
/// index order, which makes the result identical whether or not the run is
/// parallel.
#[derive(Debug)]
pub struct AccessibilityEngine<'a> {
    demand: &'a PointSet<DemandPoint>,
    supply: &'a PointSet<SupplyPoint>,
    demand_locations: Vec<GeoPoint>,
    supply_locations: Vec<GeoPoint>,
    demand_index: SpatialIndex,
    supply_index: SpatialIndex,
    radius: f64,
    radius_sq: f64,
    kernel: GaussianKernel,
    competition_epsilon: f64,
    parallel: bool,
    show_progress: bool,
}

impl<'a> AccessibilityEngine<'a> {
    pub fn new(
        demand: &'a PointSet<DemandPoint>,
        supply: &'a PointSet<SupplyPoint>,
        config: &AccessConfig,
    ) -> Result<Self> {
        let kernel = {
            let _timing = logging::start_timing(
                "validate_inputs",
                OperationCategory::Accessibility { subcategory: AccessStep::Validation },
            );
            validate_inputs(demand, supply, config)?
        };

        let demand_locations = demand.locations();
        let supply_locations = supply.locations();

        let (demand_index, supply_index) = {
            let _timing = logging::start_timing("build_spatial_indices", OperationCategory::IndexBuild);
            (
                SpatialIndex::new(&demand_locations)?,
                SpatialIndex::new(&supply_locations)?,
            )
        };

        debug!(
            demand = demand_index.len(),
            supply = supply_index.len(),
            "spatial indices built"
        );

        Ok(Self {
            demand,
            supply,
            demand_locations,
            supply_locations,
            demand_index,
            supply_index,
            radius: config.radius,
            radius_sq: config.radius * config.radius,
            kernel,
            competition_epsilon: config.competition_epsilon,
            parallel: config.parallel,
            show_progress: false,
        })
    }

    /// Show an indicatif progress bar for large steps.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn kernel(&self) -> &GaussianKernel {
        &self.kernel
    }

    /// Step 1: capacity over decay-weighted competing demand, per supply point.
    pub fn compute_supply_ratios(&self) -> SupplyRatios {
        let _timing = logging::start_timing(
            "compute_supply_ratios",
            OperationCategory::Accessibility { subcategory: AccessStep::SupplyRatio },
        );

        let demand_points = self.demand.points();
        let supply_points = self.supply.points();

        let outcomes = self.map_points(supply_points.len(), "Step 1: supply ratios", |j| {
            let location = &self.supply_locations[j];
            let in_range = self.demand_index.within_sorted(location, self.radius_sq);
            supply_outcome(
                supply_points[j].get_capacity(),
                in_range
                    .iter()
                    .map(|&i| (demand_points[i].get_weight(), self.demand_locations[i].distance_to(location))),
                &self.kernel,
                self.competition_epsilon,
            )
        });

        let unreached = outcomes.iter().filter(|o| **o == SupplyOutcome::Unreached).count();
        let negligible_competition = outcomes.iter().filter(|o| **o == SupplyOutcome::Negligible).count();

        SupplyRatios {
            ratios: outcomes.into_iter().map(SupplyOutcome::ratio).collect(),
            unreached,
            negligible_competition,
        }
    }

    /// Step 2: decay-weighted sum of supply ratios, per demand point.
    ///
    /// `ratios` must be the complete Step 1 output, aligned with the supply set.
    pub fn compute_scores(&self, ratios: &[f64]) -> Result<DemandScores> {
        if ratios.len() != self.supply.len() {
            return Err(AccessError::InvalidInput(format!(
                "expected {} supply ratios, got {}",
                self.supply.len(),
                ratios.len()
            )));
        }

        let _timing = logging::start_timing(
            "compute_scores",
            OperationCategory::Accessibility { subcategory: AccessStep::DemandScore },
        );

        let scores = self.map_points(self.demand.len(), "Step 2: accessibility", |i| {
            let location = &self.demand_locations[i];
            let in_range = self.supply_index.within_sorted(location, self.radius_sq);
            if in_range.is_empty() {
                return None;
            }
            Some(decayed_sum(
                in_range
                    .iter()
                    .map(|&j| (ratios[j], self.supply_locations[j].distance_to(location))),
                &self.kernel,
            ))
        });

        let unreached = scores.iter().filter(|s| s.is_none()).count();

        Ok(DemandScores {
            scores: scores.into_iter().map(|s| s.unwrap_or(0.0)).collect(),
            unreached,
        })
    }

    /// Runs Step 1 to completion, then Step 2, and assembles the result.
    pub fn run(&self) -> Result<AccessibilityResult> {
        info!(
            demand = self.demand.len(),
            supply = self.supply.len(),
            radius = self.radius,
            sigma = self.kernel.sigma(),
            parallel = self.parallel,
            "computing accessibility"
        );

        let step1 = self.compute_supply_ratios();
        let step2 = self.compute_scores(&step1.ratios)?;

        let diagnostics = Diagnostics {
            supply_count: self.supply.len(),
            demand_count: self.demand.len(),
            unreached_supply: step1.unreached,
            negligible_competition: step1.negligible_competition,
            unreached_demand: step2.unreached,
        };
        log_diagnostics(&diagnostics);

        let demand = self
            .demand
            .iter()
            .zip(step2.scores)
            .map(|(point, accessibility)| AugmentedDemand {
                point: point.clone(),
                accessibility,
            })
            .collect();

        Ok(AccessibilityResult {
            demand,
            supply_ratios: step1.ratios,
            diagnostics,
        })
    }

    fn map_points<T, F>(&self, count: usize, label: &'static str, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        let progress = self.progress_bar(count, label);
        let tick = |idx: usize| {
            let value = f(idx);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
            value
        };

        let values: Vec<T> = if self.parallel {
            (0..count).into_par_iter().map(tick).collect()
        } else {
            (0..count).map(tick).collect()
        };

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        values
    }

    fn progress_bar(&self, count: usize, label: &'static str) -> Option<ProgressBar> {
        if !self.show_progress || count < PROGRESS_MIN_POINTS {
            return None;
        }
        let pb = ProgressBar::new(count as u64);
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(label);
        Some(pb)
    }
}

/// Validates configuration and both inputs, returning the configured kernel.
fn validate_inputs(
    demand: &PointSet<DemandPoint>,
    supply: &PointSet<SupplyPoint>,
    config: &AccessConfig,
) -> Result<GaussianKernel> {
    config.validate()?;
    let kernel = config.kernel()?;

    demand.validate("demand")?;
    supply.validate("supply")?;

    if let (Some(demand_crs), Some(supply_crs)) = (demand.get_crs(), supply.get_crs()) {
        if demand_crs != supply_crs {
            return Err(AccessError::InvalidInput(format!(
                "demand and supply use different coordinate systems ({} vs {})",
                demand_crs, supply_crs
            )));
        }
    }

    Ok(kernel)
}

fn supply_outcome<K, I>(capacity: f64, competitors: I, kernel: &K, epsilon: f64) -> SupplyOutcome
where
    K: DistanceDecay,
    I: ExactSizeIterator<Item = (f64, f64)>,
{
    if competitors.len() == 0 {
        return SupplyOutcome::Unreached;
    }

    let denom = decayed_sum(competitors, kernel);
    // A zero sum is negligible even when epsilon is zero
    if denom <= 0.0 || denom < epsilon {
        SupplyOutcome::Negligible
    } else {
        SupplyOutcome::Ratio(capacity / denom)
    }
}

/// `sum(value * kernel(distance))` in iteration order.
fn decayed_sum<K, I>(pairs: I, kernel: &K) -> f64
where
    K: DistanceDecay,
    I: Iterator<Item = (f64, f64)>,
{
    pairs.fold(0.0, |acc, (value, distance)| acc + value * kernel.weight(distance))
}

fn log_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.unreached_supply > 0 {
        warn!(
            "{} of {} supply points unreached (no demand within radius)",
            diagnostics.unreached_supply, diagnostics.supply_count
        );
    }
    if diagnostics.negligible_competition > 0 {
        warn!(
            "{} of {} supply points had competing demand below epsilon; ratio set to 0",
            diagnostics.negligible_competition, diagnostics.supply_count
        );
    }
    if diagnostics.unreached_demand > 0 {
        info!(
            "{} of {} demand points have no supply within radius",
            diagnostics.unreached_demand, diagnostics.demand_count
        );
    }
}

/// Validates, builds both indices and runs both steps.
pub fn compute_accessibility(
    demand: &PointSet<DemandPoint>,
    supply: &PointSet<SupplyPoint>,
    config: &AccessConfig,
) -> Result<AccessibilityResult> {
    AccessibilityEngine::new(demand, supply, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(points: &[(f64, f64, f64)]) -> PointSet<DemandPoint> {
        points
            .iter()
            .map(|&(x, y, w)| DemandPoint::new(GeoPoint::new(x, y), w))
            .collect()
    }

    fn supply(points: &[(f64, f64, f64)]) -> PointSet<SupplyPoint> {
        points
            .iter()
            .map(|&(x, y, c)| SupplyPoint::new(GeoPoint::new(x, y), c))
            .collect()
    }

    fn config(radius: f64, sigma: Option<f64>) -> AccessConfig {
        AccessConfig {
            sigma,
            ..AccessConfig::with_radius(radius)
        }
    }

    #[test]
    fn single_station_two_cells() {
        let demand = demand(&[(0.0, 0.0, 10.0), (2000.0, 0.0, 5.0)]);
        let supply = supply(&[(0.0, 0.0, 100.0)]);

        let result = compute_accessibility(&demand, &supply, &config(1000.0, Some(333.33))).unwrap();

        assert_eq!(result.supply_ratios, vec![10.0]);
        assert_eq!(result.scores(), vec![10.0, 0.0]);
        assert_eq!(result.diagnostics.unreached_demand, 1);
        assert_eq!(result.diagnostics.unreached_supply, 0);
    }

    #[test]
    fn negligible_competition_yields_zero_ratio() {
        let demand = demand(&[(10.0, 0.0, 1e-12)]);
        let supply = supply(&[(0.0, 0.0, 50.0)]);

        let result = compute_accessibility(&demand, &supply, &config(5000.0, None)).unwrap();

        assert_eq!(result.supply_ratios, vec![0.0]);
        assert_eq!(result.scores(), vec![0.0]);
        assert_eq!(result.diagnostics.negligible_competition, 1);
        assert_eq!(result.diagnostics.unreached_supply, 0);
        assert_eq!(result.diagnostics.unreached_demand, 0);
    }

    #[test]
    fn zero_demand_with_zero_epsilon_is_negligible() {
        let demand = demand(&[(0.0, 0.0, 0.0), (30.0, 40.0, 0.0)]);
        let supply = supply(&[(0.0, 0.0, 100.0), (10.0, 0.0, 0.0)]);
        let config = AccessConfig {
            competition_epsilon: 0.0,
            ..config(1000.0, None)
        };

        let result = compute_accessibility(&demand, &supply, &config).unwrap();

        assert_eq!(result.supply_ratios, vec![0.0, 0.0]);
        assert_eq!(result.scores(), vec![0.0, 0.0]);
        assert_eq!(result.diagnostics.negligible_competition, 2);
        assert_eq!(result.diagnostics.unreached_supply, 0);
    }

    #[test]
    fn tiny_sigma_keeps_coincident_points_exact() {
        let demand = demand(&[(0.0, 0.0, 10.0)]);
        let supply = supply(&[(0.0, 0.0, 100.0)]);

        let result = compute_accessibility(&demand, &supply, &config(1000.0, Some(1e-200))).unwrap();

        assert_eq!(result.supply_ratios, vec![10.0]);
        assert_eq!(result.scores(), vec![10.0]);
        assert_eq!(result.diagnostics.negligible_competition, 0);
    }

    #[test]
    fn unreached_supply_has_zero_ratio() {
        let demand = demand(&[(0.0, 0.0, 3.0)]);
        let supply = supply(&[(0.0, 500.0, 9.0), (10_000.0, 0.0, 40.0)]);

        let result = compute_accessibility(&demand, &supply, &config(1000.0, None)).unwrap();

        assert_eq!(result.supply_ratios[1], 0.0);
        assert!(result.supply_ratios[0] > 0.0);
        assert_eq!(result.diagnostics.unreached_supply, 1);
        assert_eq!(result.diagnostics.zero_ratio_supply(), 1);
    }

    #[test]
    fn boundary_distance_is_within_catchment() {
        let demand = demand(&[(0.0, 0.0, 1.0)]);
        let supply = supply(&[(600.0, 800.0, 4.0)]);

        let result = compute_accessibility(&demand, &supply, &config(1000.0, None)).unwrap();

        assert!(result.supply_ratios[0] > 0.0);
        assert!(result.scores()[0] > 0.0);
        assert_eq!(result.diagnostics.unreached_demand, 0);
    }

    #[test]
    fn matches_hand_computed_two_by_two() {
        let sigma = 100.0;
        let demand = demand(&[(0.0, 0.0, 4.0), (100.0, 0.0, 2.0)]);
        let supply = supply(&[(0.0, 0.0, 12.0), (200.0, 0.0, 6.0)]);
        let w = |d: f64| {
            let z = d / sigma;
            (-0.5 * z * z).exp()
        };

        let r0 = 12.0 / (4.0 * w(0.0) + 2.0 * w(100.0));
        let r1 = 6.0 / (4.0 * w(200.0) + 2.0 * w(100.0));
        let a0 = r0 * w(0.0) + r1 * w(200.0);
        let a1 = r0 * w(100.0) + r1 * w(100.0);

        let result = compute_accessibility(&demand, &supply, &config(250.0, Some(sigma))).unwrap();

        assert_eq!(result.supply_ratios, vec![r0, r1]);
        assert_eq!(result.scores(), vec![a0, a1]);
    }

    #[test]
    fn parallel_and_sequential_agree_bit_for_bit() {
        let demand: PointSet<DemandPoint> = (0..400)
            .map(|i| {
                let x = (i % 20) as f64 * 97.0;
                let y = (i / 20) as f64 * 103.0;
                DemandPoint::new(GeoPoint::new(x, y), 1.0 + (i % 7) as f64)
            })
            .collect();
        let supply: PointSet<SupplyPoint> = (0..25)
            .map(|j| SupplyPoint::new(GeoPoint::new((j % 5) as f64 * 410.0, (j / 5) as f64 * 390.0), 10.0 + j as f64))
            .collect();

        let parallel = compute_accessibility(&demand, &supply, &config(600.0, None)).unwrap();
        let sequential = compute_accessibility(
            &demand,
            &supply,
            &AccessConfig {
                parallel: false,
                ..config(600.0, None)
            },
        )
        .unwrap();

        assert_eq!(parallel, sequential);
    }

    #[test]
    fn compute_scores_rejects_misaligned_ratios() {
        let demand = demand(&[(0.0, 0.0, 1.0)]);
        let supply = supply(&[(0.0, 0.0, 1.0)]);
        let engine = AccessibilityEngine::new(&demand, &supply, &config(10.0, None)).unwrap();
        assert!(matches!(engine.compute_scores(&[1.0, 2.0]), Err(AccessError::InvalidInput(_))));
    }

    #[test]
    fn validation_happens_before_computation() {
        let good_demand = demand(&[(0.0, 0.0, 1.0)]);
        let good_supply = supply(&[(0.0, 0.0, 1.0)]);
        let empty_supply = supply(&[]);
        let negative_supply = supply(&[(0.0, 0.0, -1.0)]);

        assert!(matches!(
            compute_accessibility(&good_demand, &empty_supply, &config(10.0, None)),
            Err(AccessError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_accessibility(&good_demand, &negative_supply, &config(10.0, None)),
            Err(AccessError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_accessibility(&good_demand, &good_supply, &config(-10.0, None)),
            Err(AccessError::InvalidParameter(_))
        ));
        assert!(matches!(
            compute_accessibility(&good_demand, &good_supply, &config(10.0, Some(-1.0))),
            Err(AccessError::InvalidParameter(_))
        ));
    }

    #[test]
    fn mismatched_crs_labels_are_rejected() {
        let mut demand = demand(&[(0.0, 0.0, 1.0)]);
        let mut supply = supply(&[(0.0, 0.0, 1.0)]);
        demand.set_crs(Some("EPSG:4544".to_string()));
        supply.set_crs(Some("EPSG:32650".to_string()));
        assert!(matches!(
            compute_accessibility(&demand, &supply, &config(10.0, None)),
            Err(AccessError::InvalidInput(_))
        ));

        supply.set_crs(Some("EPSG:4544".to_string()));
        assert!(compute_accessibility(&demand, &supply, &config(10.0, None)).is_ok());
    }
}
