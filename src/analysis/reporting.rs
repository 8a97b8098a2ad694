use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::config::access_config::AccessConfig;
use crate::error::Result;
use crate::models::result::{AccessibilityResult, Diagnostics};

/// Distribution summary of a score vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Fraction of scores exactly equal to zero.
    pub zero_share: f64,
}

impl ScoreSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                count: 0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                zero_share: 0.0,
            };
        }

        let count = scores.len();
        let sum: f64 = scores.iter().sum();
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let zeros = scores.iter().filter(|s| **s == 0.0).count();

        Self {
            count,
            mean: sum / count as f64,
            min,
            max,
            zero_share: zeros as f64 / count as f64,
        }
    }
}

pub fn print_accessibility_summary(result: &AccessibilityResult) {
    let scores = ScoreSummary::from_scores(&result.scores());
    let ratios = ScoreSummary::from_scores(&result.supply_ratios);

    println!("\nAccessibility Summary");
    println!("----------------------------------------");
    println!("Demand points: {}", scores.count);
    println!("  Mean score: {:.6}", scores.mean);
    println!("  Max score: {:.6}", scores.max);
    println!("  Zero share: {:.2}%", scores.zero_share * 100.0);
    println!("Supply points: {}", ratios.count);
    println!("  Mean ratio: {:.6}", ratios.mean);
    println!("  Max ratio: {:.6}", ratios.max);
    print_diagnostics(&result.diagnostics);
    println!("----------------------------------------");
}

pub fn print_diagnostics(diagnostics: &Diagnostics) {
    println!("Fallbacks:");
    println!(
        "  Unreached supply: {} of {}",
        diagnostics.unreached_supply, diagnostics.supply_count
    );
    println!(
        "  Negligible competition: {} of {}",
        diagnostics.negligible_competition, diagnostics.supply_count
    );
    println!(
        "  Zero-ratio supply: {} of {}",
        diagnostics.zero_ratio_supply(),
        diagnostics.supply_count
    );
    println!(
        "  Unreached demand: {} of {}",
        diagnostics.unreached_demand, diagnostics.demand_count
    );
}

/// Record of one run, written next to the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at: String,
    pub demand_source: String,
    pub supply_source: String,
    pub config: AccessConfig,
    pub effective_sigma: f64,
    pub diagnostics: Diagnostics,
    pub scores: ScoreSummary,
    pub ratios: ScoreSummary,
    pub elapsed_secs: f64,
}

impl RunManifest {
    pub fn new(
        demand_source: &str,
        supply_source: &str,
        config: &AccessConfig,
        result: &AccessibilityResult,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            created_at: Local::now().to_rfc3339(),
            demand_source: demand_source.to_string(),
            supply_source: supply_source.to_string(),
            config: config.clone(),
            effective_sigma: config.effective_sigma(),
            diagnostics: result.diagnostics,
            scores: ScoreSummary::from_scores(&result.scores()),
            ratios: ScoreSummary::from_scores(&result.supply_ratios),
            elapsed_secs,
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_scores() {
        let summary = ScoreSummary::from_scores(&[0.0, 2.0, 4.0, 0.0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 1.5);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.max, 4.0);
        assert_eq!(summary.zero_share, 0.5);
    }

    #[test]
    fn summary_of_nothing_is_zeroed() {
        let summary = ScoreSummary::from_scores(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.zero_share, 0.0);
    }

    #[test]
    fn manifest_captures_effective_sigma() {
        let result = AccessibilityResult {
            demand: Vec::new(),
            supply_ratios: vec![1.0, 0.0],
            diagnostics: Diagnostics {
                supply_count: 2,
                unreached_supply: 1,
                ..Diagnostics::default()
            },
        };
        let config = AccessConfig::with_radius(600.0);
        let manifest = RunManifest::new("pop.csv", "ev.csv", &config, &result, 1.25);

        assert_eq!(manifest.effective_sigma, 200.0);
        assert_eq!(manifest.ratios.zero_share, 0.5);
        assert_eq!(manifest.diagnostics.unreached_supply, 1);

        let json = serde_json::to_string(&manifest).unwrap();
        let back: RunManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }
}
