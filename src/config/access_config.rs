use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::constants::{
    DEFAULT_COMPETITION_EPSILON, DEFAULT_DEMAND_FIELD, DEFAULT_RADIUS, DEFAULT_SUPPLY_FIELD,
    DEFAULT_X_FIELD, DEFAULT_Y_FIELD, SIGMA_RADIUS_DIVISOR,
};
use crate::core::kernel::GaussianKernel;
use crate::error::{AccessError, Result};

/// Default decay scale for a catchment radius.
pub fn default_sigma(radius: f64) -> f64 {
    radius / SIGMA_RADIUS_DIVISOR
}

/// Column names identifying coordinates and the weight field in a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    pub x_field: String,
    pub y_field: String,
    pub weight_field: String,
}

impl FieldSelection {
    pub fn new(x_field: &str, y_field: &str, weight_field: &str) -> Self {
        Self {
            x_field: x_field.to_string(),
            y_field: y_field.to_string(),
            weight_field: weight_field.to_string(),
        }
    }
}

/// All parameters of an accessibility run. There is no hidden global state:
/// everything the engine reads comes from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Catchment cutoff distance, inclusive.
    pub radius: f64,
    /// Gaussian decay scale; `None` means `radius / 3`.
    pub sigma: Option<f64>,
    /// Step-1 denominators below this are treated as no competition and
    /// yield a zero ratio. Numerical floor only, not a domain rule.
    pub competition_epsilon: f64,
    pub demand_field: String,
    pub supply_field: String,
    pub x_field: String,
    pub y_field: String,
    pub parallel: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            sigma: None,
            competition_epsilon: DEFAULT_COMPETITION_EPSILON,
            demand_field: DEFAULT_DEMAND_FIELD.to_string(),
            supply_field: DEFAULT_SUPPLY_FIELD.to_string(),
            x_field: DEFAULT_X_FIELD.to_string(),
            y_field: DEFAULT_Y_FIELD.to_string(),
            parallel: true,
        }
    }
}

impl AccessConfig {
    pub fn with_radius(radius: f64) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let config = serde_json::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn effective_sigma(&self) -> f64 {
        self.sigma.unwrap_or_else(|| default_sigma(self.radius))
    }

    pub fn kernel(&self) -> Result<GaussianKernel> {
        GaussianKernel::new(self.effective_sigma())
    }

    pub fn demand_fields(&self) -> FieldSelection {
        FieldSelection::new(&self.x_field, &self.y_field, &self.demand_field)
    }

    pub fn supply_fields(&self) -> FieldSelection {
        FieldSelection::new(&self.x_field, &self.y_field, &self.supply_field)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(AccessError::InvalidParameter(format!(
                "radius must be a finite value > 0, got {}",
                self.radius
            )));
        }

        if let Some(sigma) = self.sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(AccessError::InvalidParameter(format!(
                    "sigma must be a finite value > 0, got {}",
                    sigma
                )));
            }
        }

        if !self.competition_epsilon.is_finite() || self.competition_epsilon < 0.0 {
            return Err(AccessError::InvalidParameter(format!(
                "competition epsilon must be a finite value >= 0, got {}",
                self.competition_epsilon
            )));
        }

        for (name, value) in [
            ("demand field", &self.demand_field),
            ("supply field", &self.supply_field),
            ("x field", &self.x_field),
            ("y field", &self.y_field),
        ] {
            if value.trim().is_empty() {
                return Err(AccessError::InvalidParameter(format!("{} must not be empty", name)));
            }
        }

        Ok(())
    }
}
