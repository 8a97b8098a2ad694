use crate::error::{AccessError, Result};

/// Maps a distance to a non-negative, non-increasing contribution weight.
pub trait DistanceDecay: Sync {
    fn weight(&self, distance: f64) -> f64;
}

/// Gaussian decay `exp(-d^2 / (2 sigma^2))`, with `weight(0) == 1`.
///
/// Only constructible through [`GaussianKernel::new`], so `sigma` is always
/// finite and positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianKernel {
    sigma: f64,
}

impl GaussianKernel {
    pub fn new(sigma: f64) -> Result<Self> {
        validate_sigma(sigma)?;
        Ok(Self { sigma })
    }

    /// Kernel with the default decay scale `radius / 3`.
    pub fn for_radius(radius: f64) -> Result<Self> {
        Self::new(crate::config::access_config::default_sigma(radius))
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl DistanceDecay for GaussianKernel {
    fn weight(&self, distance: f64) -> f64 {
        // Scale first: 2 * sigma^2 underflows to zero for tiny sigma
        let z = distance / self.sigma;
        (-0.5 * z * z).exp()
    }
}

/// One-off evaluation of the Gaussian kernel.
pub fn gaussian_weight(distance: f64, sigma: f64) -> Result<f64> {
    Ok(GaussianKernel::new(sigma)?.weight(distance))
}

fn validate_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(AccessError::InvalidParameter(format!(
            "sigma must be a finite value > 0, got {}",
            sigma
        )));
    }
    Ok(())
}
