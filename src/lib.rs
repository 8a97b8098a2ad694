// Module declarations for the accessibility toolkit

pub mod error;

// Core accessibility computation
pub mod core {
    pub mod kernel;
    pub mod engine;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod access_config;
}

// Model definitions
pub mod models {
    pub mod point;
    pub mod result;
}

// Data loaders
pub mod data {
    pub mod poi;
    pub mod point_loader;
    pub mod raster_points;
}

// Analysis and reporting
pub mod analysis {
    pub mod reporting;
}

// Utility functions
pub mod utils {
    pub mod spatial_index;
    pub mod logging;
    pub mod csv_export;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

// Re-export commonly used items
pub use crate::config::access_config::AccessConfig;
pub use crate::core::engine::{compute_accessibility, AccessibilityEngine};
pub use crate::core::kernel::GaussianKernel;
pub use crate::data::poi::GeoPoint;
pub use crate::error::AccessError;
pub use crate::models::point::{DemandPoint, PointSet, SupplyPoint};
pub use crate::models::result::{AccessibilityResult, AugmentedDemand, Diagnostics};
pub use crate::utils::spatial_index::SpatialIndex;
