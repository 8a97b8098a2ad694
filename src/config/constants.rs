// Catchment Defaults
pub const DEFAULT_RADIUS: f64 = 1000.0;                   // Linear units of the input coordinates
pub const SIGMA_RADIUS_DIVISOR: f64 = 3.0;                // sigma = radius / 3 when not supplied
pub const DEFAULT_COMPETITION_EPSILON: f64 = 1e-9;        // Step-1 denominator floor

// Field Selectors
pub const DEFAULT_DEMAND_FIELD: &str = "value";
pub const DEFAULT_SUPPLY_FIELD: &str = "capacity";
pub const DEFAULT_X_FIELD: &str = "x";
pub const DEFAULT_Y_FIELD: &str = "y";

// Output
pub const ACCESS_SCORE_FIELD: &str = "access_g2sfca";
pub const SUPPLY_RATIO_FIELD: &str = "ratio";
pub const OUTPUT_SUFFIX: &str = "_g2sfca";
pub const RATIOS_SUFFIX: &str = "_supply_ratios";
pub const MANIFEST_SUFFIX: &str = "_manifest";

// Spatial Index
pub const KDTREE_NODE_SIZE: usize = 16;                   // Leaf bucket size, scanned linearly

// Progress Reporting
pub const PROGRESS_MIN_POINTS: usize = 10_000;            // Smaller runs skip the progress bar
