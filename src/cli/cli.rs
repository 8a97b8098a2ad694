use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::config::access_config::AccessConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gaussian two-step floating catchment area accessibility", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, default_value_t = false)]
    enable_timing: bool,

    #[arg(long, global = true, help = "Log this crate at DEBUG level", default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute accessibility scores for demand points from supply points
    Run(RunArgs),
    /// Convert an ESRI ASCII grid or GeoTIFF into a CSV of cell-center points
    Rasterize(RasterizeArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(short, long, help = "Demand points CSV (projected coordinates)")]
    demand: PathBuf,

    #[arg(short, long, help = "Supply points CSV (same coordinate system as demand)")]
    supply: PathBuf,

    #[arg(short, long, help = "JSON file with AccessConfig fields; flags override it")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Catchment radius in coordinate units")]
    radius: Option<f64>,

    #[arg(long, help = "Gaussian decay scale; defaults to radius / 3")]
    sigma: Option<f64>,

    #[arg(long, help = "Step 1 denominators below this give a zero ratio")]
    epsilon: Option<f64>,

    #[arg(long)]
    demand_field: Option<String>,

    #[arg(long)]
    supply_field: Option<String>,

    #[arg(long)]
    x_field: Option<String>,

    #[arg(long)]
    y_field: Option<String>,

    #[arg(long, help = "CRS label of the demand set, compared with --supply-crs")]
    demand_crs: Option<String>,

    #[arg(long, help = "CRS label of the supply set, compared with --demand-crs")]
    supply_crs: Option<String>,

    #[arg(short, long, help = "Augmented demand CSV; defaults to <demand>_g2sfca.csv")]
    output: Option<PathBuf>,

    #[arg(long, help = "Supply ratio CSV; defaults to <demand>_supply_ratios.csv")]
    ratios_output: Option<PathBuf>,

    #[arg(long, help = "Skip writing the JSON run manifest", default_value_t = false)]
    no_manifest: bool,

    #[arg(long, help = "Run both steps on a single thread", default_value_t = false)]
    sequential: bool,

    #[arg(long, help = "Hide progress bars", default_value_t = false)]
    quiet: bool,
}

#[derive(Args, Debug)]
pub struct RasterizeArgs {
    #[arg(short, long, help = "ESRI ASCII grid (.asc) or GeoTIFF (.tif, .tiff)")]
    input: PathBuf,

    #[arg(short, long, help = "Output CSV; defaults to <input>.csv")]
    output: Option<PathBuf>,
}

impl Cli {
    pub fn subcommand(&self) -> &Command {
        &self.command
    }

    pub fn enable_timing(&self) -> bool {
        self.enable_timing
    }

    pub fn debug(&self) -> bool {
        self.debug
    }
}

impl RunArgs {
    pub fn demand(&self) -> &Path {
        &self.demand
    }

    pub fn supply(&self) -> &Path {
        &self.supply
    }

    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn demand_crs(&self) -> Option<&str> {
        self.demand_crs.as_deref()
    }

    pub fn supply_crs(&self) -> Option<&str> {
        self.supply_crs.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn ratios_output(&self) -> Option<&Path> {
        self.ratios_output.as_deref()
    }

    pub fn no_manifest(&self) -> bool {
        self.no_manifest
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Applies flag overrides on top of `base` (defaults or a JSON file).
    pub fn apply_overrides(&self, base: AccessConfig) -> AccessConfig {
        let mut config = base;
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        if let Some(sigma) = self.sigma {
            config.sigma = Some(sigma);
        }
        if let Some(epsilon) = self.epsilon {
            config.competition_epsilon = epsilon;
        }
        if let Some(field) = &self.demand_field {
            config.demand_field = field.clone();
        }
        if let Some(field) = &self.supply_field {
            config.supply_field = field.clone();
        }
        if let Some(field) = &self.x_field {
            config.x_field = field.clone();
        }
        if let Some(field) = &self.y_field {
            config.y_field = field.clone();
        }
        if self.sequential {
            config.parallel = false;
        }
        config
    }
}

impl RasterizeArgs {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("csv"))
    }
}
