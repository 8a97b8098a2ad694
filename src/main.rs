use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use g2sfca::analysis::reporting::{self, RunManifest};
use g2sfca::cli::cli::{Cli, Command, RasterizeArgs, RunArgs};
use g2sfca::config::access_config::AccessConfig;
use g2sfca::config::constants::{ACCESS_SCORE_FIELD, MANIFEST_SUFFIX, OUTPUT_SUFFIX, RATIOS_SUFFIX};
use g2sfca::core::engine::AccessibilityEngine;
use g2sfca::data::{point_loader, raster_points};
use g2sfca::utils::csv_export;
use g2sfca::utils::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.enable_timing(), cli.debug()).context("failed to set up tracing subscriber")?;

    let started = Instant::now();
    match cli.subcommand() {
        Command::Run(args) => run_accessibility(args, started)?,
        Command::Rasterize(args) => run_rasterize(args)?,
    }

    logging::print_timing_report();
    println!("Total time: {:.2} s", started.elapsed().as_secs_f64());
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<AccessConfig> {
    let base = match args.config() {
        Some(path) => AccessConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AccessConfig::default(),
    };
    let config = args.apply_overrides(base);
    config.validate()?;
    Ok(config)
}

fn run_accessibility(args: &RunArgs, started: Instant) -> Result<()> {
    let config = load_config(args)?;
    info!(
        radius = config.radius,
        sigma = config.effective_sigma(),
        epsilon = config.competition_epsilon,
        "configuration loaded"
    );

    let mut demand = point_loader::load_demand(args.demand(), &config.demand_fields())
        .with_context(|| format!("failed to load demand points from {}", args.demand().display()))?;
    demand.set_crs(args.demand_crs().map(str::to_string));

    let mut supply = point_loader::load_supply(args.supply(), &config.supply_fields())
        .with_context(|| format!("failed to load supply points from {}", args.supply().display()))?;
    supply.set_crs(args.supply_crs().map(str::to_string));

    info!("Demand points: {}, supply points: {}", demand.len(), supply.len());

    let result = AccessibilityEngine::new(&demand, &supply, &config)?
        .with_progress(!args.quiet())
        .run()?;

    let output = args
        .output()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| csv_export::derived_path(args.demand(), OUTPUT_SUFFIX));
    csv_export::export_augmented_demand(&output, demand.get_columns(), &result.demand, ACCESS_SCORE_FIELD)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let ratios_output = args
        .ratios_output()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| csv_export::derived_path(args.demand(), RATIOS_SUFFIX));
    csv_export::export_supply_ratios(&ratios_output, &supply, &result.supply_ratios)
        .with_context(|| format!("failed to write {}", ratios_output.display()))?;

    reporting::print_accessibility_summary(&result);

    if !args.no_manifest() {
        let manifest_path = csv_export::derived_path(&output, MANIFEST_SUFFIX).with_extension("json");
        RunManifest::new(
            &args.demand().display().to_string(),
            &args.supply().display().to_string(),
            &config,
            &result,
            started.elapsed().as_secs_f64(),
        )
        .save_json(&manifest_path)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;
    }

    println!("Done. Results written to: {}", output.display());
    Ok(())
}

fn run_rasterize(args: &RasterizeArgs) -> Result<()> {
    let points = raster_points::raster_to_points(args.input())
        .with_context(|| format!("failed to convert {}", args.input().display()))?;

    let output = args.output();
    csv_export::export_demand_points(&output, &points)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Converted {} -> {} ({} points)", args.input().display(), output.display(), points.len());
    Ok(())
}
