use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::info;

use crate::config::constants::{
    DEFAULT_DEMAND_FIELD, DEFAULT_X_FIELD, DEFAULT_Y_FIELD, SUPPLY_RATIO_FIELD,
};
use crate::data::poi::WeightedPoi;
use crate::error::{AccessError, Result};
use crate::models::point::{DemandPoint, PointSet, SupplyPoint};
use crate::models::result::AugmentedDemand;
use crate::utils::logging::{self, FileIOType, OperationCategory};

/// `<dir>/<stem><suffix>.csv` next to `input`.
pub fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.csv", stem, suffix))
}

/// Header and row values for a point, falling back to `x, y, <weight>`
/// when the point was built in memory without original attributes.
fn record_fields<T: WeightedPoi>(
    columns: &[String],
    point: &T,
    attributes: &[String],
    weight_field: &str,
) -> (Vec<String>, Vec<String>) {
    if !columns.is_empty() && columns.len() == attributes.len() {
        return (columns.to_vec(), attributes.to_vec());
    }
    let location = point.get_location();
    (
        vec![
            DEFAULT_X_FIELD.to_string(),
            DEFAULT_Y_FIELD.to_string(),
            weight_field.to_string(),
        ],
        vec![
            location.x.to_string(),
            location.y.to_string(),
            point.get_weight().to_string(),
        ],
    )
}

/// Writes the demand table with every original column followed by the
/// accessibility score column.
pub fn write_augmented_demand<W: Write>(
    writer: W,
    columns: &[String],
    demand: &[AugmentedDemand],
    score_field: &str,
) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    let mut header_written = false;

    for augmented in demand {
        let (mut header, mut row) = record_fields(
            columns,
            &augmented.point,
            augmented.point.get_attributes(),
            DEFAULT_DEMAND_FIELD,
        );
        if !header_written {
            header.push(score_field.to_string());
            wtr.write_record(&header)?;
            header_written = true;
        }
        row.push(augmented.accessibility.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes one row per supply point: input position, location, capacity and
/// the Step 1 ratio.
pub fn write_supply_ratios<W: Write>(
    writer: W,
    supply: &PointSet<SupplyPoint>,
    ratios: &[f64],
) -> Result<()> {
    if supply.len() != ratios.len() {
        return Err(AccessError::InvalidInput(format!(
            "{} supply points but {} ratios",
            supply.len(),
            ratios.len()
        )));
    }

    let mut wtr = Writer::from_writer(writer);
    wtr.write_record([
        "supply_index",
        DEFAULT_X_FIELD,
        DEFAULT_Y_FIELD,
        "capacity",
        SUPPLY_RATIO_FIELD,
    ])?;

    for (idx, (point, ratio)) in supply.iter().zip(ratios).enumerate() {
        let location = point.get_location();
        wtr.write_record(&[
            idx.to_string(),
            location.x.to_string(),
            location.y.to_string(),
            point.get_capacity().to_string(),
            ratio.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes a demand set as-is, e.g. the output of raster conversion.
pub fn write_demand_points<W: Write>(writer: W, points: &PointSet<DemandPoint>) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    let mut header_written = false;

    for point in points.iter() {
        let (header, row) = record_fields(
            points.get_columns(),
            point,
            point.get_attributes(),
            DEFAULT_DEMAND_FIELD,
        );
        if !header_written {
            wtr.write_record(&header)?;
            header_written = true;
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn export_augmented_demand(
    path: impl AsRef<Path>,
    columns: &[String],
    demand: &[AugmentedDemand],
    score_field: &str,
) -> Result<()> {
    let path = path.as_ref();
    let _timing = logging::start_timing(
        "export_augmented_demand",
        OperationCategory::FileIO { subcategory: FileIOType::ResultsSave },
    );
    write_augmented_demand(File::create(path)?, columns, demand, score_field)?;
    info!("Wrote {} demand rows to {}", demand.len(), path.display());
    Ok(())
}

pub fn export_supply_ratios(
    path: impl AsRef<Path>,
    supply: &PointSet<SupplyPoint>,
    ratios: &[f64],
) -> Result<()> {
    let path = path.as_ref();
    let _timing = logging::start_timing(
        "export_supply_ratios",
        OperationCategory::FileIO { subcategory: FileIOType::ResultsSave },
    );
    write_supply_ratios(File::create(path)?, supply, ratios)?;
    info!("Wrote {} supply ratios to {}", ratios.len(), path.display());
    Ok(())
}

pub fn export_demand_points(path: impl AsRef<Path>, points: &PointSet<DemandPoint>) -> Result<()> {
    let path = path.as_ref();
    let _timing = logging::start_timing(
        "export_demand_points",
        OperationCategory::FileIO { subcategory: FileIOType::ResultsSave },
    );
    write_demand_points(File::create(path)?, points)?;
    info!("Wrote {} points to {}", points.len(), path.display());
    Ok(())
}
