use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::config::access_config::FieldSelection;
use crate::data::poi::GeoPoint;
use crate::error::{AccessError, Result};
use crate::models::point::{DemandPoint, PointSet, SupplyPoint};
use crate::utils::logging::{self, FileIOType, OperationCategory};

struct ColumnIndices {
    x: usize,
    y: usize,
    weight: usize,
}

struct LoadedRecord {
    location: GeoPoint,
    weight: f64,
    attributes: Vec<String>,
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| {
            let available: Vec<&str> = headers.iter().collect();
            AccessError::InvalidInput(format!(
                "column '{}' not found; available columns: {}",
                name,
                available.join(", ")
            ))
        })
}

fn parse_number(record: &StringRecord, idx: usize, name: &str, row: usize) -> Result<f64> {
    let raw = record
        .get(idx)
        .ok_or_else(|| AccessError::InvalidInput(format!("row {}: missing column '{}'", row, name)))?;
    raw.trim().parse::<f64>().map_err(|_| {
        AccessError::InvalidInput(format!(
            "row {}: column '{}' value '{}' is not a number",
            row, name, raw
        ))
    })
}

/// Reads every record of a headed CSV, keeping all fields as attributes.
/// `row` in messages is 1-based and counts data rows only.
fn read_records<R: Read>(reader: R, fields: &FieldSelection) -> Result<(Vec<String>, Vec<LoadedRecord>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let columns = ColumnIndices {
        x: find_column(&headers, &fields.x_field)?,
        y: find_column(&headers, &fields.y_field)?,
        weight: find_column(&headers, &fields.weight_field)?,
    };

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let row = row + 1;

        let x = parse_number(&record, columns.x, &fields.x_field, row)?;
        let y = parse_number(&record, columns.y, &fields.y_field, row)?;
        let weight = parse_number(&record, columns.weight, &fields.weight_field, row)?;

        records.push(LoadedRecord {
            location: GeoPoint::new(x, y),
            weight,
            attributes: record.iter().map(str::to_string).collect(),
        });
    }

    Ok((headers.iter().map(|h| h.trim().to_string()).collect(), records))
}

pub fn read_demand<R: Read>(reader: R, fields: &FieldSelection) -> Result<PointSet<DemandPoint>> {
    let (columns, records) = read_records(reader, fields)?;
    let points = records
        .into_iter()
        .map(|r| DemandPoint::with_attributes(r.location, r.weight, r.attributes))
        .collect();
    Ok(PointSet::with_columns(points, columns))
}

pub fn read_supply<R: Read>(reader: R, fields: &FieldSelection) -> Result<PointSet<SupplyPoint>> {
    let (columns, records) = read_records(reader, fields)?;
    let points = records
        .into_iter()
        .map(|r| SupplyPoint::with_attributes(r.location, r.weight, r.attributes))
        .collect();
    Ok(PointSet::with_columns(points, columns))
}

pub fn load_demand(path: impl AsRef<Path>, fields: &FieldSelection) -> Result<PointSet<DemandPoint>> {
    let path = path.as_ref();
    let _timing = logging::start_timing("load_demand", OperationCategory::FileIO { subcategory: FileIOType::DataLoad });
    let set = read_demand(BufReader::new(File::open(path)?), fields)?;
    debug!("loaded {} demand points from {}", set.len(), path.display());
    Ok(set)
}

pub fn load_supply(path: impl AsRef<Path>, fields: &FieldSelection) -> Result<PointSet<SupplyPoint>> {
    let path = path.as_ref();
    let _timing = logging::start_timing("load_supply", OperationCategory::FileIO { subcategory: FileIOType::DataLoad });
    let set = read_supply(BufReader::new(File::open(path)?), fields)?;
    debug!("loaded {} supply points from {}", set.len(), path.display());
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_selected_columns_and_keeps_the_rest() {
        let data = "id,x,y,value,district\n1,10.5,20.0,300,north\n2,11.0,21.5,0,south\n";
        let set = read_demand(data.as_bytes(), &FieldSelection::new("x", "y", "value")).unwrap();

        assert_eq!(set.get_columns(), &["id", "x", "y", "value", "district"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.points()[0].get_location(), &GeoPoint::new(10.5, 20.0));
        assert_eq!(set.points()[0].get_weight(), 300.0);
        assert_eq!(set.points()[1].get_attributes()[4], "south");
    }

    #[test]
    fn custom_field_names_select_capacity() {
        let data = "lon_m,lat_m,TotalC\n100,200,12\n";
        let set = read_supply(data.as_bytes(), &FieldSelection::new("lon_m", "lat_m", "TotalC")).unwrap();
        assert_eq!(set.points()[0].get_capacity(), 12.0);
        assert_eq!(set.points()[0].get_location(), &GeoPoint::new(100.0, 200.0));
    }

    #[test]
    fn missing_column_is_invalid_input() {
        let data = "x,y,pop\n1,2,3\n";
        let err = read_demand(data.as_bytes(), &FieldSelection::new("x", "y", "value")).unwrap_err();
        match err {
            AccessError::InvalidInput(msg) => assert!(msg.contains("'value'"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unparsable_number_reports_the_row() {
        let data = "x,y,value\n1,2,3\n4,five,6\n";
        let err = read_demand(data.as_bytes(), &FieldSelection::new("x", "y", "value")).unwrap_err();
        match err {
            AccessError::InvalidInput(msg) => assert!(msg.starts_with("row 2"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn header_only_file_gives_empty_set() {
        let set = read_supply("x,y,capacity\n".as_bytes(), &FieldSelection::new("x", "y", "capacity")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_demand("/nonexistent/g2sfca/demand.csv", &FieldSelection::new("x", "y", "value"));
        assert!(matches!(result, Err(AccessError::IoError(_))));
    }
}
