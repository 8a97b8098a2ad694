//! Raster-to-point conversion for single-band grids.
//!
//! Two inputs are understood: ESRI ASCII grids (`.asc`) and GeoTIFFs
//! (`.tif`, `.tiff`) georeferenced through the ModelPixelScale and
//! ModelTiepoint tags. Every cell that is not NODATA becomes one demand
//! point at the cell center, carrying the cell value as its weight. Output
//! columns are `x`, `y` and `value`.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::config::constants::{DEFAULT_DEMAND_FIELD, DEFAULT_X_FIELD, DEFAULT_Y_FIELD};
use crate::data::poi::GeoPoint;
use crate::error::{AccessError, Result};
use crate::models::point::{DemandPoint, PointSet};
use crate::utils::logging::{self, FileIOType, OperationCategory};

/// North-up grid placement: `origin` is the upper-left corner of the
/// upper-left cell; rows run southward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GridTransform {
    /// Center of cell (`col`, `row`).
    pub fn cell_center(&self, col: usize, row: usize) -> GeoPoint {
        GeoPoint::new(
            self.origin_x + (col as f64 + 0.5) * self.cell_width,
            self.origin_y - (row as f64 + 0.5) * self.cell_height,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    AsciiGrid,
    GeoTiff,
}

impl RasterFormat {
    /// `.tif`/`.tiff` (any case) is GeoTIFF; everything else is read as
    /// an ASCII grid.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            Some("tif") | Some("tiff") => RasterFormat::GeoTiff,
            _ => RasterFormat::AsciiGrid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    pub ncols: usize,
    pub nrows: usize,
    pub transform: GridTransform,
    pub nodata: Option<f64>,
    /// Row-major, first row is the northernmost.
    pub values: Vec<f64>,
}

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cell_size: Option<f64>,
    nodata: Option<f64>,
}

fn header_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        AccessError::InvalidInput(format!("grid header '{}' has invalid value '{}'", key, raw))
    })
}

fn missing(key: &str) -> AccessError {
    AccessError::InvalidInput(format!("grid header is missing '{}'", key))
}

fn cell_count(ncols: usize, nrows: usize) -> Result<usize> {
    ncols.checked_mul(nrows).ok_or_else(|| {
        AccessError::InvalidInput(format!("grid dimensions {}x{} are too large", ncols, nrows))
    })
}

fn positive_extent(label: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(AccessError::InvalidInput(format!(
            "grid {} must be > 0, got {}",
            label, value
        )));
    }
    Ok(value)
}

impl RasterGrid {
    /// Parses an ESRI ASCII grid (`ncols`, `nrows`, `xllcorner|xllcenter`,
    /// `yllcorner|yllcenter`, `cellsize`, optional `NODATA_value`).
    pub fn from_ascii_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut header = Header::default();
        let mut values = Vec::new();
        let mut in_body = false;

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if !in_body {
                let mut parts = trimmed.split_whitespace();
                let key = parts.next().unwrap_or_default().to_ascii_lowercase();
                let raw = parts.next().unwrap_or_default();
                let is_header = match key.as_str() {
                    "ncols" => {
                        header.ncols = Some(header_value(&key, raw)?);
                        true
                    }
                    "nrows" => {
                        header.nrows = Some(header_value(&key, raw)?);
                        true
                    }
                    "xllcorner" | "xllcenter" => {
                        header.xll = Some((header_value(&key, raw)?, key == "xllcenter"));
                        true
                    }
                    "yllcorner" | "yllcenter" => {
                        header.yll = Some((header_value(&key, raw)?, key == "yllcenter"));
                        true
                    }
                    "cellsize" => {
                        header.cell_size = Some(header_value(&key, raw)?);
                        true
                    }
                    "nodata_value" => {
                        header.nodata = Some(header_value(&key, raw)?);
                        true
                    }
                    _ => false,
                };
                if is_header {
                    continue;
                }
                in_body = true;
            }

            for token in trimmed.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| {
                    AccessError::InvalidInput(format!("grid cell value '{}' is not a number", token))
                })?;
                values.push(value);
            }
        }

        let ncols = header.ncols.ok_or_else(|| missing("ncols"))?;
        let nrows = header.nrows.ok_or_else(|| missing("nrows"))?;
        let (xll, x_is_center) = header.xll.ok_or_else(|| missing("xllcorner"))?;
        let (yll, y_is_center) = header.yll.ok_or_else(|| missing("yllcorner"))?;
        let cell_size = positive_extent("cellsize", header.cell_size.ok_or_else(|| missing("cellsize"))?)?;

        let expected = cell_count(ncols, nrows)?;
        if values.len() != expected {
            return Err(AccessError::InvalidInput(format!(
                "grid declares {}x{} cells but contains {} values",
                ncols,
                nrows,
                values.len()
            )));
        }

        // Normalise the lower-left reference to the upper-left corner
        let origin_x = if x_is_center { xll - cell_size / 2.0 } else { xll };
        let lower_edge = if y_is_center { yll - cell_size / 2.0 } else { yll };
        let origin_y = lower_edge + nrows as f64 * cell_size;

        Ok(Self {
            ncols,
            nrows,
            transform: GridTransform {
                origin_x,
                origin_y,
                cell_width: cell_size,
                cell_height: cell_size,
            },
            nodata: header.nodata,
            values,
        })
    }

    /// Decodes the first image of a single-band GeoTIFF. The GDAL_NODATA
    /// tag, when present, marks the nodata value.
    pub fn from_geotiff_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let ncols = width as usize;
        let nrows = height as usize;
        let expected = cell_count(ncols, nrows)?;

        let transform = read_geotiff_transform(&mut decoder)?;
        let nodata = read_gdal_nodata(&mut decoder)?;

        let decoded = decoder.read_image()?;
        // GDAL writes the nodata text at double precision; match it at the
        // precision the samples were stored in
        let nodata = match decoded {
            DecodingResult::F32(_) => nodata.map(|v| v as f32 as f64),
            _ => nodata,
        };
        let values = samples_as_f64(decoded);

        if values.len() != expected {
            return Err(AccessError::InvalidInput(format!(
                "GeoTIFF holds {} samples for {}x{} cells; only single-band rasters are supported",
                values.len(),
                ncols,
                nrows
            )));
        }

        Ok(Self {
            ncols,
            nrows,
            transform,
            nodata,
            values,
        })
    }

    /// Reads a grid, choosing the format from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        match RasterFormat::from_path(path) {
            RasterFormat::GeoTiff => Self::from_geotiff_reader(BufReader::new(file)),
            RasterFormat::AsciiGrid => Self::from_ascii_reader(BufReader::new(file)),
        }
    }

    fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nodata| value == nodata)
    }

    /// One demand point per valid cell, in row-major order.
    pub fn to_points(&self) -> PointSet<DemandPoint> {
        let mut points = Vec::new();
        for row in 0..self.nrows {
            for col in 0..self.ncols {
                let value = self.values[row * self.ncols + col];
                if self.is_nodata(value) {
                    continue;
                }
                let center = self.transform.cell_center(col, row);
                points.push(DemandPoint::with_attributes(
                    center,
                    value,
                    vec![center.x.to_string(), center.y.to_string(), value.to_string()],
                ));
            }
        }

        PointSet::with_columns(
            points,
            vec![
                DEFAULT_X_FIELD.to_string(),
                DEFAULT_Y_FIELD.to_string(),
                DEFAULT_DEMAND_FIELD.to_string(),
            ],
        )
    }
}

/// Upper-left origin and cell size from ModelPixelScale + ModelTiepoint.
fn read_geotiff_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GridTransform> {
    let not_georeferenced = |_: tiff::TiffError| {
        AccessError::InvalidInput(
            "GeoTIFF lacks ModelPixelScale/ModelTiepoint georeferencing tags".to_string(),
        )
    };
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(not_georeferenced)?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(not_georeferenced)?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(AccessError::InvalidInput(format!(
            "GeoTIFF georeferencing is incomplete ({} scale values, {} tiepoint values)",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let cell_width = positive_extent("pixel width", scale[0])?;
    let cell_height = positive_extent("pixel height", scale[1])?;
    Ok(GridTransform {
        origin_x: tiepoint[3] - tiepoint[0] * cell_width,
        origin_y: tiepoint[4] + tiepoint[1] * cell_height,
        cell_width,
        cell_height,
    })
}

fn read_gdal_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let text = text.trim_end_matches('\0').trim();
    text.parse::<f64>().map(Some).map_err(|_| {
        AccessError::InvalidInput(format!("GDAL_NODATA value '{}' is not a number", text))
    })
}

fn samples_as_f64(decoded: DecodingResult) -> Vec<f64> {
    match decoded {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
    }
}

/// Reads a grid (ASCII or GeoTIFF) and converts it to demand points.
pub fn raster_to_points(path: impl AsRef<Path>) -> Result<PointSet<DemandPoint>> {
    let path = path.as_ref();
    let _timing = logging::start_timing(
        "raster_to_points",
        OperationCategory::FileIO { subcategory: FileIOType::RasterConvert },
    );
    let grid = RasterGrid::from_path(path)?;
    let points = grid.to_points();
    debug!(
        "{}: {:?} {}x{} grid, {} valid cells",
        path.display(),
        RasterFormat::from_path(path),
        grid.ncols,
        grid.nrows,
        points.len()
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    const GRID: &str = "ncols 3\nnrows 2\nxllcorner 1000\nyllcorner 2000\ncellsize 100\n\
                        NODATA_value -9999\n1 2 -9999\n4 0 6\n";

    fn geotiff(width: u32, height: u32, data: &[f32], georeferenced: bool, nodata: Option<&str>) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).unwrap();
            let mut image = encoder.new_image::<colortype::Gray32Float>(width, height).unwrap();
            if georeferenced {
                image
                    .encoder()
                    .write_tag(Tag::ModelPixelScaleTag, &[100.0f64, 50.0, 0.0][..])
                    .unwrap();
                image
                    .encoder()
                    .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 1000.0, 2000.0, 0.0][..])
                    .unwrap();
            }
            if let Some(nodata) = nodata {
                image.encoder().write_tag(Tag::GdalNodata, nodata).unwrap();
            }
            image.write_data(data).unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn parses_header_and_values() {
        let grid = RasterGrid::from_ascii_reader(GRID.as_bytes()).unwrap();
        assert_eq!(grid.ncols, 3);
        assert_eq!(grid.nrows, 2);
        assert_eq!(grid.nodata, Some(-9999.0));
        assert_eq!(grid.transform.origin_x, 1000.0);
        assert_eq!(grid.transform.origin_y, 2200.0);
        assert_eq!(grid.values.len(), 6);
    }

    #[test]
    fn cell_centers_skip_nodata() {
        let points = RasterGrid::from_ascii_reader(GRID.as_bytes()).unwrap().to_points();
        assert_eq!(points.len(), 5);
        assert_eq!(points.get_columns(), &["x", "y", "value"]);

        let first = &points.points()[0];
        assert_eq!(first.get_location(), &GeoPoint::new(1050.0, 2150.0));
        assert_eq!(first.get_weight(), 1.0);

        // Row 1 starts after the skipped NODATA cell
        let third = &points.points()[2];
        assert_eq!(third.get_location(), &GeoPoint::new(1050.0, 2050.0));
        assert_eq!(third.get_weight(), 4.0);

        // Zero-valued cells are kept; only NODATA is dropped
        assert_eq!(points.points()[3].get_weight(), 0.0);
    }

    #[test]
    fn center_registration_is_normalised() {
        let text = "ncols 1\nnrows 1\nxllcenter 50\nyllcenter 50\ncellsize 100\n7\n";
        let points = RasterGrid::from_ascii_reader(text.as_bytes()).unwrap().to_points();
        assert_eq!(points.points()[0].get_location(), &GeoPoint::new(50.0, 50.0));
    }

    #[test]
    fn value_count_must_match_dimensions() {
        let text = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        assert!(matches!(
            RasterGrid::from_ascii_reader(text.as_bytes()),
            Err(AccessError::InvalidInput(_))
        ));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let text = "ncols 18446744073709551615\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2\n";
        match RasterGrid::from_ascii_reader(text.as_bytes()) {
            Err(AccessError::InvalidInput(msg)) => assert!(msg.contains("too large"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_header_is_reported() {
        let text = "ncols 1\nnrows 1\nxllcorner 0\ncellsize 1\n1\n";
        match RasterGrid::from_ascii_reader(text.as_bytes()) {
            Err(AccessError::InvalidInput(msg)) => assert!(msg.contains("yllcorner"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn geotiff_cells_become_centers() {
        let bytes = geotiff(2, 2, &[1.0, 2.0, -99999.0, 4.0], true, Some("-99999"));
        let grid = RasterGrid::from_geotiff_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(grid.ncols, 2);
        assert_eq!(grid.nrows, 2);
        assert_eq!(grid.nodata, Some(-99999.0));
        assert_eq!(grid.transform.cell_width, 100.0);
        assert_eq!(grid.transform.cell_height, 50.0);

        let points = grid.to_points();
        assert_eq!(points.len(), 3);
        assert_eq!(points.points()[0].get_location(), &GeoPoint::new(1050.0, 1975.0));
        assert_eq!(points.points()[1].get_location(), &GeoPoint::new(1150.0, 1975.0));
        assert_eq!(points.points()[2].get_location(), &GeoPoint::new(1150.0, 1925.0));
        assert_eq!(points.points()[2].get_weight(), 4.0);
    }

    #[test]
    fn geotiff_nodata_matches_float_samples() {
        let bytes = geotiff(2, 1, &[f32::MIN, 3.5], true, Some("-3.40282346638529e+38"));
        let points = RasterGrid::from_geotiff_reader(Cursor::new(bytes)).unwrap().to_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points.points()[0].get_weight(), 3.5);
    }

    #[test]
    fn geotiff_without_georeferencing_is_rejected() {
        let bytes = geotiff(1, 1, &[1.0], false, None);
        assert!(matches!(
            RasterGrid::from_geotiff_reader(Cursor::new(bytes)),
            Err(AccessError::InvalidInput(_))
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(RasterFormat::from_path(Path::new("pop.tif")), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_path(Path::new("pop.TIFF")), RasterFormat::GeoTiff);
        assert_eq!(RasterFormat::from_path(Path::new("pop.asc")), RasterFormat::AsciiGrid);
        assert_eq!(RasterFormat::from_path(Path::new("pop")), RasterFormat::AsciiGrid);
    }

    #[test]
    fn geotiff_file_converts_to_points() {
        let path = std::env::temp_dir().join("g2sfca_raster_points_test.tif");
        std::fs::write(&path, geotiff(1, 1, &[12.0], true, None)).unwrap();

        let points = raster_to_points(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(points.len(), 1);
        assert_eq!(points.points()[0].get_location(), &GeoPoint::new(1050.0, 1975.0));
        assert_eq!(points.points()[0].get_weight(), 12.0);
    }
}
