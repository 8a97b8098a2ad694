use std::fmt;

/// Errors raised before or around an accessibility run.
///
/// Per-point numerical degeneracies are never reported here; they are
/// counted in [`crate::models::result::Diagnostics`] instead.
#[derive(Debug)]
pub enum AccessError {
    /// Empty collections, non-finite coordinates, negative or non-finite
    /// weights, missing columns, mismatched coordinate systems.
    InvalidInput(String),
    /// Non-positive radius or sigma, negative competition epsilon.
    InvalidParameter(String),
    IoError(std::io::Error),
    CsvError(csv::Error),
    JsonError(serde_json::Error),
    TiffError(tiff::TiffError),
}

impl From<std::io::Error> for AccessError {
    fn from(err: std::io::Error) -> Self {
        AccessError::IoError(err)
    }
}

impl From<csv::Error> for AccessError {
    fn from(err: csv::Error) -> Self {
        AccessError::CsvError(err)
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::JsonError(err)
    }
}

impl From<tiff::TiffError> for AccessError {
    fn from(err: tiff::TiffError) -> Self {
        AccessError::TiffError(err)
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::InvalidInput(s) => write!(f, "Invalid input: {}", s),
            AccessError::InvalidParameter(s) => write!(f, "Invalid parameter: {}", s),
            AccessError::IoError(e) => write!(f, "IO error: {}", e),
            AccessError::CsvError(e) => write!(f, "CSV error: {}", e),
            AccessError::JsonError(e) => write!(f, "JSON error: {}", e),
            AccessError::TiffError(e) => write!(f, "TIFF error: {}", e),
        }
    }
}

impl std::error::Error for AccessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AccessError::IoError(e) => Some(e),
            AccessError::CsvError(e) => Some(e),
            AccessError::JsonError(e) => Some(e),
            AccessError::TiffError(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
