use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing an instrument export or transforming its signal.
#[derive(Error, Debug)]
pub enum SpectraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// A section sentinel is missing, or the sections are out of order.
    #[error("Malformed file {path}: {reason}")]
    MalformedFormat { path: PathBuf, reason: String },

    /// A required info/metadata field or data column is absent.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field value does not carry the expected unit suffix or is not a number.
    #[error("Cannot parse '{value}' of field '{field}' (expected a number followed by '{unit}')")]
    UnitParse {
        field: String,
        value: String,
        unit: String,
    },

    /// Exact-match lookup on the domain axis failed.
    #[error("Value {0} is not a sample of the domain axis")]
    ValueNotFound(f64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl SpectraError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SpectraError::MalformedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for parsing and pipeline operations.
pub type Result<T> = std::result::Result<T, SpectraError>;
