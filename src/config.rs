//! Options controlling how an instrument export is read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};

/// HT voltage above which a CD sample is considered unreliable.
pub const DEFAULT_HT_MAX: f64 = 600.0;

/// Parse-time options shared by every record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Maximum permitted HT voltage; the first sample strictly above it ends
    /// the trustworthy range.
    #[serde(default = "default_ht_max")]
    pub ht_max: f64,

    /// The data block carries an extra `Abs [UA]` column.
    #[serde(default)]
    pub include_absorbance: bool,
}

fn default_ht_max() -> f64 {
    DEFAULT_HT_MAX
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            ht_max: default_ht_max(),
            include_absorbance: false,
        }
    }
}

impl ParseOptions {
    /// Builder-style setter for the HT threshold.
    pub fn with_ht_max(mut self, ht_max: f64) -> Self {
        self.ht_max = ht_max;
        self
    }

    /// Builder-style setter for the absorbance column flag.
    pub fn with_absorbance(mut self, include_absorbance: bool) -> Self {
        self.include_absorbance = include_absorbance;
        self
    }

    /// Load options from a JSON file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            SpectraError::InvalidParameter(format!("options file {}: {e}", path.display()))
        })
    }
}
