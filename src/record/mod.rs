//! Typed records, one per instrument modality.
//!
//! | record              | layout         | domain       | signal      |
//! |---------------------|----------------|--------------|-------------|
//! | [`AbsorbanceSpectrum`] | `XYDATA`    | wavelength   | `Abs [UA]`  |
//! | [`CdSpectrum`]         | `XYDATA`    | wavelength   | `CD [mdeg]` |
//! | [`CdMeltCurve`]        | `XYDATA`    | temperature  | `CD [mdeg]` |
//! | [`CdMeltSpectra`]      | `Channel 1/2` | wavelength × temperature | `CD [mdeg]` |

pub mod absorbance;
pub mod cd;
pub mod melt_curve;
pub mod melt_spectra;

use std::path::{Path, PathBuf};

use log::warn;
use serde::Serialize;

pub use absorbance::{AbsorbanceSpectrum, BaselineSource};
pub use cd::CdSpectrum;
pub use melt_curve::CdMeltCurve;
pub use melt_spectra::{CdMeltSpectra, GridPoint};

use crate::data::loader::{read_numeric_table, ParsedFile};
use crate::data::model::{FieldTable, NumericTable, SectionRole};
use crate::error::{Result, SpectraError};
use crate::pipeline::{is_strictly_monotonic, Series};

// ---------------------------------------------------------------------------
// Column and field names
// ---------------------------------------------------------------------------

pub const WAVELENGTH_COL: &str = "Wavelength [nm]";
pub const TEMPERATURE_COL: &str = "Temperature";
pub const CD_COL: &str = "CD [mdeg]";
pub const HT_COL: &str = "HT [V]";
pub const ABS_COL: &str = "Abs [UA]";

pub const DATA_PITCH_FIELD: &str = "Data pitch";
pub const MONITOR_WAVELENGTH_FIELD: &str = "Monitor wavelength";
pub const DELTAX_FIELD: &str = "DELTAX";
pub const NM_UNIT: &str = " nm";

/// Column schema of the CD data block.
fn cd_columns(domain_col: &'static str, include_absorbance: bool) -> Vec<&'static str> {
    let mut cols = vec![domain_col, CD_COL, HT_COL];
    if include_absorbance {
        cols.push(ABS_COL);
    }
    cols
}

// ---------------------------------------------------------------------------
// RecordHeader – descriptive part shared by every record
// ---------------------------------------------------------------------------

/// Where a record came from and the descriptive blocks around its data.
#[derive(Debug, Clone, Serialize)]
pub struct RecordHeader {
    pub path: PathBuf,
    /// File stem.
    pub name: String,
    pub title: String,
    pub info: FieldTable,
    pub metadata: FieldTable,
}

impl RecordHeader {
    pub fn from_parsed(parsed: &ParsedFile) -> Result<Self> {
        Ok(Self {
            path: parsed.path.clone(),
            name: parsed.name(),
            title: parsed.title.clone(),
            info: parsed.info()?,
            metadata: parsed.metadata()?,
        })
    }
}

/// Read the XY block of a parsed single-spectrum file with `columns`.
fn read_xy_block(parsed: &ParsedFile, columns: &[&str]) -> Result<NumericTable> {
    read_numeric_table(
        &parsed.path,
        parsed.section_lines(SectionRole::XyData),
        columns,
    )
}

/// Reject a wavelength axis that is not strictly monotonic.
fn check_wavelength_axis(path: &Path, domain: &[f64]) -> Result<()> {
    if is_strictly_monotonic(domain) {
        Ok(())
    } else {
        Err(SpectraError::malformed(
            path,
            "wavelength column is not strictly monotonic",
        ))
    }
}

fn warn_if_not_monotonic(path: &Path, domain: &[f64]) {
    if !is_strictly_monotonic(domain) {
        warn!("{}: temperature column is not strictly monotonic", path.display());
    }
}

/// Window shared by the blank and the sample: from the larger of the two
/// lower ends up to the sample's upper end.
fn blank_window(own_lower: f64, own_upper: f64, blank: &Series) -> (f64, f64) {
    let blank_lower = blank.domain.iter().copied().fold(f64::INFINITY, f64::min);
    (own_lower.max(blank_lower), own_upper)
}
