//! Parser and signal pipeline for JASCO spectrophotometer and
//! spectropolarimeter exports.
//!
//! This crate provides:
//! - Section scanning of the `;`-delimited, decimal-comma export format
//! - Typed records for absorbance spectra, CD spectra, CD melting curves and
//!   CD melting spectra (wavelength × temperature)
//! - HT reliability filtering, baseline subtraction, mean residue
//!   ellipticity, Savitzky-Golay smoothing and windowed integration, each
//!   one-shot step guarded against double application
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use rusty_cd::CdSpectrum;
//!
//! let mut cd = CdSpectrum::load(Path::new("lysozyme.csv")).unwrap();
//! let _ = cd.reliability_filter();
//! let _ = cd.baseline(Path::new("buffer.csv")).unwrap();
//! cd.mre(1e-5, 129, 0.1).unwrap();
//! let helix = cd.integrate(215.0, 225.0).unwrap();
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod record;

pub use config::ParseOptions;
pub use error::{Result, SpectraError};
pub use pipeline::{SavitzkyGolay, Smoother, Stage, StepOutcome};
pub use record::{
    AbsorbanceSpectrum, BaselineSource, CdMeltCurve, CdMeltSpectra, CdSpectrum, GridPoint,
    RecordHeader,
};
