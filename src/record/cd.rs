use std::path::Path;

use log::{debug, warn};

use super::{
    blank_window, cd_columns, check_wavelength_axis, read_xy_block, RecordHeader, ABS_COL,
    CD_COL, DATA_PITCH_FIELD, HT_COL, NM_UNIT, WAVELENGTH_COL,
};
use crate::config::ParseOptions;
use crate::data::filter::reliable_len;
use crate::data::loader::{parse_file, FileLayout, ParsedFile};
use crate::data::model::field_with_unit;
use crate::error::Result;
use crate::pipeline::{
    mre_divisor, SavitzkyGolay, Series, SignalTrack, Smoother, Stage, StepOutcome,
};

// ---------------------------------------------------------------------------
// CdSpectrum – ellipticity vs wavelength
// ---------------------------------------------------------------------------

/// A CD spectrum with its HT channel and optional absorbance channel.
#[derive(Debug, Clone)]
pub struct CdSpectrum {
    pub header: RecordHeader,
    track: SignalTrack,
    ht: Vec<f64>,
    absorbance: Option<Vec<f64>>,
    options: ParseOptions,
    domain_step: f64,
    /// Leading samples with HT at or below `ht_max`.
    reliable_len: usize,
    integral: Option<f64>,
}

impl CdSpectrum {
    /// Load with default options (`ht_max = 600`, no absorbance column).
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &ParseOptions::default())
    }

    pub fn load_with(path: &Path, options: &ParseOptions) -> Result<Self> {
        let parsed = parse_file(path, FileLayout::SingleSpectrum)?;
        Self::from_parsed(&parsed, options)
    }

    pub fn from_parsed(parsed: &ParsedFile, options: &ParseOptions) -> Result<Self> {
        let header = RecordHeader::from_parsed(parsed)?;
        let columns = cd_columns(WAVELENGTH_COL, options.include_absorbance);
        let mut table = read_xy_block(parsed, &columns)?;

        let domain = table.take_column(WAVELENGTH_COL)?;
        check_wavelength_axis(&parsed.path, &domain)?;
        let signal = table.take_column(CD_COL)?;
        let ht = table.take_column(HT_COL)?;
        let absorbance = if options.include_absorbance {
            Some(table.take_column(ABS_COL)?)
        } else {
            None
        };
        let domain_step = field_with_unit(&header.metadata, DATA_PITCH_FIELD, NM_UNIT)?;
        let reliable_len = reliable_len(&ht, options.ht_max);
        debug!(
            "{}: {} samples, {reliable_len} below HT {}",
            parsed.path.display(),
            domain.len(),
            options.ht_max
        );

        Ok(Self {
            header,
            track: SignalTrack::new(domain, signal),
            ht,
            absorbance,
            options: options.clone(),
            domain_step,
            reliable_len,
            integral: None,
        })
    }

    // -- accessors --

    /// Current wavelength axis.
    pub fn domain(&self) -> &[f64] {
        self.track.domain()
    }

    /// Current ellipticity.
    pub fn signal(&self) -> &[f64] {
        self.track.signal()
    }

    /// Ellipticity exactly as parsed.
    pub fn signal_raw(&self) -> &[f64] {
        &self.track.raw().signal
    }

    pub fn domain_raw(&self) -> &[f64] {
        &self.track.raw().domain
    }

    pub fn ht(&self) -> &[f64] {
        &self.ht
    }

    pub fn absorbance(&self) -> Option<&[f64]> {
        self.absorbance.as_deref()
    }

    pub fn ht_max(&self) -> f64 {
        self.options.ht_max
    }

    /// Last parsed wavelength (the instrument scans downwards).
    pub fn domain_min(&self) -> f64 {
        self.domain_raw().last().copied().unwrap_or(f64::NAN)
    }

    /// First parsed wavelength.
    pub fn domain_max(&self) -> f64 {
        self.domain_raw().first().copied().unwrap_or(f64::NAN)
    }

    /// Data pitch in nm.
    pub fn domain_step(&self) -> f64 {
        self.domain_step
    }

    /// Index of the last sample before HT exceeds `ht_max`; `None` when the
    /// very first sample already exceeds it.
    pub fn reliability_cutoff_index(&self) -> Option<usize> {
        self.reliable_len.checked_sub(1)
    }

    /// Wavelength at the reliability cut-off.
    pub fn cutoff_wavelength(&self) -> Option<f64> {
        self.reliability_cutoff_index().map(|i| self.domain_raw()[i])
    }

    pub fn is_reliability_filtered(&self) -> bool {
        self.track.is_filtered()
    }

    pub fn is_baseline_corrected(&self) -> bool {
        self.track.is_baseline_corrected()
    }

    pub fn current_stage(&self) -> Stage {
        self.track.current_stage()
    }

    /// Stage outputs, for inspecting the series before a later correction.
    pub fn track(&self) -> &SignalTrack {
        &self.track
    }

    pub fn smoothed(&self) -> Option<&[f64]> {
        self.track.smoothed()
    }

    pub fn integral(&self) -> Option<f64> {
        self.integral
    }

    // -- pipeline --

    /// Drop every sample past the reliability cut-off. One-shot.
    pub fn reliability_filter(&mut self) -> StepOutcome {
        let outcome = self.track.truncate(self.reliable_len);
        if !outcome.applied() {
            warn!(
                "{}: data has already been filtered using the HT threshold",
                self.header.name
            );
        }
        outcome
    }

    /// Same as [`CdSpectrum::reliability_filter`].
    pub fn ht_filter(&mut self) -> StepOutcome {
        self.reliability_filter()
    }

    /// Subtract the blank spectrum stored at `blank_path`. One-shot.
    pub fn baseline(&mut self, blank_path: &Path) -> Result<StepOutcome> {
        if self.already_corrected() {
            return Ok(StepOutcome::Skipped);
        }
        let parsed = parse_file(blank_path, FileLayout::SingleSpectrum)?;
        let columns = cd_columns(WAVELENGTH_COL, self.options.include_absorbance);
        let table = read_xy_block(&parsed, &columns)?;
        let blank = Series::new(
            table.column(WAVELENGTH_COL)?.to_vec(),
            table.column(CD_COL)?.to_vec(),
        );
        self.subtract(&blank)
    }

    /// Subtract an already loaded blank. One-shot.
    pub fn baseline_with(&mut self, blank: &CdSpectrum) -> Result<StepOutcome> {
        if self.already_corrected() {
            return Ok(StepOutcome::Skipped);
        }
        self.subtract(blank.track.raw())
    }

    fn already_corrected(&self) -> bool {
        if self.track.is_baseline_corrected() {
            warn!("{}: baseline is already corrected", self.header.name);
            return true;
        }
        false
    }

    fn subtract(&mut self, blank: &Series) -> Result<StepOutcome> {
        let lower = if self.track.is_filtered() {
            self.cutoff_wavelength().unwrap_or_else(|| self.domain_min())
        } else {
            self.domain_min()
        };
        let (lower, upper) = blank_window(lower, self.domain_max(), blank);
        self.track.subtract_blank(blank, lower, upper)?;
        Ok(StepOutcome::Applied)
    }

    /// Savitzky-Golay smoothing of the current ellipticity.
    pub fn smooth(&mut self, window: usize, polyorder: usize) -> Result<&[f64]> {
        self.smooth_with(&SavitzkyGolay, window, polyorder)
    }

    pub fn smooth_with(
        &mut self,
        smoother: &dyn Smoother,
        window: usize,
        polyorder: usize,
    ) -> Result<&[f64]> {
        self.track.smooth(smoother, window, polyorder)
    }

    /// Convert the current ellipticity to mean residue ellipticity.
    /// Each call divides again.
    ///
    /// Pass `residue_count = 1` and `pathlength = 1.0` for plain molar
    /// ellipticity.
    pub fn mre(&mut self, concentration: f64, residue_count: u32, pathlength: f64) -> Result<()> {
        let divisor = mre_divisor(concentration, f64::from(residue_count), pathlength)?;
        self.track.divide(divisor);
        Ok(())
    }

    /// Riemann sum of the current ellipticity between two sampled wavelengths.
    pub fn integrate(&mut self, lower: f64, upper: f64) -> Result<f64> {
        let integral = self.track.integrate(lower, upper, self.domain_step)?;
        self.integral = Some(integral);
        Ok(integral)
    }
}
