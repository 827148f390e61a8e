use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{
    blank_window, check_wavelength_axis, read_xy_block, RecordHeader, ABS_COL,
    DATA_PITCH_FIELD, NM_UNIT, WAVELENGTH_COL,
};
use crate::data::loader::{parse_file, FileLayout, ParsedFile};
use crate::data::model::field_with_unit;
use crate::error::{Result, SpectraError};
use crate::pipeline::{SavitzkyGolay, Series, SignalTrack, Smoother, Stage, StepOutcome};

const COLUMNS: [&str; 2] = [WAVELENGTH_COL, ABS_COL];

/// What to subtract as the absorbance baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineSource {
    /// A blank (buffer) spectrum on disk.
    File(PathBuf),
    /// The absorbance read at this exact wavelength, subtracted everywhere.
    FixedValue(f64),
}

// ---------------------------------------------------------------------------
// AbsorbanceSpectrum – absorbance vs wavelength
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AbsorbanceSpectrum {
    pub header: RecordHeader,
    track: SignalTrack,
    domain_step: f64,
    blank_subtracted: bool,
    offset_subtracted: bool,
    concentration: Option<f64>,
    integral: Option<f64>,
}

impl AbsorbanceSpectrum {
    pub fn load(path: &Path) -> Result<Self> {
        let parsed = parse_file(path, FileLayout::SingleSpectrum)?;
        Self::from_parsed(&parsed)
    }

    pub fn from_parsed(parsed: &ParsedFile) -> Result<Self> {
        let header = RecordHeader::from_parsed(parsed)?;
        let mut table = read_xy_block(parsed, &COLUMNS)?;
        let domain = table.take_column(WAVELENGTH_COL)?;
        check_wavelength_axis(&parsed.path, &domain)?;
        let signal = table.take_column(ABS_COL)?;
        let domain_step = field_with_unit(&header.metadata, DATA_PITCH_FIELD, NM_UNIT)?;

        Ok(Self {
            header,
            track: SignalTrack::new(domain, signal),
            domain_step,
            blank_subtracted: false,
            offset_subtracted: false,
            concentration: None,
            integral: None,
        })
    }

    pub fn domain(&self) -> &[f64] {
        self.track.domain()
    }

    /// Current absorbance.
    pub fn signal(&self) -> &[f64] {
        self.track.signal()
    }

    pub fn signal_raw(&self) -> &[f64] {
        &self.track.raw().signal
    }

    pub fn domain_min(&self) -> f64 {
        self.track.raw().domain.last().copied().unwrap_or(f64::NAN)
    }

    pub fn domain_max(&self) -> f64 {
        self.track.raw().domain.first().copied().unwrap_or(f64::NAN)
    }

    pub fn domain_step(&self) -> f64 {
        self.domain_step
    }

    pub fn is_baseline_corrected(&self) -> bool {
        self.blank_subtracted || self.offset_subtracted
    }

    pub fn current_stage(&self) -> Stage {
        self.track.current_stage()
    }

    pub fn track(&self) -> &SignalTrack {
        &self.track
    }

    pub fn smoothed(&self) -> Option<&[f64]> {
        self.track.smoothed()
    }

    /// Molar concentration from the last [`AbsorbanceSpectrum::concentration_calc`].
    pub fn concentration(&self) -> Option<f64> {
        self.concentration
    }

    pub fn integral(&self) -> Option<f64> {
        self.integral
    }

    /// Subtract a blank spectrum or a fixed-wavelength offset. Each source
    /// kind can be applied once; a repeat is skipped.
    pub fn baseline(&mut self, source: BaselineSource) -> Result<StepOutcome> {
        match source {
            BaselineSource::File(path) => {
                if self.blank_already_subtracted() {
                    return Ok(StepOutcome::Skipped);
                }
                let parsed = parse_file(&path, FileLayout::SingleSpectrum)?;
                let table = read_xy_block(&parsed, &COLUMNS)?;
                let blank = Series::new(
                    table.column(WAVELENGTH_COL)?.to_vec(),
                    table.column(ABS_COL)?.to_vec(),
                );
                self.subtract_blank(&blank)
            }
            BaselineSource::FixedValue(wavelength) => {
                if self.offset_subtracted {
                    warn!("{}: a baseline value was already subtracted", self.header.name);
                    return Ok(StepOutcome::Skipped);
                }
                let offset = self.track.current().value_at(wavelength)?;
                self.track.subtract_offset(offset);
                self.offset_subtracted = true;
                Ok(StepOutcome::Applied)
            }
        }
    }

    /// Subtract an already loaded blank spectrum. One-shot.
    pub fn baseline_with(&mut self, blank: &AbsorbanceSpectrum) -> Result<StepOutcome> {
        if self.blank_already_subtracted() {
            return Ok(StepOutcome::Skipped);
        }
        self.subtract_blank(blank.track.raw())
    }

    fn blank_already_subtracted(&self) -> bool {
        if self.blank_subtracted {
            warn!("{}: the blank was already subtracted", self.header.name);
        }
        self.blank_subtracted
    }

    fn subtract_blank(&mut self, blank: &Series) -> Result<StepOutcome> {
        let (lower, upper) = blank_window(self.domain_min(), self.domain_max(), blank);
        self.track.subtract_blank(blank, lower, upper)?;
        self.blank_subtracted = true;
        Ok(StepOutcome::Applied)
    }

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

    /// Beer-Lambert concentration from the absorbance at `wavelength`.
    ///
    /// `extinction_coefficient` in M⁻¹·cm⁻¹, `pathlength` in cm.
    pub fn concentration_calc(
        &mut self,
        wavelength: f64,
        extinction_coefficient: f64,
        pathlength: f64,
    ) -> Result<f64> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(extinction_coefficient) || !positive(pathlength) {
            return Err(SpectraError::InvalidParameter(format!(
                "extinction coefficient ({extinction_coefficient}) and pathlength \
                 ({pathlength}) must be positive"
            )));
        }
        let absorbance = self.track.current().value_at(wavelength)?;
        let concentration = absorbance / (extinction_coefficient * pathlength);
        info!(
            "{}: A({wavelength}) = {absorbance} → {concentration} M",
            self.header.name
        );
        self.concentration = Some(concentration);
        Ok(concentration)
    }

    pub fn integrate(&mut self, lower: f64, upper: f64) -> Result<f64> {
        let integral = self.track.integrate(lower, upper, self.domain_step)?;
        self.integral = Some(integral);
        Ok(integral)
    }
}
