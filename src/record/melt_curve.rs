use std::path::Path;

use log::warn;

use super::{
    cd_columns, read_xy_block, warn_if_not_monotonic, RecordHeader, ABS_COL, CD_COL, HT_COL,
    MONITOR_WAVELENGTH_FIELD, NM_UNIT, TEMPERATURE_COL,
};
use crate::config::ParseOptions;
use crate::data::filter::reliable_len;
use crate::data::loader::{parse_file, FileLayout, ParsedFile};
use crate::data::model::field_with_unit;
use crate::error::Result;
use crate::pipeline::{mre_divisor, SavitzkyGolay, SignalTrack, Smoother, Stage, StepOutcome};

/// Ellipticity at a fixed wavelength recorded over a temperature ramp.
#[derive(Debug, Clone)]
pub struct CdMeltCurve {
    pub header: RecordHeader,
    track: SignalTrack,
    ht: Vec<f64>,
    absorbance: Option<Vec<f64>>,
    monitor_wavelength: f64,
    reliable_len: usize,
}

impl CdMeltCurve {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &ParseOptions::default())
    }

    pub fn load_with(path: &Path, options: &ParseOptions) -> Result<Self> {
        let parsed = parse_file(path, FileLayout::SingleSpectrum)?;
        Self::from_parsed(&parsed, options)
    }

    pub fn from_parsed(parsed: &ParsedFile, options: &ParseOptions) -> Result<Self> {
        let header = RecordHeader::from_parsed(parsed)?;
        let columns = cd_columns(TEMPERATURE_COL, options.include_absorbance);
        let mut table = read_xy_block(parsed, &columns)?;

        let temperatures = table.take_column(TEMPERATURE_COL)?;
        warn_if_not_monotonic(&parsed.path, &temperatures);
        let signal = table.take_column(CD_COL)?;
        let ht = table.take_column(HT_COL)?;
        let absorbance = if options.include_absorbance {
            Some(table.take_column(ABS_COL)?)
        } else {
            None
        };
        let monitor_wavelength =
            field_with_unit(&header.metadata, MONITOR_WAVELENGTH_FIELD, NM_UNIT)?;
        let reliable_len = reliable_len(&ht, options.ht_max);

        Ok(Self {
            header,
            track: SignalTrack::new(temperatures, signal),
            ht,
            absorbance,
            monitor_wavelength,
            reliable_len,
        })
    }

    /// Current temperature axis.
    pub fn temperatures(&self) -> &[f64] {
        self.track.domain()
    }

    pub fn signal(&self) -> &[f64] {
        self.track.signal()
    }

    pub fn signal_raw(&self) -> &[f64] {
        &self.track.raw().signal
    }

    pub fn ht(&self) -> &[f64] {
        &self.ht
    }

    pub fn absorbance(&self) -> Option<&[f64]> {
        self.absorbance.as_deref()
    }

    /// Wavelength (nm) at which the ellipticity was followed.
    pub fn monitor_wavelength(&self) -> f64 {
        self.monitor_wavelength
    }

    /// Last recorded temperature.
    pub fn domain_min(&self) -> f64 {
        self.track.raw().domain.last().copied().unwrap_or(f64::NAN)
    }

    /// First recorded temperature.
    pub fn domain_max(&self) -> f64 {
        self.track.raw().domain.first().copied().unwrap_or(f64::NAN)
    }

    pub fn reliability_cutoff_index(&self) -> Option<usize> {
        self.reliable_len.checked_sub(1)
    }

    pub fn is_reliability_filtered(&self) -> bool {
        self.track.is_filtered()
    }

    pub fn current_stage(&self) -> Stage {
        self.track.current_stage()
    }

    pub fn smoothed(&self) -> Option<&[f64]> {
        self.track.smoothed()
    }

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

    /// Mean residue ellipticity; each call divides again.
    /// `residue_count = 1` and `pathlength = 1.0` give molar ellipticity.
    pub fn mre(&mut self, concentration: f64, residue_count: u32, pathlength: f64) -> Result<()> {
        let divisor = mre_divisor(concentration, f64::from(residue_count), pathlength)?;
        self.track.divide(divisor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpectraError;
    use crate::record::fixtures::write_export;

    /// Two-state unfolding from 20 °C to 90 °C in 1 °C steps.
    fn melt_rows() -> Vec<Vec<f64>> {
        (0..=70)
            .map(|i| {
                let t = 20.0 + i as f64;
                let folded = 1.0 / (1.0 + ((t - 55.0) / 3.0).exp());
                vec![t, -20.0 * folded - 2.0, 300.0 + 5.0 * i as f64]
            })
            .collect()
    }

    fn load() -> CdMeltCurve {
        let file = write_export(
            "Thermal denaturation",
            &melt_rows(),
            &[("Monitor wavelength", "222 nm"), ("Temperature slope", "1 C/min")],
        );
        CdMeltCurve::load(file.path()).unwrap()
    }

    #[test]
    fn test_parse_melt_curve() {
        let melt = load();
        assert_eq!(melt.monitor_wavelength(), 222.0);
        assert_eq!(melt.temperatures().len(), 71);
        assert_eq!(melt.domain_max(), 20.0);
        assert_eq!(melt.domain_min(), 90.0);
        let authored: Vec<f64> = melt_rows().iter().map(|r| r[1]).collect();
        assert_eq!(melt.signal_raw(), authored.as_slice());
    }

    #[test]
    fn test_melt_curve_ht_filter() {
        let mut melt = load();
        // HT = 300 + 5i exceeds 600 first at i = 61.
        assert_eq!(melt.reliability_cutoff_index(), Some(60));
        assert!(melt.reliability_filter().applied());
        assert_eq!(melt.temperatures().len(), 61);
        assert_eq!(melt.reliability_filter(), StepOutcome::Skipped);
    }

    #[test]
    fn test_melt_curve_smooth_and_mre() {
        let mut melt = load();
        assert_eq!(melt.smooth(7, 2).unwrap().len(), 71);
        melt.mre(2e-5, 129, 0.1).unwrap();
        let divisor = 10.0 * 2e-5 * 129.0 * 0.1;
        assert!((melt.signal()[0] - melt.signal_raw()[0] / divisor).abs() < 1e-6);
    }

    #[test]
    fn test_missing_monitor_wavelength() {
        let file = write_export("x", &melt_rows(), &[("Data pitch", "1 nm")]);
        assert!(matches!(
            CdMeltCurve::load(file.path()),
            Err(SpectraError::MissingField(_))
        ));
    }
}
