//! Signal pipeline: staged outputs of each correction over one series.
//!
//! ```text
//!   Raw ──► Filtered ──► BaselineCorrected ──► Converted
//!    │          │               │                  │
//!    └──────────┴─── current ───┴──────────────────┘
//!                       │
//!                       ▼
//!            smooth / integrate / value_at
//! ```
//!
//! Each transform reads whatever stage `current` points at, writes its own
//! stage, and moves `current` there. Earlier stages stay readable.

pub mod smoothing;

use log::info;

pub use smoothing::{SavitzkyGolay, Smoother};

use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// Series – paired domain / signal
// ---------------------------------------------------------------------------

/// An ordered (domain, signal) pairing; both vectors have the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    pub domain: Vec<f64>,
    pub signal: Vec<f64>,
}

impl Series {
    pub fn new(domain: Vec<f64>, signal: Vec<f64>) -> Self {
        debug_assert_eq!(domain.len(), signal.len());
        Self { domain, signal }
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    /// Position of `value` on the domain axis (exact match, no interpolation).
    pub fn index_of(&self, value: f64) -> Result<usize> {
        self.domain
            .iter()
            .position(|&d| d == value)
            .ok_or(SpectraError::ValueNotFound(value))
    }

    /// Signal value recorded exactly at `value`.
    pub fn value_at(&self, value: f64) -> Result<f64> {
        self.index_of(value).map(|i| self.signal[i])
    }

    /// Indices whose domain value lies within `[lower, upper]`.
    fn indices_within(&self, lower: f64, upper: f64) -> Vec<usize> {
        self.domain
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d >= lower && d <= upper)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Whether `values` is strictly increasing or strictly decreasing.
pub fn is_strictly_monotonic(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1]) || values.windows(2).all(|w| w[0] > w[1])
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Named output of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Filtered,
    BaselineCorrected,
    Converted,
}

/// Result of a one-shot step: repeating it is a logged no-op, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum StepOutcome {
    Applied,
    Skipped,
}

impl StepOutcome {
    pub fn applied(self) -> bool {
        self == StepOutcome::Applied
    }
}

/// Divisor turning ellipticity in mdeg into mean residue ellipticity.
pub fn mre_divisor(concentration: f64, residue_count: f64, pathlength: f64) -> Result<f64> {
    for (name, v) in [
        ("concentration", concentration),
        ("residue count", residue_count),
        ("pathlength", pathlength),
    ] {
        if !v.is_finite() || v <= 0.0 {
            return Err(SpectraError::InvalidParameter(format!(
                "{name} must be positive, got {v}"
            )));
        }
    }
    let divisor = 10.0 * concentration * residue_count * pathlength;
    if divisor == 0.0 || !divisor.is_finite() {
        return Err(SpectraError::InvalidParameter(format!(
            "conversion divisor {divisor} is not usable"
        )));
    }
    Ok(divisor)
}

// ---------------------------------------------------------------------------
// SignalTrack – stage outputs plus the current pointer
// ---------------------------------------------------------------------------

/// The mutable signal of a 1-D record.
#[derive(Debug, Clone)]
pub struct SignalTrack {
    raw: Series,
    filtered: Option<Series>,
    baseline_corrected: Option<Series>,
    converted: Option<Series>,
    smoothed: Option<Vec<f64>>,
    current: Stage,
}

impl SignalTrack {
    pub fn new(domain: Vec<f64>, signal: Vec<f64>) -> Self {
        Self {
            raw: Series::new(domain, signal),
            filtered: None,
            baseline_corrected: None,
            converted: None,
            smoothed: None,
            current: Stage::Raw,
        }
    }

    pub fn current_stage(&self) -> Stage {
        self.current
    }

    pub fn stage(&self, stage: Stage) -> Option<&Series> {
        match stage {
            Stage::Raw => Some(&self.raw),
            Stage::Filtered => self.filtered.as_ref(),
            Stage::BaselineCorrected => self.baseline_corrected.as_ref(),
            Stage::Converted => self.converted.as_ref(),
        }
    }

    /// The series subsequent operations read.
    pub fn current(&self) -> &Series {
        self.stage(self.current).unwrap_or(&self.raw)
    }

    pub fn raw(&self) -> &Series {
        &self.raw
    }

    pub fn domain(&self) -> &[f64] {
        &self.current().domain
    }

    pub fn signal(&self) -> &[f64] {
        &self.current().signal
    }

    pub fn smoothed(&self) -> Option<&[f64]> {
        self.smoothed.as_deref()
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }

    pub fn is_baseline_corrected(&self) -> bool {
        self.baseline_corrected.is_some()
    }

    fn set(&mut self, stage: Stage, series: Series) {
        match stage {
            Stage::Raw => self.raw = series,
            Stage::Filtered => self.filtered = Some(series),
            Stage::BaselineCorrected => self.baseline_corrected = Some(series),
            Stage::Converted => self.converted = Some(series),
        }
        self.current = stage;
    }

    /// Keep the first `len` samples of the current series. One-shot.
    pub fn truncate(&mut self, len: usize) -> StepOutcome {
        if self.is_filtered() {
            return StepOutcome::Skipped;
        }
        let cur = self.current();
        let len = len.min(cur.len());
        let series = Series::new(cur.domain[..len].to_vec(), cur.signal[..len].to_vec());
        info!("reliability filter keeps {len} of {} samples", cur.len());
        self.set(Stage::Filtered, series);
        StepOutcome::Applied
    }

    /// Subtract `blank` over `[lower, upper]`, pairing samples by position
    /// inside that window. The resulting domain is the blank's.
    ///
    /// Validates before touching any stage.
    pub fn subtract_blank(&mut self, blank: &Series, lower: f64, upper: f64) -> Result<()> {
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        let cur = self.current();
        let own = cur.indices_within(lower, upper);
        let theirs = blank.indices_within(lower, upper);
        if theirs.is_empty() {
            return Err(SpectraError::InvalidParameter(format!(
                "blank has no samples within [{lower}, {upper}]"
            )));
        }
        if own.len() != theirs.len() {
            return Err(SpectraError::InvalidParameter(format!(
                "blank has {} samples within [{lower}, {upper}], spectrum has {}",
                theirs.len(),
                own.len()
            )));
        }

        let domain = theirs.iter().map(|&j| blank.domain[j]).collect();
        let signal = own
            .iter()
            .zip(&theirs)
            .map(|(&i, &j)| cur.signal[i] - blank.signal[j])
            .collect();
        info!("subtracted blank over [{lower}, {upper}] ({} samples)", own.len());
        self.set(Stage::BaselineCorrected, Series::new(domain, signal));
        Ok(())
    }

    /// Subtract a constant from every sample of the current series.
    pub fn subtract_offset(&mut self, offset: f64) {
        let cur = self.current();
        let signal = cur.signal.iter().map(|s| s - offset).collect();
        let series = Series::new(cur.domain.clone(), signal);
        info!("subtracted constant offset {offset}");
        self.set(Stage::BaselineCorrected, series);
    }

    /// Divide the current series by `divisor`. Repeated calls compound.
    pub fn divide(&mut self, divisor: f64) {
        let cur = self.current();
        let signal = cur.signal.iter().map(|s| s / divisor).collect();
        let series = Series::new(cur.domain.clone(), signal);
        info!("divided signal by {divisor}");
        self.set(Stage::Converted, series);
    }

    /// Smooth the current signal; the result is kept beside it.
    pub fn smooth(
        &mut self,
        smoother: &dyn Smoother,
        window: usize,
        polyorder: usize,
    ) -> Result<&[f64]> {
        let smoothed = smoother.smooth(self.signal(), window, polyorder)?;
        Ok(self.smoothed.insert(smoothed).as_slice())
    }

    /// Riemann sum of the current signal between two exact domain samples,
    /// inclusive, times `step`. Bound order does not matter.
    pub fn integrate(&self, lower: f64, upper: f64, step: f64) -> Result<f64> {
        let cur = self.current();
        let a = cur.index_of(upper)?;
        let b = cur.index_of(lower)?;
        let (first, last) = (a.min(b), a.max(b));
        let sum: f64 = cur.signal[first..=last].iter().sum();
        Ok(step * sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descending_track(n: usize, value: f64) -> SignalTrack {
        let domain = (0..n).map(|i| 500.0 - i as f64).collect();
        SignalTrack::new(domain, vec![value; n])
    }

    #[test]
    fn test_integrate_inclusive_window() {
        let track = descending_track(101, 0.5);
        let integral = track.integrate(450.0, 460.0, 1.0).unwrap();
        assert!((integral - 5.5).abs() < 1e-12);
        // Same index range when the bounds are swapped.
        assert_eq!(track.integrate(460.0, 450.0, 1.0).unwrap(), integral);
    }

    #[test]
    fn test_integrate_matches_slice_sum() {
        let domain: Vec<f64> = (0..20).map(|i| 220.0 - i as f64).collect();
        let signal: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        let track = SignalTrack::new(domain.clone(), signal.clone());
        let i_upper = domain.iter().position(|&d| d == 215.0).unwrap();
        let i_lower = domain.iter().position(|&d| d == 205.0).unwrap();
        let expected = 2.0 * signal[i_upper..i_lower + 1].iter().sum::<f64>();
        let got = track.integrate(205.0, 215.0, 2.0).unwrap();
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_requires_exact_bounds() {
        let track = descending_track(11, 1.0);
        assert!(matches!(
            track.integrate(495.5, 499.0, 1.0),
            Err(SpectraError::ValueNotFound(v)) if v == 495.5
        ));
        assert!(matches!(
            track.integrate(491.0, 520.0, 1.0),
            Err(SpectraError::ValueNotFound(_))
        ));
    }

    #[test]
    fn test_truncate_is_one_shot() {
        let mut track = descending_track(10, 1.0);
        assert_eq!(track.truncate(4), StepOutcome::Applied);
        assert_eq!(track.domain().len(), 4);
        assert_eq!(track.truncate(2), StepOutcome::Skipped);
        assert_eq!(track.domain().len(), 4);
        assert_eq!(track.current_stage(), Stage::Filtered);
        assert_eq!(track.raw().len(), 10);
    }

    #[test]
    fn test_subtract_blank_takes_blank_domain() {
        let mut track = SignalTrack::new(vec![203.0, 202.0, 201.0], vec![5.0, 6.0, 7.0]);
        let blank = Series::new(vec![204.0, 203.0, 202.0, 201.0], vec![9.0, 1.0, 2.0, 3.0]);
        track.subtract_blank(&blank, 201.0, 203.0).unwrap();
        assert_eq!(track.signal(), &[4.0, 4.0, 4.0]);
        assert_eq!(track.domain(), &[203.0, 202.0, 201.0]);
        assert!(track.is_baseline_corrected());
    }

    #[test]
    fn test_subtract_blank_mismatch_leaves_track_untouched() {
        let mut track = SignalTrack::new(vec![203.0, 202.0, 201.0], vec![5.0, 6.0, 7.0]);
        let blank = Series::new(vec![203.0, 201.0], vec![1.0, 3.0]);
        assert!(track.subtract_blank(&blank, 201.0, 203.0).is_err());
        assert_eq!(track.current_stage(), Stage::Raw);
        assert_eq!(track.signal(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_divide_compounds_and_keeps_raw() {
        let mut track = descending_track(3, 2.0);
        track.divide(0.01);
        track.divide(2.0);
        assert!(track.signal().iter().all(|&s| (s - 100.0).abs() < 1e-9));
        assert_eq!(track.raw().signal, vec![2.0; 3]);
    }

    #[test]
    fn test_mre_divisor_validation() {
        assert!((mre_divisor(1e-5, 100.0, 1.0).unwrap() - 0.01).abs() < 1e-15);
        assert!(mre_divisor(0.0, 1.0, 1.0).is_err());
        assert!(mre_divisor(1e-5, -1.0, 1.0).is_err());
        assert!(mre_divisor(1e-5, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_monotonic_check() {
        assert!(is_strictly_monotonic(&[3.0, 2.0, 1.0]));
        assert!(is_strictly_monotonic(&[1.0, 2.0]));
        assert!(!is_strictly_monotonic(&[1.0, 1.0, 2.0]));
        assert!(!is_strictly_monotonic(&[1.0, 3.0, 2.0]));
    }
}
