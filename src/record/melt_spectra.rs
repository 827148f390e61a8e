use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use super::{RecordHeader, DELTAX_FIELD};
use crate::config::ParseOptions;
use crate::data::filter::mask_unreliable;
use crate::data::loader::{parse_file, read_grid_table, FileLayout, ParsedFile};
use crate::data::model::{FieldTable, SectionRole};
use crate::error::{Result, SpectraError};
use crate::pipeline::{mre_divisor, SavitzkyGolay, Smoother};

// ---------------------------------------------------------------------------
// GridPoint – one (wavelength, temperature) sample in long form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPoint {
    pub wavelength: f64,
    pub temperature: f64,
    /// Ellipticity as parsed (mdeg).
    pub raw: f64,
    pub ht: f64,
    /// `raw` where HT is at or below the threshold.
    pub filtered: Option<f64>,
    /// Mean residue ellipticity computed from `filtered`.
    pub mre: Option<f64>,
    pub smoothed: Option<f64>,
}

// ---------------------------------------------------------------------------
// CdMeltSpectra – wavelength × temperature grid
// ---------------------------------------------------------------------------

/// CD spectra recorded at a series of temperatures.
///
/// `points` is temperature-major: all wavelengths of the first temperature,
/// then all wavelengths of the second, and so on.
#[derive(Debug, Clone)]
pub struct CdMeltSpectra {
    pub header: RecordHeader,
    wavelengths: Vec<f64>,
    temperatures: Vec<f64>,
    points: Vec<GridPoint>,
    domain_step: f64,
    mre_applied: bool,
    integrals: Option<Vec<f64>>,
}

/// `|DELTAX|` from the info block.
fn deltax(info: &FieldTable) -> Result<f64> {
    let value = info
        .get(DELTAX_FIELD)
        .filter(|v| !v.is_null())
        .ok_or_else(|| SpectraError::MissingField(DELTAX_FIELD.to_string()))?;
    value
        .as_f64()
        .map(f64::abs)
        .ok_or_else(|| SpectraError::UnitParse {
            field: DELTAX_FIELD.to_string(),
            value: value.to_string(),
            unit: String::new(),
        })
}

impl CdMeltSpectra {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, &ParseOptions::default())
    }

    pub fn load_with(path: &Path, options: &ParseOptions) -> Result<Self> {
        let parsed = parse_file(path, FileLayout::MeltGrid)?;
        Self::from_parsed(&parsed, options)
    }

    pub fn from_parsed(parsed: &ParsedFile, options: &ParseOptions) -> Result<Self> {
        let header = RecordHeader::from_parsed(parsed)?;
        let domain_step = deltax(&header.info)?;
        let cd = read_grid_table(&parsed.path, parsed.section_lines(SectionRole::XyData))?;
        let ht = read_grid_table(&parsed.path, parsed.section_lines(SectionRole::HtData))?;

        // HT is matched to CD by position; labels may drift in the last digit.
        if cd.rows.len() != ht.rows.len() || cd.column_labels.len() != ht.column_labels.len() {
            return Err(SpectraError::malformed(
                &parsed.path,
                format!(
                    "CD grid is {}x{} but HT grid is {}x{}",
                    cd.rows.len(),
                    cd.column_labels.len(),
                    ht.rows.len(),
                    ht.column_labels.len()
                ),
            ));
        }
        if cd.row_labels != ht.row_labels || cd.column_labels != ht.column_labels {
            debug!(
                "{}: HT labels differ from CD labels, pairing by position",
                parsed.path.display()
            );
        }

        let n = cd.rows.len() * cd.column_labels.len();
        let mut raw = Vec::with_capacity(n);
        let mut ht_values = Vec::with_capacity(n);
        for j in 0..cd.column_labels.len() {
            for (cd_row, ht_row) in cd.rows.iter().zip(&ht.rows) {
                raw.push(cd_row[j]);
                ht_values.push(ht_row[j]);
            }
        }
        let filtered = mask_unreliable(&raw, &ht_values, options.ht_max);

        let points = cd
            .column_labels
            .iter()
            .flat_map(|&t| cd.row_labels.iter().map(move |&wl| (wl, t)))
            .zip(raw.iter().zip(&ht_values).zip(filtered))
            .map(|((wavelength, temperature), ((&raw, &ht), filtered))| GridPoint {
                wavelength,
                temperature,
                raw,
                ht,
                filtered,
                mre: None,
                smoothed: None,
            })
            .collect();

        Ok(Self {
            header,
            wavelengths: cd.row_labels,
            temperatures: cd.column_labels,
            points,
            domain_step,
            mre_applied: false,
            integrals: None,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temperatures
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// The spectrum recorded at the `index`-th temperature.
    pub fn spectrum_at(&self, index: usize) -> &[GridPoint] {
        let n = self.wavelengths.len();
        let start = (index * n).min(self.points.len());
        let end = (start + n).min(self.points.len());
        &self.points[start..end]
    }

    /// `|DELTAX|` in nm.
    pub fn domain_step(&self) -> f64 {
        self.domain_step
    }

    pub fn is_mre_applied(&self) -> bool {
        self.mre_applied
    }

    /// Per-temperature integrals from the last [`CdMeltSpectra::integrate`].
    pub fn integrals(&self) -> Option<&[f64]> {
        self.integrals.as_deref()
    }

    /// The column later operations read: mre once computed, else filtered.
    fn active(&self, point: &GridPoint) -> Option<f64> {
        if self.mre_applied {
            point.mre
        } else {
            point.filtered
        }
    }

    /// Compute mean residue ellipticity from the filtered column.
    ///
    /// Always derived from `filtered`, so repeating it recomputes rather than
    /// compounds.
    /// `residue_count = 1` and `pathlength = 1.0` give molar ellipticity.
    pub fn mre(&mut self, concentration: f64, residue_count: u32, pathlength: f64) -> Result<()> {
        let divisor = mre_divisor(concentration, f64::from(residue_count), pathlength)?;
        for p in &mut self.points {
            p.mre = p.filtered.map(|v| v / divisor);
        }
        self.mre_applied = true;
        info!("{}: mean residue ellipticity (divisor {divisor})", self.header.name);
        Ok(())
    }

    /// Smooth each temperature's spectrum separately. Unreliable samples stay
    /// unset, as do their neighbours within the window.
    pub fn smooth(&mut self, window: usize, polyorder: usize) -> Result<()> {
        self.smooth_with(&SavitzkyGolay, window, polyorder)
    }

    pub fn smooth_with(
        &mut self,
        smoother: &dyn Smoother,
        window: usize,
        polyorder: usize,
    ) -> Result<()> {
        let n = self.wavelengths.len();
        let mut smoothed = Vec::with_capacity(self.points.len());
        for block in self.points.chunks(n) {
            let values: Vec<f64> = block
                .iter()
                .map(|p| self.active(p).unwrap_or(f64::NAN))
                .collect();
            smoothed.extend(smoother.smooth(&values, window, polyorder)?);
        }
        for (p, s) in self.points.iter_mut().zip(smoothed) {
            p.smoothed = s.is_finite().then_some(s);
        }
        Ok(())
    }

    /// Riemann sum over `[lower, upper]` for every temperature, in the order
    /// of [`CdMeltSpectra::temperatures`]. Unreliable samples contribute 0.
    pub fn integrate(&mut self, lower: f64, upper: f64) -> Result<&[f64]> {
        for bound in [lower, upper] {
            if !self.wavelengths.contains(&bound) {
                return Err(SpectraError::ValueNotFound(bound));
            }
        }
        let (lower, upper) = (lower.min(upper), lower.max(upper));
        let n = self.wavelengths.len();
        let integrals: Vec<f64> = self
            .points
            .chunks(n)
            .map(|block| {
                let sum: f64 = block
                    .iter()
                    .filter(|p| p.wavelength >= lower && p.wavelength <= upper)
                    .filter_map(|p| self.active(p))
                    .sum();
                self.domain_step * sum
            })
            .collect();
        Ok(self.integrals.insert(integrals).as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetadataValue;
    use crate::record::fixtures::{comma, write_text};

    const WAVELENGTHS: [f64; 5] = [204.0, 203.0, 202.0, 201.0, 200.0];
    const TEMPERATURES: [f64; 3] = [20.0, 50.5, 80.0];

    fn cd_value(i: usize, j: usize) -> f64 {
        -(i as f64 + 1.0) * (j as f64 + 1.0)
    }

    /// HT passes 600 only at the shortest wavelength of the hottest spectrum.
    fn ht_value(i: usize, j: usize) -> f64 {
        if i == 4 && j == 2 {
            700.0
        } else {
            400.0
        }
    }

    fn matrix(value: fn(usize, usize) -> f64, label_shift: f64) -> String {
        let header: Vec<String> = TEMPERATURES.iter().map(|t| comma(t + label_shift)).collect();
        let mut text = format!(";{}\n", header.join(";"));
        for (i, wl) in WAVELENGTHS.iter().enumerate() {
            let row: Vec<String> = (0..TEMPERATURES.len()).map(|j| comma(value(i, j))).collect();
            text.push_str(&format!("{};{}\n", comma(*wl), row.join(";")));
        }
        text
    }

    fn grid_text(label_shift: f64) -> String {
        format!(
            "TITLE;Temperature interval\nDELTAX;-1\nXUNITS;NANOMETERS\nChannel 1\n{}Channel 2\n{}",
            matrix(cd_value, 0.0),
            matrix(ht_value, label_shift)
        )
    }

    fn load() -> CdMeltSpectra {
        let file = write_text(&grid_text(0.0));
        CdMeltSpectra::load(file.path()).unwrap()
    }

    #[test]
    fn test_parse_long_form() {
        let grid = load();
        assert_eq!(grid.header.title, "Temperature interval");
        assert_eq!(grid.wavelengths(), &WAVELENGTHS);
        assert_eq!(grid.temperatures(), &TEMPERATURES);
        assert_eq!(grid.domain_step(), 1.0);
        assert_eq!(grid.points().len(), 15);

        let p = &grid.points()[5 + 2];
        assert_eq!(p.temperature, 50.5);
        assert_eq!(p.wavelength, 202.0);
        assert_eq!(p.raw, cd_value(2, 1));
        assert_eq!(p.filtered, Some(p.raw));
    }

    #[test]
    fn test_ht_mask_is_pointwise() {
        let grid = load();
        let hot = grid.spectrum_at(2);
        assert_eq!(hot.len(), 5);
        assert_eq!(hot[4].ht, 700.0);
        assert_eq!(hot[4].filtered, None);
        assert!(hot[..4].iter().all(|p| p.filtered.is_some()));
    }

    #[test]
    fn test_labels_drift_is_tolerated() {
        let file = write_text(&grid_text(0.01));
        let grid = CdMeltSpectra::load(file.path()).unwrap();
        assert_eq!(grid.temperatures(), &TEMPERATURES);
        assert_eq!(grid.points()[14].filtered, None);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut text = grid_text(0.0);
        text.push_str("199;1;1;1\n");
        let file = write_text(&text);
        assert!(matches!(
            CdMeltSpectra::load(file.path()),
            Err(SpectraError::MalformedFormat { .. })
        ));
    }

    #[test]
    fn test_integrate_per_temperature() {
        let mut grid = load();
        let integrals = grid.integrate(201.0, 203.0).unwrap().to_vec();
        // Rows 1..=3 for each temperature.
        let expected: Vec<f64> = (0..3)
            .map(|j| (1..=3).map(|i| cd_value(i, j)).sum())
            .collect();
        assert_eq!(integrals, expected);

        // The unreliable sample at 200 nm / 80 °C is skipped.
        let all = grid.integrate(200.0, 204.0).unwrap();
        let hottest: f64 = (0..4).map(|i| cd_value(i, 2)).sum();
        assert_eq!(all[2], hottest);
        assert_eq!(grid.integrals().map(|v| v.len()), Some(3));

        assert!(matches!(
            grid.integrate(200.5, 204.0),
            Err(SpectraError::ValueNotFound(_))
        ));
    }

    #[test]
    fn test_mre_switches_active_column() {
        let mut grid = load();
        grid.mre(1e-5, 100, 1.0).unwrap();
        assert!(grid.is_mre_applied());
        let p = &grid.points()[0];
        assert!((p.mre.unwrap() - p.raw / 0.01).abs() < 1e-9);

        // Recomputed from the filtered column, not compounded.
        grid.mre(1e-5, 100, 1.0).unwrap();
        let p = &grid.points()[0];
        assert!((p.mre.unwrap() - p.raw / 0.01).abs() < 1e-9);

        let integrals = grid.integrate(204.0, 204.0).unwrap();
        assert!((integrals[0] - cd_value(0, 0) / 0.01).abs() < 1e-9);
        assert!(grid.mre(0.0, 100, 1.0).is_err());
    }

    #[test]
    fn test_smooth_per_temperature() {
        let mut grid = load();
        grid.smooth(3, 1).unwrap();
        // Linear within each spectrum, so a line fit reproduces it.
        for p in grid.spectrum_at(0) {
            assert!((p.smoothed.unwrap() - p.raw).abs() < 1e-9);
        }
        // Windows touching the masked sample stay unset.
        let hot = grid.spectrum_at(2);
        assert!(hot[4].smoothed.is_none());
        assert!(hot[0].smoothed.is_some());
        assert!(grid.smooth(7, 2).is_err());
    }

    fn assert_malformed(text: &str) {
        let file = write_text(text);
        assert!(matches!(
            CdMeltSpectra::load(file.path()),
            Err(SpectraError::MalformedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_ht_channel_is_rejected() {
        let text = format!(
            "TITLE;x\nDELTAX;-1\nChannel 1\n{}",
            matrix(cd_value, 0.0)
        );
        assert_malformed(&text);
    }

    #[test]
    fn test_channels_out_of_order_are_rejected() {
        let text = format!(
            "TITLE;x\nDELTAX;-1\nChannel 2\n{}Channel 1\n{}",
            matrix(ht_value, 0.0),
            matrix(cd_value, 0.0)
        );
        assert_malformed(&text);
    }

    #[test]
    fn test_empty_ht_channel_is_rejected() {
        let text = format!(
            "TITLE;x\nDELTAX;-1\nChannel 1\n{}Channel 2\n",
            matrix(cd_value, 0.0)
        );
        assert_malformed(&text);

        let text = format!(
            "TITLE;x\nDELTAX;-1\nChannel 1\n{}Channel 2\n##### Extended Information\nData pitch;1 nm\n",
            matrix(cd_value, 0.0)
        );
        assert_malformed(&text);
    }

    #[test]
    fn test_grid_with_footer() {
        let mut text = grid_text(0.0);
        text.push_str("\n##### Extended Information\n[Measurement Information]\nData pitch;1 nm\n");
        let file = write_text(&text);
        let grid = CdMeltSpectra::load(file.path()).unwrap();

        assert_eq!(grid.points().len(), 15);
        assert_eq!(
            grid.header.metadata.get("Data pitch"),
            Some(&MetadataValue::String("1 nm".into()))
        );
        assert_eq!(grid.spectrum_at(2)[4].filtered, None);
        assert_eq!(grid.spectrum_at(2)[3].filtered, Some(cd_value(3, 2)));
    }

    #[test]
    fn test_missing_deltax() {
        let text = grid_text(0.0).replace("DELTAX;-1\n", "");
        let file = write_text(&text);
        assert!(matches!(
            CdMeltSpectra::load(file.path()),
            Err(SpectraError::MissingField(f)) if f == "DELTAX"
        ));
    }
}
