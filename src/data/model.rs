use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell of the info / metadata blocks
// ---------------------------------------------------------------------------

/// A dynamically-typed field value as found in the info and footer blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Interpret a raw cell. Numbers use the instrument's decimal comma.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Some(v) = parse_decimal(s) {
            return MetadataValue::Float(v);
        }
        MetadataValue::String(s.to_string())
    }

    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::String(s) => parse_decimal(s),
            MetadataValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

/// Parse a number written with either a decimal comma or a decimal point.
pub fn parse_decimal(s: &str) -> Option<f64> {
    let normalized = s.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// FieldTable – pivoted (name → value) block
// ---------------------------------------------------------------------------

/// Field name → value, built from a two-column `name;value` block.
pub type FieldTable = BTreeMap<String, MetadataValue>;

/// Look up a field and read it as `<number><unit>`, e.g. `"1 nm"`.
pub fn field_with_unit(table: &FieldTable, field: &str, unit: &str) -> Result<f64> {
    let value = table
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| SpectraError::MissingField(field.to_string()))?;

    let unit_error = || SpectraError::UnitParse {
        field: field.to_string(),
        value: value.to_string(),
        unit: unit.to_string(),
    };

    match value {
        MetadataValue::String(s) => {
            let number = s.strip_suffix(unit).ok_or_else(unit_error)?;
            parse_decimal(number).ok_or_else(unit_error)
        }
        _ => Err(unit_error()),
    }
}

// ---------------------------------------------------------------------------
// RawSection – located region of the source text
// ---------------------------------------------------------------------------

/// The logical role of a [`RawSection`].
///
/// Sections never overlap and appear in this order. The title line is line 0
/// of [`SectionRole::Info`]; its text is extracted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRole {
    Info,
    XyData,
    /// Second channel of a melt-spectra grid (HT voltages).
    HtData,
    Metadata,
}

/// Half-open line range `[start, end)` of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSection {
    pub role: SectionRole,
    pub start: usize,
    pub end: usize,
}

impl RawSection {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The lines of `lines` covered by this section.
    pub fn slice<'a>(&self, lines: &'a [String]) -> &'a [String] {
        let end = self.end.min(lines.len());
        let start = self.start.min(end);
        &lines[start..end]
    }
}

// ---------------------------------------------------------------------------
// NumericTable – column-major data block
// ---------------------------------------------------------------------------

/// A numeric block with named columns, row order preserved.
#[derive(Debug, Clone, Default)]
pub struct NumericTable {
    pub columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl NumericTable {
    pub fn new(columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); columns.len()];
        Self { columns, values }
    }

    /// Append one row; the caller guarantees `row.len() == columns.len()`.
    pub(crate) fn push_row(&mut self, row: &[f64]) {
        for (col, v) in self.values.iter_mut().zip(row) {
            col.push(*v);
        }
    }

    pub fn n_rows(&self) -> usize {
        self.values.first().map_or(0, |c| c.len())
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
            .ok_or_else(|| SpectraError::MissingField(name.to_string()))
    }

    /// Move one column out of the table, leaving it empty.
    pub fn take_column(&mut self, name: &str) -> Result<Vec<f64>> {
        let i = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| SpectraError::MissingField(name.to_string()))?;
        Ok(std::mem::take(&mut self.values[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_value_decimal_comma() {
        assert_eq!(MetadataValue::parse("-1"), MetadataValue::Integer(-1));
        assert_eq!(MetadataValue::parse("0,5"), MetadataValue::Float(0.5));
        assert_eq!(MetadataValue::parse(" "), MetadataValue::Null);
        assert_eq!(
            MetadataValue::parse("1 nm"),
            MetadataValue::String("1 nm".into())
        );
    }

    #[test]
    fn test_field_with_unit() {
        let mut table = FieldTable::new();
        table.insert("Data pitch".into(), MetadataValue::parse("0,5 nm"));
        table.insert("Bandwidth".into(), MetadataValue::parse("1"));
        table.insert("Monitor wavelength".into(), MetadataValue::parse("abc nm"));

        assert_eq!(field_with_unit(&table, "Data pitch", " nm").unwrap(), 0.5);
        assert!(matches!(
            field_with_unit(&table, "Bandwidth", " nm"),
            Err(SpectraError::UnitParse { .. })
        ));
        assert!(matches!(
            field_with_unit(&table, "Monitor wavelength", " nm"),
            Err(SpectraError::UnitParse { .. })
        ));
        assert!(matches!(
            field_with_unit(&table, "Scanning speed", " nm"),
            Err(SpectraError::MissingField(_))
        ));
    }

    #[test]
    fn test_numeric_table_columns() {
        let mut table = NumericTable::new(vec!["a".into(), "b".into()]);
        table.push_row(&[1.0, 2.0]);
        table.push_row(&[3.0, 4.0]);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("b").unwrap(), &[2.0, 4.0]);
        assert!(table.column("c").is_err());
        assert_eq!(table.take_column("a").unwrap(), vec![1.0, 3.0]);
    }
}
