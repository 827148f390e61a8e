use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};

use super::model::{
    parse_decimal, FieldTable, MetadataValue, NumericTable, RawSection, SectionRole,
};
use crate::error::{Result, SpectraError};

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Line preceding the XY block of single-spectrum exports.
pub const XYDATA_MARKER: &str = "XYDATA";
/// First line of the footer of single-spectrum exports.
pub const FOOTER_MARKER: &str = "##### Extended Information";
/// Line preceding the CD matrix of melt-spectra exports.
pub const CHANNEL_1_MARKER: &str = "Channel 1";
/// Line preceding the HT matrix of melt-spectra exports.
pub const CHANNEL_2_MARKER: &str = "Channel 2";

/// Which family of export the scanner should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLayout {
    /// `XYDATA` … `##### Extended Information` (spectra and melt curves).
    SingleSpectrum,
    /// `Channel 1` … `Channel 2` wavelength × temperature matrices.
    MeltGrid,
}

// ---------------------------------------------------------------------------
// ParsedFile – source lines plus located sections
// ---------------------------------------------------------------------------

/// One export split into its logical regions.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub title: String,
    pub sections: Vec<RawSection>,
}

impl ParsedFile {
    pub fn section(&self, role: SectionRole) -> Option<RawSection> {
        self.sections.iter().copied().find(|s| s.role == role)
    }

    /// Lines of the section with the given role (empty if absent).
    pub fn section_lines(&self, role: SectionRole) -> &[String] {
        self.section(role)
            .map(|s| s.slice(&self.lines))
            .unwrap_or(&[])
    }

    /// The info block pivoted into a field table.
    pub fn info(&self) -> Result<FieldTable> {
        read_field_table(self.section_lines(SectionRole::Info))
    }

    /// The footer block pivoted into a field table.
    pub fn metadata(&self) -> Result<FieldTable> {
        read_field_table(self.section_lines(SectionRole::Metadata))
    }

    /// File stem, e.g. `"lysozyme_25C"` for `data/lysozyme_25C.csv`.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read an export from disk and locate its sections.
pub fn parse_file(path: &Path, layout: FileLayout) -> Result<ParsedFile> {
    let lines = read_lines(path)?;
    parse_lines(path, lines, layout)
}

/// Locate sections in already-loaded lines. `path` is used for diagnostics.
pub fn parse_lines(path: &Path, lines: Vec<String>, layout: FileLayout) -> Result<ParsedFile> {
    let title = extract_title(path, &lines)?;
    let sections = scan_sections(path, &lines, layout)?;
    debug!("{}: title '{title}', sections {sections:?}", path.display());
    Ok(ParsedFile {
        path: path.to_path_buf(),
        lines,
        title,
        sections,
    })
}

/// Instrument software writes Latin-1 (e.g. `°C`), so decode lossily.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect())
}

fn extract_title(path: &Path, lines: &[String]) -> Result<String> {
    let first = lines
        .first()
        .ok_or_else(|| SpectraError::malformed(path, "file is empty"))?;
    match first.split_once(';') {
        Some((_, rest)) => Ok(rest.split(';').next().unwrap_or("").trim().to_string()),
        None => {
            warn!("{}: title line has no ';' separator", path.display());
            Ok(String::new())
        }
    }
}

fn has_token(line: &str, token: &str) -> bool {
    line.split(';').any(|field| field.trim() == token)
}

// ---------------------------------------------------------------------------
// Section scanner
// ---------------------------------------------------------------------------

/// Scan once for the start/end sentinels and return the tagged sections in
/// file order. Scanning stops at the end sentinel.
pub fn scan_sections(path: &Path, lines: &[String], layout: FileLayout) -> Result<Vec<RawSection>> {
    let (start_marker, end_marker) = match layout {
        FileLayout::SingleSpectrum => (XYDATA_MARKER, FOOTER_MARKER),
        FileLayout::MeltGrid => (CHANNEL_1_MARKER, CHANNEL_2_MARKER),
    };

    let mut start_line = None;
    let mut end_line = None;
    for (position, line) in lines.iter().enumerate().skip(1) {
        if has_token(line, end_marker) {
            if start_line.is_none() {
                return Err(SpectraError::malformed(
                    path,
                    format!("'{end_marker}' found on line {position} before '{start_marker}'"),
                ));
            }
            end_line = Some(position);
            break;
        }
        if start_line.is_none() && has_token(line, start_marker) {
            start_line = Some(position);
        }
    }

    let start_line = start_line
        .ok_or_else(|| SpectraError::malformed(path, format!("no '{start_marker}' line")))?;
    let end_line = end_line.ok_or_else(|| {
        SpectraError::malformed(path, format!("no '{end_marker}' line after '{start_marker}'"))
    })?;

    let data = match layout {
        // The line right before the footer is the separator, not a sample.
        FileLayout::SingleSpectrum => {
            let end = end_line - 1;
            if !lines[end].trim().is_empty() && end > start_line + 1 {
                warn!(
                    "{}: line {end} before the footer is not blank and is ignored",
                    path.display()
                );
            }
            RawSection {
                role: SectionRole::XyData,
                start: start_line + 1,
                end,
            }
        }
        // Grid blocks start with a header row of temperature labels.
        FileLayout::MeltGrid => RawSection {
            role: SectionRole::XyData,
            start: start_line + 1,
            end: end_line,
        },
    };
    if data.start >= data.end {
        return Err(SpectraError::malformed(path, "data section is empty"));
    }

    // Line 0 belongs to the info block; the title is also kept on `ParsedFile`.
    let mut sections = vec![
        RawSection {
            role: SectionRole::Info,
            start: 0,
            end: start_line,
        },
        data,
    ];

    match layout {
        FileLayout::SingleSpectrum => sections.push(RawSection {
            role: SectionRole::Metadata,
            start: end_line + 1,
            end: lines.len(),
        }),
        FileLayout::MeltGrid => {
            let ht_start = end_line + 1;
            let footer = lines
                .iter()
                .enumerate()
                .skip(ht_start)
                .find(|(_, l)| has_token(l, FOOTER_MARKER))
                .map(|(i, _)| i);
            let ht_end = footer.unwrap_or(lines.len());
            if ht_start >= ht_end {
                return Err(SpectraError::malformed(path, "HT channel is empty"));
            }
            sections.push(RawSection {
                role: SectionRole::HtData,
                start: ht_start,
                end: ht_end,
            });
            if let Some(footer) = footer {
                sections.push(RawSection {
                    role: SectionRole::Metadata,
                    start: footer + 1,
                    end: lines.len(),
                });
            }
        }
    }

    Ok(sections)
}

// ---------------------------------------------------------------------------
// Tabular readers
// ---------------------------------------------------------------------------

fn semicolon_records(lines: &[String]) -> Result<Vec<StringRecord>> {
    let text = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::with_capacity(lines.len());
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

/// Pivot a `name;value` block into a table. Names are trimmed; the first
/// occurrence of a duplicated name wins.
pub fn read_field_table(lines: &[String]) -> Result<FieldTable> {
    let mut table = FieldTable::new();
    for record in semicolon_records(lines)? {
        let name = record.get(0).unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        let value = record
            .get(1)
            .map(MetadataValue::parse)
            .unwrap_or(MetadataValue::Null);
        table.entry(name.to_string()).or_insert(value);
    }
    Ok(table)
}

/// Read a decimal-comma numeric block with an explicit column schema.
/// Trailing extra fields are ignored; missing fields are an error.
pub fn read_numeric_table(path: &Path, lines: &[String], columns: &[&str]) -> Result<NumericTable> {
    let mut table = NumericTable::new(columns.iter().map(|c| c.to_string()).collect());
    let mut row = Vec::with_capacity(columns.len());

    for (row_no, record) in semicolon_records(lines)?.iter().enumerate() {
        if record.len() < columns.len() {
            return Err(SpectraError::malformed(
                path,
                format!(
                    "data row {row_no} has {} fields, expected {}",
                    record.len(),
                    columns.len()
                ),
            ));
        }
        row.clear();
        for (col, field) in columns.iter().zip(record.iter()) {
            let v = parse_decimal(field).ok_or_else(|| {
                SpectraError::malformed(
                    path,
                    format!("data row {row_no}, column '{col}': '{field}' is not a number"),
                )
            })?;
            row.push(v);
        }
        table.push_row(&row);
    }

    if table.n_rows() == 0 {
        return Err(SpectraError::malformed(path, "data section has no rows"));
    }
    Ok(table)
}

/// A labelled matrix: one row per wavelength, one column per temperature.
#[derive(Debug, Clone)]
pub struct GridTable {
    pub row_labels: Vec<f64>,
    pub column_labels: Vec<f64>,
    /// Row-major values, `rows[i][j]` at `(row_labels[i], column_labels[j])`.
    pub rows: Vec<Vec<f64>>,
}

/// Read a matrix block whose first record holds the column labels and whose
/// first field of every later record is the row label.
pub fn read_grid_table(path: &Path, lines: &[String]) -> Result<GridTable> {
    let records = semicolon_records(lines)?;
    let (header, body) = records
        .split_first()
        .ok_or_else(|| SpectraError::malformed(path, "matrix block has no header row"))?;

    let column_labels = header
        .iter()
        .skip(1)
        .filter(|f| !f.is_empty())
        .map(|f| {
            parse_decimal(f).ok_or_else(|| {
                SpectraError::malformed(path, format!("column label '{f}' is not a number"))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    if column_labels.is_empty() {
        return Err(SpectraError::malformed(path, "matrix block has no columns"));
    }

    let mut row_labels = Vec::with_capacity(body.len());
    let mut rows = Vec::with_capacity(body.len());
    for (row_no, record) in body.iter().enumerate() {
        let fields: Vec<&str> = record.iter().collect();
        let used = fields
            .iter()
            .rposition(|f| !f.is_empty())
            .map_or(0, |i| i + 1);
        if used != column_labels.len() + 1 {
            return Err(SpectraError::malformed(
                path,
                format!(
                    "matrix row {row_no} has {} values, expected {}",
                    used.saturating_sub(1),
                    column_labels.len()
                ),
            ));
        }
        let parsed = fields[..used]
            .iter()
            .map(|f| {
                parse_decimal(f).ok_or_else(|| {
                    SpectraError::malformed(
                        path,
                        format!("matrix row {row_no}: '{f}' is not a number"),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        row_labels.push(parsed[0]);
        rows.push(parsed[1..].to_vec());
    }

    if rows.is_empty() {
        return Err(SpectraError::malformed(path, "matrix block has no rows"));
    }
    Ok(GridTable {
        row_labels,
        column_labels,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const SPECTRUM: &str = "TITLE;Buffer blank\n\
DELTAX;-1\n\
XYDATA\n\
202;1,5;300\n\
201;2,5;310\n\
200;3,5;320\n\
\n\
##### Extended Information\n\
[Measurement Information]\n\
Data pitch;1 nm\n\
 Scanning speed ;50 nm/min\n\
Data pitch;2 nm\n";

    #[test]
    fn test_scan_single_spectrum_sections() {
        let parsed =
            parse_lines(Path::new("blank.csv"), lines(SPECTRUM), FileLayout::SingleSpectrum)
                .unwrap();

        assert_eq!(parsed.title, "Buffer blank");
        assert_eq!(parsed.name(), "blank");
        let data = parsed.section(SectionRole::XyData).unwrap();
        assert_eq!((data.start, data.end), (3, 6));
        let info = parsed.section(SectionRole::Info).unwrap();
        assert_eq!((info.start, info.end), (0, 2));
        let meta = parsed.section(SectionRole::Metadata).unwrap();
        assert_eq!((meta.start, meta.end), (8, 12));
    }

    #[test]
    fn test_field_tables_keep_first_and_trim() {
        let parsed =
            parse_lines(Path::new("blank.csv"), lines(SPECTRUM), FileLayout::SingleSpectrum)
                .unwrap();
        let info = parsed.info().unwrap();
        assert_eq!(info["DELTAX"], MetadataValue::Integer(-1));
        assert_eq!(info["TITLE"], MetadataValue::String("Buffer blank".into()));

        let meta = parsed.metadata().unwrap();
        assert_eq!(meta["Data pitch"], MetadataValue::String("1 nm".into()));
        assert_eq!(
            meta["Scanning speed"],
            MetadataValue::String("50 nm/min".into())
        );
        assert!(meta["[Measurement Information]"].is_null());
    }

    #[test]
    fn test_numeric_table_decimal_comma() {
        let parsed =
            parse_lines(Path::new("blank.csv"), lines(SPECTRUM), FileLayout::SingleSpectrum)
                .unwrap();
        let table = read_numeric_table(
            &parsed.path,
            parsed.section_lines(SectionRole::XyData),
            &["Wavelength [nm]", "CD [mdeg]", "HT [V]"],
        )
        .unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column("CD [mdeg]").unwrap(), &[1.5, 2.5, 3.5]);
        assert_eq!(table.column("Wavelength [nm]").unwrap(), &[202.0, 201.0, 200.0]);
    }

    #[test]
    fn test_missing_start_marker() {
        let text = "TITLE;x\n200;1\n##### Extended Information\n";
        let err = parse_lines(Path::new("x.csv"), lines(text), FileLayout::SingleSpectrum)
            .unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }

    #[test]
    fn test_missing_end_marker() {
        let text = "TITLE;x\nXYDATA\n200;1\n201;2\n";
        let err = parse_lines(Path::new("x.csv"), lines(text), FileLayout::SingleSpectrum)
            .unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }

    #[test]
    fn test_footer_before_data_is_rejected() {
        let text = "TITLE;x\n##### Extended Information\nXYDATA\n200;1\n\n";
        let err = parse_lines(Path::new("x.csv"), lines(text), FileLayout::SingleSpectrum)
            .unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }

    #[test]
    fn test_empty_data_section_is_rejected() {
        let text = "TITLE;x\nXYDATA\n##### Extended Information\n";
        let err = parse_lines(Path::new("x.csv"), lines(text), FileLayout::SingleSpectrum)
            .unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let data = lines("200;1,0;300\n199;2,0\n");
        let err = read_numeric_table(Path::new("x.csv"), &data, &["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }

    #[test]
    fn test_scan_melt_grid_sections() {
        let text = "TITLE;Melt\n\
DELTAX;-1\n\
Channel 1\n\
;20,0;30,0\n\
201;1,0;2,0\n\
200;3,0;4,0\n\
Channel 2\n\
;20,0;30,0\n\
201;300;310\n\
200;320;330\n";
        let parsed =
            parse_lines(Path::new("melt.csv"), lines(text), FileLayout::MeltGrid).unwrap();
        let cd = parsed.section(SectionRole::XyData).unwrap();
        assert_eq!((cd.start, cd.end), (3, 6));
        let ht = parsed.section(SectionRole::HtData).unwrap();
        assert_eq!((ht.start, ht.end), (7, 10));
        assert!(parsed.section(SectionRole::Metadata).is_none());

        let grid = read_grid_table(&parsed.path, parsed.section_lines(SectionRole::XyData))
            .unwrap();
        assert_eq!(grid.column_labels, vec![20.0, 30.0]);
        assert_eq!(grid.row_labels, vec![201.0, 200.0]);
        assert_eq!(grid.rows[1], vec![3.0, 4.0]);
    }

    fn assert_ordered_and_disjoint(parsed: &ParsedFile) {
        for pair in parsed.sections.windows(2) {
            assert!(pair[0].start < pair[0].end);
            assert!(pair[0].end <= pair[1].start, "{pair:?}");
        }
    }

    #[test]
    fn test_sections_do_not_overlap() {
        let parsed =
            parse_lines(Path::new("blank.csv"), lines(SPECTRUM), FileLayout::SingleSpectrum)
                .unwrap();
        let roles: Vec<SectionRole> = parsed.sections.iter().map(|s| s.role).collect();
        assert_eq!(
            roles,
            vec![SectionRole::Info, SectionRole::XyData, SectionRole::Metadata]
        );
        assert_ordered_and_disjoint(&parsed);

        let text = "TITLE;Melt\n\
Channel 1\n\
;20,0\n\
200;1,0\n\
Channel 2\n\
;20,0\n\
200;300\n\
\n\
##### Extended Information\n\
Data pitch;1 nm\n";
        let parsed =
            parse_lines(Path::new("melt.csv"), lines(text), FileLayout::MeltGrid).unwrap();
        let meta = parsed.section(SectionRole::Metadata).unwrap();
        assert_eq!((meta.start, meta.end), (9, 10));
        assert_ordered_and_disjoint(&parsed);
    }

    #[test]
    fn test_melt_grid_missing_channel_2() {
        let text = "TITLE;x\nChannel 1\n;20,0\n200;1,0\n";
        let err = parse_lines(Path::new("x.csv"), lines(text), FileLayout::MeltGrid).unwrap_err();
        assert!(matches!(err, SpectraError::MalformedFormat { .. }));
    }
}
