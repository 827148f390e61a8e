/// Data layer: section scanning, typed tables, and HT reliability.
///
/// Architecture:
/// ```text
///  JASCO .csv export (';' delimited, decimal comma)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  sentinel scan → ParsedFile { title, RawSection list }
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  FieldTable (info / metadata), NumericTable, GridTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  HT threshold → cut-off index / point-wise mask
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
