use crate::error::{BurstError, Result};
use crate::types::{BurstRecord, CanonicalField, UNKNOWN};
use crate::util::{clean_column_name, excel_serial_to_datetime, parse_datetime_safe};
use calamine::{Data, Ods, Range, Reader, Xls, Xlsb, Xlsx};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use serde::Serialize;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// A single decoded cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Text view of the cell; `None` when there is nothing usable.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.to_string())
                }
            }
            Cell::Number(n) if !n.is_finite() => None,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Timestamp view of the cell. Numbers are read as Excel serial dates.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_datetime_safe(Some(s)),
            Cell::Number(n) => excel_serial_to_datetime(*n),
            Cell::Empty | Cell::Bool(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_none()
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Number(dt.as_f64())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Header plus data rows exactly as decoded, before any column mapping.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// What happened while turning a raw table into burst records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub skipped_blank_rows: usize,
    pub mapped_columns: Vec<(String, CanonicalField)>,
    pub dropped_columns: Vec<String>,
    pub ambiguous_columns: Vec<(String, CanonicalField)>,
    pub unparsed_dates: usize,
}

/// Source column index for each canonical field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    slots: [Option<usize>; 5],
    pub mapped: Vec<(String, CanonicalField)>,
    pub dropped: Vec<String>,
    pub ambiguous: Vec<(String, CanonicalField)>,
}

impl ColumnMapping {
    pub fn column_for(&self, field: CanonicalField) -> Option<usize> {
        self.slots[field.index()]
    }
}

/// Decode `bytes` as a table, picking the decoder from `extension`.
///
/// Spreadsheet formats read the first worksheet; its first row is the header.
pub fn read_table(bytes: &[u8], extension: &str) -> Result<RawTable> {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let cursor = || Cursor::new(bytes.to_vec());
    let range = match ext.as_str() {
        "csv" => return read_csv(bytes),
        "xlsx" | "xlsm" => first_sheet(Xlsx::new(cursor()))?,
        "xls" => first_sheet(Xls::new(cursor()))?,
        "xlsb" => first_sheet(Xlsb::new(cursor()))?,
        "ods" => first_sheet(Ods::new(cursor()))?,
        other => return Err(BurstError::UnsupportedFormat(other.to_string())),
    };
    Ok(table_from_range(&range))
}

type SheetSource = Cursor<Vec<u8>>;

fn first_sheet<R>(workbook: std::result::Result<R, R::Error>) -> Result<Range<Data>>
where
    R: Reader<SheetSource>,
    R::Error: std::fmt::Display,
{
    let mut workbook = workbook.map_err(|e| BurstError::Parse(e.to_string()))?;
    match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(BurstError::Parse(e.to_string())),
        None => Err(BurstError::Parse("workbook has no worksheets".to_string())),
    }
}

fn table_from_range(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_name(idx, &Cell::from(cell)))
            .collect(),
        None => Vec::new(),
    };
    let rows = rows
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();
    RawTable { headers, rows }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);
    let headers = rdr
        .headers()
        .map_err(|e| BurstError::Parse(e.to_string()))?
        .iter()
        .enumerate()
        .map(|(idx, h)| header_name(idx, &Cell::Text(h.to_string())))
        .collect();
    // Data fields are decoded lossily; a stray non-UTF-8 byte degrades one
    // value instead of failing the whole table.
    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result.map_err(|e| BurstError::Parse(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    let field = String::from_utf8_lossy(field);
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.into_owned())
                    }
                })
                .collect(),
        );
    }
    Ok(RawTable { headers, rows })
}

/// Blank headers get a positional placeholder that matches no mapping rule,
/// so an exported index column is dropped rather than mapped.
fn header_name(idx: usize, cell: &Cell) -> String {
    cell.as_text().unwrap_or_else(|| format!("column_{idx}"))
}

/// Assign each cleaned column name to at most one canonical field.
///
/// When several columns match the same field, the first one wins and the
/// rest are reported as ambiguous and dropped.
pub fn map_columns(cleaned: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    for (idx, name) in cleaned.iter().enumerate() {
        match CanonicalField::classify(name) {
            Some(field) if mapping.slots[field.index()].is_none() => {
                mapping.slots[field.index()] = Some(idx);
                mapping.mapped.push((name.clone(), field));
            }
            Some(field) => {
                warn!(
                    "Column '{}' also matches {}; keeping the first match",
                    name, field
                );
                mapping.ambiguous.push((name.clone(), field));
            }
            None => mapping.dropped.push(name.clone()),
        }
    }
    mapping
}

/// Clean headers, map columns, coerce every field and sort the records by
/// officer name, then burst date with missing dates last.
pub fn normalize(table: &RawTable) -> (Vec<BurstRecord>, LoadReport) {
    let cleaned: Vec<String> = table.headers.iter().map(|h| clean_column_name(h)).collect();
    let mapping = map_columns(&cleaned);
    for field in CanonicalField::ALL {
        if mapping.column_for(field).is_none() {
            debug!("No column for {}; filling with nulls", field);
        }
    }

    let mut report = LoadReport {
        mapped_columns: mapping.mapped.clone(),
        dropped_columns: mapping.dropped.clone(),
        ambiguous_columns: mapping.ambiguous.clone(),
        ..LoadReport::default()
    };

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.iter().all(Cell::is_empty) {
            report.skipped_blank_rows += 1;
            continue;
        }
        let cell = |field: CanonicalField| mapping.column_for(field).and_then(|idx| row.get(idx));
        let text = |field: CanonicalField| {
            cell(field)
                .and_then(Cell::as_text)
                .unwrap_or_else(|| UNKNOWN.to_string())
        };

        let date_cell = cell(CanonicalField::BurstDate);
        let burst_date = date_cell.and_then(Cell::as_datetime);
        if burst_date.is_none() && date_cell.is_some_and(|c| !c.is_empty()) {
            report.unparsed_dates += 1;
        }

        records.push(BurstRecord {
            officer_name: text(CanonicalField::OfficerName),
            burst_date,
            pipe_size: text(CanonicalField::PipeSize),
            region: text(CanonicalField::Region),
            burst_location: text(CanonicalField::BurstLocation),
        });
    }
    report.total_rows = records.len();

    if report.unparsed_dates > 0 {
        debug!("{} burst dates could not be parsed", report.unparsed_dates);
    }
    sort_records(&mut records);
    (records, report)
}

/// Stable sort by officer name, then date ascending with `None` last.
pub fn sort_records(records: &mut [BurstRecord]) {
    records.sort_by(|a, b| {
        a.officer_name
            .cmp(&b.officer_name)
            .then_with(|| match (a.burst_date, b.burst_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });
}

/// Decode and normalize in one step.
pub fn load_and_clean(bytes: &[u8], extension: &str) -> Result<(Vec<BurstRecord>, LoadReport)> {
    let table = read_table(bytes, extension)?;
    info!(
        "Decoded {} columns and {} rows from .{} input",
        table.headers.len(),
        table.rows.len(),
        extension.trim_start_matches('.')
    );
    Ok(normalize(&table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable { headers: headers.iter().map(|h| h.to_string()).collect(), rows }
    }

    #[test]
    fn test_cell_as_text() {
        assert_eq!(Cell::Number(6.0).as_text(), Some("6".to_string()));
        assert_eq!(Cell::Number(6.5).as_text(), Some("6.5".to_string()));
        assert_eq!(text("  North ").as_text(), Some("North".to_string()));
        assert_eq!(text("   ").as_text(), None);
        assert_eq!(Cell::Empty.as_text(), None);
        assert_eq!(Cell::Number(f64::NAN).as_text(), None);
    }

    #[test]
    fn test_map_columns_drops_unmatched() {
        let cleaned: Vec<String> = ["fix_area", "tech", "officer_name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = map_columns(&cleaned);
        assert_eq!(mapping.column_for(CanonicalField::Region), Some(0));
        assert_eq!(mapping.column_for(CanonicalField::OfficerName), Some(2));
        assert_eq!(mapping.column_for(CanonicalField::BurstDate), None);
        assert_eq!(mapping.dropped, vec!["tech".to_string()]);
    }

    #[test]
    fn test_map_columns_first_match_wins() {
        let cleaned: Vec<String> = ["burst_date", "report_time"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = map_columns(&cleaned);
        assert_eq!(mapping.column_for(CanonicalField::BurstDate), Some(0));
        assert_eq!(
            mapping.ambiguous,
            vec![("report_time".to_string(), CanonicalField::BurstDate)]
        );
    }

    #[test]
    fn test_normalize_fills_missing_columns() {
        let t = table(&["Officer"], vec![vec![text("Alice")], vec![Cell::Empty]]);
        let (records, report) = normalize(&t);
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.skipped_blank_rows, 1);
        assert_eq!(records[0].officer_name, "Alice");
        assert_eq!(records[0].burst_date, None);
        assert_eq!(records[0].pipe_size, "Unknown");
        assert_eq!(records[0].region, "Unknown");
        assert_eq!(records[0].burst_location, "Unknown");
    }

    #[test]
    fn test_normalize_degrades_bad_dates() {
        let t = table(
            &["Officer", "Date", "Pipe Size"],
            vec![
                vec![text("Bob"), text("not a date"), Cell::Number(8.0)],
                vec![text("Bob"), Cell::Number(45296.0), Cell::Empty],
            ],
        );
        let (records, report) = normalize(&t);
        assert_eq!(report.unparsed_dates, 1);
        assert_eq!(
            records[0].burst_date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-01-05"
        );
        assert_eq!(records[0].pipe_size, "Unknown");
        assert_eq!(records[1].burst_date, None);
        assert_eq!(records[1].pipe_size, "8");
    }

    #[test]
    fn test_short_rows_are_tolerated() {
        let t = table(&["Officer", "Region"], vec![vec![text("Carol")]]);
        let (records, _) = normalize(&t);
        assert_eq!(records[0].region, "Unknown");
    }

    #[test]
    fn test_sort_nulls_last_and_stable() {
        let t = table(
            &["Officer", "Date", "Location"],
            vec![
                vec![text("Bob"), Cell::Empty, text("first-null")],
                vec![text("Alice"), text("2024-03-01"), text("a2")],
                vec![text("Bob"), text("2024-01-01"), text("b1")],
                vec![text("Bob"), Cell::Empty, text("second-null")],
                vec![text("Alice"), text("2024-01-01"), text("a1")],
            ],
        );
        let (records, _) = normalize(&t);
        let order: Vec<&str> = records.iter().map(|r| r.burst_location.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b1", "first-null", "second-null"]);
    }

    #[test]
    fn test_read_csv() {
        let csv = "Officer Name,Burst Date\nAlice,2024-01-05\nBob,\n";
        let t = read_table(csv.as_bytes(), "CSV").unwrap();
        assert_eq!(t.headers, vec!["Officer Name", "Burst Date"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1][1], Cell::Empty);
    }

    #[test]
    fn test_blank_header_does_not_claim_a_field() {
        let csv = ",Officer Name,Region\n1,Alice,North\n2,Bob,South\n";
        let (records, report) = load_and_clean(csv.as_bytes(), "csv").unwrap();
        assert_eq!(report.dropped_columns, vec!["column_0".to_string()]);
        assert!(report.ambiguous_columns.is_empty());
        let officers: Vec<&str> = records.iter().map(|r| r.officer_name.as_str()).collect();
        assert_eq!(officers, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_csv_invalid_utf8_degrades_the_field() {
        let csv = b"Officer Name,Region\nAlice,North\nBob,S\xE9o Paulo\n";
        let (records, report) = load_and_clean(csv, "csv").unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(records[1].officer_name, "Bob");
        assert_eq!(records[1].region, "S\u{FFFD}o Paulo");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_table(b"whatever", "pdf").unwrap_err();
        assert!(matches!(err, BurstError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[test]
    fn test_corrupt_workbook_is_fatal() {
        let err = read_table(b"definitely not a zip archive", ".xlsx").unwrap_err();
        assert!(matches!(err, BurstError::Parse(_)));
        assert!(err.to_string().starts_with("Could not parse input"));
    }
}
