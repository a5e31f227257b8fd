//! Spreadsheet adapter.
//!
//! The engine reads sources only through [`SpreadsheetAdapter`]: list the
//! sheets of a file, and read the rows of one sheet from a given offset.
//! [`WorkbookAdapter`] is the default implementation:
//!
//! - `.csv`, `.tsv`, `.txt`: delimited text with encoding and delimiter
//!   auto-detection, exposed as a single sheet named [`CSV_SHEET_NAME`]
//! - anything else: opened with calamine (xlsx, xlsm, xlsb, xls, ods)
//!
//! Cells come back as [`CellValue`]s. Empty cells are `Null`, trailing empty
//! cells are trimmed from every row, and workbook ranges are re-anchored to
//! A1 so row offsets count from the top of the sheet.

pub mod headers;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveTime};
use std::io::Cursor;

use crate::error::{SourceError, SourceResult};
use crate::models::{CellValue, SourceFile};

pub use headers::{column_letter, fallback_header, resolve_headers, DEFAULT_HEADER_SCAN_ROWS};

/// Sheet name exposed for delimited text files.
pub const CSV_SHEET_NAME: &str = "Sheet1";

/// Narrow read contract the engine depends on.
pub trait SpreadsheetAdapter: Send + Sync {
    /// Sheet names in workbook order.
    fn list_sheets(&self, file: &SourceFile) -> SourceResult<Vec<String>>;

    /// Rows of `sheet` starting at 0-based row `offset`.
    fn read_rows(
        &self,
        file: &SourceFile,
        sheet: &str,
        offset: usize,
    ) -> SourceResult<Vec<Vec<CellValue>>>;

    /// Only the row at `offset`. Implementations that can stop early should.
    fn read_header(
        &self,
        file: &SourceFile,
        sheet: &str,
        offset: usize,
    ) -> SourceResult<Vec<CellValue>> {
        Ok(self
            .read_rows(file, sheet, offset)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}

/// Default adapter: calamine for workbooks, `csv` for delimited text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookAdapter;

impl WorkbookAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SpreadsheetAdapter for WorkbookAdapter {
    fn list_sheets(&self, file: &SourceFile) -> SourceResult<Vec<String>> {
        if is_delimited(file) {
            return Ok(vec![CSV_SHEET_NAME.to_string()]);
        }

        let workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes()))
            .map_err(|e| SourceError::read(file.name(), e))?;
        Ok(workbook.sheet_names().to_vec())
    }

    fn read_rows(
        &self,
        file: &SourceFile,
        sheet: &str,
        offset: usize,
    ) -> SourceResult<Vec<Vec<CellValue>>> {
        if is_delimited(file) {
            return read_delimited(file, offset, None);
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes()))
            .map_err(|e| SourceError::read(file.name(), e))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| SourceError::read(file.name(), e))?;

        Ok(range_rows(&range, offset))
    }

    fn read_header(
        &self,
        file: &SourceFile,
        sheet: &str,
        offset: usize,
    ) -> SourceResult<Vec<CellValue>> {
        if is_delimited(file) {
            return Ok(read_delimited(file, offset, Some(1))?
                .into_iter()
                .next()
                .unwrap_or_default());
        }

        // calamine has no partial-range read, but only the header row is converted
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(file.bytes()))
            .map_err(|e| SourceError::read(file.name(), e))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| SourceError::read(file.name(), e))?;

        Ok(range_row(&range, offset))
    }
}

fn is_delimited(file: &SourceFile) -> bool {
    matches!(file.extension().as_deref(), Some("csv" | "tsv" | "txt"))
}

// =============================================================================
// Workbooks
// =============================================================================

/// Rows of a calamine range from absolute sheet row `offset`, re-anchored to A1.
fn range_rows(range: &Range<Data>, offset: usize) -> Vec<Vec<CellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let (start_row, start_col) = (start_row as usize, start_col as usize);

    let mut rows = Vec::new();
    // rows above the used range are empty but still occupy a position
    for _ in offset..start_row {
        rows.push(Vec::new());
    }

    let skip = offset.saturating_sub(start_row);
    for cells in range.rows().skip(skip) {
        let mut row: Vec<CellValue> = std::iter::repeat(CellValue::Null)
            .take(start_col)
            .chain(cells.iter().map(data_to_cell))
            .collect();
        trim_trailing_nulls(&mut row);
        rows.push(row);
    }

    rows
}

/// The single row at absolute sheet row `offset`, re-anchored to A1.
fn range_row(range: &Range<Data>, offset: usize) -> Vec<CellValue> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let Some(index) = offset.checked_sub(start_row as usize) else {
        return Vec::new();
    };
    let Some(cells) = range.rows().nth(index) else {
        return Vec::new();
    };

    let mut row: Vec<CellValue> = std::iter::repeat(CellValue::Null)
        .take(start_col as usize)
        .chain(cells.iter().map(data_to_cell))
        .collect();
    trim_trailing_nulls(&mut row);
    row
}

/// Convert a calamine cell.
fn data_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Text(excel_serial_to_string(dt.as_f64())),
        Data::DateTimeIso(s) => CellValue::text(s.as_str()),
        Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::Error(e) => CellValue::Text(format!("#ERR:{:?}", e)),
    }
}

/// Render an Excel serial date as ISO-8601 (`2024-01-31` or `2024-01-31T08:30:00`).
fn excel_serial_to_string(serial: f64) -> String {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0));
    let millis = (serial * 86_400_000.0).round() as i64;

    match epoch.and_then(|e| e.checked_add_signed(Duration::milliseconds(millis))) {
        Some(dt) if dt.time() == NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}

fn trim_trailing_nulls(row: &mut Vec<CellValue>) {
    while row.last().is_some_and(CellValue::is_null) {
        row.pop();
    }
}

// =============================================================================
// Delimited text
// =============================================================================

/// Read delimited text rows from `offset`, at most `limit` of them.
fn read_delimited(
    file: &SourceFile,
    offset: usize,
    limit: Option<usize>,
) -> SourceResult<Vec<Vec<CellValue>>> {
    let encoding = detect_encoding(file.bytes());
    let content = decode_content(file.bytes(), &encoding);
    let content = content.trim_start_matches('\u{feff}');

    let delimiter = match file.extension().as_deref() {
        Some("tsv") => '\t',
        _ => detect_delimiter(content),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| SourceError::read(file.name(), e))?;
        // 0-based line of the record start; the reader drops blank lines
        let line = record
            .position()
            .map_or(0, |p| p.line().saturating_sub(1) as usize);
        if line < offset {
            continue;
        }

        while offset + rows.len() < line {
            rows.push(Vec::new());
        }
        if limit.is_some_and(|l| rows.len() >= l) {
            break;
        }

        let mut row: Vec<CellValue> = record.iter().map(CellValue::from).collect();
        trim_trailing_nulls(&mut row);
        rows.push(row);
    }

    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok(rows)
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Lines inspected by [`detect_delimiter`]. Title rows above the header
/// usually hold no separator at all.
const DELIMITER_SAMPLE_LINES: usize = 10;

/// Detect the delimiter by counting occurrences in the first lines
pub fn detect_delimiter(content: &str) -> char {
    let sample: Vec<&str> = content.lines().take(DELIMITER_SAMPLE_LINES).collect();

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count: usize = sample.iter().map(|line| line.matches(sep).count()).sum();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::xlsx_file;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    #[test]
    fn test_csv_single_sheet() {
        let file = SourceFile::new("orders.csv", "a,b\n1,2\n");
        let sheets = WorkbookAdapter.list_sheets(&file).unwrap();
        assert_eq!(sheets, vec![CSV_SHEET_NAME]);
    }

    #[test]
    fn test_csv_rows_from_offset() {
        let file = SourceFile::new("orders.csv", "title\n\na,b\n1,2\n");
        let rows = WorkbookAdapter.read_rows(&file, CSV_SHEET_NAME, 2).unwrap();
        assert_eq!(rows[0], vec![text("a"), text("b")]);
        assert_eq!(rows[1], vec![text("1"), text("2")]);
    }

    #[test]
    fn test_csv_blank_lines_keep_position() {
        let file = SourceFile::new("orders.csv", "Amt\n1\n\nxyz\n");
        let rows = WorkbookAdapter.read_rows(&file, CSV_SHEET_NAME, 0).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows[2].is_empty());
        assert_eq!(rows[3], vec![text("xyz")]);

        // a blank line at the offset is a blank header, not the next line
        let file = SourceFile::new("orders.csv", "title\n\na,b\n");
        let header = WorkbookAdapter.read_header(&file, CSV_SHEET_NAME, 1).unwrap();
        assert!(header.is_empty());
    }

    #[test]
    fn test_csv_empty_cells_are_null() {
        let file = SourceFile::new("orders.csv", "a,b,c\n,2,\n");
        let rows = WorkbookAdapter.read_rows(&file, CSV_SHEET_NAME, 0).unwrap();
        // trailing empty cell trimmed, leading one kept as null
        assert_eq!(rows[1], vec![CellValue::Null, text("2")]);
    }

    #[test]
    fn test_csv_quoted_and_semicolon() {
        let file = SourceFile::new("orders.csv", "name;note\n\"Alice\";\"a;b\"\n");
        let rows = WorkbookAdapter.read_rows(&file, CSV_SHEET_NAME, 0).unwrap();
        assert_eq!(rows[1], vec![text("Alice"), text("a;b")]);
    }

    #[test]
    fn test_csv_bom_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"Date,Amt\n");
        let file = SourceFile::new("orders.csv", bytes);
        let header = WorkbookAdapter.read_header(&file, CSV_SHEET_NAME, 0).unwrap();
        assert_eq!(header, vec![text("Date"), text("Amt")]);
    }

    #[test]
    fn test_tsv_uses_tab() {
        let file = SourceFile::new("orders.tsv", "a,x\tb\n");
        let header = WorkbookAdapter.read_header(&file, CSV_SHEET_NAME, 0).unwrap();
        assert_eq!(header, vec![text("a,x"), text("b")]);
    }

    #[test]
    fn test_xlsx_sheets_and_rows() {
        let file = xlsx_file(
            "book.xlsx",
            &[
                ("Summary", vec![vec!["x"]]),
                ("Data", vec![vec!["Date", "Amt"], vec!["2024-01-01", "100"]]),
            ],
        );

        let sheets = WorkbookAdapter.list_sheets(&file).unwrap();
        assert_eq!(sheets, vec!["Summary", "Data"]);

        let rows = WorkbookAdapter.read_rows(&file, "Data", 0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![text("2024-01-01"), text("100")]);
    }

    #[test]
    fn test_xlsx_offset_counts_from_top() {
        let file = xlsx_file(
            "book.xlsx",
            &[("Data", vec![vec!["Report"], vec![], vec!["Name", "Qty"], vec!["a", "1"]])],
        );

        let header = WorkbookAdapter.read_header(&file, "Data", 2).unwrap();
        assert_eq!(header, vec![text("Name"), text("Qty")]);

        let rows = WorkbookAdapter.read_rows(&file, "Data", 2).unwrap();
        assert_eq!(header, rows[0]);
        assert!(WorkbookAdapter.read_header(&file, "Data", 9).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_workbook_is_read_error() {
        let file = SourceFile::new("broken.xlsx", vec![0u8, 1, 2, 3, 4, 5]);
        let err = WorkbookAdapter.list_sheets(&file).unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(excel_serial_to_string(45292.0), "2024-01-01");
        assert_eq!(excel_serial_to_string(45292.5), "2024-01-01T12:00:00");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
        assert_eq!(detect_delimiter("Title row\nName;Qty\na;1"), ';');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }
}
