//! Row extraction.
//!
//! Pulls the data region of one sheet out of one source file and keys every
//! row by the resolved header names.
//!
//! ```text
//!   sheet row 0    Report for January          ┐
//!   sheet row 1                                │ above start_row: ignored
//!   sheet row 2    Date     | Amt   |          ← start_row (header)
//!   sheet row 3    2024-01  | 100   | note     ← index 0 → { Date, Amt, Column C }
//!   sheet row 4    2024-02  |       |          ← index 1 → { Date, Amt: null, Column C: null }
//!   sheet row 5    ...                         ← end_row (exclusive), if set
//! ```

use crate::api::logs::log_warning;
use crate::error::{SourceError, SourceResult};
use crate::models::{CellValue, Record, SourceFile, Template};
use crate::parser::{resolve_headers, SpreadsheetAdapter};

/// One data row and its position in the extracted slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    /// 0-based position after the header row.
    pub index: usize,
    pub values: Record,
}

/// Result of extracting one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Sheet actually read (after fallback).
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<ExtractedRow>,
}

/// Pick the sheet to read: `wanted` if the file has it, else the first sheet.
///
/// Falling back is logged, not fatal. A file without any sheet is a
/// [`SourceError::SheetNotFound`].
pub fn resolve_sheet(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    wanted: &str,
) -> SourceResult<String> {
    let sheets = adapter.list_sheets(file)?;
    if sheets.iter().any(|s| s == wanted) {
        return Ok(wanted.to_string());
    }

    let first = sheets
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::SheetNotFound(file.name().to_string()))?;

    if !wanted.trim().is_empty() {
        log_warning(format!(
            "Sheet '{}' not found in {}, using '{}'",
            wanted,
            file.name(),
            first
        ));
    }
    Ok(first)
}

/// Extract the data region of `file`.
///
/// `start_row` is the 0-based header row. `end_row`, if set, is the 0-based
/// sheet row where data stops (exclusive). Rows whose cells are all blank
/// are skipped but keep their index, so reported row numbers still point at
/// the right sheet row.
pub fn extract(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    sheet_name: &str,
    start_row: usize,
    end_row: Option<usize>,
    scan_rows: usize,
) -> SourceResult<Extraction> {
    let sheet = resolve_sheet(adapter, file, sheet_name)?;
    let mut region = adapter.read_rows(file, &sheet, start_row)?;

    if let Some(end) = end_row {
        let data_rows = end.saturating_sub(start_row + 1);
        region.truncate(data_rows + 1);
    }

    let headers = resolve_headers(&region, scan_rows);

    let rows = region
        .iter()
        .skip(1)
        .enumerate()
        .filter(|(_, cells)| !cells.iter().all(CellValue::is_blank))
        .map(|(index, cells)| ExtractedRow {
            index,
            values: headers
                .iter()
                .enumerate()
                .map(|(col, key)| (key.clone(), cells.get(col).cloned().unwrap_or_default()))
                .collect(),
        })
        .collect();

    Ok(Extraction {
        sheet,
        headers,
        rows,
    })
}

/// [`extract`] with the template's sheet, header row and end row.
pub fn extract_with_template(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    template: &Template,
    scan_rows: usize,
) -> SourceResult<Extraction> {
    extract(
        adapter,
        file,
        &template.sheet_name,
        template.start_row,
        template.end_row,
        scan_rows,
    )
}
