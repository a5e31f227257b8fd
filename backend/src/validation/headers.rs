//! Header pre-validation.
//!
//! Cheap checks run when files are attached to a task, before any data is
//! extracted. Only the header row is read.

use crate::error::SourceResult;
use crate::models::{
    BatchTask, CellValue, SourceFile, Template, ValidationError, MISSING_EXPECTED_HEADER,
};
use crate::parser::{resolve_headers, SpreadsheetAdapter};
use crate::transform::extractor::resolve_sheet;

/// Compare a file's header row with a template.
///
/// - a mapped column absent from the header row is an `error`
/// - an `expectedHeaders` entry absent but not mapped is a `warning`
///
/// A file that cannot be opened yields a single `FILE_SYSTEM` entry.
pub fn check_headers(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    template: &Template,
) -> Vec<ValidationError> {
    let headers = match read_header_keys(adapter, file, &template.sheet_name, template.start_row) {
        Ok(headers) => headers,
        Err(e) => return vec![ValidationError::file_system(file.name(), e.to_string())],
    };

    let header_row = template.start_row + 1;
    let mut findings = Vec::new();

    let mut mapped: Vec<&str> = Vec::new();
    for column in template
        .mapping
        .keys()
        .filter_map(|field_id| template.mapped_column(field_id))
    {
        if !mapped.contains(&column) {
            mapped.push(column);
        }
    }

    for column in &mapped {
        if !headers.iter().any(|h| h == column) {
            findings.push(ValidationError::error(
                header_row,
                *column,
                CellValue::text(*column),
                MISSING_EXPECTED_HEADER,
            ));
        }
    }

    for expected in &template.expected_headers {
        let expected = expected.trim();
        if expected.is_empty() || mapped.contains(&expected) {
            continue;
        }
        if !headers.iter().any(|h| h == expected) {
            findings.push(ValidationError::warning(
                header_row,
                expected,
                CellValue::text(expected),
                MISSING_EXPECTED_HEADER,
            ));
        }
    }

    findings
}

/// Resolved column keys of a sample file, e.g. to refresh a template's
/// `expectedHeaders`. Inspects the header row plus the usual scan window.
pub fn capture_headers(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    sheet: &str,
    start_row: usize,
    scan_rows: usize,
) -> SourceResult<Vec<String>> {
    let sheet = resolve_sheet(adapter, file, sheet)?;
    let rows = adapter.read_rows(file, &sheet, start_row)?;
    let window = rows.len().min(scan_rows + 1);
    Ok(resolve_headers(&rows[..window], scan_rows))
}

fn read_header_keys(
    adapter: &dyn SpreadsheetAdapter,
    file: &SourceFile,
    sheet: &str,
    start_row: usize,
) -> SourceResult<Vec<String>> {
    let sheet = resolve_sheet(adapter, file, sheet)?;
    let header = adapter.read_header(file, &sheet, start_row)?;
    Ok(resolve_headers(&[header], 0))
}

impl BatchTask {
    /// Attach files and pre-validate their headers against `template`.
    ///
    /// Files are attached whatever the findings; the findings are kept in
    /// `validation_results` for review.
    pub fn attach_files(
        &mut self,
        files: Vec<SourceFile>,
        template: &Template,
        adapter: &dyn SpreadsheetAdapter,
    ) -> &[ValidationError] {
        let findings: Vec<ValidationError> = files
            .iter()
            .flat_map(|file| check_headers(adapter, file, template))
            .collect();

        self.files.extend(files);
        self.validation_results
            .get_or_insert_with(Vec::new)
            .extend(findings);
        self.validation_results.as_deref().unwrap_or_default()
    }
}
