//! In-memory workbook fixtures for unit tests.

use rust_xlsxwriter::Workbook;

use crate::models::SourceFile;

/// An `.xlsx` file with one worksheet per `(name, rows)` pair.
///
/// Cells are written as strings; empty strings are left unwritten.
pub fn xlsx_file(name: &str, sheets: &[(&str, Vec<Vec<&str>>)]) -> SourceFile {
    let mut workbook = Workbook::new();

    for (sheet_name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*sheet_name).unwrap();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    sheet.write_string(r as u32, c as u16, *cell).unwrap();
                }
            }
        }
    }

    SourceFile::new(name, workbook.save_to_buffer().unwrap())
}
