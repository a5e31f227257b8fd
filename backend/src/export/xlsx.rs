//! Workbook writer.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::OutputTable;
use crate::error::ExportResult;
use crate::models::CellValue;

/// Turns named tables into workbook bytes. Called once per output artifact.
pub trait WorkbookWriter: Send + Sync {
    fn write_workbook(&self, tables: &[OutputTable]) -> ExportResult<Vec<u8>>;
}

/// `.xlsx` writer backed by `rust_xlsxwriter`.
///
/// One worksheet per table, bold header row, nulls left as empty cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWriter;

impl WorkbookWriter for XlsxWriter {
    fn write_workbook(&self, tables: &[OutputTable]) -> ExportResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();

        for table in tables {
            let sheet = workbook.add_worksheet();
            sheet.set_name(&table.name)?;

            for (col, header) in table.headers.iter().enumerate() {
                sheet.write_string_with_format(0, column(col)?, header, &bold)?;
            }
            for (i, cells) in table.rows.iter().enumerate() {
                let row = u32::try_from(i + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
                for (col, cell) in cells.iter().enumerate() {
                    write_cell(sheet, row, column(col)?, cell)?;
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

fn column(index: usize) -> Result<u16, XlsxError> {
    u16::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue) -> Result<(), XlsxError> {
    match cell {
        CellValue::Null => {}
        CellValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        CellValue::Number(n) => {
            sheet.write_number(row, col, *n)?;
        }
        CellValue::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    #[test]
    fn test_cells_keep_their_type() {
        let table = OutputTable {
            name: "Invoices".into(),
            headers: vec!["Amount".into(), "Paid".into(), "Memo".into()],
            rows: vec![
                vec![CellValue::Number(42.0), CellValue::Bool(true), CellValue::from("late")],
                vec![CellValue::from("xyz"), CellValue::Null, CellValue::Null],
            ],
        };
        let bytes = XlsxWriter.write_workbook(&[table]).unwrap();

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range("Invoices").unwrap();

        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Amount".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(42.0)));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Bool(true)));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("xyz".into())));
        assert_eq!(range.get_value((2, 1)), Some(&Data::Empty));
    }

    #[test]
    fn test_illegal_sheet_name_is_rejected() {
        let table = OutputTable {
            name: "a/b".into(),
            headers: Vec::new(),
            rows: Vec::new(),
        };
        assert!(XlsxWriter.write_workbook(&[table]).is_err());
    }
}
