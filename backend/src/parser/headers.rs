//! Header resolution.
//!
//! Turns the header row of a data region into a stable list of column keys.
//! Blank header cells get a positional name (`"Column C"`) so that two files
//! with the same blank-header layout resolve to the same keys, and the key
//! list is widened to the longest data row so trailing columns under empty
//! header cells are never dropped.

use crate::models::CellValue;

/// Data rows inspected (after the header) when sizing the key list.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 100;

/// Spreadsheet column letters for a 0-based index (`0 -> A`, `26 -> AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Positional key used for a blank header cell.
pub fn fallback_header(index: usize) -> String {
    format!("Column {}", column_letter(index))
}

/// Resolve column keys for a region whose first row is the header row.
///
/// One key per column position up to the widest of the header row and the
/// next `scan_rows` data rows. Repeated names get a `_1`, `_2`... suffix in
/// column order.
pub fn resolve_headers(rows: &[Vec<CellValue>], scan_rows: usize) -> Vec<String> {
    let Some((header_row, data_rows)) = rows.split_first() else {
        return Vec::new();
    };

    let width = data_rows
        .iter()
        .take(scan_rows)
        .map(Vec::len)
        .chain(std::iter::once(header_row.len()))
        .max()
        .unwrap_or(0);

    let mut keys: Vec<String> = Vec::with_capacity(width);
    for index in 0..width {
        let base = header_row
            .get(index)
            .map(|cell| cell.to_string().trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_header(index));

        let mut key = base.clone();
        let mut suffix = 1;
        while keys.contains(&key) {
            key = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        keys.push(key);
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(2), "C");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_headers_are_trimmed() {
        let rows = vec![row(&["  Date ", "Amount"])];
        assert_eq!(resolve_headers(&rows, 10), vec!["Date", "Amount"]);
    }

    #[test]
    fn test_blank_header_fallback() {
        let rows = vec![row(&["A", "B", "", "D"]), row(&["1", "2", "3", "4"])];
        let headers = resolve_headers(&rows, 10);
        assert_eq!(headers[2], "Column C");
    }

    #[test]
    fn test_fallback_is_deterministic_across_files() {
        let first = vec![row(&["Name", "Qty", " "]), row(&["a", "1", "x"])];
        let second = vec![row(&["Name", "Qty", ""]), row(&["b", "2", "y"])];
        assert_eq!(resolve_headers(&first, 10), resolve_headers(&second, 10));
    }

    #[test]
    fn test_widened_by_data_rows() {
        let rows = vec![row(&["A", "B"]), row(&["1", "2", "3", "4"])];
        let headers = resolve_headers(&rows, 10);
        assert_eq!(headers, vec!["A", "B", "Column C", "Column D"]);
    }

    #[test]
    fn test_scan_limit() {
        let rows = vec![row(&["A"]), row(&["1"]), row(&["1", "2", "3"])];
        assert_eq!(resolve_headers(&rows, 1), vec!["A"]);
        assert_eq!(resolve_headers(&rows, 2).len(), 3);
    }

    #[test]
    fn test_numeric_header_cells() {
        let rows = vec![vec![CellValue::Number(2024.0), CellValue::Bool(true)]];
        assert_eq!(resolve_headers(&rows, 10), vec!["2024", "true"]);
    }

    #[test]
    fn test_duplicate_headers_suffixed() {
        let rows = vec![row(&["Amount", "Amount", "Amount"])];
        assert_eq!(
            resolve_headers(&rows, 10),
            vec!["Amount", "Amount_1", "Amount_2"]
        );
    }

    #[test]
    fn test_empty_region() {
        assert!(resolve_headers(&[], 10).is_empty());
    }
}
