//! Validation for SheetMill.
//!
//! Three independent checks live here:
//!
//! - field validation ([`validate_value`], [`validate_cell`]): one schema
//!   field against one raw cell, producing the output value and at most
//!   one [`ValidationError`]
//! - header pre-validation ([`headers::check_headers`]): reads only the
//!   header row of a file and reports mapped or expected columns it lacks
//! - document validation ([`document`]): JSON Schema checks for
//!   configuration bundles
//!
//! # Field rules
//!
//! | Situation | Output value | Finding |
//! |-----------|--------------|---------|
//! | unmapped field | `null` | `required field missing` if required |
//! | required, blank cell | `null` | `required field missing` |
//! | `number`, cell parses | the number | none |
//! | `number`, cell does not parse | raw cell | `non-numeric value` |
//! | `string` / `date` / `boolean` | raw cell | none |
//!
//! `date` and `boolean` cells are not checked beyond presence.

pub mod document;
pub mod headers;

use crate::models::{
    CellValue, FieldDefinition, FieldType, Record, Template, ValidationError,
    NON_NUMERIC_VALUE, REQUIRED_FIELD_MISSING,
};

pub use document::{is_valid, validate, validate_workspace_document};
pub use headers::{capture_headers, check_headers};

/// Outcome of validating one field of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub value: CellValue,
    pub error: Option<ValidationError>,
}

/// 1-based sheet row of a data row, given its position in the extracted
/// slice and the template's header row.
pub fn report_row(index: usize, start_row: usize) -> usize {
    index + start_row + 2
}

/// Raw cell for a field: the mapped column's value, or `null` when the
/// field is unmapped or the column is absent from the row.
pub fn source_value(field: &FieldDefinition, template: &Template, record: &Record) -> CellValue {
    template
        .mapped_column(&field.id)
        .and_then(|column| record.get(column))
        .cloned()
        .unwrap_or(CellValue::Null)
}

/// Validate a field against an extracted source row.
pub fn validate_cell(
    field: &FieldDefinition,
    template: &Template,
    record: &Record,
    row: usize,
) -> FieldOutcome {
    validate_value(field, source_value(field, template, record), row)
}

/// Validate one raw value against one field.
pub fn validate_value(field: &FieldDefinition, raw: CellValue, row: usize) -> FieldOutcome {
    if raw.is_blank() {
        let error = field
            .required
            .then(|| ValidationError::error(row, &field.name, CellValue::Null, REQUIRED_FIELD_MISSING));
        return FieldOutcome {
            value: CellValue::Null,
            error,
        };
    }

    match field.field_type {
        FieldType::Number => match coerce_number(&raw) {
            Some(n) => FieldOutcome {
                value: CellValue::Number(n),
                error: None,
            },
            None => FieldOutcome {
                error: Some(ValidationError::error(
                    row,
                    &field.name,
                    raw.clone(),
                    NON_NUMERIC_VALUE,
                )),
                value: raw,
            },
        },
        // TODO: date/boolean format checks once accepted formats are agreed on
        FieldType::String | FieldType::Date | FieldType::Boolean => FieldOutcome {
            value: raw,
            error: None,
        },
    }
}

/// Numeric coercion: numeric cells as-is, text parsed after trimming.
/// Non-finite results (`NaN`, `inf`) do not count as numbers.
pub fn coerce_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) => Some(*n),
        CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        CellValue::Bool(_) | CellValue::Null => None,
    }
}
