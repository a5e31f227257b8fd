//! Mapping suggestions.
//!
//! A [`MappingSuggester`] proposes `fieldId -> sourceColumn` pairs for a
//! schema against the columns of a sample file. Suggestions are only a
//! starting point: [`apply_suggestions`] fills unmapped fields and drops
//! anything naming an unknown field or column, so an empty or garbage
//! answer leaves a template unchanged.

use std::collections::BTreeMap;

use crate::api::logs::log_info;
use crate::models::{FieldDefinition, Template};

/// Proposes field-to-column pairs.
pub trait MappingSuggester: Send + Sync {
    fn suggest(&self, fields: &[FieldDefinition], columns: &[String]) -> BTreeMap<String, String>;
}

/// Never suggests anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuggestions;

impl MappingSuggester for NoSuggestions {
    fn suggest(&self, _fields: &[FieldDefinition], _columns: &[String]) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Offline suggester matching field names against column names.
///
/// Names are compared uppercased with punctuation and spaces removed, so
/// `"Invoice Date"`, `"invoice_date"` and `"InvoiceDate"` match. A second
/// pass accepts a column that contains the field name (or the reverse) when
/// both are at least `min_partial_len` long. Each column is used once.
#[derive(Debug, Clone, Copy)]
pub struct HeaderMatchSuggester {
    pub min_partial_len: usize,
}

impl Default for HeaderMatchSuggester {
    fn default() -> Self {
        Self { min_partial_len: 4 }
    }
}

fn normalize(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

impl MappingSuggester for HeaderMatchSuggester {
    fn suggest(&self, fields: &[FieldDefinition], columns: &[String]) -> BTreeMap<String, String> {
        let normalized: Vec<String> = columns.iter().map(|c| normalize(c)).collect();
        let mut used = vec![false; columns.len()];
        let mut suggestions = BTreeMap::new();

        // exact
        for field in fields {
            let wanted = normalize(&field.name);
            if wanted.is_empty() {
                continue;
            }
            if let Some(i) = (0..columns.len()).find(|&i| !used[i] && normalized[i] == wanted) {
                used[i] = true;
                suggestions.insert(field.id.clone(), columns[i].clone());
            }
        }

        // partial
        for field in fields {
            if suggestions.contains_key(&field.id) {
                continue;
            }
            let wanted = normalize(&field.name);
            if wanted.len() < self.min_partial_len {
                continue;
            }
            let hit = (0..columns.len()).find(|&i| {
                !used[i]
                    && normalized[i].len() >= self.min_partial_len
                    && (normalized[i].contains(&wanted) || wanted.contains(&normalized[i]))
            });
            if let Some(i) = hit {
                used[i] = true;
                suggestions.insert(field.id.clone(), columns[i].clone());
            }
        }

        suggestions
    }
}

/// Fill the unmapped fields of `template` from `suggestions`.
///
/// Entries for unknown fields, unknown columns, or fields that already have
/// a mapping are ignored. Returns how many entries were applied.
pub fn apply_suggestions(
    template: &mut Template,
    fields: &[FieldDefinition],
    columns: &[String],
    suggestions: &BTreeMap<String, String>,
) -> usize {
    let mut applied = 0;

    for (field_id, column) in suggestions {
        let known_field = fields.iter().any(|f| &f.id == field_id);
        let known_column = columns.iter().any(|c| c == column);
        if !known_field || !known_column || template.mapped_column(field_id).is_some() {
            continue;
        }
        template.mapping.insert(field_id.clone(), column.clone());
        applied += 1;
    }

    if applied > 0 {
        log_info(format!("Template '{}': {} suggested mapping(s) applied", template.name, applied));
    }
    applied
}
