//! Consolidation of completed task outputs into output workbooks.
//!
//! Only tasks that are `completed` and produced at least one row take part.
//!
//! | Strategy  | Artifacts               | Tables per artifact |
//! |-----------|-------------------------|---------------------|
//! | `split`   | one per task            | one                 |
//! | `unified` | one for the whole batch | one per task        |
//!
//! Names fall back in this order:
//! - file: task custom file name, template export file name, template name
//!   (`split`); batch global file name, batch name (`unified`)
//! - sheet: task custom sheet name, batch global sheet name, template export
//!   sheet name, template name

pub mod xlsx;

pub use xlsx::{WorkbookWriter, XlsxWriter};

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::api::logs::log_info;
use crate::error::ExportResult;
use crate::models::{
    BatchConfiguration, BatchTask, CellValue, ExportStrategy, FileNamePosition, ProcessedData,
    TaskStatus, Template,
};
use crate::transform::Definitions;

/// Header of the provenance column.
pub const SOURCE_FILE_HEADER: &str = "Source File";

/// Longest sheet name a workbook accepts.
pub const MAX_SHEET_NAME_LEN: usize = 31;

static ILLEGAL_SHEET_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\[\]:*?/\\]").expect("static pattern"));

/// One named table: a header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// One workbook to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub file_name: String,
    pub tables: Vec<OutputTable>,
}

/// A written workbook.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Write into `dir`, creating it if needed. Returns the written path.
    pub fn write_to(&self, dir: &Path) -> ExportResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Make `name` acceptable as a sheet name.
///
/// Illegal characters become `_`, the result is cut to [`MAX_SHEET_NAME_LEN`]
/// characters, then surrounding whitespace and apostrophes are dropped.
/// Blank input gives `"Sheet"`.
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced = ILLEGAL_SHEET_CHARS.replace_all(name, "_");
    let cut: String = replaced.trim().chars().take(MAX_SHEET_NAME_LEN).collect();
    let trimmed = trim_sheet_edges(&cut);
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed.to_string()
}

/// Sheet names may not start or end with an apostrophe.
fn trim_sheet_edges(name: &str) -> &str {
    name.trim_matches(|c: char| c.is_whitespace() || c == '\'')
}

/// Add `" (2)"`, `" (3)"`... until `name` is not in `taken` (case-insensitive),
/// keeping the result within the sheet name limit.
fn unique_sheet_name(name: String, taken: &[String]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t.eq_ignore_ascii_case(candidate));
    if !is_taken(&name) {
        return name;
    }

    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let base: String = name
            .chars()
            .take(MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count()))
            .collect();
        let candidate = format!("{}{}", trim_sheet_edges(&base), suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Output file name with an `.xlsx` extension.
pub fn output_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect();
    let cleaned = if cleaned.is_empty() { "export".to_string() } else { cleaned };

    if cleaned.to_lowercase().ends_with(".xlsx") {
        cleaned
    } else {
        format!("{}.xlsx", cleaned)
    }
}

fn unique_file_name(name: String, taken: &[String]) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let stem = name.trim_end_matches(".xlsx").to_string();
    (2..)
        .map(|n| format!("{} ({}).xlsx", stem, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(name)
}

fn first_non_blank<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .unwrap_or("")
}

/// Table for one task's output.
///
/// Columns are the schema fields in order, plus [`SOURCE_FILE_HEADER`] at
/// the front or back when the template asks for it.
pub fn build_table(name: String, data: &ProcessedData, template: &Template) -> OutputTable {
    let mut headers: Vec<String> = data
        .rows
        .first()
        .map(|row| row.values.keys().map(str::to_string).collect())
        .unwrap_or_default();

    let provenance = template.include_file_name.then_some(template.file_name_position);
    match provenance {
        Some(FileNamePosition::Front) => headers.insert(0, SOURCE_FILE_HEADER.to_string()),
        Some(FileNamePosition::Back) => headers.push(SOURCE_FILE_HEADER.to_string()),
        None => {}
    }

    let rows = data
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<CellValue> = row.values.values().cloned().collect();
            match provenance {
                Some(FileNamePosition::Front) => cells.insert(0, CellValue::text(row.origin.as_str())),
                Some(FileNamePosition::Back) => cells.push(CellValue::text(row.origin.as_str())),
                None => {}
            }
            cells
        })
        .collect();

    OutputTable {
        name,
        headers,
        rows,
    }
}

/// Completed tasks with rows, paired with their template.
fn exportable<'a>(
    batch: &'a BatchConfiguration,
    definitions: &'a dyn Definitions,
) -> Vec<(&'a BatchTask, &'a Template, &'a ProcessedData)> {
    batch
        .tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .filter_map(|task| {
            let data = task.results.as_ref().filter(|d| !d.rows.is_empty())?;
            let template = definitions.template(&task.template_id)?;
            Some((task, template, data))
        })
        .collect()
}

fn sheet_name_for(task: &BatchTask, template: &Template, batch: &BatchConfiguration) -> String {
    sanitize_sheet_name(first_non_blank(&[
        task.custom_output_sheet_name.as_str(),
        batch.global_sheet_name.as_deref().unwrap_or(""),
        template.export_sheet_name.as_str(),
        template.name.as_str(),
    ]))
}

/// Group the outputs of `batch` into workbooks per its export strategy.
pub fn consolidate(batch: &BatchConfiguration, definitions: &dyn Definitions) -> Vec<OutputPlan> {
    let tasks = exportable(batch, definitions);

    match batch.export_strategy {
        ExportStrategy::Split => {
            let mut taken: Vec<String> = Vec::new();
            tasks
                .into_iter()
                .map(|(task, template, data)| {
                    let file_name = output_file_name(first_non_blank(&[
                        task.custom_output_file_name.as_str(),
                        template.export_file_name.as_str(),
                        template.name.as_str(),
                    ]));
                    let file_name = unique_file_name(file_name, &taken);
                    taken.push(file_name.clone());

                    OutputPlan {
                        file_name,
                        tables: vec![build_table(sheet_name_for(task, template, batch), data, template)],
                    }
                })
                .collect()
        }
        ExportStrategy::Unified => {
            if tasks.is_empty() {
                return Vec::new();
            }

            let mut taken: Vec<String> = Vec::new();
            let tables = tasks
                .into_iter()
                .map(|(task, template, data)| {
                    let name = unique_sheet_name(sheet_name_for(task, template, batch), &taken);
                    taken.push(name.clone());
                    build_table(name, data, template)
                })
                .collect();

            vec![OutputPlan {
                file_name: output_file_name(first_non_blank(&[
                    batch.global_file_name.as_deref().unwrap_or(""),
                    batch.name.as_str(),
                ])),
                tables,
            }]
        }
    }
}

/// Write every plan through `writer`.
pub fn write_plans(
    plans: &[OutputPlan],
    writer: &dyn WorkbookWriter,
) -> ExportResult<Vec<ExportArtifact>> {
    plans
        .iter()
        .map(|plan| {
            let bytes = writer.write_workbook(&plan.tables)?;
            log_info(format!(
                "{}: {} table(s), {} bytes",
                plan.file_name,
                plan.tables.len(),
                bytes.len()
            ));
            Ok(ExportArtifact {
                file_name: plan.file_name.clone(),
                bytes,
            })
        })
        .collect()
}
