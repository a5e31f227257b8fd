//! Transformation task runner.
//!
//! Runs one template over the files of one [`BatchTask`]:
//!
//! ```text
//! pending ──▶ processing ──┬──▶ completed   every file opened
//!                          ├──▶ error       at least one file could not be read
//!                          └──▶ pending     no file attached
//! ```
//!
//! Structural failures (unreadable file, no sheet, unknown template or
//! schema) become a single `FILE_SYSTEM` entry each and flip the task to
//! `error`. Field findings only feed the error list and `fieldStats`; they
//! never change the status.

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{
    BatchTask, CellValue, ProcessedData, ProcessedRow, Record, Schema, SourceFile, TaskStatus,
    Template, ValidationError, FILE_SYSTEM_FIELD,
};
use crate::parser::SpreadsheetAdapter;
use crate::validation::{report_row, validate_cell};

use super::extractor::extract_with_template;
use super::{Definitions, RunOptions};

/// Output of [`process_files`].
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub data: ProcessedData,
    /// Files that could not be read.
    pub failed_files: usize,
}

/// Extract and validate every file, in order.
///
/// Output rows follow file order, then in-file row order. Each row holds
/// one value per schema field, in schema order.
pub fn process_files(
    adapter: &dyn SpreadsheetAdapter,
    template: &Template,
    schema: &Schema,
    files: &[SourceFile],
    options: &RunOptions,
) -> TaskOutput {
    let mut data = ProcessedData::for_schema(schema);
    data.file_count = files.len();
    let mut failed_files = 0;

    for file in files {
        let extraction = match extract_with_template(adapter, file, template, options.header_scan_rows) {
            Ok(extraction) => extraction,
            Err(e) => {
                log_error(format!("{}: {}", file.name(), e));
                data.record_error(ValidationError::file_system(file.name(), e.to_string()));
                failed_files += 1;
                continue;
            }
        };

        let origin = format!("{}_{}", file.name(), extraction.sheet);
        let row_count = extraction.rows.len();

        for row in extraction.rows {
            let row_number = report_row(row.index, template.start_row);
            let mut values = Record::with_capacity(schema.fields.len());

            for field in &schema.fields {
                let outcome = validate_cell(field, template, &row.values, row_number);
                if let Some(error) = outcome.error {
                    data.record_error(error);
                }
                values.insert(field.name.clone(), outcome.value);
            }

            data.rows.push(ProcessedRow {
                origin: origin.clone(),
                values,
            });
        }

        log_success(format!("{}: {} rows from '{}'", file.name(), row_count, extraction.sheet));
    }

    TaskOutput { data, failed_files }
}

/// Run one task, updating its status and results in place.
///
/// `on_status` sees the task after every status change.
pub fn run_task(
    task: &mut BatchTask,
    definitions: &dyn Definitions,
    adapter: &dyn SpreadsheetAdapter,
    options: &RunOptions,
    on_status: &mut dyn FnMut(&BatchTask),
) -> TaskStatus {
    task.reset();

    let resolved = definitions
        .template(&task.template_id)
        .ok_or_else(|| format!("Template not found: {}", task.template_id))
        .and_then(|template| {
            definitions
                .schema(&template.schema_id)
                .map(|schema| (template, schema))
                .ok_or_else(|| format!("Schema not found: {}", template.schema_id))
        })
        .and_then(|(template, schema)| match schema.duplicate_field_names().first() {
            Some(name) => Err(format!(
                "Schema {} has more than one field named '{}'",
                schema.id, name
            )),
            None => Ok((template, schema)),
        });

    let (template, schema) = match resolved {
        Ok(pair) => pair,
        Err(message) => {
            log_error(format!("Task {}: {}", task.id, message));
            let mut data = ProcessedData {
                file_count: task.files.len(),
                ..ProcessedData::default()
            };
            data.record_error(ValidationError::error(
                0,
                FILE_SYSTEM_FIELD,
                CellValue::text(task.template_id.as_str()),
                message,
            ));
            task.results = Some(data);
            task.status = TaskStatus::Error;
            on_status(task);
            return task.status;
        }
    };

    task.status = TaskStatus::Processing;
    on_status(task);

    if task.files.is_empty() {
        log_warning(format!("Task {} ({}): no files attached", task.id, template.name));
        task.status = TaskStatus::Pending;
        on_status(task);
        return task.status;
    }

    log_info(format!(
        "Task {} ({} → {}): {} file(s)",
        task.id,
        template.name,
        schema.name,
        task.files.len()
    ));

    let output = process_files(adapter, template, schema, &task.files, options);

    task.status = if output.failed_files > 0 {
        log_warning(format!(
            "Task {}: {} of {} file(s) could not be read",
            task.id,
            output.failed_files,
            task.files.len()
        ));
        TaskStatus::Error
    } else {
        TaskStatus::Completed
    };
    log_info(format!(
        "Task {}: {} rows, {} finding(s)",
        task.id,
        output.data.rows.len(),
        output.data.errors.len()
    ));
    task.results = Some(output.data);
    on_status(task);

    task.status
}
