//! High-level pipeline API: run a batch and consolidate its outputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetmill::config::Workspace;
//! use sheetmill::export::XlsxWriter;
//! use sheetmill::models::SourceFile;
//! use sheetmill::parser::WorkbookAdapter;
//! use sheetmill::transform::{process_batch, RunOptions};
//!
//! let workspace = Workspace::from_file("workspace.json".as_ref())?;
//! let mut batch = workspace.batch_by_id("january")?.clone();
//! batch.tasks[0].files.push(SourceFile::from_path("vendor_a.xlsx")?);
//!
//! let result = process_batch(&mut batch, &workspace, &WorkbookAdapter, &XlsxWriter, &RunOptions::default())?;
//! for artifact in &result.artifacts {
//!     artifact.write_to("exports".as_ref())?;
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::api::logs::{log_info, log_success};
use crate::error::PipelineResult;
use crate::export::{consolidate, write_plans, ExportArtifact, WorkbookWriter};
use crate::models::{
    BatchConfiguration, BatchTask, ExportStrategy, FieldStat, TaskStatus, ValidationError,
};
use crate::parser::SpreadsheetAdapter;

use super::batch::{run_batch, BatchSummary};
use super::{Definitions, RunOptions};

/// Review snapshot of one task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub task_id: String,
    pub template_id: String,
    pub status: TaskStatus,
    pub file_count: usize,
    pub row_count: usize,
    pub errors: Vec<ValidationError>,
    pub field_stats: BTreeMap<String, FieldStat>,
    /// Header pre-validation findings, if files were attached with checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<Vec<ValidationError>>,
}

impl From<&BatchTask> for TaskReport {
    fn from(task: &BatchTask) -> Self {
        let results = task.results.as_ref();
        Self {
            task_id: task.id.clone(),
            template_id: task.template_id.clone(),
            status: task.status,
            file_count: task.files.len(),
            row_count: results.map(|r| r.rows.len()).unwrap_or(0),
            errors: results.map(|r| r.errors.clone()).unwrap_or_default(),
            field_stats: results.map(|r| r.field_stats.clone()).unwrap_or_default(),
            validation_results: task.validation_results.clone(),
        }
    }
}

/// One produced workbook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReport {
    pub file_name: String,
    pub tables: Vec<String>,
    pub size: usize,
}

/// Review snapshot of a batch run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: String,
    pub batch_name: String,
    pub export_strategy: ExportStrategy,
    pub summary: BatchSummary,
    pub tasks: Vec<TaskReport>,
    pub artifacts: Vec<ArtifactReport>,
    pub generated_at: DateTime<Utc>,
}

/// Result of [`process_batch`].
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub report: BatchReport,
    pub artifacts: Vec<ExportArtifact>,
}

/// Run every task of `batch`, then consolidate completed outputs.
///
/// Task-level failures are inside the report. Only a workbook that cannot
/// be written fails the whole call.
pub fn process_batch(
    batch: &mut BatchConfiguration,
    definitions: &dyn Definitions,
    adapter: &dyn SpreadsheetAdapter,
    writer: &dyn WorkbookWriter,
    options: &RunOptions,
) -> PipelineResult<BatchResult> {
    log_info(format!("📖 Running batch '{}'...", batch.name));
    let summary = run_batch(batch, definitions, adapter, options, &mut |_: &BatchTask| {});

    log_info(format!("📦 Consolidating ({:?})...", batch.export_strategy));
    let plans = consolidate(batch, definitions);
    let artifacts = write_plans(&plans, writer)?;

    let report = BatchReport {
        batch_id: batch.id.clone(),
        batch_name: batch.name.clone(),
        export_strategy: batch.export_strategy,
        summary,
        tasks: batch.tasks.iter().map(TaskReport::from).collect(),
        artifacts: plans
            .iter()
            .zip(&artifacts)
            .map(|(plan, artifact)| ArtifactReport {
                file_name: artifact.file_name.clone(),
                tables: plan.tables.iter().map(|t| t.name.clone()).collect(),
                size: artifact.bytes.len(),
            })
            .collect(),
        generated_at: Utc::now(),
    };

    log_success(format!(
        "Batch '{}' done: {} artifact(s)",
        batch.name,
        artifacts.len()
    ));

    Ok(BatchResult { report, artifacts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workspace;
    use crate::export::XlsxWriter;
    use crate::models::SourceFile;
    use crate::parser::WorkbookAdapter;
    use calamine::{open_workbook_auto_from_rs, Reader};
    use std::io::Cursor;

    const BUNDLE: &str = r#"{
        "schemas": [{
            "id": "s1",
            "name": "Invoices",
            "fields": [
                { "id": "f1", "name": "InvoiceDate", "type": "date", "required": true },
                { "id": "f2", "name": "Amount", "type": "number", "required": true }
            ]
        }],
        "templates": [
            { "id": "ta", "name": "Vendor A", "schemaId": "s1", "mapping": { "f1": "Date", "f2": "Amt" } },
            {
                "id": "tb", "name": "Vendor B", "schemaId": "s1", "startRow": 1,
                "mapping": { "f1": "Invoice date", "f2": "Total" },
                "includeFileName": true, "fileNamePosition": "front"
            }
        ],
        "batches": [{
            "id": "b1",
            "name": "January",
            "tasks": [
                { "id": "task-a", "templateId": "ta", "customOutputSheetName": "From A" },
                { "id": "task-b", "templateId": "tb", "customOutputSheetName": "From B" }
            ]
        }]
    }"#;

    fn loaded(strategy: ExportStrategy) -> (Workspace, BatchConfiguration) {
        let workspace = Workspace::from_json(BUNDLE).unwrap();
        let mut batch = workspace.batch_by_id("b1").unwrap().clone();
        batch.export_strategy = strategy;
        batch.tasks[0].files = vec![SourceFile::new("a.csv", "Date,Amt\n2024-01-01,100\n,xyz\n")];
        batch.tasks[1].files = vec![SourceFile::new(
            "b.csv",
            "Vendor B export\nInvoice date;Total\n2024-01-03;7.5\n",
        )];
        (workspace, batch)
    }

    fn run(strategy: ExportStrategy) -> BatchResult {
        let (workspace, mut batch) = loaded(strategy);
        process_batch(
            &mut batch,
            &workspace,
            &WorkbookAdapter,
            &XlsxWriter,
            &RunOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_split_batch() {
        let result = run(ExportStrategy::Split);

        assert_eq!(result.report.summary.completed, 2);
        assert_eq!(result.artifacts.len(), 2);
        assert_eq!(result.report.artifacts[0].tables, vec!["From A"]);
        assert_eq!(result.report.artifacts[1].tables, vec!["From B"]);
    }

    #[test]
    fn test_unified_batch() {
        let result = run(ExportStrategy::Unified);

        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].file_name, "January.xlsx");

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(result.artifacts[0].bytes.as_slice())).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["From A", "From B"]);

        let range = workbook.worksheet_range("From B").unwrap();
        assert_eq!(range.get_size(), (2, 3));
    }

    #[test]
    fn test_report_carries_findings() {
        let result = run(ExportStrategy::Split);
        let task_a = &result.report.tasks[0];

        assert_eq!(task_a.status, TaskStatus::Completed);
        assert_eq!(task_a.row_count, 2);
        assert_eq!(task_a.errors.len(), 2);
        assert_eq!(task_a.field_stats["Amount"].mismatch_count, 1);

        let json = serde_json::to_value(&result.report).unwrap();
        assert_eq!(json["tasks"][0]["fieldStats"]["Amount"]["mismatchCount"], 1);
        assert_eq!(json["exportStrategy"], "split");
    }

    #[test]
    fn test_failed_task_is_left_out_of_export() {
        let (workspace, mut batch) = loaded(ExportStrategy::Unified);
        batch.tasks[1].files = vec![SourceFile::new("b.xlsx", b"garbage".to_vec())];

        let result = process_batch(
            &mut batch,
            &workspace,
            &WorkbookAdapter,
            &XlsxWriter,
            &RunOptions::default(),
        )
        .unwrap();

        assert_eq!(result.report.summary.failed, 1);
        assert_eq!(result.report.artifacts[0].tables, vec!["From A"]);
    }
}
