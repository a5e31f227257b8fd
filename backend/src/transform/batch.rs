//! Batch orchestration.
//!
//! Tasks run one after the other in configured order. A task ending in
//! `error` never stops the batch.

use serde::Serialize;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::models::{BatchConfiguration, BatchTask, TaskStatus};
use crate::parser::SpreadsheetAdapter;

use super::task::run_task;
use super::{Definitions, RunOptions};

/// Final status tally of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    /// Tasks left pending (no file attached).
    pub skipped: usize,
}

impl BatchSummary {
    fn count(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Error => self.failed += 1,
            TaskStatus::Pending | TaskStatus::Processing => self.skipped += 1,
        }
    }
}

/// Run every task of `batch`, resetting previous results first.
///
/// `on_status` sees each task after every status change.
pub fn run_batch(
    batch: &mut BatchConfiguration,
    definitions: &dyn Definitions,
    adapter: &dyn SpreadsheetAdapter,
    options: &RunOptions,
    on_status: &mut dyn FnMut(&BatchTask),
) -> BatchSummary {
    log_info(format!("Batch '{}': {} task(s)", batch.name, batch.tasks.len()));

    for task in &mut batch.tasks {
        task.reset();
        on_status(task);
    }

    let mut summary = BatchSummary::default();
    for task in &mut batch.tasks {
        let status = run_task(task, definitions, adapter, options, on_status);
        summary.count(status);
    }

    if summary.failed > 0 {
        log_warning(format!(
            "Batch '{}': {} completed, {} failed, {} skipped",
            batch.name, summary.completed, summary.failed, summary.skipped
        ));
    } else {
        log_success(format!(
            "Batch '{}': {} completed, {} skipped",
            batch.name, summary.completed, summary.skipped
        ));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workspace;
    use crate::models::{
        ExportStrategy, FieldDefinition, FieldType, ProcessedData, Schema, SourceFile, Template,
    };
    use crate::parser::WorkbookAdapter;

    fn workspace() -> Workspace {
        let mut schema = Schema::new(
            "Invoices",
            vec![FieldDefinition::new("f-amount", "Amount", FieldType::Number)],
        );
        schema.id = "s1".into();
        let mut template = Template::new("Vendor", "s1").map("f-amount", "Amt");
        template.id = "t1".into();

        Workspace {
            schemas: vec![schema],
            templates: vec![template],
            batches: Vec::new(),
        }
    }

    fn batch(tasks: Vec<BatchTask>) -> BatchConfiguration {
        let mut batch = BatchConfiguration::new("January", ExportStrategy::Split);
        batch.tasks = tasks;
        batch
    }

    #[test]
    fn test_failed_task_does_not_stop_batch() {
        let mut batch = batch(vec![
            BatchTask::new("t1").with_files(vec![SourceFile::new("bad.xls", vec![1u8, 2, 3])]),
            BatchTask::new("t1").with_files(vec![SourceFile::new("good.csv", "Amt\n4\n")]),
            BatchTask::new("t1"),
        ]);

        let summary = run_batch(
            &mut batch,
            &workspace(),
            &WorkbookAdapter,
            &RunOptions::default(),
            &mut |_: &BatchTask| {},
        );

        assert_eq!(
            summary,
            BatchSummary {
                completed: 1,
                failed: 1,
                skipped: 1
            }
        );
        let statuses: Vec<_> = batch.tasks.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Error, TaskStatus::Completed, TaskStatus::Pending]
        );
    }

    #[test]
    fn test_previous_results_are_cleared() {
        let mut stale = BatchTask::new("t1");
        stale.status = TaskStatus::Completed;
        stale.results = Some(ProcessedData::default());
        let mut batch = batch(vec![stale]);

        run_batch(
            &mut batch,
            &workspace(),
            &WorkbookAdapter,
            &RunOptions::default(),
            &mut |_: &BatchTask| {},
        );

        assert_eq!(batch.tasks[0].status, TaskStatus::Pending);
        assert!(batch.tasks[0].results.is_none());
    }

    #[test]
    fn test_tasks_run_in_order() {
        let mut first = BatchTask::new("t1").with_files(vec![SourceFile::new("a.csv", "Amt\n1\n")]);
        first.id = "first".into();
        let mut second = BatchTask::new("t1").with_files(vec![SourceFile::new("b.csv", "Amt\n2\n")]);
        second.id = "second".into();
        let mut batch = batch(vec![first, second]);

        let mut processing = Vec::new();
        run_batch(
            &mut batch,
            &workspace(),
            &WorkbookAdapter,
            &RunOptions::default(),
            &mut |t: &BatchTask| {
                if t.status == TaskStatus::Processing {
                    processing.push(t.id.clone());
                }
            },
        );

        assert_eq!(processing, vec!["first", "second"]);
    }
}
