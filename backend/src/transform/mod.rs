//! Transformation module.
//!
//! This module turns attached source files into schema-shaped tables:
//! - Extractor: header resolution and data region of one sheet
//! - Task: one template over one task's files
//! - Batch: every task of a batch, in order
//! - Pipeline: batch run plus consolidation into output workbooks

pub mod batch;
pub mod extractor;
pub mod pipeline;
pub mod task;

pub use batch::{run_batch, BatchSummary};
pub use extractor::{extract, extract_with_template, resolve_sheet, ExtractedRow, Extraction};
pub use pipeline::{process_batch, BatchReport, BatchResult, TaskReport};
pub use task::{process_files, run_task, TaskOutput};

use crate::models::{Schema, Template};
use crate::parser::DEFAULT_HEADER_SCAN_ROWS;

/// Lookup of schemas and templates by id.
pub trait Definitions {
    fn schema(&self, id: &str) -> Option<&Schema>;
    fn template(&self, id: &str) -> Option<&Template>;
}

/// Knobs for a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Rows below the header inspected to size the column set.
    pub header_scan_rows: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
        }
    }
}
