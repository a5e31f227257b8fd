//! # SheetMill - template-driven spreadsheet transformation and validation
//!
//! SheetMill maps heterogeneous spreadsheets (CSV, XLSX, XLS, ODS) onto
//! canonical schemas through saved templates, validates every cell, and
//! consolidates the results into output workbooks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Source file │────▶│  Extractor  │────▶│  Validator  │────▶│ Consolidate │
//! │ (csv, xlsx) │     │ (headers +  │     │ (per field, │     │ (split or   │
//! │             │     │  data rows) │     │  per row)   │     │  unified)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! A *schema* is the target table, a *template* maps one source layout onto
//! it, a *task* applies one template to a set of files, and a *batch* runs
//! its tasks in order and writes their outputs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetmill::config::Workspace;
//! use sheetmill::{process_batch, RunOptions, SourceFile, WorkbookAdapter, XlsxWriter};
//!
//! let workspace = Workspace::from_file("workspace.json".as_ref())?;
//! let mut batch = workspace.batch_by_id("january")?.clone();
//! batch.tasks[0].files.push(SourceFile::from_path("vendor_a.xlsx")?);
//!
//! let result = process_batch(&mut batch, &workspace, &WorkbookAdapter, &XlsxWriter, &RunOptions::default())?;
//! println!("{} workbook(s)", result.artifacts.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Schemas, templates, batches, cell values
//! - [`parser`] - Spreadsheet adapter and header resolution
//! - [`validation`] - Field validation, header pre-validation, config documents
//! - [`transform`] - Extraction, task runner, batch orchestration, pipeline
//! - [`export`] - Consolidation and workbook writing
//! - [`suggest`] - Mapping suggestions
//! - [`config`] - Environment settings and the workspace bundle
//! - [`api`] - HTTP API server and run log

// Core modules
pub mod error;
pub mod models;

// Reading
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Output
pub mod export;

// Configuration
pub mod config;
pub mod suggest;

// HTTP API
pub mod api;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ExportError, PipelineError, ServerError, SourceError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    BatchConfiguration, BatchTask, CellValue, ExportStrategy, FieldDefinition, FieldType,
    ProcessedData, Record, Schema, Severity, SourceFile, TaskStatus, Template, ValidationError,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use parser::{SpreadsheetAdapter, WorkbookAdapter};
pub use transform::{process_batch, run_batch, run_task, Definitions, RunOptions};
pub use export::{consolidate, WorkbookWriter, XlsxWriter};
pub use config::{Settings, Workspace};
