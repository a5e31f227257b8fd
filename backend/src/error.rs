//! Error types for the SheetMill engine.
//!
//! This module defines the hierarchy of *structural* errors:
//!
//! - [`SourceError`] - A source file could not be opened or has no sheet
//! - [`ConfigError`] - A configuration bundle is malformed or references unknown ids
//! - [`ExportError`] - An output workbook could not be produced
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Data-quality findings (a required cell is empty, a number does not parse)
//! are *not* errors in this sense. They are recorded as
//! [`crate::models::ValidationError`] values and never thrown.

use thiserror::Error;

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while opening a source spreadsheet.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The byte stream is not a readable spreadsheet.
    #[error("Cannot read '{file}' as a spreadsheet: {message}")]
    Read { file: String, message: String },

    /// The workbook exposes no sheet at all.
    #[error("No sheet available in '{0}'")]
    SheetNotFound(String),

    /// Failed to read the file from disk.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn read(file: impl Into<String>, message: impl ToString) -> Self {
        Self::Read {
            file: file.into(),
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading a configuration bundle.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document does not match the embedded configuration schema.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Schema(Vec<String>),

    /// JSON decoding failed.
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A schema, template or batch id is not defined.
    #[error("Unknown {kind}: {id}")]
    UnknownId { kind: &'static str, id: String },

    /// Two fields of one schema share a name.
    #[error("Schema '{schema}' has more than one field named '{name}'")]
    DuplicateFieldName { schema: String, name: String },

    /// IO error.
    #[error("Configuration IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing consolidated output.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The workbook writer rejected the content.
    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Returned by [`crate::transform::pipeline::process_batch`]. Per-file
/// structural failures never reach this type: the task runner turns them
/// into `FILE_SYSTEM` validation errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source error outside of a task run (pre-validation, header capture).
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Pipeline(err.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // SourceError -> PipelineError
        let source_err = SourceError::SheetNotFound("empty.xlsx".into());
        let pipeline_err: PipelineError = source_err.into();
        assert!(pipeline_err.to_string().contains("empty.xlsx"));

        // ConfigError -> ServerError
        let config_err = ConfigError::UnknownId {
            kind: "template",
            id: "tpl-9".into(),
        };
        let server_err: ServerError = config_err.into();
        assert!(server_err.to_string().contains("tpl-9"));
    }

    #[test]
    fn test_read_error_format() {
        let err = SourceError::read("invoices.xlsx", "invalid zip header");
        let msg = err.to_string();
        assert!(msg.contains("invoices.xlsx"));
        assert!(msg.contains("invalid zip header"));
    }

    #[test]
    fn test_schema_error_joins_messages() {
        let err = ConfigError::Schema(vec!["a is required".into(), "b must be a string".into()]);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: a is required; b must be a string"
        );
    }
}
