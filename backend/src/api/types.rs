//! REST API response types.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{Severity, ValidationError};
use crate::transform::pipeline::BatchReport;

/// Overall outcome shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every task completed without findings.
    Ready,
    /// Completed, but with data-quality findings or skipped tasks.
    Warning,
    /// At least one task failed.
    Error,
}

/// Response of `POST /api/batches/run`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBatchResponse {
    pub job_id: String,
    pub status: RunStatus,
    pub report: BatchReport,
    /// Download paths of the written workbooks, under `/exports`.
    pub downloads: Vec<String>,
}

impl RunBatchResponse {
    pub fn new(job_id: String, report: BatchReport) -> Self {
        let downloads = report
            .artifacts
            .iter()
            .map(|a| format!("/exports/{}/{}", job_id, a.file_name))
            .collect();
        Self {
            status: run_status(&report),
            job_id,
            report,
            downloads,
        }
    }
}

fn run_status(report: &BatchReport) -> RunStatus {
    if report.summary.failed > 0 {
        RunStatus::Error
    } else if report.summary.skipped > 0 || report.tasks.iter().any(|t| !t.errors.is_empty()) {
        RunStatus::Warning
    } else {
        RunStatus::Ready
    }
}

/// Response of `POST /api/templates/check`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCheckResponse {
    pub template_id: String,
    pub file_name: String,
    pub error_count: usize,
    pub warning_count: usize,
    pub findings: Vec<ValidationError>,
}

impl HeaderCheckResponse {
    pub fn new(template_id: String, file_name: String, findings: Vec<ValidationError>) -> Self {
        let error_count = findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count();
        Self {
            template_id,
            file_name,
            error_count,
            warning_count: findings.len() - error_count,
            findings,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, ExportStrategy, MISSING_EXPECTED_HEADER};
    use crate::transform::BatchSummary;
    use chrono::Utc;

    fn report(summary: BatchSummary) -> BatchReport {
        BatchReport {
            batch_id: "b1".into(),
            batch_name: "January".into(),
            export_strategy: ExportStrategy::Split,
            summary,
            tasks: Vec::new(),
            artifacts: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_status() {
        let ok = report(BatchSummary {
            completed: 2,
            ..BatchSummary::default()
        });
        assert_eq!(RunBatchResponse::new("j".into(), ok).status, RunStatus::Ready);

        let failed = report(BatchSummary {
            completed: 1,
            failed: 1,
            skipped: 0,
        });
        assert_eq!(RunBatchResponse::new("j".into(), failed).status, RunStatus::Error);

        let skipped = report(BatchSummary {
            skipped: 1,
            ..BatchSummary::default()
        });
        assert_eq!(RunBatchResponse::new("j".into(), skipped).status, RunStatus::Warning);
    }

    #[test]
    fn test_header_check_counts() {
        let findings = vec![
            ValidationError::error(1, "Amt", CellValue::from("Amt"), MISSING_EXPECTED_HEADER),
            ValidationError::warning(1, "Memo", CellValue::from("Memo"), MISSING_EXPECTED_HEADER),
            ValidationError::warning(1, "Ref", CellValue::from("Ref"), MISSING_EXPECTED_HEADER),
        ];
        let response = HeaderCheckResponse::new("t1".into(), "a.csv".into(), findings);

        assert_eq!(response.error_count, 1);
        assert_eq!(response.warning_count, 2);
    }

    #[test]
    fn test_error_response() {
        let body = error_response("No file provided");
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
    }
}
