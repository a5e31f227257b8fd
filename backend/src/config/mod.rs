//! Configuration: environment settings and the workspace bundle.
//!
//! The workspace bundle is the persisted form of everything a user defines:
//! schemas, templates and batch configurations. It is plain camelCase JSON,
//! checked against `schemas/workspace.json` before decoding. Attached files,
//! statuses and results are never part of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{BatchConfiguration, Schema, Template};
use crate::parser::DEFAULT_HEADER_SCAN_ROWS;
use crate::transform::{Definitions, RunOptions};
use crate::validation::validate_workspace_document;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_OUTPUT_DIR: &str = "./exports";

/// Process settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `SHEETMILL_PORT`
    pub port: u16,
    /// `SHEETMILL_OUTPUT_DIR`
    pub output_dir: PathBuf,
    /// `SHEETMILL_HEADER_SCAN_ROWS`
    pub header_scan_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Unparseable values keep their
    /// default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "SHEETMILL_PORT").unwrap_or(defaults.port),
            output_dir: lookup("SHEETMILL_OUTPUT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            header_scan_rows: parsed(&lookup, "SHEETMILL_HEADER_SCAN_ROWS")
                .unwrap_or(defaults.header_scan_rows),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            header_scan_rows: self.header_scan_rows,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log_warning(format!("Ignoring {}={:?}: not a valid value", key, raw));
            None
        }
    }
}

/// Schemas, templates and batches as one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub schemas: Vec<Schema>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub batches: Vec<BatchConfiguration>,
}

impl Workspace {
    /// Parse and validate a workspace document.
    ///
    /// Dangling references (a template on an unknown schema, a task on an
    /// unknown template) are logged, not rejected: the affected task fails
    /// when it runs.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        validate_workspace_document(&value).map_err(ConfigError::Schema)?;
        let workspace: Workspace = serde_json::from_value(value)?;
        workspace.check_field_names()?;

        for problem in workspace.dangling_references() {
            log_warning(problem);
        }
        Ok(workspace)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn schema_by_id(&self, id: &str) -> ConfigResult<&Schema> {
        self.schemas
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| unknown("schema", id))
    }

    pub fn template_by_id(&self, id: &str) -> ConfigResult<&Template> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| unknown("template", id))
    }

    pub fn batch_by_id(&self, id: &str) -> ConfigResult<&BatchConfiguration> {
        self.batches
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| unknown("batch", id))
    }

    /// Template plus the schema it maps onto.
    pub fn template_with_schema(&self, template_id: &str) -> ConfigResult<(&Template, &Schema)> {
        let template = self.template_by_id(template_id)?;
        let schema = self.schema_by_id(&template.schema_id)?;
        Ok((template, schema))
    }

    /// Human-readable list of references that do not resolve.
    /// Fails on the first schema with two fields of the same name.
    pub fn check_field_names(&self) -> ConfigResult<()> {
        for schema in &self.schemas {
            if let Some(name) = schema.duplicate_field_names().first() {
                return Err(ConfigError::DuplicateFieldName {
                    schema: schema.id.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn dangling_references(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for template in &self.templates {
            if self.schema(&template.schema_id).is_none() {
                problems.push(format!(
                    "Template '{}' uses unknown schema '{}'",
                    template.id, template.schema_id
                ));
            }
        }
        for batch in &self.batches {
            for task in &batch.tasks {
                if self.template(&task.template_id).is_none() {
                    problems.push(format!(
                        "Task '{}' of batch '{}' uses unknown template '{}'",
                        task.id, batch.id, task.template_id
                    ));
                }
            }
        }

        problems
    }
}

fn unknown(kind: &'static str, id: &str) -> ConfigError {
    ConfigError::UnknownId {
        kind,
        id: id.to_string(),
    }
}

impl Definitions for Workspace {
    fn schema(&self, id: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.id == id)
    }

    fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExportStrategy, TaskStatus};
    use std::collections::HashMap;

    const BUNDLE: &str = r#"{
        "schemas": [{
            "id": "s1",
            "name": "Invoices",
            "fields": [
                { "id": "f1", "name": "InvoiceDate", "type": "date", "required": true },
                { "id": "f2", "name": "Amount", "type": "number", "required": true }
            ]
        }],
        "templates": [{
            "id": "t1",
            "name": "Vendor A",
            "schemaId": "s1",
            "sheetName": "Sheet1",
            "startRow": 0,
            "mapping": { "f1": "Date", "f2": "Amt" }
        }],
        "batches": [{
            "id": "b1",
            "name": "January",
            "exportStrategy": "unified",
            "tasks": [{ "id": "task-1", "templateId": "t1", "customOutputSheetName": "A" }]
        }]
    }"#;

    #[test]
    fn test_load_bundle() {
        let workspace = Workspace::from_json(BUNDLE).unwrap();

        let (template, schema) = workspace.template_with_schema("t1").unwrap();
        assert_eq!(template.mapped_column("f2"), Some("Amt"));
        assert_eq!(schema.fields.len(), 2);

        let batch = workspace.batch_by_id("b1").unwrap();
        assert_eq!(batch.export_strategy, ExportStrategy::Unified);
        assert_eq!(batch.tasks[0].status, TaskStatus::Pending);
        assert_eq!(batch.tasks[0].custom_output_sheet_name, "A");
        assert!(workspace.dangling_references().is_empty());
    }

    #[test]
    fn test_schema_violation() {
        let broken = BUNDLE.replace(r#""type": "number""#, r#""type": "money""#);
        let err = Workspace::from_json(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_duplicate_field_names_rejected() {
        let bundle = BUNDLE.replace("\"name\": \"InvoiceDate\"", "\"name\": \"Amount\"");
        let err = Workspace::from_json(&bundle).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateFieldName { ref schema, ref name } if schema == "s1" && name == "Amount"
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = Workspace::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_unknown_ids() {
        let workspace = Workspace::from_json(BUNDLE).unwrap();
        let err = workspace.template_by_id("nope").unwrap_err();
        assert_eq!(err.to_string(), "Unknown template: nope");
        assert!(workspace.batch_by_id("nope").is_err());
    }

    #[test]
    fn test_dangling_references_are_reported() {
        let dangling = BUNDLE.replace(r#""templateId": "t1""#, r#""templateId": "t9""#);
        let workspace = Workspace::from_json(&dangling).unwrap();
        let problems = workspace.dangling_references();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("t9"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workspace.json");

        let workspace = Workspace::from_json(BUNDLE).unwrap();
        workspace.save(&path).unwrap();
        let reloaded = Workspace::from_file(&path).unwrap();

        assert_eq!(reloaded.schemas, workspace.schemas);
        assert_eq!(reloaded.templates, workspace.templates);
        assert_eq!(reloaded.batches[0].tasks[0].id, "task-1");
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SHEETMILL_PORT", "8080"),
            ("SHEETMILL_HEADER_SCAN_ROWS", "many"),
        ]);
        let settings = Settings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.header_scan_rows, DEFAULT_HEADER_SCAN_ROWS);
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.run_options().header_scan_rows, DEFAULT_HEADER_SCAN_ROWS);
    }
}
