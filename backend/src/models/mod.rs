//! Domain models for the SheetMill engine.
//!
//! This module contains the data structures shared by every stage:
//!
//! - [`Schema`] / [`FieldDefinition`] - Canonical target tables ("data definitions")
//! - [`Template`] - Mapping from one spreadsheet layout onto one schema
//! - [`BatchConfiguration`] / [`BatchTask`] - Ordered template runs sharing an export strategy
//! - [`CellValue`] / [`Record`] - Typed cell values and ordered key/value rows
//! - [`ProcessedData`] / [`ValidationError`] - Task output and data-quality findings
//!
//! Configuration types serialize to plain camelCase JSON. Runtime state
//! (attached files, status, results) is skipped by serde, so a reloaded
//! batch always starts with every task `pending` and no results.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Field name used for structural (per-file) failures.
pub const FILE_SYSTEM_FIELD: &str = "FILE_SYSTEM";

/// Message for an empty required field.
pub const REQUIRED_FIELD_MISSING: &str = "required field missing";

/// Message for a `number` field whose cell does not parse.
pub const NON_NUMERIC_VALUE: &str = "non-numeric value";

/// Message for a header absent from a source file during pre-validation.
pub const MISSING_EXPECTED_HEADER: &str = "missing expected header";

// =============================================================================
// Cell values and records
// =============================================================================

/// A single spreadsheet cell, resolved once by the adapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Empty text collapses to `Null` so absent and empty cells look the same.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Null
        } else {
            CellValue::Text(value)
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// Ordered key/value row.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Serializes as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: CellValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// =============================================================================
// Schemas
// =============================================================================

/// Target type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Date,
    Boolean,
}

/// One column of a canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type,
            required: false,
            description: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A canonical target table ("data definition").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            fields,
            created_at: Utc::now(),
        }
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Field names used by more than one field. Output rows are keyed by
    /// name, so a schema is only runnable when this is empty.
    pub fn duplicate_field_names(&self) -> Vec<&str> {
        let mut duplicates: Vec<&str> = Vec::new();
        for (i, field) in self.fields.iter().enumerate() {
            let repeated = self.fields[..i].iter().any(|f| f.name == field.name);
            if repeated && !duplicates.contains(&field.name.as_str()) {
                duplicates.push(&field.name);
            }
        }
        duplicates
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Where the provenance column goes in exported rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNamePosition {
    Front,
    #[default]
    Back,
}

/// Saved mapping from one spreadsheet layout onto one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub schema_id: String,
    #[serde(default)]
    pub sheet_name: String,
    /// 0-based row of the header within the sheet.
    #[serde(default)]
    pub start_row: usize,
    /// 0-based sheet row where data stops (exclusive).
    #[serde(default)]
    pub end_row: Option<usize>,
    /// Field id -> source column name.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub expected_headers: Vec<String>,
    #[serde(default)]
    pub export_file_name: String,
    #[serde(default)]
    pub export_sheet_name: String,
    #[serde(default)]
    pub include_file_name: bool,
    #[serde(default)]
    pub file_name_position: FileNamePosition,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: impl Into<String>, schema_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            schema_id: schema_id.into(),
            sheet_name: String::new(),
            start_row: 0,
            end_row: None,
            mapping: BTreeMap::new(),
            expected_headers: Vec::new(),
            export_file_name: String::new(),
            export_sheet_name: String::new(),
            include_file_name: false,
            file_name_position: FileNamePosition::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn map(mut self, field_id: impl Into<String>, column: impl Into<String>) -> Self {
        self.mapping.insert(field_id.into(), column.into());
        self
    }

    /// Source column mapped to a field. Blank entries count as unmapped.
    pub fn mapped_column(&self, field_id: &str) -> Option<&str> {
        self.mapping
            .get(field_id)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }
}

// =============================================================================
// Source files
// =============================================================================

/// A readable byte stream plus its display name. Never persisted.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// Display name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// =============================================================================
// Validation results
// =============================================================================

/// Severity of a data-quality finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A data-quality finding, or a per-file structural failure when
/// `field == FILE_SYSTEM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// 1-based sheet row (0 for file-level entries).
    pub row: usize,
    pub field: String,
    pub value: CellValue,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn error(
        row: usize,
        field: impl Into<String>,
        value: CellValue,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row,
            field: field.into(),
            value,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(
        row: usize,
        field: impl Into<String>,
        value: CellValue,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(row, field, value, message)
        }
    }

    /// Structural failure for a whole file.
    pub fn file_system(file_name: &str, message: impl Into<String>) -> Self {
        Self::error(0, FILE_SYSTEM_FIELD, CellValue::text(file_name), message)
    }

    pub fn is_file_system(&self) -> bool {
        self.field == FILE_SYSTEM_FIELD
    }
}

/// Per-field error tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStat {
    pub mismatch_count: usize,
}

/// One output row: schema-ordered values plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRow {
    /// `"<sourceFileName>_<sourceSheetName>"`.
    pub origin: String,
    pub values: Record,
}

/// Output of one task run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedData {
    pub rows: Vec<ProcessedRow>,
    pub errors: Vec<ValidationError>,
    pub file_count: usize,
    pub field_stats: BTreeMap<String, FieldStat>,
}

impl ProcessedData {
    /// Empty output with a zeroed stat per schema field.
    pub fn for_schema(schema: &Schema) -> Self {
        Self {
            field_stats: schema
                .fields
                .iter()
                .map(|f| (f.name.clone(), FieldStat::default()))
                .collect(),
            ..Self::default()
        }
    }

    /// Record a finding, counting it against its field when the field is tracked.
    pub fn record_error(&mut self, error: ValidationError) {
        if let Some(stat) = self.field_stats.get_mut(&error.field) {
            stat.mismatch_count += 1;
        }
        self.errors.push(error);
    }

    pub fn mismatch_count(&self, field_name: &str) -> usize {
        self.field_stats
            .get(field_name)
            .map(|s| s.mismatch_count)
            .unwrap_or(0)
    }

    pub fn file_failures(&self) -> usize {
        self.errors.iter().filter(|e| e.is_file_system()).count()
    }
}

// =============================================================================
// Batches
// =============================================================================

/// Lifecycle of a batch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

/// How completed tasks are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// One artifact per task.
    #[default]
    Split,
    /// One artifact, one table per task.
    Unified,
}

/// One template applied to one set of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTask {
    pub id: String,
    pub template_id: String,
    #[serde(skip)]
    pub files: Vec<SourceFile>,
    #[serde(skip)]
    pub status: TaskStatus,
    #[serde(default)]
    pub custom_output_sheet_name: String,
    #[serde(default)]
    pub custom_output_file_name: String,
    #[serde(skip)]
    pub validation_results: Option<Vec<ValidationError>>,
    #[serde(skip)]
    pub results: Option<ProcessedData>,
}

impl BatchTask {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            files: Vec::new(),
            status: TaskStatus::Pending,
            custom_output_sheet_name: String::new(),
            custom_output_file_name: String::new(),
            validation_results: None,
            results: None,
        }
    }

    pub fn with_files(mut self, files: Vec<SourceFile>) -> Self {
        self.files = files;
        self
    }

    /// Drop run state so the task can be run again.
    pub fn reset(&mut self) {
        self.status = TaskStatus::Pending;
        self.results = None;
    }
}

/// An ordered collection of tasks sharing an export strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfiguration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<BatchTask>,
    #[serde(default)]
    pub export_strategy: ExportStrategy,
    #[serde(default)]
    pub global_file_name: Option<String>,
    #[serde(default)]
    pub global_sheet_name: Option<String>,
}

impl BatchConfiguration {
    pub fn new(name: impl Into<String>, export_strategy: ExportStrategy) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            tasks: Vec::new(),
            export_strategy,
            global_file_name: None,
            global_sheet_name: None,
        }
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut BatchTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_text_is_null() {
        assert_eq!(CellValue::from(""), CellValue::Null);
        assert_eq!(CellValue::from("x"), CellValue::Text("x".into()));
        assert!(CellValue::from("   ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_cell_value_json() {
        let record: Record = vec![
            ("b", CellValue::Number(42.0)),
            ("a", CellValue::Null),
            ("c", CellValue::from("x")),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({ "b": 42.0, "a": null, "c": "x" }));

        // insertion order is kept
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.starts_with(r#"{"b":"#));
    }

    #[test]
    fn test_record_insert_replaces() {
        let mut record = Record::new();
        record.insert("a", CellValue::from("1"));
        record.insert("b", CellValue::from("2"));
        record.insert("a", CellValue::from("3"));

        assert_eq!(record.len(), 2);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(&CellValue::from("3")));
    }

    #[test]
    fn test_number_display() {
        assert_eq!(CellValue::Number(42.0).to_string(), "42");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Null.to_string(), "");
    }

    #[test]
    fn test_mapped_column_ignores_blank() {
        let template = Template::new("t", "s")
            .map("f1", "Amount")
            .map("f2", "  ");
        assert_eq!(template.mapped_column("f1"), Some("Amount"));
        assert_eq!(template.mapped_column("f2"), None);
        assert_eq!(template.mapped_column("f3"), None);
    }

    #[test]
    fn test_reloaded_batch_drops_run_state() {
        let mut task = BatchTask::new("tpl-1").with_files(vec![SourceFile::new("a.csv", "x")]);
        task.status = TaskStatus::Completed;
        task.results = Some(ProcessedData::default());

        let mut batch = BatchConfiguration::new("monthly", ExportStrategy::Unified);
        batch.tasks.push(task);

        let json = serde_json::to_string(&batch).unwrap();
        assert!(!json.contains("results"));
        assert!(!json.contains("status"));

        let reloaded: BatchConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.tasks[0].status, TaskStatus::Pending);
        assert!(reloaded.tasks[0].files.is_empty());
        assert!(reloaded.tasks[0].results.is_none());
        assert_eq!(reloaded.export_strategy, ExportStrategy::Unified);
    }

    #[test]
    fn test_record_error_counts_known_fields_only() {
        let schema = Schema::new(
            "invoices",
            vec![FieldDefinition::new("f1", "Amount", FieldType::Number)],
        );
        let mut data = ProcessedData::for_schema(&schema);
        data.record_error(ValidationError::error(2, "Amount", CellValue::Null, NON_NUMERIC_VALUE));
        data.record_error(ValidationError::file_system("bad.xlsx", "unreadable"));

        assert_eq!(data.mismatch_count("Amount"), 1);
        assert_eq!(data.errors.len(), 2);
        assert_eq!(data.file_failures(), 1);
        assert!(!data.field_stats.contains_key(FILE_SYSTEM_FIELD));
    }

    #[test]
    fn test_schema_json_shape() {
        let schema: Schema = serde_json::from_value(json!({
            "id": "s1",
            "name": "Invoices",
            "fields": [
                { "id": "f1", "name": "InvoiceDate", "type": "date", "required": true },
                { "id": "f2", "name": "Amount", "type": "number" }
            ]
        }))
        .unwrap();

        assert_eq!(schema.fields[0].field_type, FieldType::Date);
        assert!(schema.fields[0].required);
        assert!(!schema.fields[1].required);
        assert_eq!(schema.field("f2").map(|f| f.name.as_str()), Some("Amount"));
    }
}
