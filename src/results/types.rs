// ABOUTME: User-facing comparison result shapes shared by polling, callbacks and sync responses
// ABOUTME: Table and schema results form one tagged union keyed by comparison_type

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn parse(raw: &str) -> Option<JobStatus> {
        let status = match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "submitted" | "created" => JobStatus::Pending,
            "running" | "in_progress" | "processing" | "started" => JobStatus::Running,
            "completed" | "complete" | "success" | "succeeded" | "done" => JobStatus::Completed,
            "failed" | "failure" | "error" | "cancelled" => JobStatus::Failed,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Table,
    Schema,
}

/// Where a finished result was served from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Cache,
    DurableStore,
    Sync,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "comparison_type", rename_all = "lowercase")]
pub enum ComparisonResult {
    Table(TableResult),
    Schema(SchemaResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Match,
    Differences,
    /// Some requested columns were not compared; never reported as a match.
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableResult {
    pub status: TableStatus,
    pub source_table: Option<String>,
    pub target_table: Option<String>,
    pub key_columns: Vec<String>,
    pub source_row_count: u64,
    pub target_row_count: u64,
    pub rows_matched: u64,
    pub rows_only_in_source: u64,
    pub rows_only_in_target: u64,
    pub rows_with_value_differences: u64,
    pub total_differences: u64,
    /// Percentage, 0 to 100.
    pub match_rate: f64,
    pub differences: Vec<RowDifference>,
    pub skipped_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    OnlyInSource,
    OnlyInTarget,
    ValueMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDifference {
    pub kind: DifferenceKind,
    pub key: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_row: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_row: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Extrapolation of the total difference count from a sampled scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingEstimate {
    pub sample_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_size: Option<u64>,
    pub method: String,
    pub confidence_level: f64,
    pub margin_of_error: f64,
    pub sampled_differences: u64,
    pub estimated_differences: f64,
    pub confidence_interval: ConfidenceInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDifference {
    pub column: String,
    pub source_type: String,
    pub target_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSchemaDiff {
    pub table: String,
    pub columns_only_in_source: Vec<ColumnDef>,
    pub columns_only_in_target: Vec<ColumnDef>,
    pub type_differences: Vec<TypeDifference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaResult {
    pub tables_only_in_source: Vec<String>,
    pub tables_only_in_target: Vec<String>,
    pub common_tables: Vec<String>,
    pub table_differences: Vec<TableSchemaDiff>,
}

/// A finished comparison as handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonOutcome {
    pub job_id: Option<String>,
    pub provenance: Provenance,
    pub result: ComparisonResult,
}

/// One observation of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Completed(ComparisonOutcome),
    Pending(JobStatus),
    Failed { message: String },
}
