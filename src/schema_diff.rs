// ABOUTME: Flattens a schema comparison into severity-tagged differences and a one-line summary
// ABOUTME: Anything missing on the target side is high impact; extra target objects are medium

use serde::Serialize;
use serde_json::Value;

use crate::error::{DiffError, Result};
use crate::results::{normalize_result, ComparisonResult, OperationKind, SchemaResult};

pub const IDENTICAL_SUMMARY: &str = "Schemas are identical.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceCategory {
    TableOnlyInSource,
    TableOnlyInTarget,
    ColumnOnlyInSource,
    ColumnOnlyInTarget,
    TypeMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDifference {
    pub kind: DifferenceCategory,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    pub impact: Impact,
}

impl SchemaDifference {
    fn new(kind: DifferenceCategory, table: &str) -> Self {
        let impact = match kind {
            DifferenceCategory::TableOnlyInSource
            | DifferenceCategory::ColumnOnlyInSource
            | DifferenceCategory::TypeMismatch => Impact::High,
            DifferenceCategory::TableOnlyInTarget | DifferenceCategory::ColumnOnlyInTarget => {
                Impact::Medium
            }
        };
        Self {
            kind,
            table: table.to_string(),
            column: None,
            source_type: None,
            target_type: None,
            impact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDiffSummary {
    pub differences: Vec<SchemaDifference>,
    pub tables_only_in_source: usize,
    pub tables_only_in_target: usize,
    pub column_differences: usize,
    pub type_differences: usize,
    pub total_differences: usize,
    pub summary: String,
}

impl SchemaDiffSummary {
    pub fn is_identical(&self) -> bool {
        self.total_differences == 0
    }

    pub fn high_impact(&self) -> impl Iterator<Item = &SchemaDifference> {
        self.differences.iter().filter(|d| d.impact == Impact::High)
    }
}

fn counted(count: usize, singular: &str, plural: &str) -> String {
    format!("{} {}", count, if count == 1 { singular } else { plural })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDiffSummarizer;

impl SchemaDiffSummarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(&self, result: &SchemaResult) -> SchemaDiffSummary {
        let mut differences = Vec::new();

        for table in &result.tables_only_in_source {
            differences.push(SchemaDifference::new(DifferenceCategory::TableOnlyInSource, table));
        }
        for table in &result.tables_only_in_target {
            differences.push(SchemaDifference::new(DifferenceCategory::TableOnlyInTarget, table));
        }

        let mut column_differences = 0;
        let mut type_differences = 0;
        for diff in &result.table_differences {
            for column in &diff.columns_only_in_source {
                differences.push(SchemaDifference {
                    column: Some(column.name.clone()),
                    source_type: column.data_type.clone(),
                    ..SchemaDifference::new(DifferenceCategory::ColumnOnlyInSource, &diff.table)
                });
                column_differences += 1;
            }
            for column in &diff.columns_only_in_target {
                differences.push(SchemaDifference {
                    column: Some(column.name.clone()),
                    target_type: column.data_type.clone(),
                    ..SchemaDifference::new(DifferenceCategory::ColumnOnlyInTarget, &diff.table)
                });
                column_differences += 1;
            }
            for mismatch in &diff.type_differences {
                differences.push(SchemaDifference {
                    column: Some(mismatch.column.clone()),
                    source_type: Some(mismatch.source_type.clone()),
                    target_type: Some(mismatch.target_type.clone()),
                    ..SchemaDifference::new(DifferenceCategory::TypeMismatch, &diff.table)
                });
                type_differences += 1;
            }
        }

        let tables_only_in_source = result.tables_only_in_source.len();
        let tables_only_in_target = result.tables_only_in_target.len();
        let total_differences =
            tables_only_in_source + tables_only_in_target + column_differences + type_differences;

        let summary = if total_differences == 0 {
            IDENTICAL_SUMMARY.to_string()
        } else {
            format!(
                "{}: {} only in source, {} only in target, {}, {}.",
                counted(total_differences, "schema difference", "schema differences"),
                counted(tables_only_in_source, "table", "tables"),
                counted(tables_only_in_target, "table", "tables"),
                counted(column_differences, "column difference", "column differences"),
                counted(type_differences, "type difference", "type differences"),
            )
        };

        SchemaDiffSummary {
            differences,
            tables_only_in_source,
            tables_only_in_target,
            column_differences,
            type_differences,
            total_differences,
            summary,
        }
    }

    /// Summarizes a raw backend schema tree, accepting the same shapes as
    /// result retrieval does.
    pub fn summarize_raw(&self, raw: &Value) -> Result<SchemaDiffSummary> {
        match normalize_result(raw, Some(OperationKind::Schema))? {
            ComparisonResult::Schema(schema) => Ok(self.summarize(&schema)),
            ComparisonResult::Table(_) => Err(DiffError::InvalidPayload(
                "expected a schema comparison result, got a table result".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{ColumnDef, TableSchemaDiff, TypeDifference};
    use serde_json::json;

    #[test]
    fn test_one_table_only_in_target() {
        let result = SchemaResult {
            tables_only_in_target: vec!["audit_log".into()],
            ..Default::default()
        };
        let summary = SchemaDiffSummarizer::new().summarize(&result);
        assert_eq!(summary.total_differences, 1);
        assert!(!summary.is_identical());
        assert_ne!(summary.summary, IDENTICAL_SUMMARY);
        assert_eq!(summary.differences[0].impact, Impact::Medium);
        assert_eq!(
            summary.summary,
            "1 schema difference: 0 tables only in source, 1 table only in target, 0 column differences, 0 type differences."
        );
    }

    #[test]
    fn test_identical_schemas() {
        let result = SchemaResult {
            common_tables: vec!["users".into()],
            ..Default::default()
        };
        let summary = SchemaDiffSummarizer::new().summarize(&result);
        assert!(summary.is_identical());
        assert_eq!(summary.summary, IDENTICAL_SUMMARY);
        assert!(summary.differences.is_empty());
    }

    #[test]
    fn test_severity_rules() {
        let result = SchemaResult {
            tables_only_in_source: vec!["legacy".into()],
            table_differences: vec![TableSchemaDiff {
                table: "orders".into(),
                columns_only_in_source: vec![ColumnDef {
                    name: "discount".into(),
                    data_type: Some("numeric".into()),
                }],
                columns_only_in_target: vec![ColumnDef {
                    name: "note".into(),
                    data_type: None,
                }],
                type_differences: vec![TypeDifference {
                    column: "amount".into(),
                    source_type: "numeric".into(),
                    target_type: "float8".into(),
                }],
            }],
            ..Default::default()
        };
        let summary = SchemaDiffSummarizer::new().summarize(&result);
        let impacts: Vec<(DifferenceCategory, Impact)> =
            summary.differences.iter().map(|d| (d.kind, d.impact)).collect();
        assert_eq!(
            impacts,
            vec![
                (DifferenceCategory::TableOnlyInSource, Impact::High),
                (DifferenceCategory::ColumnOnlyInSource, Impact::High),
                (DifferenceCategory::ColumnOnlyInTarget, Impact::Medium),
                (DifferenceCategory::TypeMismatch, Impact::High),
            ]
        );
        assert_eq!(summary.column_differences, 2);
        assert_eq!(summary.type_differences, 1);
        assert_eq!(summary.total_differences, 4);
        assert_eq!(summary.high_impact().count(), 3);
    }

    #[test]
    fn test_summarize_raw_tree() {
        let summary = SchemaDiffSummarizer::new()
            .summarize_raw(&json!({
                "source_only_tables": ["a", "b"],
                "table_differences": [{"table": "c", "type_changes": {"x": ["int", "text"]}}]
            }))
            .unwrap();
        assert_eq!(summary.tables_only_in_source, 2);
        assert_eq!(summary.type_differences, 1);
        assert_eq!(summary.differences[2].column.as_deref(), Some("x"));
    }

    #[test]
    fn test_summarize_raw_rejects_table_results() {
        let err = SchemaDiffSummarizer::new()
            .summarize_raw(&json!({"comparison_type": "table", "source_row_count": 4}))
            .unwrap_err();
        assert!(matches!(err, DiffError::InvalidPayload(_)));
    }

    #[test]
    fn test_unrecognized_tree_is_never_identical() {
        let result = SchemaDiffSummarizer::new()
            .summarize_raw(&json!({"catalog_delta": {"orders": "changed"}}));
        assert!(matches!(result, Err(DiffError::InvalidPayload(_))));
    }
}
