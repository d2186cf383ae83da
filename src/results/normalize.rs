// ABOUTME: Turns raw backend result trees into the typed comparison result union
// ABOUTME: Tolerates the key spellings different backend versions emit

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::sampling::{self, SampleObservation};
use super::types::{
    ColumnDef, ComparisonResult, ConfidenceInterval, DifferenceKind, OperationKind, RowDifference,
    SamplingEstimate, SchemaResult, TableResult, TableSchemaDiff, TableStatus, TypeDifference,
};
use crate::error::{DiffError, Result};

const SCHEMA_MARKERS: &[&str] = &[
    "schema_diff",
    "tables_only_in_source",
    "tables_only_in_target",
    "source_only_tables",
    "target_only_tables",
    "table_differences",
];

/// Normalizes a raw result. The kind comes from `comparison_type` when
/// present, then from `hint`, then from the shape of the tree.
pub fn normalize_result(raw: &Value, hint: Option<OperationKind>) -> Result<ComparisonResult> {
    let parsed;
    let raw = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).map_err(|e| {
                DiffError::InvalidPayload(format!("result is a string but not JSON: {}", e))
            })?;
            &parsed
        }
        other => other,
    };
    let object = raw.as_object().ok_or_else(|| {
        DiffError::InvalidPayload(format!(
            "result must be an object, got {}",
            crate::connection::json_kind(raw)
        ))
    })?;

    let declared = object
        .get("comparison_type")
        .and_then(Value::as_str)
        .map(|kind| match kind.to_ascii_lowercase().as_str() {
            "schema" => Ok(OperationKind::Schema),
            "table" => Ok(OperationKind::Table),
            other => Err(DiffError::InvalidPayload(format!(
                "unknown comparison_type '{}'",
                other
            ))),
        })
        .transpose()?;

    let kind = declared.or(hint).unwrap_or_else(|| {
        if SCHEMA_MARKERS.iter().any(|key| object.contains_key(*key)) {
            OperationKind::Schema
        } else {
            OperationKind::Table
        }
    });

    Ok(match kind {
        OperationKind::Table => ComparisonResult::Table(normalize_table(object)?),
        OperationKind::Schema => ComparisonResult::Schema(normalize_schema(object)?),
    })
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

/// The root plus the nested blocks backends put counters in.
fn sections(raw: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    let mut out = vec![raw];
    for key in ["summary", "statistics", "stats", "config"] {
        if let Some(nested) = raw.get(key).and_then(Value::as_object) {
            out.push(nested);
        }
    }
    out
}

fn pick<'a>(sections: &[&'a Map<String, Value>], keys: &[&str]) -> Option<&'a Value> {
    sections
        .iter()
        .find_map(|section| keys.iter().find_map(|key| section.get(*key)))
        .filter(|value| !value.is_null())
}

fn pick_u64(sections: &[&Map<String, Value>], keys: &[&str]) -> Option<u64> {
    pick(sections, keys).and_then(as_u64)
}

fn pick_f64(sections: &[&Map<String, Value>], keys: &[&str]) -> Option<f64> {
    pick(sections, keys).and_then(as_f64)
}

fn pick_str(sections: &[&Map<String, Value>], keys: &[&str]) -> Option<String> {
    pick(sections, keys).and_then(Value::as_str).map(str::to_string)
}

fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => ["name", "table", "table_name", "column"]
            .iter()
            .find_map(|key| o.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(name_of).collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

const SOURCE_ROW_KEYS: &[&str] = &[
    "source_row_count",
    "total_source_rows",
    "source_rows",
    "table1_count",
    "rows_in_source",
];
const TARGET_ROW_KEYS: &[&str] = &[
    "target_row_count",
    "total_target_rows",
    "target_rows",
    "table2_count",
    "rows_in_target",
];
const ONLY_IN_SOURCE_KEYS: &[&str] = &["rows_only_in_source", "only_in_source", "exclusive_source", "missing_in_target"];
const ONLY_IN_TARGET_KEYS: &[&str] = &["rows_only_in_target", "only_in_target", "exclusive_target", "missing_in_source"];
const VALUE_DIFFERENCE_KEYS: &[&str] = &["rows_with_value_differences", "value_differences", "rows_different", "updated"];
const TOTAL_DIFFERENCE_KEYS: &[&str] = &["total_differences", "differences_count", "diff_count"];
const MATCHED_KEYS: &[&str] = &["rows_matched", "matched_rows", "identical_rows", "unchanged"];
const DIFFERENCE_LIST_KEYS: &[&str] = &["differences", "diff", "diffs", "sample_differences"];
const SKIPPED_KEYS: &[&str] = &["skipped_columns", "unsupported_columns", "columns_skipped", "excluded_columns"];
const COMPLETENESS_KEYS: &[&str] = &["complete", "incomplete"];
/// A fraction in [0, 1]; values above 1 come from backends that send percentages.
const FRACTION_RATE_KEYS: &[&str] = &["match_rate"];
/// Always a percentage, however small.
const PERCENT_RATE_KEYS: &[&str] = &["match_percentage", "match_rate_percent"];
const SAMPLING_KEYS: &[&str] = &["sampling", "sampling_info", "sampling_result", "sample_info"];

/// Keys that carry an actual comparison outcome. A table result with none of
/// them says nothing about the data and must not read as a match.
const TABLE_OUTCOME_KEYS: &[&[&str]] = &[
    SOURCE_ROW_KEYS,
    TARGET_ROW_KEYS,
    ONLY_IN_SOURCE_KEYS,
    ONLY_IN_TARGET_KEYS,
    VALUE_DIFFERENCE_KEYS,
    TOTAL_DIFFERENCE_KEYS,
    MATCHED_KEYS,
    DIFFERENCE_LIST_KEYS,
    SKIPPED_KEYS,
    COMPLETENESS_KEYS,
    FRACTION_RATE_KEYS,
    PERCENT_RATE_KEYS,
];

fn normalize_table(raw: &Map<String, Value>) -> Result<TableResult> {
    let sections = sections(raw);
    let has_outcome = TABLE_OUTCOME_KEYS
        .iter()
        .any(|keys| pick(&sections, keys).is_some())
        || SAMPLING_KEYS.iter().any(|key| raw.get(*key).map_or(false, Value::is_object));
    if !has_outcome {
        return Err(DiffError::InvalidPayload(format!(
            "table result carries no row counts or differences (keys: {})",
            raw.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }

    let key_columns = string_list(pick(&sections, &["key_columns", "primary_keys"]));
    let columns = string_list(pick(&sections, &["columns", "column_names"]));
    let differences = pick(&sections, DIFFERENCE_LIST_KEYS)
        .map(|value| parse_differences(value, &key_columns, &columns))
        .unwrap_or_default();

    let count = |kind: DifferenceKind| differences.iter().filter(|d| d.kind == kind).count() as u64;

    let source_row_count = pick_u64(&sections, SOURCE_ROW_KEYS).unwrap_or(0);
    let target_row_count = pick_u64(&sections, TARGET_ROW_KEYS).unwrap_or(0);
    let rows_only_in_source = pick_u64(&sections, ONLY_IN_SOURCE_KEYS)
        .unwrap_or_else(|| count(DifferenceKind::OnlyInSource));
    let rows_only_in_target = pick_u64(&sections, ONLY_IN_TARGET_KEYS)
        .unwrap_or_else(|| count(DifferenceKind::OnlyInTarget));
    let rows_with_value_differences = pick_u64(&sections, VALUE_DIFFERENCE_KEYS)
        .unwrap_or_else(|| count(DifferenceKind::ValueMismatch));
    let total_differences = pick_u64(&sections, TOTAL_DIFFERENCE_KEYS).unwrap_or_else(|| {
        rows_only_in_source
            .saturating_add(rows_only_in_target)
            .saturating_add(rows_with_value_differences)
    });
    let rows_matched = pick_u64(&sections, MATCHED_KEYS).unwrap_or_else(|| {
        source_row_count.saturating_sub(rows_only_in_source.saturating_add(rows_with_value_differences))
    });

    let match_rate = match (
        pick_f64(&sections, PERCENT_RATE_KEYS),
        pick_f64(&sections, FRACTION_RATE_KEYS),
    ) {
        (Some(percent), _) => percent.clamp(0.0, 100.0),
        (None, Some(rate)) if rate <= 1.0 => rate.max(0.0) * 100.0,
        (None, Some(rate)) => rate.min(100.0),
        (None, None) => {
            let denominator = source_row_count.max(target_row_count);
            if denominator == 0 {
                if total_differences == 0 { 100.0 } else { 0.0 }
            } else {
                rows_matched as f64 / denominator as f64 * 100.0
            }
        }
    };

    let skipped_columns = string_list(pick(&sections, SKIPPED_KEYS));
    let flagged_incomplete = pick(&sections, &["complete"]).and_then(Value::as_bool) == Some(false)
        || pick(&sections, &["incomplete"]).and_then(Value::as_bool) == Some(true);

    let sampling = parse_sampling(raw, source_row_count, differences.len() as u64);

    let status = if flagged_incomplete || !skipped_columns.is_empty() {
        TableStatus::Incomplete
    } else if total_differences > 0
        || sampling
            .as_ref()
            .map(|s| s.sampled_differences > 0)
            .unwrap_or(false)
    {
        TableStatus::Differences
    } else {
        TableStatus::Match
    };

    Ok(TableResult {
        status,
        source_table: pick_str(&sections, &["source_table", "table1"]),
        target_table: pick_str(&sections, &["target_table", "table2"]),
        key_columns,
        source_row_count,
        target_row_count,
        rows_matched,
        rows_only_in_source,
        rows_only_in_target,
        rows_with_value_differences,
        total_differences,
        match_rate,
        differences,
        skipped_columns,
        sampling,
        duration_seconds: pick_f64(
            &sections,
            &["duration_seconds", "duration", "execution_time", "elapsed_seconds"],
        ),
    })
}

enum Side {
    Source,
    Target,
    Mismatch,
}

fn side_of(tag: &str) -> Option<Side> {
    match tag.trim().to_ascii_lowercase().as_str() {
        "-" | "source_only" | "only_in_source" | "missing_in_target" | "deleted" | "removed" => {
            Some(Side::Source)
        }
        "+" | "target_only" | "only_in_target" | "missing_in_source" | "added" | "inserted" => {
            Some(Side::Target)
        }
        "changed" | "value_mismatch" | "modified" | "updated" | "different" | "mismatch" => {
            Some(Side::Mismatch)
        }
        _ => None,
    }
}

fn key_of(row: &Value, key_columns: &[String]) -> Value {
    let width = key_columns.len().max(1);
    match row {
        Value::Array(values) if width == 1 => values.first().cloned().unwrap_or(Value::Null),
        Value::Array(values) => Value::Array(values.iter().take(width).cloned().collect()),
        Value::Object(fields) => {
            let keyed: Vec<Value> = key_columns
                .iter()
                .filter_map(|k| fields.get(k).cloned())
                .collect();
            match keyed.len() {
                0 => Value::Null,
                1 => keyed.into_iter().next().unwrap_or(Value::Null),
                _ => Value::Array(keyed),
            }
        }
        _ => Value::Null,
    }
}

fn changed_columns(source: &Value, target: &Value, columns: &[String]) -> Vec<String> {
    match (source, target) {
        (Value::Array(a), Value::Array(b)) => (0..a.len().max(b.len()))
            .filter(|i| a.get(*i) != b.get(*i))
            .map(|i| columns.get(i).cloned().unwrap_or_else(|| format!("column_{}", i)))
            .collect(),
        (Value::Object(a), Value::Object(b)) => {
            let mut names: Vec<String> = a
                .keys()
                .chain(b.keys().filter(|k| !a.contains_key(*k)))
                .filter(|k| a.get(*k) != b.get(*k))
                .cloned()
                .collect();
            names.dedup();
            names
        }
        _ => Vec::new(),
    }
}

/// Parses raw row differences. Side-only rows sharing a key collapse into one
/// value mismatch.
fn parse_differences(value: &Value, key_columns: &[String], columns: &[String]) -> Vec<RowDifference> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    let mut out: Vec<RowDifference> = Vec::new();
    let mut pending: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let (side, row, key, source_row, target_row, changed) = match entry {
            Value::Array(pair) if pair.len() == 2 && pair[0].is_string() => {
                let Some(side) = pair[0].as_str().and_then(side_of) else {
                    continue;
                };
                (side, Some(pair[1].clone()), None, None, None, Vec::new())
            }
            Value::Object(fields) => {
                let tag = ["kind", "type", "sign", "side", "diff_type"]
                    .iter()
                    .find_map(|k| fields.get(*k).and_then(Value::as_str));
                let source_row = ["source_row", "source", "source_values"]
                    .iter()
                    .find_map(|k| fields.get(*k).cloned());
                let target_row = ["target_row", "target", "target_values"]
                    .iter()
                    .find_map(|k| fields.get(*k).cloned());
                let side = match tag.and_then(side_of) {
                    Some(side) => side,
                    None if source_row.is_some() && target_row.is_some() => Side::Mismatch,
                    None => continue,
                };
                let row = ["row", "values", "data"].iter().find_map(|k| fields.get(*k).cloned());
                let key = ["key", "primary_key", "pk"].iter().find_map(|k| fields.get(*k).cloned());
                let changed = string_list(fields.get("changed_columns"));
                (side, row, key, source_row, target_row, changed)
            }
            _ => continue,
        };

        let row_for_key = row.as_ref().or(source_row.as_ref()).or(target_row.as_ref());
        let key = key.unwrap_or_else(|| {
            row_for_key
                .map(|r| key_of(r, key_columns))
                .unwrap_or(Value::Null)
        });

        match side {
            Side::Mismatch => {
                let changed = if changed.is_empty() {
                    match (&source_row, &target_row) {
                        (Some(s), Some(t)) => changed_columns(s, t, columns),
                        _ => Vec::new(),
                    }
                } else {
                    changed
                };
                out.push(RowDifference {
                    kind: DifferenceKind::ValueMismatch,
                    key,
                    source_row,
                    target_row,
                    changed_columns: changed,
                });
            }
            Side::Source | Side::Target => {
                let is_source = matches!(side, Side::Source);
                let row = row.or(if is_source { source_row } else { target_row });
                let lookup = if key.is_null() { None } else { Some(key.to_string()) };

                if let Some(index) = lookup.as_ref().and_then(|k| pending.get(k).copied()) {
                    let existing = &mut out[index];
                    let opposite = if is_source {
                        existing.kind == DifferenceKind::OnlyInTarget
                    } else {
                        existing.kind == DifferenceKind::OnlyInSource
                    };
                    if opposite {
                        if is_source {
                            existing.source_row = row;
                        } else {
                            existing.target_row = row;
                        }
                        existing.kind = DifferenceKind::ValueMismatch;
                        if let (Some(s), Some(t)) = (&existing.source_row, &existing.target_row) {
                            existing.changed_columns = changed_columns(s, t, columns);
                        }
                        if let Some(k) = &lookup {
                            pending.remove(k);
                        }
                        continue;
                    }
                }

                let (kind, source_row, target_row) = if is_source {
                    (DifferenceKind::OnlyInSource, row, None)
                } else {
                    (DifferenceKind::OnlyInTarget, None, row)
                };
                if let Some(k) = lookup {
                    pending.insert(k, out.len());
                }
                out.push(RowDifference {
                    kind,
                    key,
                    source_row,
                    target_row,
                    changed_columns: Vec::new(),
                });
            }
        }
    }
    out
}

fn parse_interval(value: &Value) -> Option<ConfidenceInterval> {
    match value {
        Value::Array(bounds) if bounds.len() == 2 => Some(ConfidenceInterval {
            lower: as_f64(&bounds[0])?,
            upper: as_f64(&bounds[1])?,
        }),
        Value::Object(bounds) => Some(ConfidenceInterval {
            lower: bounds.get("lower").or_else(|| bounds.get("low")).and_then(as_f64)?,
            upper: bounds.get("upper").or_else(|| bounds.get("high")).and_then(as_f64)?,
        }),
        _ => None,
    }
}

fn parse_sampling(raw: &Map<String, Value>, source_rows: u64, listed_differences: u64) -> Option<SamplingEstimate> {
    let block = SAMPLING_KEYS
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_object))?;
    if block.get("enabled").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let sections = [block];
    let sample_size = pick_u64(&sections, &["sample_size", "sampled_rows", "rows_sampled"])?;
    let population_size = pick_u64(&sections, &["population_size", "total_rows"])
        .or(Some(source_rows).filter(|rows| *rows > 0));

    let observation = SampleObservation {
        sample_size,
        sampled_differences: pick_u64(
            &sections,
            &["sampled_differences", "differences_in_sample", "sample_differences", "differences_found"],
        )
        .unwrap_or(listed_differences),
        population_size,
        method: pick_str(&sections, &["method", "sampling_method"]).unwrap_or_else(|| "unknown".to_string()),
        confidence_level: pick_f64(&sections, &["confidence_level"]).unwrap_or(0.95),
        reported_estimate: pick_f64(
            &sections,
            &["estimated_differences", "estimated_total_differences", "extrapolated_differences"],
        ),
        reported_margin: pick_f64(&sections, &["margin_of_error"]),
    };

    let mut estimate = sampling::estimate(&observation);
    if let Some(interval) = block.get("confidence_interval").and_then(parse_interval) {
        estimate.confidence_interval = interval;
    }
    Some(estimate)
}

fn column_defs(value: Option<&Value>) -> Vec<ColumnDef> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let name = name_of(item)?;
                let data_type = item
                    .as_object()
                    .and_then(|o| ["type", "data_type"].iter().find_map(|k| o.get(*k)))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some(ColumnDef { name, data_type })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, data_type)| ColumnDef {
                name: name.clone(),
                data_type: data_type.as_str().map(str::to_string),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn type_pair(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Array(pair) if pair.len() == 2 => Some((
            pair[0].as_str()?.to_string(),
            pair[1].as_str()?.to_string(),
        )),
        Value::Object(o) => Some((
            ["source_type", "source"].iter().find_map(|k| o.get(*k))?.as_str()?.to_string(),
            ["target_type", "target"].iter().find_map(|k| o.get(*k))?.as_str()?.to_string(),
        )),
        _ => None,
    }
}

fn type_differences(value: Option<&Value>) -> Vec<TypeDifference> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let column = name_of(item)?;
                let (source_type, target_type) = type_pair(item)?;
                Some(TypeDifference {
                    column,
                    source_type,
                    target_type,
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(column, pair)| {
                let (source_type, target_type) = type_pair(pair)?;
                Some(TypeDifference {
                    column: column.clone(),
                    source_type,
                    target_type,
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn table_schema_diff(table: String, fields: &Map<String, Value>) -> TableSchemaDiff {
    let get = |keys: &[&str]| keys.iter().find_map(|k| fields.get(*k));
    TableSchemaDiff {
        table,
        columns_only_in_source: column_defs(get(&[
            "columns_only_in_source",
            "source_only_columns",
            "columns_missing_in_target",
            "removed_columns",
        ])),
        columns_only_in_target: column_defs(get(&[
            "columns_only_in_target",
            "target_only_columns",
            "columns_missing_in_source",
            "added_columns",
        ])),
        type_differences: type_differences(get(&[
            "type_differences",
            "type_mismatches",
            "type_changes",
            "column_type_differences",
        ])),
    }
}

const SOURCE_TABLE_KEYS: &[&str] = &[
    "tables_only_in_source",
    "source_only_tables",
    "tables_missing_in_target",
    "removed_tables",
];
const TARGET_TABLE_KEYS: &[&str] = &[
    "tables_only_in_target",
    "target_only_tables",
    "tables_missing_in_source",
    "added_tables",
];
const COMMON_TABLE_KEYS: &[&str] = &["common_tables", "tables_in_both"];
const TABLE_DIFF_KEYS: &[&str] = &["table_differences", "column_differences", "table_diffs", "tables"];

fn normalize_schema(raw: &Map<String, Value>) -> Result<SchemaResult> {
    let root = ["schema_diff", "diff"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_object))
        .unwrap_or(raw);
    let sections = [root, raw];

    // An unrecognized tree is not the same as identical schemas.
    if ![SOURCE_TABLE_KEYS, TARGET_TABLE_KEYS, COMMON_TABLE_KEYS, TABLE_DIFF_KEYS]
        .iter()
        .any(|keys| pick(&sections, keys).is_some())
    {
        return Err(DiffError::InvalidPayload(format!(
            "schema result carries no table lists or table differences (keys: {})",
            root.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }

    let table_differences = match pick(&sections, TABLE_DIFF_KEYS) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(table, fields)| {
                fields
                    .as_object()
                    .map(|fields| table_schema_diff(table.clone(), fields))
            })
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let fields = item.as_object()?;
                let table = name_of(item)?;
                Some(table_schema_diff(table, fields))
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(SchemaResult {
        tables_only_in_source: string_list(pick(&sections, SOURCE_TABLE_KEYS)),
        tables_only_in_target: string_list(pick(&sections, TARGET_TABLE_KEYS)),
        common_tables: string_list(pick(&sections, COMMON_TABLE_KEYS)),
        table_differences: table_differences
            .into_iter()
            .filter(|diff: &TableSchemaDiff| {
                !(diff.columns_only_in_source.is_empty()
                    && diff.columns_only_in_target.is_empty()
                    && diff.type_differences.is_empty())
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(raw: Value) -> TableResult {
        match normalize_result(&raw, None).unwrap() {
            ComparisonResult::Table(t) => t,
            other => panic!("expected table result, got {:?}", other),
        }
    }

    fn schema(raw: Value) -> SchemaResult {
        match normalize_result(&raw, None).unwrap() {
            ComparisonResult::Schema(s) => s,
            other => panic!("expected schema result, got {:?}", other),
        }
    }

    #[test]
    fn test_table_summary_counts() {
        let result = table(json!({
            "summary": {
                "source_row_count": 100,
                "target_row_count": 98,
                "rows_only_in_source": 3,
                "rows_only_in_target": 1,
                "rows_different": 2,
            },
            "key_columns": ["id"],
        }));
        assert_eq!(result.total_differences, 6);
        assert_eq!(result.rows_matched, 95);
        assert!((result.match_rate - 95.0).abs() < 1e-9);
        assert_eq!(result.status, TableStatus::Differences);
    }

    #[test]
    fn test_signed_rows_pair_into_mismatch() {
        let result = table(json!({
            "columns": ["id", "name", "amount"],
            "differences": [
                ["-", [1, "alice", 10]],
                ["+", [1, "alice", 12]],
                ["-", [2, "bob", 5]],
                ["+", [3, "carol", 7]],
            ],
        }));
        assert_eq!(result.differences.len(), 3);
        let mismatch = &result.differences[0];
        assert_eq!(mismatch.kind, DifferenceKind::ValueMismatch);
        assert_eq!(mismatch.key, json!(1));
        assert_eq!(mismatch.changed_columns, vec!["amount"]);
        assert_eq!(result.differences[1].kind, DifferenceKind::OnlyInSource);
        assert_eq!(result.differences[2].kind, DifferenceKind::OnlyInTarget);
        assert_eq!(result.rows_only_in_source, 1);
        assert_eq!(result.rows_only_in_target, 1);
        assert_eq!(result.rows_with_value_differences, 1);
    }

    #[test]
    fn test_object_differences() {
        let result = table(json!({
            "key_columns": ["id"],
            "differences": [
                {"type": "value_mismatch", "key": 7, "source": {"id": 7, "v": "a"}, "target": {"id": 7, "v": "b"}},
                {"type": "missing_in_target", "row": {"id": 9, "v": "z"}},
            ],
        }));
        assert_eq!(result.differences[0].changed_columns, vec!["v"]);
        assert_eq!(result.differences[1].kind, DifferenceKind::OnlyInSource);
        assert_eq!(result.differences[1].key, json!(9));
    }

    #[test]
    fn test_clean_match() {
        let result = table(json!({"source_row_count": 10, "target_row_count": 10}));
        assert_eq!(result.status, TableStatus::Match);
        assert_eq!(result.match_rate, 100.0);
    }

    #[test]
    fn test_skipped_columns_make_result_incomplete() {
        let result = table(json!({
            "source_row_count": 10,
            "target_row_count": 10,
            "skipped_columns": ["geom"],
        }));
        assert_eq!(result.status, TableStatus::Incomplete);
        assert_eq!(result.skipped_columns, vec!["geom"]);
    }

    #[test]
    fn test_fractional_match_rate_becomes_percent() {
        let result = table(json!({"match_rate": 0.5}));
        assert_eq!(result.match_rate, 50.0);
    }

    #[test]
    fn test_match_percentage_is_never_scaled() {
        let small = table(json!({"match_percentage": 0.5}));
        assert_eq!(small.match_rate, 0.5);
        let one = table(json!({"summary": {"match_percentage": 1.0}}));
        assert_eq!(one.match_rate, 1.0);
        let both = table(json!({"match_rate_percent": 97.5, "match_rate": 0.2}));
        assert_eq!(both.match_rate, 97.5);
    }

    #[test]
    fn test_sampling_block_produces_interval() {
        let result = table(json!({
            "source_row_count": 1_000_000,
            "sampling": {
                "sample_size": 10_000,
                "method": "bernoulli",
                "confidence_level": 0.95,
                "sampled_differences": 12,
            },
        }));
        let sampling = result.sampling.unwrap();
        assert_eq!(sampling.population_size, Some(1_000_000));
        assert!((sampling.estimated_differences - 1_200.0).abs() < 1e-6);
        assert!(sampling.confidence_interval.lower < 1_200.0);
        assert!(sampling.confidence_interval.upper > 1_200.0);
        assert_eq!(result.status, TableStatus::Differences);
    }

    #[test]
    fn test_backend_interval_is_kept() {
        let result = table(json!({
            "sampling": {"sample_size": 100, "confidence_interval": [4.0, 9.5]},
        }));
        let interval = result.sampling.unwrap().confidence_interval;
        assert_eq!(interval.lower, 4.0);
        assert_eq!(interval.upper, 9.5);
    }

    #[test]
    fn test_schema_detection_and_parsing() {
        let result = schema(json!({
            "tables_only_in_source": ["legacy"],
            "tables_only_in_target": [],
            "table_differences": {
                "orders": {
                    "columns_only_in_source": {"discount": "numeric"},
                    "type_differences": {"amount": ["numeric(10,2)", "float8"]},
                },
                "customers": {},
            },
        }));
        assert_eq!(result.tables_only_in_source, vec!["legacy"]);
        assert_eq!(result.table_differences.len(), 1);
        let orders = &result.table_differences[0];
        assert_eq!(orders.columns_only_in_source[0].name, "discount");
        assert_eq!(orders.type_differences[0].target_type, "float8");
    }

    #[test]
    fn test_schema_array_form_under_schema_diff() {
        let result = schema(json!({
            "schema_diff": {
                "target_only_tables": [{"name": "audit"}],
                "tables": [
                    {"table": "users", "type_mismatches": [{"column": "age", "source_type": "int", "target_type": "bigint"}]}
                ]
            }
        }));
        assert_eq!(result.tables_only_in_target, vec!["audit"]);
        assert_eq!(result.table_differences[0].type_differences[0].column, "age");
    }

    #[test]
    fn test_declared_type_wins_and_hint_applies() {
        let raw = json!({"comparison_type": "schema", "common_tables": ["users"]});
        assert!(matches!(normalize_result(&raw, Some(OperationKind::Table)).unwrap(), ComparisonResult::Schema(_)));
        let lists = json!({"common_tables": ["users"]});
        assert!(matches!(normalize_result(&lists, Some(OperationKind::Schema)).unwrap(), ComparisonResult::Schema(_)));
        let counts = json!({"source_row_count": 2});
        assert!(matches!(normalize_result(&counts, None).unwrap(), ComparisonResult::Table(_)));
    }

    #[test]
    fn test_unrecognized_table_result_is_rejected() {
        for raw in [json!({}), json!({"outcome": {"rows": 5}, "mismatches": 12})] {
            let err = normalize_result(&raw, Some(OperationKind::Table)).unwrap_err();
            assert!(matches!(err, DiffError::InvalidPayload(_)), "{}", raw);
        }
        // A comparison_config echo alone is not an outcome.
        let echoed = json!({"config": {"key_columns": ["id"]}, "sampling_note": "n/a"});
        assert!(normalize_result(&echoed, None).is_err());
    }

    #[test]
    fn test_unrecognized_schema_tree_is_rejected() {
        let err = normalize_result(&json!({"catalog": {"tables": 3}}), Some(OperationKind::Schema)).unwrap_err();
        assert!(matches!(err, DiffError::InvalidPayload(_)));

        let identical = schema(json!({
            "tables_only_in_source": [],
            "tables_only_in_target": [],
            "common_tables": ["users"],
        }));
        assert!(identical.table_differences.is_empty());
        assert_eq!(identical.common_tables, vec!["users"]);
    }

    #[test]
    fn test_huge_counters_saturate() {
        let result = table(json!({
            "source_row_count": 10,
            "rows_only_in_source": u64::MAX,
            "rows_only_in_target": 1,
            "rows_different": 1,
        }));
        assert_eq!(result.total_differences, u64::MAX);
        assert_eq!(result.rows_matched, 0);
        assert_eq!(result.status, TableStatus::Differences);
    }

    #[test]
    fn test_string_encoded_result() {
        let raw = Value::String(r#"{"source_row_count": 3, "target_row_count": 3}"#.to_string());
        assert!(matches!(normalize_result(&raw, None).unwrap(), ComparisonResult::Table(_)));
        assert!(normalize_result(&json!([1, 2]), None).is_err());
    }
}
